use crate::{
    decomposition::{Decomposition, HaloExchange, LocalBlock, Tile},
    grid::{Grid, HorizontalGrid},
    state::check_field_shape,
    Field3, Float, QgError, Result,
};

/// `-J(psi, a)` at `[i, j]` averaged over the three Arakawa (1966) forms, before
/// division by the cell area. `i` and `j` must not be on the outer ring.
fn arakawa(
    a: impl Fn(usize, usize) -> Float,
    psi: impl Fn(usize, usize) -> Float,
    i: usize,
    j: usize,
) -> Float {
    let (ip, im, jp, jm) = (i + 1, i - 1, j + 1, j - 1);
    let j_pp = (a(ip, j) - a(im, j)) * (psi(i, jp) - psi(i, jm))
        - (a(i, jp) - a(i, jm)) * (psi(ip, j) - psi(im, j));
    let j_pc = a(ip, j) * (psi(ip, jp) - psi(ip, jm))
        - a(im, j) * (psi(im, jp) - psi(im, jm))
        - a(i, jp) * (psi(ip, jp) - psi(im, jp))
        + a(i, jm) * (psi(ip, jm) - psi(im, jm));
    let j_cp = a(ip, jp) * (psi(i, jp) - psi(ip, j))
        - a(im, jm) * (psi(im, j) - psi(i, jm))
        - a(im, jp) * (psi(i, jp) - psi(im, j))
        + a(ip, jm) * (psi(ip, j) - psi(i, jm));
    0.25 * (j_pp + j_pc + j_cp) / 3.
}

/// Evaluates `dQ/dt` for one configuration of grid and diffusivity.
#[derive(Clone, Copy)]
pub struct RhsComputer<'a> {
    grid: &'a Grid,
    diffusivity: Float,
}

impl<'a> RhsComputer<'a> {
    pub fn new(grid: &'a Grid, diffusivity: Float) -> Self {
        Self { grid, diffusivity }
    }

    /// Fills `dq` with the tendency of `q` advected by `psi`.
    ///
    /// The outer lateral ring is set to exactly zero.
    pub fn compute<E: HaloExchange + ?Sized>(
        &self,
        decomposition: &Decomposition,
        exchange: &E,
        q: &Field3,
        psi: &Field3,
        dq: &mut Field3,
    ) -> Result<()> {
        let shape = self.grid.shape();
        for (name, field) in [("Q", q), ("PSI", psi), ("dQ", &*dq)] {
            check_field_shape(name, field, shape)?;
        }
        if decomposition.shape() != shape {
            return Err(QgError::configuration(
                shape,
                format!("decomposition covers {:?}", decomposition.shape()),
            ));
        }
        decomposition.map_tiles(dq, |tile| {
            let q = exchange.global_to_local(q, tile);
            let psi = exchange.global_to_local(psi, tile);
            self.tile_tendency(tile, &q, &psi)
        });
        if let Some(((i, j, k), &value)) = dq.indexed_iter().find(|(_, value)| !value.is_finite()) {
            return Err(QgError::NumericalDomain {
                shape,
                index: [i, j, k],
                value,
                reason: "non-finite PV tendency",
            });
        }
        Ok(())
    }

    fn tile_tendency(&self, tile: &Tile, q: &LocalBlock, psi: &LocalBlock) -> Field3 {
        let mut dq = Field3::zeros(tile.local_shape());
        let diffusivity = self.diffusivity;
        for i in tile.x_range() {
            for j in tile.y_range() {
                if tile.is_lateral_boundary(i, j) {
                    continue;
                }
                for k in tile.z_range() {
                    let q_at = |a: usize, b: usize| q.at(a, b, k);
                    let psi_at = |a: usize, b: usize| psi.at(a, b, k);
                    let center = q_at(i, j);
                    let value = match self.grid.horizontal() {
                        HorizontalGrid::Uniform { dx, dy } => {
                            arakawa(q_at, psi_at, i, j) / (dx * dy)
                                + diffusivity
                                    * ((q_at(i + 1, j) - 2. * center + q_at(i - 1, j)) / (dx * dx)
                                        + (q_at(i, j + 1) - 2. * center + q_at(i, j - 1))
                                            / (dy * dy))
                        }
                        HorizontalGrid::Curvilinear(metrics) => {
                            let area = metrics.dxt[[i, j]] * metrics.dyt[[i, j]];
                            // Planetary vorticity is advected on top of Q.
                            let advection = arakawa(q_at, psi_at, i, j)
                                + arakawa(|a, b| metrics.f[[a, b]], psi_at, i, j);
                            let grid = self.grid;
                            let dissipation = grid.x_face_ratio(i, j) * (q_at(i + 1, j) - center)
                                - grid.x_face_ratio(i - 1, j) * (center - q_at(i - 1, j))
                                + grid.y_face_ratio(i, j) * (q_at(i, j + 1) - center)
                                - grid.y_face_ratio(i, j - 1) * (center - q_at(i, j - 1));
                            (advection + diffusivity * dissipation) / area
                        }
                    };
                    dq[[i - tile.xs, j - tile.ys, k - tile.zs]] = value;
                }
            }
        }
        dq
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        decomposition::SharedMemoryExchange, examples, grid::VerticalGrid,
        test_util::assert_all_close,
    };

    fn uniform_grid() -> Grid {
        Grid::uniform(9, 8, 1e3, 2e3, VerticalGrid::uniform(4, 100.)).unwrap()
    }

    fn random_field(shape: [usize; 3], seed: u64) -> Field3 {
        let [nx, ny, nz] = shape;
        let mut rng = frand::Rand::with_seed(seed);
        Field3::from_shape_simple_fn((nx, ny, nz), || rng.gen_range((-1.)..1.))
    }

    fn tendency(grid: &Grid, decomposition: &Decomposition, q: &Field3, psi: &Field3, k: Float) -> Field3 {
        let [nx, ny, nz] = grid.shape();
        let mut dq = Field3::from_elem((nx, ny, nz), Float::NAN);
        RhsComputer::new(grid, k)
            .compute(decomposition, &SharedMemoryExchange, q, psi, &mut dq)
            .unwrap();
        dq
    }

    #[test]
    fn test_zero_pv_gives_zero_tendency() {
        let grid = uniform_grid();
        let shape = grid.shape();
        let dq = tendency(
            &grid,
            &Decomposition::serial(shape),
            &Field3::zeros((9, 8, 4)),
            &random_field(shape, 1),
            0.,
        );
        assert!(dq.iter().all(|&value| value == 0.));
    }

    #[test]
    fn test_outer_ring_is_zero() {
        for grid in [uniform_grid(), examples::stretched_grid(9, 8, 4).unwrap()] {
            let shape = grid.shape();
            let dq = tendency(
                &grid,
                &Decomposition::new(shape, 2, 3).unwrap(),
                &random_field(shape, 2),
                &random_field(shape, 3),
                150.,
            );
            for ((i, j, _), &value) in dq.indexed_iter() {
                if i == 0 || j == 0 || i == 8 || j == 7 {
                    assert_eq!(value, 0.);
                } else {
                    assert!(value != 0.);
                }
            }
        }
    }

    #[test]
    fn test_tiling_does_not_change_result() {
        let grid = examples::stretched_grid(11, 9, 5).unwrap();
        let shape = grid.shape();
        let q = random_field(shape, 4);
        let psi = random_field(shape, 5);
        let serial = tendency(&grid, &Decomposition::serial(shape), &q, &psi, 80.);
        let tiled = tendency(&grid, &Decomposition::new(shape, 3, 2).unwrap(), &q, &psi, 80.);
        assert_eq!(serial, tiled);
    }

    #[test]
    fn test_self_advection_vanishes() {
        let grid = uniform_grid();
        let shape = grid.shape();
        let psi = random_field(shape, 6);
        let dq = tendency(&grid, &Decomposition::serial(shape), &psi, &psi, 0.);
        assert_all_close(&dq, &Field3::zeros((9, 8, 4)))
            .with_abs_tol(Some(1e-20))
            .with_rel_tol(None);
    }

    #[test]
    fn test_advection_conserves_compact_pv() {
        let grid = uniform_grid();
        let shape = grid.shape();
        let mut q = random_field(shape, 7);
        q.indexed_iter_mut().for_each(|((i, j, _), value)| {
            if !(2..7).contains(&i) || !(2..6).contains(&j) {
                *value = 0.;
            }
        });
        let dq = tendency(&grid, &Decomposition::serial(shape), &q, &random_field(shape, 8), 0.);
        let total: Float = dq.sum();
        let scale: Float = dq.iter().map(|value| value.abs()).sum();
        assert!(total.abs() <= 1e-13 * scale, "{total} vs {scale}");
    }

    #[test]
    fn test_non_finite_pv_is_reported() {
        let grid = uniform_grid();
        let shape = grid.shape();
        let mut q = random_field(shape, 9);
        q[[3, 3, 1]] = Float::NAN;
        let mut dq = Field3::zeros((9, 8, 4));
        let result = RhsComputer::new(&grid, 0.).compute(
            &Decomposition::new(shape, 2, 2).unwrap(),
            &SharedMemoryExchange,
            &q,
            &random_field(shape, 10),
            &mut dq,
        );
        // The first cell in row-major order whose stencil reaches [3, 3].
        match result {
            Err(QgError::NumericalDomain {
                shape: got,
                index,
                value,
                ..
            }) => {
                assert_eq!(got, shape);
                assert_eq!(index, [2, 2, 1]);
                assert!(value.is_nan());
            }
            other => panic!("expected a numerical domain error, got {other:?}"),
        }
    }

    #[test]
    fn test_rejects_mismatched_fields() {
        let grid = uniform_grid();
        let shape = grid.shape();
        let rhs = RhsComputer::new(&grid, 0.);
        let q = random_field(shape, 11);
        let mut dq = Field3::zeros((9, 8, 4));
        let result = rhs.compute(
            &Decomposition::serial(shape),
            &SharedMemoryExchange,
            &q,
            &Field3::zeros((9, 8, 5)),
            &mut dq,
        );
        assert!(matches!(result, Err(QgError::Configuration { .. })));
        let result = rhs.compute(
            &Decomposition::serial([9, 7, 4]),
            &SharedMemoryExchange,
            &q,
            &q,
            &mut dq,
        );
        assert!(matches!(result, Err(QgError::Configuration { .. })));
    }

    #[test]
    fn test_uniform_dissipation() {
        let grid = uniform_grid();
        let q = Field3::from_shape_fn((9, 8, 4), |(i, j, _)| {
            let (x, y) = (i as Float * 1e3, j as Float * 2e3);
            x * x + 3. * y * y
        });
        let dq = tendency(
            &grid,
            &Decomposition::serial(grid.shape()),
            &q,
            &Field3::zeros((9, 8, 4)),
            10.,
        );
        approx::assert_relative_eq!(dq[[4, 4, 2]], 10. * (2. + 6.), max_relative = 1e-9);
    }

    #[test]
    fn test_curvilinear_dissipation_preserves_constants() {
        let grid = examples::stretched_grid(9, 8, 4).unwrap();
        let (nx, ny, nz) = (9, 8, 4);
        let q = Field3::from_elem((nx, ny, nz), 2.5);
        let mut psi = Field3::zeros((nx, ny, nz));
        let dq = tendency(&grid, &Decomposition::serial(grid.shape()), &q, &psi, 500.);
        assert_all_close(&dq, &Field3::zeros((nx, ny, nz)))
            .with_abs_tol(Some(1e-15))
            .with_rel_tol(None);

        // A uniform flow across the Coriolis gradient still feels the planetary term.
        psi.indexed_iter_mut()
            .for_each(|((i, _, _), value)| *value = i as Float);
        let dq = tendency(&grid, &Decomposition::serial(grid.shape()), &q, &psi, 0.);
        assert!(dq[[4, 4, 1]].abs() > 0.);
    }
}
