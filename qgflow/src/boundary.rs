use ndarray as nd;

use crate::{config::DensitySource, grid::Grid, state::State, Field3};

fn copy_plane(field: &mut Field3, axis: usize, from: usize, to: usize) {
    let plane = field.index_axis(nd::Axis(axis), from).to_owned();
    field.index_axis_mut(nd::Axis(axis), to).assign(&plane);
}

/// Zero normal gradient of Q on the lateral walls: south, north, west and east
/// in turn copy their inward neighbour.
pub fn reset_lateral(q: &mut Field3) {
    let (nx, ny, _) = q.dim();
    copy_plane(q, 1, 1, 0);
    copy_plane(q, 1, ny - 2, ny - 1);
    copy_plane(q, 0, 1, 0);
    copy_plane(q, 0, nx - 2, nx - 1);
}

/// Loads the `k_down`/`k_up` layers of Q from the density field or from the
/// vertical shear of PSI.
pub fn load_boundary_density(grid: &Grid, state: &mut State, source: DensitySource) {
    let (k_down, k_up) = (grid.k_down(), grid.k_up());
    let layer = |field: &Field3, k: usize| field.index_axis(nd::Axis(2), k).to_owned();
    let (down, up) = match source {
        DensitySource::Density => (
            (layer(&state.rho, k_down) + layer(&state.rho, k_down + 1)) * 0.5,
            (layer(&state.rho, k_up) + layer(&state.rho, k_up - 1)) * 0.5,
        ),
        DensitySource::Streamfunction => {
            let constants = state.constants;
            let psi_to_rho = -constants.rho0 * constants.f0 / constants.g;
            let dzw = grid.dzw();
            (
                (layer(&state.psi, k_down + 1) - layer(&state.psi, k_down))
                    * (psi_to_rho / dzw[k_down]),
                (layer(&state.psi, k_up) - layer(&state.psi, k_up - 1))
                    * (psi_to_rho / dzw[k_up - 1]),
            )
        }
    };
    state.q.index_axis_mut(nd::Axis(2), k_down).assign(&down);
    state.q.index_axis_mut(nd::Axis(2), k_up).assign(&up);
}

/// Mirrors the stepped boundary layers of Q into the two density layers
/// straddling each marker.
pub fn sync_boundary_density(grid: &Grid, state: &mut State) {
    let (k_down, k_up) = (grid.k_down(), grid.k_up());
    for (source, targets) in [(k_down, [k_down, k_down + 1]), (k_up, [k_up, k_up - 1])] {
        let layer = state.q.index_axis(nd::Axis(2), source).to_owned();
        for k in targets {
            state.rho.index_axis_mut(nd::Axis(2), k).assign(&layer);
        }
    }
}

/// Replaces the `k_down`/`k_up` layers of Q with their inner neighbours.
pub fn reset_vertical_boundaries(grid: &Grid, q: &mut Field3) {
    let (k_down, k_up) = (grid.k_down(), grid.k_up());
    copy_plane(q, 2, k_down + 1, k_down);
    copy_plane(q, 2, k_up - 1, k_up);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        grid::VerticalGrid,
        state::PhysicalConstants,
        test_util::assert_all_close,
        Float,
    };

    fn labelled(shape: (usize, usize, usize)) -> Field3 {
        Field3::from_shape_fn(shape, |(i, j, k)| (100 * i + 10 * j + k) as Float)
    }

    #[test]
    fn test_reset_lateral() {
        let mut q = labelled((5, 4, 3));
        reset_lateral(&mut q);
        assert_eq!(q[[2, 0, 1]], q[[2, 1, 1]]);
        assert_eq!(q[[2, 3, 1]], q[[2, 2, 1]]);
        assert_eq!(q[[0, 2, 2]], q[[1, 2, 2]]);
        assert_eq!(q[[4, 2, 0]], q[[3, 2, 0]]);
        // Corners end up with the diagonal interior value.
        assert_eq!(q[[0, 0, 1]], 100. + 10. + 1.);
        assert_eq!(q[[4, 3, 1]], 300. + 20. + 1.);
        // Interior untouched.
        assert_eq!(q[[2, 2, 2]], 222.);
    }

    #[test]
    fn test_reset_lateral_is_idempotent() {
        let mut rng = frand::Rand::with_seed(0);
        let mut q = Field3::from_shape_simple_fn((6, 7, 4), || rng.gen_range((-1.)..1.));
        reset_lateral(&mut q);
        let once = q.clone();
        reset_lateral(&mut q);
        assert_eq!(q, once);
    }

    #[test]
    fn test_density_coupling_layers() {
        let grid = Grid::uniform(3, 3, 1., 1., VerticalGrid::uniform(6, 50.)).unwrap();
        let constants = PhysicalConstants {
            f0: 1e-4,
            rho0: 1000.,
            g: 10.,
        };
        let mut state = State::new(
            Field3::zeros((3, 3, 6)),
            labelled((3, 3, 6)),
            labelled((3, 3, 6)) * 2.,
            constants,
        );

        load_boundary_density(&grid, &mut state, DensitySource::Density);
        approx::assert_relative_eq!(state.q[[1, 2, 1]], (242. + 244.) / 2.);
        approx::assert_relative_eq!(state.q[[1, 2, 4]], (248. + 246.) / 2.);

        load_boundary_density(&grid, &mut state, DensitySource::Streamfunction);
        let expected = 1. / 50. * (-1000. * 1e-4 / 10.);
        assert_all_close(
            &state.q.index_axis(nd::Axis(2), 1).to_owned(),
            &nd::Array2::from_elem((3, 3), expected),
        );
        assert_all_close(
            &state.q.index_axis(nd::Axis(2), 4).to_owned(),
            &nd::Array2::from_elem((3, 3), expected),
        );

        state.q.index_axis_mut(nd::Axis(2), 1).fill(7.);
        state.q.index_axis_mut(nd::Axis(2), 4).fill(-3.);
        sync_boundary_density(&grid, &mut state);
        let column: Vec<Float> = (0..6).map(|k| state.rho[[2, 1, k]]).collect();
        assert_eq!(column, vec![420., 7., 7., -3., -3., 430.]);
    }

    #[test]
    fn test_reset_vertical_boundaries() {
        let grid = Grid::uniform(3, 3, 1., 1., VerticalGrid::uniform(6, 50.)).unwrap();
        let mut q = labelled((3, 3, 6));
        reset_vertical_boundaries(&grid, &mut q);
        assert_eq!(q[[1, 1, 1]], 112.);
        assert_eq!(q[[1, 1, 4]], 113.);
        assert_eq!(q[[1, 1, 0]], 110.);
        assert_eq!(q[[1, 1, 5]], 115.);
    }
}
