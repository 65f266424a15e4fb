use crate::{
    config::ModelConfig,
    decomposition::Decomposition,
    grid::{CurvilinearMetrics, Grid, Stratification, VerticalGrid},
    state::{PhysicalConstants, State},
    Array1, Array2, Field3, Float, QgModel, Result,
};

/// Everything needed to construct a [`QgModel`].
pub struct Preset {
    pub grid: Grid,
    pub stratification: Stratification,
    pub state: State,
    pub config: ModelConfig,
}
impl Preset {
    pub fn into_model(self, decomposition: Decomposition) -> Result<QgModel> {
        QgModel::new(
            self.grid,
            self.stratification,
            self.state,
            self.config,
            decomposition,
        )
    }
}

/// Smoothly stretched horizontal metrics over an `nx × ny` box with nominal
/// spacings `dx`, `dy` and a beta-plane Coriolis parameter `f0 + beta y`.
pub fn stretched_metrics(
    nx: usize,
    ny: usize,
    dx: Float,
    dy: Float,
    f0: Float,
    beta: Float,
) -> CurvilinearMetrics {
    let frac = |index: usize, n: usize| index as Float / (n - 1) as Float;
    let dxt = Array2::from_shape_fn((nx, ny), |(i, j)| {
        dx * (1. + 0.3 * frac(i, nx)) * (1. + 0.1 * frac(j, ny))
    });
    let dyt = Array2::from_shape_fn((nx, ny), |(i, j)| {
        dy * (1. + 0.2 * frac(j, ny)) * (1. + 0.1 * frac(i, nx))
    });
    // U points sit half way to the next T point in x, V points in y.
    let towards = |metric: &Array2, di: usize, dj: usize| {
        Array2::from_shape_fn((nx, ny), |(i, j)| {
            let (i2, j2) = ((i + di).min(nx - 1), (j + dj).min(ny - 1));
            0.5 * (metric[[i, j]] + metric[[i2, j2]])
        })
    };
    let y = Array2::from_shape_fn((nx, ny), |(i, j)| {
        (0..j).map(|jj| dyt[[i, jj]]).sum::<Float>()
    });
    CurvilinearMetrics {
        dxu: towards(&dxt, 1, 0),
        dyu: towards(&dyt, 1, 0),
        dxv: towards(&dxt, 0, 1),
        dyv: towards(&dyt, 0, 1),
        f: y.mapv(|y| f0 + beta * y),
        dxt,
        dyt,
    }
}

/// `nz` layers over `depth` metres, thinning towards the surface.
pub fn stretched_vertical(nz: usize, depth: Float) -> Result<VerticalGrid> {
    let zf = Array1::from_shape_fn(nz + 1, |k| {
        -depth * (1. - k as Float / nz as Float).powf(1.5)
    });
    let zc = Array1::from_shape_fn(nz, |k| 0.5 * (zf[k] + zf[k + 1]));
    VerticalGrid::from_levels(&zc, &zf)
}

/// A curvilinear beta-plane grid of 5 km nominal spacing and 2 km depth.
pub fn stretched_grid(nx: usize, ny: usize, nz: usize) -> Result<Grid> {
    Grid::curvilinear(
        stretched_metrics(nx, ny, 5e3, 5e3, PhysicalConstants::default().f0, 2e-11),
        stretched_vertical(nz, 2000.)?,
    )
}

/// A Gaussian PV anomaly of width `radius` cells centred at `[ci, cj]` on the
/// interior levels.
fn gaussian_anomaly(shape: [usize; 3], ci: Float, cj: Float, radius: Float, amplitude: Float) -> Field3 {
    let [nx, ny, nz] = shape;
    Field3::from_shape_fn((nx, ny, nz), |(i, j, k)| {
        if k == 0 || k + 1 == nz {
            return 0.;
        }
        let r2 = ((i as Float - ci).powi(2) + (j as Float - cj).powi(2)) / radius.powi(2);
        amplitude * (-r2).exp()
    })
}

/// Uniform 10 km box, 100 m layers, with a centred Gaussian PV anomaly.
pub fn gaussian_box(nx: usize, ny: usize, nz: usize) -> Result<Preset> {
    let grid = Grid::uniform(nx, ny, 10e3, 10e3, VerticalGrid::uniform(nz, 100.))?;
    let constants = PhysicalConstants::default();
    let mut state = State::zeros(&grid, constants);
    state.q = gaussian_anomaly(
        grid.shape(),
        (nx - 1) as Float / 2.,
        (ny - 1) as Float / 2.,
        nx.min(ny) as Float / 8.,
        1e-5,
    );
    Ok(Preset {
        stratification: Stratification::constant(nz, 1e-5),
        state,
        config: ModelConfig::default(),
        grid,
    })
}

/// Stretched beta-plane box with surface-intensified stratification and an
/// off-centre anomaly.
pub fn beta_plane_box(nx: usize, ny: usize, nz: usize) -> Result<Preset> {
    let grid = stretched_grid(nx, ny, nz)?;
    let n2 = Array1::from_shape_fn(nz - 1, |k| 1e-6 * (1. + 9. * k as Float / (nz - 1) as Float));
    let mut state = State::zeros(&grid, PhysicalConstants::default());
    state.q = gaussian_anomaly(
        grid.shape(),
        (nx - 1) as Float / 3.,
        (ny - 1) as Float / 2.,
        nx.min(ny) as Float / 6.,
        -2e-5,
    );
    Ok(Preset {
        stratification: Stratification::new(n2),
        state,
        config: ModelConfig::default().with_diffusivity(50.),
        grid,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stretched_grid() {
        let grid = stretched_grid(6, 5, 7).unwrap();
        assert_eq!(grid.shape(), [6, 5, 7]);
        assert!(!grid.uniform_horizontal());
        assert!(!grid.uniform_vertical());
        approx::assert_relative_eq!(grid.dzc().sum(), 2000., max_relative = 1e-12);
        // Layers thin towards the surface.
        assert!(grid.dzc()[6] < grid.dzc()[0]);
    }

    #[test]
    fn test_presets_validate() {
        for preset in [gaussian_box(8, 9, 5).unwrap(), beta_plane_box(8, 9, 5).unwrap()] {
            preset.state.validate(&preset.grid).unwrap();
            preset.stratification.validate(&preset.grid).unwrap();
            preset.config.validate(preset.grid.shape()).unwrap();
        }
    }
}
