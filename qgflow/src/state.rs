use crate::{Field3, Float, Grid, QgError, Result};

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PhysicalConstants {
    /// Reference Coriolis parameter (1/s).
    pub f0: Float,
    /// Reference density (kg/m³).
    pub rho0: Float,
    /// Gravitational acceleration (m/s²).
    pub g: Float,
}

impl Default for PhysicalConstants {
    fn default() -> Self {
        Self {
            f0: 8.5158e-5,
            rho0: 1000.,
            g: 9.81,
        }
    }
}

/// The simulated fields.
///
/// PSI is derived from Q by inversion and is never advanced on its own.
#[derive(Clone, Debug)]
pub struct State {
    pub q: Field3,
    pub psi: Field3,
    pub rho: Field3,
    pub constants: PhysicalConstants,
}

impl State {
    pub fn zeros(grid: &Grid, constants: PhysicalConstants) -> Self {
        let [nx, ny, nz] = grid.shape();
        Self {
            q: Field3::zeros((nx, ny, nz)),
            psi: Field3::zeros((nx, ny, nz)),
            rho: Field3::zeros((nx, ny, nz)),
            constants,
        }
    }

    pub fn new(q: Field3, psi: Field3, rho: Field3, constants: PhysicalConstants) -> Self {
        Self {
            q,
            psi,
            rho,
            constants,
        }
    }

    /// Checks that Q, PSI and RHO all have the grid's shape.
    pub fn check_shapes(&self, grid: &Grid) -> Result<()> {
        for (name, field) in [("Q", &self.q), ("PSI", &self.psi), ("RHO", &self.rho)] {
            check_field_shape(name, field, grid.shape())?;
        }
        Ok(())
    }

    /// Checks that every field matches the grid and the constants are usable.
    pub fn validate(&self, grid: &Grid) -> Result<()> {
        let shape = grid.shape();
        self.check_shapes(grid)?;
        for (name, field) in [("Q", &self.q), ("PSI", &self.psi), ("RHO", &self.rho)] {
            if let Some(((i, j, k), value)) = field.indexed_iter().find(|(_, v)| !v.is_finite()) {
                return Err(QgError::configuration(
                    shape,
                    format!("field {name} holds {value} at {:?}", [i, j, k]),
                ));
            }
        }
        let PhysicalConstants { f0, rho0, g } = self.constants;
        if !(f0.is_finite() && rho0.is_finite() && rho0 > 0. && g.is_finite() && g > 0.) {
            return Err(QgError::configuration(
                shape,
                format!("invalid physical constants f0={f0}, rho0={rho0}, g={g}"),
            ));
        }
        Ok(())
    }

    /// Domain integral of Q weighted by cell volume.
    pub fn integrated_q(&self, grid: &Grid) -> Float {
        self.q
            .indexed_iter()
            .map(|((i, j, k), q)| q * grid.cell_area(i, j) * grid.dzc()[k])
            .sum()
    }
}

pub(crate) fn check_field_shape(name: &str, field: &Field3, shape: [usize; 3]) -> Result<()> {
    let (nx, ny, nz) = field.dim();
    if [nx, ny, nz] != shape {
        return Err(QgError::configuration(
            shape,
            format!("field {name} has shape {:?}", [nx, ny, nz]),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::VerticalGrid;

    #[test]
    fn test_validate_shapes() {
        let grid = Grid::uniform(3, 5, 1e3, 1e3, VerticalGrid::uniform(4, 100.)).unwrap();
        let mut state = State::zeros(&grid, PhysicalConstants::default());
        state.validate(&grid).unwrap();

        state.rho = Field3::zeros((3, 5, 5));
        assert!(matches!(
            state.validate(&grid),
            Err(QgError::Configuration { shape: [3, 5, 4], .. })
        ));

        let mut state = State::zeros(&grid, PhysicalConstants::default());
        state.q[[1, 2, 3]] = Float::NAN;
        assert!(state.validate(&grid).is_err());
    }

    #[test]
    fn test_integrated_q() {
        let grid = Grid::uniform(3, 5, 2., 3., VerticalGrid::uniform(4, 10.)).unwrap();
        let mut state = State::zeros(&grid, PhysicalConstants::default());
        state.q.fill(0.5);
        approx::assert_relative_eq!(state.integrated_q(&grid), 0.5 * 60. * 6. * 10.);
    }
}
