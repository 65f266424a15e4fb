use serde::{Deserialize, Serialize};

use crate::{Float, QgError, Result, SECONDS_PER_DAY};

/// Condition applied at the top or bottom layer of the PV inversion.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, strum::EnumString, strum::Display,
)]
pub enum VerticalBoundary {
    /// Zero vertical derivative of PSI, i.e. a flux condition tied to the
    /// surface/bottom buoyancy (which the inversion sets to zero).
    #[default]
    #[strum(serialize = "N_PSI")]
    #[serde(alias = "N_PSI")]
    NeumannPsi,
    /// PSI vanishes on the layer.
    #[strum(serialize = "D")]
    #[serde(alias = "D")]
    Dirichlet,
}

/// Condition applied at the four lateral walls of the PV inversion.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, strum::EnumString, strum::Display,
)]
pub enum LateralBoundary {
    /// Zero normal derivative of PSI.
    #[default]
    #[strum(serialize = "N")]
    #[serde(alias = "N")]
    Neumann,
    /// PSI vanishes on the wall.
    #[strum(serialize = "D")]
    #[serde(alias = "D")]
    Dirichlet,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BoundarySpec {
    pub top: VerticalBoundary,
    pub bottom: VerticalBoundary,
    pub lateral: LateralBoundary,
}

impl BoundarySpec {
    pub fn hom_neumann() -> Self {
        Self::default()
    }

    pub fn hom_dirichlet() -> Self {
        Self {
            top: VerticalBoundary::Dirichlet,
            bottom: VerticalBoundary::Dirichlet,
            lateral: LateralBoundary::Dirichlet,
        }
    }

    /// Whether any wall pins PSI, which makes the operator non-singular.
    pub fn has_dirichlet(&self) -> bool {
        self.top == VerticalBoundary::Dirichlet
            || self.bottom == VerticalBoundary::Dirichlet
            || self.lateral == LateralBoundary::Dirichlet
    }
}

/// Where the surface/bottom PV layers are loaded from when density coupling is on.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
pub enum DensitySource {
    /// Vertical derivative of PSI converted to density.
    #[default]
    Streamfunction,
    /// Mean of the two density layers straddling the marker.
    Density,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
pub enum SolverMethod {
    /// Conjugate gradient for symmetric operators, BiCGSTAB otherwise.
    #[default]
    Auto,
    ConjugateGradient,
    BiCgStab,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverConfig {
    pub rel_tol: Float,
    pub abs_tol: Float,
    pub max_iters: usize,
    pub method: SolverMethod,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            rel_tol: 1e-10,
            abs_tol: 1e-30,
            max_iters: 10_000,
            method: SolverMethod::Auto,
        }
    }
}

impl SolverConfig {
    pub fn with_rel_tol(self, rel_tol: Float) -> Self {
        Self { rel_tol, ..self }
    }

    pub fn with_abs_tol(self, abs_tol: Float) -> Self {
        Self { abs_tol, ..self }
    }

    pub fn with_max_iters(self, max_iters: usize) -> Self {
        Self { max_iters, ..self }
    }

    pub fn with_method(self, method: SolverMethod) -> Self {
        Self { method, ..self }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeConfig {
    /// Fixed time step in seconds.
    pub dt: Float,
    /// Harmonic dissipation coefficient `K` in m²/s.
    pub diffusivity: Float,
    /// Model time at construction, in seconds.
    pub t0: Float,
    /// Advect surface and bottom densities through the PV boundary layers.
    pub density_coupling: Option<DensitySource>,
}

impl Default for TimeConfig {
    fn default() -> Self {
        Self {
            dt: 0.02 * SECONDS_PER_DAY,
            diffusivity: 200.,
            t0: 0.,
            density_coupling: None,
        }
    }
}

/// Run configuration, fixed at model construction. Versioned so that a driver
/// loading it from a document can reject layouts it does not understand.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    pub version: u32,
    pub boundary: BoundarySpec,
    pub time: TimeConfig,
    pub solver: SolverConfig,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            version: Self::VERSION,
            boundary: BoundarySpec::default(),
            time: TimeConfig::default(),
            solver: SolverConfig::default(),
        }
    }
}

impl ModelConfig {
    pub const VERSION: u32 = 1;

    pub fn with_boundary(self, boundary: BoundarySpec) -> Self {
        Self { boundary, ..self }
    }

    pub fn with_dt(self, dt: Float) -> Self {
        Self {
            time: TimeConfig { dt, ..self.time },
            ..self
        }
    }

    pub fn with_diffusivity(self, diffusivity: Float) -> Self {
        Self {
            time: TimeConfig {
                diffusivity,
                ..self.time
            },
            ..self
        }
    }

    pub fn with_t0(self, t0: Float) -> Self {
        Self {
            time: TimeConfig { t0, ..self.time },
            ..self
        }
    }

    pub fn with_density_coupling(self, density_coupling: Option<DensitySource>) -> Self {
        Self {
            time: TimeConfig {
                density_coupling,
                ..self.time
            },
            ..self
        }
    }

    pub fn with_solver(self, solver: SolverConfig) -> Self {
        Self { solver, ..self }
    }

    /// Rejects settings that cannot produce a meaningful run on a grid of `shape`.
    pub fn validate(&self, shape: [usize; 3]) -> Result<()> {
        let fail = |reason: String| Err(QgError::configuration(shape, reason));
        if self.version != Self::VERSION {
            return fail(format!(
                "unsupported configuration version {} (expected {})",
                self.version,
                Self::VERSION
            ));
        }
        if !(self.time.dt.is_finite() && self.time.dt > 0.) {
            return fail(format!("time step must be positive, got {}", self.time.dt));
        }
        if !(self.time.diffusivity.is_finite() && self.time.diffusivity >= 0.) {
            return fail(format!(
                "diffusivity must be non-negative, got {}",
                self.time.diffusivity
            ));
        }
        if !self.time.t0.is_finite() {
            return fail(format!("initial time must be finite, got {}", self.time.t0));
        }
        if !(self.solver.rel_tol > 0. && self.solver.abs_tol > 0.) {
            return fail(format!(
                "solver tolerances must be positive, got rel_tol={} abs_tol={}",
                self.solver.rel_tol, self.solver.abs_tol
            ));
        }
        if self.solver.max_iters == 0 {
            return fail("solver iteration budget must be non-zero".to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_boundary_tags() {
        use std::str::FromStr;

        assert_eq!(
            VerticalBoundary::from_str("N_PSI").unwrap(),
            VerticalBoundary::NeumannPsi
        );
        assert_eq!(
            VerticalBoundary::from_str("D").unwrap(),
            VerticalBoundary::Dirichlet
        );
        assert_eq!(
            LateralBoundary::from_str("N").unwrap(),
            LateralBoundary::Neumann
        );
        assert!(VerticalBoundary::from_str("periodic").is_err());
        assert_eq!(VerticalBoundary::NeumannPsi.to_string(), "N_PSI");
    }

    #[test]
    fn test_load_partial_document() {
        let config: ModelConfig = serde_json::from_str(
            r#"{
                "boundary": {"top": "N_PSI", "bottom": "D"},
                "time": {"dt": 600.0, "density_coupling": "Density"}
            }"#,
        )
        .unwrap();
        assert_eq!(config.version, ModelConfig::VERSION);
        assert_eq!(config.boundary.top, VerticalBoundary::NeumannPsi);
        assert_eq!(config.boundary.bottom, VerticalBoundary::Dirichlet);
        assert_eq!(config.boundary.lateral, LateralBoundary::Neumann);
        approx::assert_relative_eq!(config.time.dt, 600.);
        approx::assert_relative_eq!(config.time.diffusivity, 200.);
        assert_eq!(config.time.density_coupling, Some(DensitySource::Density));
        assert_eq!(config.solver, SolverConfig::default());
        config.validate([4, 4, 4]).unwrap();
    }

    #[test]
    fn test_validate() {
        let shape = [5, 6, 7];
        assert!(ModelConfig::default().validate(shape).is_ok());
        for config in [
            ModelConfig::default().with_dt(0.),
            ModelConfig::default().with_dt(Float::NAN),
            ModelConfig::default().with_diffusivity(-1.),
            ModelConfig::default().with_solver(SolverConfig::default().with_max_iters(0)),
            ModelConfig::default().with_solver(SolverConfig::default().with_rel_tol(0.)),
            ModelConfig {
                version: 7,
                ..ModelConfig::default()
            },
        ] {
            match config.validate(shape) {
                Err(QgError::Configuration { shape: got, .. }) => assert_eq!(got, shape),
                other => panic!("expected a configuration error, got {other:?}"),
            }
        }
    }
}
