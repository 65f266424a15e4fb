use crate::{
    config::{SolverConfig, SolverMethod},
    indexing::Indexing,
    linalg::{self, LinearSolveError},
    operator::EllipticOperator,
    state::check_field_shape,
    Array1, Field3, QgError, Result,
};

pub use crate::linalg::SolveStats;

/// Persistent context for `L · PSI = Q`: the assembled operator, the chosen
/// Krylov method and its scratch vectors.
pub struct PvInversion {
    operator: EllipticOperator,
    config: SolverConfig,
    method: SolverMethod,
    workspace: linalg::Workspace,
    rhs: Array1,
    solution: Array1,
}

impl PvInversion {
    pub fn new(operator: EllipticOperator, config: SolverConfig) -> Result<Self> {
        let method = match config.method {
            SolverMethod::Auto if operator.is_symmetric() => SolverMethod::ConjugateGradient,
            SolverMethod::Auto => SolverMethod::BiCgStab,
            SolverMethod::ConjugateGradient if !operator.is_symmetric() => {
                return Err(QgError::configuration(
                    operator.shape(),
                    "conjugate gradient needs a symmetric operator (uniform horizontal and \
                     vertical grid)",
                ));
            }
            method => method,
        };
        log::info!("PV inversion uses {method}");
        let len = operator.indexing().len();
        Ok(Self {
            workspace: linalg::Workspace::new(operator.matrix()),
            operator,
            config,
            method,
            rhs: Array1::zeros(len),
            solution: Array1::zeros(len),
        })
    }

    pub fn operator(&self) -> &EllipticOperator {
        &self.operator
    }

    pub fn method(&self) -> SolverMethod {
        self.method
    }

    /// Solves for PSI given Q, warm-starting from the current contents of `psi`.
    ///
    /// PV on the top, bottom and lateral boundary cells is replaced by zero, so the
    /// boundary rows carry homogeneous conditions. `q` is left untouched.
    pub fn solve(&mut self, q: &Field3, psi: &mut Field3) -> Result<SolveStats> {
        let shape = self.operator.shape();
        let indexing = *self.operator.indexing();
        check_field_shape("Q", q, shape)?;
        check_field_shape("PSI", psi, shape)?;

        indexing.flatten_into(q, &mut self.rhs);
        for &flat_index in self.operator.boundary_cells() {
            self.rhs[flat_index] = 0.;
        }
        self.operator.remove_null_component(&mut self.rhs);
        indexing.flatten_into(psi, &mut self.solution);

        let solve: linalg::SolveFn = match self.method {
            SolverMethod::ConjugateGradient | SolverMethod::Auto => linalg::solve_cg,
            SolverMethod::BiCgStab => linalg::solve_bicgstab,
        };
        let stats = solve(
            self.operator.matrix(),
            &mut self.solution,
            &self.rhs,
            &self.config,
            &mut self.workspace,
        )
        .map_err(|error| match error {
            LinearSolveError::MaxItersReached {
                iters,
                residual,
                target,
            } => QgError::Convergence {
                shape,
                iters,
                residual,
                target,
                reason: "iteration budget exhausted",
            },
            LinearSolveError::Breakdown {
                iters,
                residual,
                target,
            } => QgError::Convergence {
                shape,
                iters,
                residual,
                target,
                reason: "Krylov breakdown",
            },
        })?;

        self.operator.remove_null_component(&mut self.solution);
        self.operator.fill_ghosts(&mut self.solution);
        if let Some((flat_index, &value)) =
            self.solution.iter().enumerate().find(|(_, value)| !value.is_finite())
        {
            return Err(QgError::NumericalDomain {
                shape,
                index: indexing.unflatten(flat_index).to_array_index(),
                value,
                reason: "non-finite streamfunction",
            });
        }
        indexing.unflatten_into(&self.solution, psi);
        log::debug!(
            "Inversion converged in {} iterations (residual {:e}, target {:e})",
            stats.iters,
            stats.residual,
            stats.target
        );
        Ok(stats)
    }
}
