use crate::{
    boundary,
    config::{DensitySource, TimeConfig},
    decomposition::{Decomposition, HaloExchange},
    grid::Grid,
    inversion::PvInversion,
    rhs::RhsComputer,
    state::State,
    Field3, Float, Result, SECONDS_PER_DAY,
};

/// Stage weights of the final combination.
const RK4_WEIGHTS: [Float; 4] = [1. / 6., 1. / 3., 1. / 3., 1. / 6.];
/// Offsets of stages 1 to 3 from the start of the step.
const RK4_OFFSETS: [Float; 3] = [0.5, 0.5, 1.];

#[derive(Clone, Copy, Debug, PartialEq, Eq, strum::Display)]
pub enum StepperPhase {
    Idle,
    Stepping { stage: usize },
    BoundaryReset,
}

/// Classical RK4 integration of the PV equation.
///
/// Each stage inverts the current Q, evaluates the tendency and forms the next
/// stage estimate from the start-of-step snapshot. Lateral boundary values are
/// reset once per full step, never between stages.
pub struct TimeStepper {
    dt: Float,
    diffusivity: Float,
    t: Float,
    density_coupling: Option<DensitySource>,
    phase: StepperPhase,

    /// Q at the start of the step.
    rhs0: Field3,
    /// Accumulated RK4 combination.
    rhs1: Field3,
    dq: Field3,
}

impl TimeStepper {
    pub fn new(shape: [usize; 3], time: &TimeConfig) -> Self {
        let [nx, ny, nz] = shape;
        Self {
            dt: time.dt,
            diffusivity: time.diffusivity,
            t: time.t0,
            density_coupling: time.density_coupling,
            phase: StepperPhase::Idle,
            rhs0: Field3::zeros((nx, ny, nz)),
            rhs1: Field3::zeros((nx, ny, nz)),
            dq: Field3::zeros((nx, ny, nz)),
        }
    }

    /// Model time in seconds.
    pub fn time(&self) -> Float {
        self.t
    }

    pub fn dt(&self) -> Float {
        self.dt
    }

    pub fn phase(&self) -> StepperPhase {
        self.phase
    }

    /// Most recent tendency evaluated by the last stage.
    pub fn last_tendency(&self) -> &Field3 {
        &self.dq
    }

    /// Advances `state` by `nt` steps. On return PSI is the inversion of the final Q.
    ///
    /// Any error leaves `state` mid-step; its fields should then be considered
    /// corrupted.
    #[allow(clippy::too_many_arguments)]
    pub fn go<E: HaloExchange + ?Sized>(
        &mut self,
        nt: usize,
        grid: &Grid,
        decomposition: &Decomposition,
        exchange: &E,
        inversion: &mut PvInversion,
        state: &mut State,
    ) -> Result<()> {
        log::info!(
            "Start time stepping: {nt} steps of {} s from t = {:.4} d",
            self.dt,
            self.t / SECONDS_PER_DAY
        );
        let result = self.run(nt, grid, decomposition, exchange, inversion, state);
        self.phase = StepperPhase::Idle;
        result?;
        log::info!("Time stepping done at t = {:.4} d", self.t / SECONDS_PER_DAY);
        Ok(())
    }

    fn run<E: HaloExchange + ?Sized>(
        &mut self,
        nt: usize,
        grid: &Grid,
        decomposition: &Decomposition,
        exchange: &E,
        inversion: &mut PvInversion,
        state: &mut State,
    ) -> Result<()> {
        let rhs = RhsComputer::new(grid, self.diffusivity);
        let dt = self.dt;

        if let Some(source) = self.density_coupling {
            boundary::load_boundary_density(grid, state, source);
        }

        for _ in 0..nt {
            self.t += dt;
            self.rhs0.assign(&state.q);
            self.rhs1.assign(&state.q);
            for stage in 0..4 {
                self.phase = StepperPhase::Stepping { stage };
                if self.density_coupling.is_some() {
                    boundary::sync_boundary_density(grid, state);
                }
                inversion.solve(&state.q, &mut state.psi)?;
                rhs.compute(decomposition, exchange, &state.q, &state.psi, &mut self.dq)?;
                if stage < 3 {
                    state.q.assign(&self.rhs0);
                    state.q.scaled_add(RK4_OFFSETS[stage] * dt, &self.dq);
                }
                self.rhs1.scaled_add(RK4_WEIGHTS[stage] * dt, &self.dq);
            }
            self.phase = StepperPhase::BoundaryReset;
            state.q.assign(&self.rhs1);
            boundary::reset_lateral(&mut state.q);
            exchange.barrier();
            log::info!("t = {:.6} d", self.t / SECONDS_PER_DAY);
        }

        if self.density_coupling.is_some() {
            boundary::sync_boundary_density(grid, state);
        }
        inversion.solve(&state.q, &mut state.psi)?;
        exchange.barrier();
        boundary::reset_vertical_boundaries(grid, &mut state.q);
        Ok(())
    }
}
