use crate::{
    config::{ModelConfig, SolverMethod},
    decomposition::{Decomposition, HaloExchange, SharedMemoryExchange},
    grid::{Grid, Stratification},
    inversion::{PvInversion, SolveStats},
    operator::EllipticOperator,
    rhs::RhsComputer,
    state::State,
    timestepper::{StepperPhase, TimeStepper},
    Field3, Float, QgError, Result,
};

/// A configured QG model: grid, state, PV inversion and time stepper.
pub struct QgModel {
    grid: Grid,
    stratification: Stratification,
    state: State,
    config: ModelConfig,
    decomposition: Decomposition,
    exchange: Box<dyn HaloExchange + Send>,
    inversion: PvInversion,
    stepper: TimeStepper,
}

impl QgModel {
    pub fn new(
        grid: Grid,
        stratification: Stratification,
        state: State,
        config: ModelConfig,
        decomposition: Decomposition,
    ) -> Result<Self> {
        let shape = grid.shape();
        config.validate(shape)?;
        stratification.validate(&grid)?;
        state.validate(&grid)?;
        if decomposition.shape() != shape {
            return Err(QgError::configuration(
                shape,
                format!("decomposition covers {:?}", decomposition.shape()),
            ));
        }

        let operator =
            EllipticOperator::build(&grid, &stratification, state.constants.f0, config.boundary)?;
        let inversion = PvInversion::new(operator, config.solver)?;
        let stepper = TimeStepper::new(shape, &config.time);
        let (px, py) = decomposition.layout();
        log::info!(
            "Created QG model on grid {shape:?} ({} horizontal grid, {px}x{py} tiles), \
             dt = {} s, K = {} m²/s",
            if grid.uniform_horizontal() {
                "uniform"
            } else {
                "curvilinear"
            },
            config.time.dt,
            config.time.diffusivity,
        );

        Ok(Self {
            grid,
            stratification,
            state,
            config,
            decomposition,
            exchange: Box::new(SharedMemoryExchange),
            inversion,
            stepper,
        })
    }

    pub fn with_exchange(self, exchange: impl HaloExchange + Send + 'static) -> Self {
        Self {
            exchange: Box::new(exchange),
            ..self
        }
    }

    /// Recomputes PSI from the current Q.
    pub fn invert(&mut self) -> Result<SolveStats> {
        self.state.check_shapes(&self.grid)?;
        let stats = self.inversion.solve(&self.state.q, &mut self.state.psi)?;
        self.exchange.barrier();
        Ok(stats)
    }

    /// Advances Q by `nt` RK4 steps, leaving PSI consistent with the final Q.
    pub fn step(&mut self, nt: usize) -> Result<()> {
        self.state.check_shapes(&self.grid)?;
        self.stepper.go(
            nt,
            &self.grid,
            &self.decomposition,
            self.exchange.as_ref(),
            &mut self.inversion,
            &mut self.state,
        )
    }

    /// Tendency of the current Q. PSI is first recomputed from Q.
    pub fn compute_rhs(&mut self) -> Result<Field3> {
        self.invert()?;
        let [nx, ny, nz] = self.grid.shape();
        let mut dq = Field3::zeros((nx, ny, nz));
        RhsComputer::new(&self.grid, self.config.time.diffusivity).compute(
            &self.decomposition,
            self.exchange.as_ref(),
            &self.state.q,
            &self.state.psi,
            &mut dq,
        )?;
        Ok(dq)
    }

    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    pub fn stratification(&self) -> &Stratification {
        &self.stratification
    }

    pub fn state(&self) -> &State {
        &self.state
    }

    /// Mutable access to the fields, e.g. to load a new Q before [`Self::invert`].
    /// Shapes are checked again on the next call that uses them.
    pub fn state_mut(&mut self) -> &mut State {
        &mut self.state
    }

    pub fn config(&self) -> &ModelConfig {
        &self.config
    }

    pub fn decomposition(&self) -> &Decomposition {
        &self.decomposition
    }

    pub fn operator(&self) -> &EllipticOperator {
        self.inversion.operator()
    }

    pub fn solver_method(&self) -> SolverMethod {
        self.inversion.method()
    }

    /// Model time in seconds.
    pub fn time(&self) -> Float {
        self.stepper.time()
    }

    pub fn phase(&self) -> StepperPhase {
        self.stepper.phase()
    }
}
