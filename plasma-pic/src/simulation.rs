use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::diagnostics::{energy_drift, EnergyDrift, EnergyRecord};
use crate::error::{PicError, Result};
use crate::field::Field;
use crate::grid::Grid;
use crate::particle::Particle;
use crate::snapshot::{MagneticSnapshot, Snapshot, SnapshotSink, SpeciesSnapshot};
use crate::solver::FieldSolver;
use crate::species::{BoundaryPolicy, Species};
use crate::storage::GridStorage2D;
use crate::vector::Vec3;

/// Leapfrog is unstable for `omega_p dt >= 2`.
const LEAPFROG_LIMIT: f64 = 2.0;
/// Above this `omega_p dt` the plasma oscillation is poorly resolved.
const ACCURACY_WARNING: f64 = 0.2;

/// What a run does when the health check finds a non-finite value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FaultPolicy {
    Abort,
    Warn,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimulationState {
    Configured, // Built, not yet stepped
    Stepping,
    Finalized,
}

#[derive(Debug, Clone)]
pub struct SimulationParams {
    pub dt: f64,                    // Time step
    pub boundary: BoundaryPolicy,   // Particle boundary handling
    pub dump_period: u64,           // Steps between snapshots, 0 disables
    pub report_period: u64,         // Steps between progress logs, 0 disables
    pub fault_policy: FaultPolicy,  // Reaction to a failed health check
    pub health_check: bool,         // Scan for NaN/inf after every step in run()
    pub leapfrog_init: bool,        // Rewind momenta by dt/2 at build
    pub phase_space_in_dumps: bool, // Include particle columns in snapshots
}

impl SimulationParams {
    pub fn new(dt: f64, boundary: BoundaryPolicy) -> Self {
        SimulationParams {
            dt,
            boundary,
            dump_period: 0,
            report_period: 100,
            fault_policy: FaultPolicy::Abort,
            health_check: true,
            leapfrog_init: true,
            phase_space_in_dumps: false,
        }
    }

    pub fn total_time(&self, steps: u64) -> f64 {
        steps as f64 * self.dt
    }

    /// True when the leapfrog stays stable at plasma frequency `omega_p`.
    pub fn check_stability(&self, omega_p: f64) -> bool {
        omega_p * self.dt < LEAPFROG_LIMIT
    }

    /// Largest step that keeps `omega_p dt` at `safety` of the leapfrog limit.
    pub fn compute_stable_dt(&self, omega_p: f64, safety: f64) -> f64 {
        if omega_p > 0.0 {
            safety * LEAPFROG_LIMIT / omega_p
        } else {
            f64::INFINITY
        }
    }

    fn validate(&self) -> Result<()> {
        if !(self.dt > 0.0 && self.dt.is_finite()) {
            return Err(PicError::Config(format!(
                "time step must be positive and finite, got {}",
                self.dt
            )));
        }
        Ok(())
    }
}

/// Plasma frequency of the mean density of all species.
pub fn plasma_frequency(species: &[Species], grid: &Grid) -> f64 {
    let area = grid.area();
    species
        .iter()
        .map(|s| {
            let number = s.particles().iter().map(|p| p.weight()).sum::<f64>();
            number / area * s.charge() * s.charge() / s.mass()
        })
        .sum::<f64>()
        .sqrt()
}

/// Static description of a species created at build time.
#[derive(Debug, Clone)]
pub struct SpeciesSpec {
    pub name: String,
    pub charge: f64,
    pub mass: f64,
    pub count: usize,
    pub weight: f64,
}

type Initializer = Box<dyn Fn(&Species, usize) -> (Vec3, Vec3)>;
type NodeField = Box<dyn Fn(usize, usize) -> Vec3>;

enum PendingSpecies {
    Spec(SpeciesSpec, Initializer),
    Built(Species),
}

/// Collects mesh, time step and species; `build` produces a configured
/// [`Simulation`].
#[derive(Default)]
pub struct SimulationBuilder {
    grid: Option<Grid>,
    params: Option<SimulationParams>,
    species: Vec<PendingSpecies>,
    magnetic: Option<NodeField>,
}

impl SimulationBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn grid(mut self, grid: Grid) -> Self {
        self.grid = Some(grid);
        self
    }

    pub fn params(mut self, params: SimulationParams) -> Self {
        self.params = Some(params);
        self
    }

    /// Uniform background magnetic field; enables the Boris rotation.
    pub fn magnetic_field(self, b0: Vec3) -> Self {
        self.magnetic_field_fn(move |_, _| b0)
    }

    /// Static magnetic field given per node as `b(i, j)`.
    pub fn magnetic_field_fn<F>(mut self, b: F) -> Self
    where
        F: Fn(usize, usize) -> Vec3 + 'static,
    {
        self.magnetic = Some(Box::new(b));
        self
    }

    /// Add a species whose particles come from `init(species, index)`.
    pub fn species<F>(mut self, spec: SpeciesSpec, init: F) -> Self
    where
        F: Fn(&Species, usize) -> (Vec3, Vec3) + 'static,
    {
        self.species.push(PendingSpecies::Spec(spec, Box::new(init)));
        self
    }

    /// Add a species that already holds its particles.
    pub fn with_species(mut self, species: Species) -> Self {
        self.species.push(PendingSpecies::Built(species));
        self
    }

    pub fn build(self) -> Result<Simulation> {
        let grid = self
            .grid
            .ok_or_else(|| PicError::Config("mesh dimensions were not set".to_string()))?;
        let params = self
            .params
            .ok_or_else(|| PicError::Config("time step and boundary policy were not set".to_string()))?;
        params.validate()?;
        if self.species.is_empty() {
            return Err(PicError::Config("at least one species is required".to_string()));
        }

        let mut species = Vec::with_capacity(self.species.len());
        for pending in self.species {
            let mut s = match pending {
                PendingSpecies::Spec(spec, init) => {
                    let mut s = Species::new(spec.name, spec.charge, spec.mass, grid)?;
                    s.populate(spec.count, spec.weight, init)?;
                    s
                }
                PendingSpecies::Built(s) => {
                    if *s.grid() != grid {
                        return Err(PicError::Config(format!(
                            "species '{}' was created on a different mesh",
                            s.name()
                        )));
                    }
                    s
                }
            };
            if let Some(index) = s.first_non_finite() {
                return Err(PicError::Config(format!(
                    "species '{}' particle {} starts with a non-finite state",
                    s.name(),
                    index
                )));
            }
            s.apply_bc(params.boundary)?;
            species.push(s);
        }

        let omega_p = plasma_frequency(&species, &grid);
        if !params.check_stability(omega_p) {
            return Err(PicError::Config(format!(
                "leapfrog unstable: omega_p*dt = {:.3} (dt must be below {:.4e})",
                omega_p * params.dt,
                params.compute_stable_dt(omega_p, 1.0)
            )));
        }
        if omega_p * params.dt > ACCURACY_WARNING {
            warn!(
                omega_p_dt = omega_p * params.dt,
                "plasma oscillation is poorly resolved; consider dt <= {:.4e}",
                params.compute_stable_dt(omega_p, ACCURACY_WARNING / LEAPFROG_LIMIT)
            );
        }

        let mut solver = FieldSolver::new(grid);
        if let Some(b) = self.magnetic {
            solver.set_b_field(b);
            if let Some(component) = solver.field().first_non_finite() {
                return Err(PicError::Config(format!(
                    "magnetic field has a non-finite {} value",
                    component
                )));
            }
        }

        let mut sim = Simulation {
            grid,
            params,
            species,
            solver,
            total_density: GridStorage2D::zeros(grid.shape()),
            current_step: 0,
            state: SimulationState::Configured,
            energy_history: Vec::new(),
        };

        // Fields at t = 0 so snapshots and the first half-step kick see them.
        sim.deposit_and_solve()?;
        for s in sim.species.iter_mut() {
            s.interpolate_fields(&sim.solver);
        }
        if sim.params.leapfrog_init {
            let dt = sim.params.dt;
            for s in sim.species.iter_mut() {
                s.shift_momentum(dt, -0.5);
            }
        }

        info!(
            nx = grid.nx,
            ny = grid.ny,
            species = sim.species.len(),
            particles = sim.particle_count(),
            omega_p,
            magnetic = sim.solver.magnetic_enabled(),
            "simulation configured"
        );
        Ok(sim)
    }
}

pub struct Simulation {
    pub grid: Grid,
    pub params: SimulationParams,
    species: Vec<Species>,
    solver: FieldSolver,
    total_density: GridStorage2D,
    current_step: u64,
    state: SimulationState,
    energy_history: Vec<EnergyRecord>,
}

impl Simulation {
    pub fn builder() -> SimulationBuilder {
        SimulationBuilder::new()
    }

    pub fn state(&self) -> SimulationState {
        self.state
    }

    pub fn current_step(&self) -> u64 {
        self.current_step
    }

    pub fn current_time(&self) -> f64 {
        self.current_step as f64 * self.params.dt
    }

    pub fn species(&self) -> &[Species] {
        &self.species
    }

    /// Mutable particle access between steps, e.g. for external kicks.
    pub fn species_mut(&mut self) -> &mut [Species] {
        &mut self.species
    }

    pub fn solver(&self) -> &FieldSolver {
        &self.solver
    }

    pub fn field(&self) -> &Field {
        self.solver.field()
    }

    pub fn particle_count(&self) -> usize {
        self.species.iter().map(|s| s.len()).sum()
    }

    /// Sum of all species densities from the last deposit.
    pub fn total_density(&self) -> &GridStorage2D {
        &self.total_density
    }

    pub fn species_density(&self, index: usize) -> Option<&GridStorage2D> {
        self.species.get(index).map(|s| s.density())
    }

    pub fn energy_history(&self) -> &[EnergyRecord] {
        &self.energy_history
    }

    pub fn energy_drift(&self) -> Option<EnergyDrift> {
        energy_drift(&self.energy_history)
    }

    /// Total `sum w p` over every species.
    pub fn total_momentum(&self) -> Vec3 {
        self.species
            .iter()
            .fold(Vec3::zeros(), |acc, s| acc + s.momentum())
    }

    pub fn field_energy(&self) -> f64 {
        self.solver.electric_energy()
    }

    /// True on steps that fall on the dump period.
    pub fn should_dump(&self) -> bool {
        self.params.dump_period > 0 && self.current_step % self.params.dump_period == 0
    }

    /// Advance one step with parallel deposition, solve and push.
    pub fn step(&mut self) -> Result<()> {
        self.advance(true)
    }

    /// Single-threaded reference step.
    pub fn step_serial(&mut self) -> Result<()> {
        self.advance(false)
    }

    /// One deposit, solve and push. Everything is computed before anything is
    /// stored, so a failed step leaves particles, densities and fields as they
    /// were.
    fn advance(&mut self, parallel: bool) -> Result<()> {
        if self.state == SimulationState::Finalized {
            return Err(PicError::InvalidState(
                "cannot step a finalized simulation".to_string(),
            ));
        }
        let dt = self.params.dt;
        let boundary = self.params.boundary;
        let magnetic = self.solver.magnetic_enabled();

        // 1. Deposit and 2. solve
        let (densities, total) = self.deposit(parallel)?;
        let solution = self.solver.compute(&total, parallel)?;

        // 3. Interpolate and plan the push of every species
        let grid = self.grid;
        let solver = &self.solver;
        let fields = |p: &Particle| {
            let pos = p.pos();
            (solution.e_at(&grid, pos.x, pos.y), solver.b_at(pos.x, pos.y))
        };
        let plans = self
            .species
            .iter()
            .map(|s| s.plan_push(&fields, dt, magnetic, boundary, parallel))
            .collect::<Result<Vec<_>>>()?;

        let field_energy = solution.energy(&grid);
        self.solver.install(solution);
        self.total_density = total;
        let mut kinetic = 0.0;
        for ((s, density), plan) in self.species.iter_mut().zip(densities).zip(plans) {
            s.set_density(density);
            kinetic += s.apply_push(plan)?.kinetic_energy;
        }

        let record = EnergyRecord::new(self.current_step, self.current_time(), kinetic, field_energy);
        self.energy_history.push(record);

        // 4. Advance the clock
        self.current_step += 1;
        self.state = SimulationState::Stepping;
        debug!(
            step = self.current_step,
            kinetic = record.kinetic,
            field = record.field,
            "step complete"
        );
        Ok(())
    }

    /// Per-species densities and their sum, in species order. Fails before
    /// depositing when a particle is outside a rejecting domain.
    fn deposit(&self, parallel: bool) -> Result<(Vec<GridStorage2D>, GridStorage2D)> {
        for s in &self.species {
            s.check_domain(self.params.boundary)?;
        }
        let densities = if parallel {
            // Each species builds only its own grid.
            self.species
                .par_iter()
                .map(|s| s.charge_density(true))
                .collect::<Result<Vec<_>>>()?
        } else {
            self.species
                .iter()
                .map(|s| s.charge_density(false))
                .collect::<Result<Vec<_>>>()?
        };
        let mut total = GridStorage2D::zeros(self.grid.shape());
        for density in &densities {
            total.add_assign(density)?;
        }
        Ok((densities, total))
    }

    fn deposit_and_solve(&mut self) -> Result<()> {
        let (densities, total) = self.deposit(true)?;
        self.solver.solve(&total)?;
        for (s, density) in self.species.iter_mut().zip(densities) {
            s.set_density(density);
        }
        self.total_density = total;
        Ok(())
    }

    /// First non-finite value in the fields or particle states, as an error.
    pub fn check_health(&self) -> Result<()> {
        if let Some(component) = self.solver.field().first_non_finite() {
            return Err(PicError::NumericalFault {
                step: self.current_step,
                what: format!("non-finite {} on the mesh", component),
            });
        }
        for s in &self.species {
            if let Some(index) = s.first_non_finite() {
                return Err(PicError::NumericalFault {
                    step: self.current_step,
                    what: format!(
                        "species '{}' particle {} has a non-finite position or momentum",
                        s.name(),
                        index
                    ),
                });
            }
        }
        Ok(())
    }

    /// Snapshot of the current state. Does not modify the simulation.
    pub fn dump_data(&self) -> Snapshot {
        let field = self.solver.field();
        let magnetic = self.solver.magnetic_enabled().then(|| MagneticSnapshot {
            bx: field.bx.clone(),
            by: field.by.clone(),
            bz: field.bz.clone(),
        });
        Snapshot {
            step: self.current_step,
            time: self.current_time(),
            total_density: self.total_density.clone(),
            species: self
                .species
                .iter()
                .map(|s| SpeciesSnapshot::of(s, self.params.phase_space_in_dumps))
                .collect(),
            ex: field.ex.clone(),
            ey: field.ey.clone(),
            ez: field.ez.clone(),
            phi: field.phi.clone(),
            magnetic,
            energy: self.energy_history.last().copied(),
        }
    }

    /// Step `steps` times, handing snapshots to `sink` on dump steps.
    pub fn run(&mut self, steps: u64, sink: &mut dyn SnapshotSink) -> Result<()> {
        info!(
            grid = %format!("{}x{}", self.grid.nx, self.grid.ny),
            dt = self.params.dt,
            steps,
            total_time = self.params.total_time(steps),
            "starting simulation"
        );

        if self.should_dump() {
            sink.consume(&self.dump_data())?;
        }

        let end = self.current_step + steps;
        while self.current_step < end {
            self.step()?;

            if self.params.health_check {
                if let Err(fault) = self.check_health() {
                    match self.params.fault_policy {
                        FaultPolicy::Abort => {
                            error!(%fault, "aborting run");
                            return Err(fault);
                        }
                        FaultPolicy::Warn => warn!(%fault, "continuing after numerical fault"),
                    }
                }
            }

            if self.should_dump() {
                sink.consume(&self.dump_data())?;
            }

            if self.params.report_period > 0 && self.current_step % self.params.report_period == 0 {
                if let Some(record) = self.energy_history.last() {
                    info!(
                        step = self.current_step,
                        time = self.current_time(),
                        kinetic = record.kinetic,
                        field = record.field,
                        total = record.total,
                        "progress"
                    );
                }
            }
        }

        info!(step = self.current_step, "simulation complete");
        Ok(())
    }

    /// Move to `Finalized` and return the closing snapshot.
    pub fn finalize(&mut self) -> Result<Snapshot> {
        if self.state == SimulationState::Finalized {
            return Err(PicError::InvalidState(
                "simulation is already finalized".to_string(),
            ));
        }
        let snapshot = self.dump_data();
        self.state = SimulationState::Finalized;
        if let Some(drift) = self.energy_drift() {
            info!(
                steps = self.current_step,
                relative_drift = drift.relative_drift,
                "simulation finalized"
            );
        }
        Ok(snapshot)
    }
}
