//! Particle ensembles and charge deposition.

use ndarray::Array1;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::{PicError, Result};
use crate::grid::Grid;
use crate::particle::Particle;
use crate::shape::Stencil;
use crate::solver::FieldSolver;
use crate::storage::{GridStorage1D, GridStorage2D};
use crate::vector::Vec3;

/// Particles per partial density grid in the parallel deposit. Fixed so the
/// reduction order, and therefore the result, does not depend on the thread
/// count.
const DEPOSIT_CHUNK: usize = 4096;

/// What happens to a particle that leaves `[0, Lx) x [0, Ly)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BoundaryPolicy {
    Periodic,
    Reject,
}

/// Result of pushing a species by one step.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PushOutcome {
    /// `sum w (|p_old|^2 + |p_new|^2) / 4m`, the kinetic energy at the
    /// integer time level between the two half-step momenta.
    pub kinetic_energy: f64,
}

/// Next state of every particle of a species, computed before any is moved.
#[derive(Debug, Clone)]
pub(crate) struct PushPlan {
    updates: Vec<Update>,
}

#[derive(Debug, Clone, Copy)]
struct Update {
    pos: Vec3,
    mom: Vec3,
    e: Vec3, // Field the particle was kicked with
    b: Vec3,
    kinetic: f64,
}

#[derive(Debug, Clone)]
pub struct Species {
    name: String,
    charge: f64, // Charge of one physical particle
    mass: f64,   // Mass of one physical particle
    grid: Grid,
    particles: Vec<Particle>,
    density: GridStorage2D,
}

impl Species {
    pub fn new(name: impl Into<String>, charge: f64, mass: f64, grid: Grid) -> Result<Self> {
        let name = name.into();
        if !(mass > 0.0 && mass.is_finite()) {
            return Err(PicError::Config(format!(
                "species '{}' needs a positive mass, got {}",
                name, mass
            )));
        }
        if !charge.is_finite() {
            return Err(PicError::Config(format!(
                "species '{}' has non-finite charge",
                name
            )));
        }
        Ok(Species {
            name,
            charge,
            mass,
            grid,
            particles: Vec::new(),
            density: GridStorage2D::zeros(grid.shape()),
        })
    }

    /// Append `count` particles of equal `weight`; `init` gives position and
    /// momentum for each index.
    pub fn populate<F>(&mut self, count: usize, weight: f64, init: F) -> Result<()>
    where
        F: Fn(&Species, usize) -> (Vec3, Vec3),
    {
        if !(weight > 0.0 && weight.is_finite()) {
            return Err(PicError::Config(format!(
                "species '{}' needs a positive particle weight, got {}",
                self.name, weight
            )));
        }
        let start = self.particles.len();
        let created: Vec<Particle> = (start..start + count)
            .map(|idx| {
                let (pos, mom) = init(self, idx);
                Particle::new(pos, mom, weight)
            })
            .collect();
        self.particles.extend(created);
        Ok(())
    }

    pub fn add_particle(&mut self, particle: Particle) {
        self.particles.push(particle);
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn charge(&self) -> f64 {
        self.charge
    }

    pub fn mass(&self) -> f64 {
        self.mass
    }

    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    pub fn len(&self) -> usize {
        self.particles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.particles.is_empty()
    }

    pub fn particles(&self) -> &[Particle] {
        &self.particles
    }

    pub fn particles_mut(&mut self) -> &mut [Particle] {
        &mut self.particles
    }

    /// Charge density from the last deposit.
    pub fn density(&self) -> &GridStorage2D {
        &self.density
    }

    /// Bring every particle inside the domain, or fail on the first one
    /// outside it under [`BoundaryPolicy::Reject`].
    pub fn apply_bc(&mut self, policy: BoundaryPolicy) -> Result<()> {
        let grid = self.grid;
        for (index, p) in self.particles.iter_mut().enumerate() {
            let pos = p.pos();
            let (x, y) = resolve_boundary(&grid, policy, &self.name, index, pos.x, pos.y)?;
            p.set_pos(Vec3::new(x, y, pos.z));
        }
        Ok(())
    }

    /// First particle outside the domain under [`BoundaryPolicy::Reject`],
    /// as an error. Periodic species always pass.
    pub fn check_domain(&self, policy: BoundaryPolicy) -> Result<()> {
        if policy == BoundaryPolicy::Periodic {
            return Ok(());
        }
        for (index, p) in self.particles.iter().enumerate() {
            let pos = p.pos();
            resolve_boundary(&self.grid, policy, &self.name, index, pos.x, pos.y)?;
        }
        Ok(())
    }

    /// Rebuild the charge density from current positions.
    ///
    /// Particles are split into fixed chunks, each chunk scatters into its own
    /// partial grid in parallel, and the partials are summed in chunk order.
    /// Under [`BoundaryPolicy::Reject`] a particle outside the domain fails
    /// the deposit before the density is touched.
    pub fn deposit_charge(&mut self, policy: BoundaryPolicy) -> Result<()> {
        self.check_domain(policy)?;
        self.density = self.charge_density(true)?;
        Ok(())
    }

    /// Single-threaded deposit.
    pub fn deposit_charge_serial(&mut self, policy: BoundaryPolicy) -> Result<()> {
        self.check_domain(policy)?;
        self.density = self.charge_density(false)?;
        Ok(())
    }

    /// Charge density of the current positions, without storing it.
    pub(crate) fn charge_density(&self, parallel: bool) -> Result<GridStorage2D> {
        let grid = self.grid;
        let q_cell = self.charge / grid.cell_area();
        if !parallel {
            let mut density = GridStorage2D::zeros(grid.shape());
            for p in &self.particles {
                stencil_at(&grid, p).scatter(&mut density, q_cell * p.weight());
            }
            return Ok(density);
        }

        let partials: Vec<GridStorage2D> = self
            .particles
            .par_chunks(DEPOSIT_CHUNK)
            .map(|chunk| {
                let mut partial = GridStorage2D::zeros(grid.shape());
                for p in chunk {
                    stencil_at(&grid, p).scatter(&mut partial, q_cell * p.weight());
                }
                partial
            })
            .collect();

        let mut density = GridStorage2D::zeros(grid.shape());
        for partial in &partials {
            density.add_assign(partial)?;
        }
        Ok(density)
    }

    pub(crate) fn set_density(&mut self, density: GridStorage2D) {
        self.density = density;
    }

    /// Cache E (and B) at every particle position.
    pub fn interpolate_fields(&mut self, solver: &FieldSolver) {
        self.particles.par_iter_mut().for_each(|p| {
            let pos = p.pos();
            p.set_local_e_field(solver.e_at(pos.x, pos.y));
            p.set_local_b_field(solver.b_at(pos.x, pos.y));
        });
    }

    /// Advance momenta and positions by `dt` using the cached fields.
    ///
    /// A rejected particle leaves the whole species untouched.
    pub fn push(&mut self, dt: f64, magnetic: bool, policy: BoundaryPolicy) -> Result<PushOutcome> {
        let plan = self.plan_push(cached_fields, dt, magnetic, policy, true)?;
        self.apply_push(plan)
    }

    /// Compute every particle's next state without touching the species.
    /// `fields` gives the E and B each particle is kicked with. When several
    /// particles are rejected the lowest index is reported.
    pub(crate) fn plan_push<F>(
        &self,
        fields: F,
        dt: f64,
        magnetic: bool,
        policy: BoundaryPolicy,
        parallel: bool,
    ) -> Result<PushPlan>
    where
        F: Fn(&Particle) -> (Vec3, Vec3) + Sync,
    {
        let updates: Vec<Update> = if parallel {
            // Collected in index order, so the first error is deterministic.
            self.particles
                .par_iter()
                .enumerate()
                .map(|(index, p)| self.advance(index, p, &fields, dt, magnetic, policy))
                .collect::<Vec<_>>()
                .into_iter()
                .collect::<Result<_>>()?
        } else {
            self.particles
                .iter()
                .enumerate()
                .map(|(index, p)| self.advance(index, p, &fields, dt, magnetic, policy))
                .collect::<Result<_>>()?
        };
        Ok(PushPlan { updates })
    }

    /// Write back a plan from [`Species::plan_push`].
    pub(crate) fn apply_push(&mut self, plan: PushPlan) -> Result<PushOutcome> {
        if plan.updates.len() != self.particles.len() {
            return Err(PicError::SizeMismatch {
                expected: self.particles.len(),
                actual: plan.updates.len(),
            });
        }
        let mut outcome = PushOutcome::default();
        for (p, u) in self.particles.iter_mut().zip(plan.updates) {
            p.set_local_e_field(u.e);
            p.set_local_b_field(u.b);
            p.set_pos(u.pos);
            p.set_mom(u.mom);
            outcome.kinetic_energy += u.kinetic;
        }
        Ok(outcome)
    }

    fn advance<F>(
        &self,
        index: usize,
        p: &Particle,
        fields: &F,
        dt: f64,
        magnetic: bool,
        policy: BoundaryPolicy,
    ) -> Result<Update>
    where
        F: Fn(&Particle) -> (Vec3, Vec3),
    {
        let (e, b) = fields(p);
        let mut kicked = *p;
        kicked.set_local_e_field(e);
        kicked.set_local_b_field(b);

        let old = p.mom();
        let mom = kicked.kicked_momentum(self.charge, self.mass, dt, magnetic);
        let pos = p.pos();
        let x = pos.x + mom.x / self.mass * dt;
        let y = pos.y + mom.y / self.mass * dt;
        let (x, y) = resolve_boundary(&self.grid, policy, &self.name, index, x, y)?;
        Ok(Update {
            pos: Vec3::new(x, y, pos.z),
            mom,
            e,
            b,
            kinetic: p.weight() * (old.norm_squared() + mom.norm_squared()) / (4.0 * self.mass),
        })
    }

    /// Shift momenta by `fraction * q E dt` using the cached E. With
    /// `fraction = -0.5` this moves momenta from `t = 0` to `t = -dt/2`.
    pub fn shift_momentum(&mut self, dt: f64, fraction: f64) {
        let scale = self.charge * dt * fraction;
        self.particles.par_iter_mut().for_each(|p| {
            let mom = p.mom() + p.local_e_field() * scale;
            p.set_mom(mom);
        });
    }

    /// `sum q w` over the species.
    pub fn total_charge(&self) -> f64 {
        self.particles.iter().map(|p| p.weight()).sum::<f64>() * self.charge
    }

    /// `sum w p` over the species.
    pub fn momentum(&self) -> Vec3 {
        self.particles
            .iter()
            .fold(Vec3::zeros(), |acc, p| acc + p.mom() * p.weight())
    }

    /// Kinetic energy from the stored momenta.
    pub fn kinetic_energy(&self) -> f64 {
        self.particles
            .iter()
            .map(|p| p.kinetic_energy_of(&p.mom(), self.mass))
            .sum()
    }

    /// Index of the first particle with a non-finite position or momentum.
    pub fn first_non_finite(&self) -> Option<usize> {
        self.particles.iter().position(|p| !p.is_finite())
    }

    pub fn x(&self) -> GridStorage1D {
        self.column(|p| p.pos().x)
    }

    pub fn y(&self) -> GridStorage1D {
        self.column(|p| p.pos().y)
    }

    pub fn px(&self) -> GridStorage1D {
        self.column(|p| p.mom().x)
    }

    pub fn py(&self) -> GridStorage1D {
        self.column(|p| p.mom().y)
    }

    pub fn pz(&self) -> GridStorage1D {
        self.column(|p| p.mom().z)
    }

    /// Component `axis` (0, 1 or 2) of the cached E field per particle.
    pub fn local_e(&self, axis: usize) -> Result<GridStorage1D> {
        check_axis(axis)?;
        Ok(self.column(|p| p.local_e_field()[axis]))
    }

    pub fn local_b(&self, axis: usize) -> Result<GridStorage1D> {
        check_axis(axis)?;
        Ok(self.column(|p| p.local_b_field()[axis]))
    }

    fn column<F: Fn(&Particle) -> f64>(&self, f: F) -> GridStorage1D {
        GridStorage1D::from_array(Array1::from_iter(self.particles.iter().map(f)))
    }
}

fn cached_fields(p: &Particle) -> (Vec3, Vec3) {
    (p.local_e_field(), p.local_b_field())
}

fn check_axis(axis: usize) -> Result<()> {
    if axis > 2 {
        return Err(PicError::OutOfBounds {
            index: axis.to_string(),
            shape: vec![3],
        });
    }
    Ok(())
}

fn stencil_at(grid: &Grid, p: &Particle) -> Stencil {
    let pos = p.pos();
    let (x, y) = grid.wrap(pos.x, pos.y);
    Stencil::new(grid, x, y)
}

fn resolve_boundary(
    grid: &Grid,
    policy: BoundaryPolicy,
    species: &str,
    index: usize,
    x: f64,
    y: f64,
) -> Result<(f64, f64)> {
    match policy {
        BoundaryPolicy::Periodic if x.is_finite() && y.is_finite() => Ok(grid.wrap(x, y)),
        // Non-finite positions are left for the health check to report.
        BoundaryPolicy::Periodic => Ok((x, y)),
        BoundaryPolicy::Reject if grid.contains(x, y) => Ok((x, y)),
        BoundaryPolicy::Reject => Err(PicError::ParticleOutOfDomain {
            species: species.to_string(),
            index,
            x,
            y,
            lx: grid.width(),
            ly: grid.height(),
        }),
    }
}
