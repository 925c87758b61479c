use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use std::fs;
use std::path::Path;
use tracing::info;

use crate::grid::Grid;
use crate::simulation::{FaultPolicy, Simulation, SimulationParams, SpeciesSpec};
use crate::species::{BoundaryPolicy, Species};
use crate::vector::Vec3;

/// Mesh configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GridConfig {
    pub nx: usize,
    pub ny: usize,
    pub dx: f64,
    pub dy: f64,
}

impl GridConfig {
    fn validate(&self) -> Result<()> {
        if self.nx < 2 || self.ny < 2 {
            return Err(anyhow!(
                "Grid needs at least 2 nodes per axis (nx={}, ny={})",
                self.nx,
                self.ny
            ));
        }
        if self.dx <= 0.0 || self.dy <= 0.0 {
            return Err(anyhow!(
                "Grid spacing must be positive (dx={}, dy={})",
                self.dx,
                self.dy
            ));
        }
        Ok(())
    }

    pub fn to_grid(&self) -> Result<Grid> {
        Ok(Grid::new(self.nx, self.ny, self.dx, self.dy)?)
    }
}

/// Time stepping and run control
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationConfig {
    pub dt: f64,
    pub steps: u64,
    pub boundary: BoundaryPolicy, // Required: "periodic" or "reject"
    #[serde(default)]
    pub dump_period: u64,
    #[serde(default = "default_report_period")]
    pub report_period: u64,
    #[serde(default = "default_fault_policy")]
    pub fault_policy: FaultPolicy,
    #[serde(default = "default_true")]
    pub health_check: bool,
    #[serde(default = "default_true")]
    pub leapfrog_init: bool,
    #[serde(default)]
    pub phase_space_in_dumps: bool,
}

fn default_report_period() -> u64 {
    100
}

fn default_fault_policy() -> FaultPolicy {
    FaultPolicy::Abort
}

fn default_true() -> bool {
    true
}

impl SimulationConfig {
    fn validate(&self) -> Result<()> {
        if !(self.dt > 0.0 && self.dt.is_finite()) {
            return Err(anyhow!("dt must be positive, got {}", self.dt));
        }
        if self.steps == 0 {
            return Err(anyhow!("steps must be at least 1"));
        }
        Ok(())
    }

    pub fn to_params(&self) -> SimulationParams {
        SimulationParams {
            dt: self.dt,
            boundary: self.boundary,
            dump_period: self.dump_period,
            report_period: self.report_period,
            fault_policy: self.fault_policy,
            health_check: self.health_check,
            leapfrog_init: self.leapfrog_init,
            phase_space_in_dumps: self.phase_space_in_dumps,
        }
    }
}

/// Uniform background magnetic field
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MagneticFieldConfig {
    pub b0: [f64; 3],
}

impl MagneticFieldConfig {
    fn validate(&self) -> Result<()> {
        if self.b0.iter().any(|b| !b.is_finite()) {
            return Err(anyhow!("magnetic_field.b0 must be finite, got {:?}", self.b0));
        }
        Ok(())
    }
}

/// Sinusoidal displacement of the lattice along x
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PerturbationConfig {
    pub amplitude: f64, // Displacement amplitude (length units)
    pub mode: u32,      // Wavelengths across the domain
}

/// Quiet-start lattice loading: `ppc_x * ppc_y` particles per cell on a
/// regular sub-lattice, with an optional drift and displacement.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoadingConfig {
    pub ppc_x: usize,
    pub ppc_y: usize,
    #[serde(default)]
    pub drift: [f64; 3],
    #[serde(default = "default_offset")]
    pub offset: f64, // Position inside a lattice cell, in [0, 1)
    #[serde(default)]
    pub perturbation: Option<PerturbationConfig>,
}

fn default_offset() -> f64 {
    0.5
}

impl LoadingConfig {
    fn validate(&self) -> Result<()> {
        if self.ppc_x == 0 || self.ppc_y == 0 {
            return Err(anyhow!(
                "particles per cell must be positive (ppc_x={}, ppc_y={})",
                self.ppc_x,
                self.ppc_y
            ));
        }
        if !(0.0..1.0).contains(&self.offset) {
            return Err(anyhow!("offset must be in [0, 1), got {}", self.offset));
        }
        if let Some(p) = &self.perturbation {
            if !p.amplitude.is_finite() {
                return Err(anyhow!("perturbation amplitude must be finite"));
            }
        }
        Ok(())
    }

    pub fn count(&self, grid: &Grid) -> usize {
        grid.nx * self.ppc_x * grid.ny * self.ppc_y
    }

    /// Position and momentum of lattice particle `index`.
    pub fn place(&self, grid: &Grid, index: usize) -> (Vec3, Vec3) {
        let nlx = grid.nx * self.ppc_x;
        let nly = grid.ny * self.ppc_y;
        let a = index % nlx;
        let b = (index / nlx) % nly;
        let mut x = (a as f64 + self.offset) * grid.width() / nlx as f64;
        let y = (b as f64 + self.offset) * grid.height() / nly as f64;
        if let Some(p) = &self.perturbation {
            let k = 2.0 * PI * p.mode as f64 / grid.width();
            x += p.amplitude * (k * x).sin();
        }
        let (x, y) = grid.wrap(x, y);
        (Vec3::new(x, y, 0.0), Vec3::from(self.drift))
    }
}

/// One particle species
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpeciesConfig {
    pub name: String,
    pub charge: f64,
    pub mass: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub weight: Option<f64>, // Default: unit number density
    pub loading: LoadingConfig,
}

impl SpeciesConfig {
    fn validate(&self) -> Result<()> {
        if self.name.is_empty() {
            return Err(anyhow!("species name must not be empty"));
        }
        if !(self.mass > 0.0 && self.mass.is_finite()) {
            return Err(anyhow!("species '{}' mass must be positive, got {}", self.name, self.mass));
        }
        if !self.charge.is_finite() {
            return Err(anyhow!("species '{}' charge must be finite", self.name));
        }
        if let Some(w) = self.weight {
            if !(w > 0.0 && w.is_finite()) {
                return Err(anyhow!("species '{}' weight must be positive, got {}", self.name, w));
            }
        }
        self.loading
            .validate()
            .with_context(|| format!("invalid loading for species '{}'", self.name))
    }

    /// Weight per macro-particle; defaults to one physical particle per unit
    /// area.
    pub fn weight(&self, grid: &Grid) -> f64 {
        self.weight
            .unwrap_or_else(|| grid.cell_area() / (self.loading.ppc_x * self.loading.ppc_y) as f64)
    }

    pub fn to_spec(&self, grid: &Grid) -> SpeciesSpec {
        SpeciesSpec {
            name: self.name.clone(),
            charge: self.charge,
            mass: self.mass,
            count: self.loading.count(grid),
            weight: self.weight(grid),
        }
    }
}

/// Complete simulation configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub grid: GridConfig,
    pub simulation: SimulationConfig,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub magnetic_field: Option<MagneticFieldConfig>,
    pub species: Vec<SpeciesConfig>,
}

impl Config {
    /// Load configuration from TOML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file '{}'", path.display()))?;
        Self::from_toml_str(&content)
            .with_context(|| format!("Invalid config file '{}'", path.display()))
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Config =
            toml::from_str(content).map_err(|e| anyhow!("Failed to parse TOML config: {}", e))?;
        config.validate()?;
        Ok(config)
    }

    /// Validate all configuration parameters
    pub fn validate(&self) -> Result<()> {
        self.grid.validate()?;
        self.simulation.validate()?;
        if let Some(b) = &self.magnetic_field {
            b.validate()?;
        }
        if self.species.is_empty() {
            return Err(anyhow!("At least one species must be defined"));
        }
        for species in &self.species {
            species.validate()?;
        }
        for (i, a) in self.species.iter().enumerate() {
            if self.species[..i].iter().any(|b| b.name == a.name) {
                return Err(anyhow!("Duplicate species name '{}'", a.name));
            }
        }
        Ok(())
    }

    /// Build a configured simulation from this file.
    pub fn build_simulation(&self) -> Result<Simulation> {
        let grid = self.grid.to_grid()?;
        let mut builder = Simulation::builder()
            .grid(grid)
            .params(self.simulation.to_params());
        if let Some(b) = &self.magnetic_field {
            builder = builder.magnetic_field(Vec3::from(b.b0));
        }
        for species in &self.species {
            let loading = species.loading.clone();
            builder = builder.species(species.to_spec(&grid), move |s: &Species, i| {
                loading.place(s.grid(), i)
            });
        }
        Ok(builder.build()?)
    }

    /// Log configuration summary
    pub fn print_summary(&self) {
        info!("=== Simulation Configuration ===");
        info!(
            "Grid: {}x{} ({} x {})",
            self.grid.nx,
            self.grid.ny,
            self.grid.nx as f64 * self.grid.dx,
            self.grid.ny as f64 * self.grid.dy
        );
        info!(
            "Simulation: dt={}, steps={}, total_time={}, boundary={:?}",
            self.simulation.dt,
            self.simulation.steps,
            self.simulation.dt * self.simulation.steps as f64,
            self.simulation.boundary
        );
        match &self.magnetic_field {
            Some(b) => info!("Magnetic field: B0={:?}", b.b0),
            None => info!("Magnetic field: none (electrostatic)"),
        }
        info!("Species: {}", self.species.len());
        for s in &self.species {
            info!(
                "  {}: q={}, m={}, {}x{} per cell, drift={:?}",
                s.name, s.charge, s.mass, s.loading.ppc_x, s.loading.ppc_y, s.loading.drift
            );
            if let Some(p) = &s.loading.perturbation {
                info!("    Perturbation: amplitude={}, mode={}", p.amplitude, p.mode);
            }
        }
        info!("================================");
    }
}
