//! Two-dimensional electrostatic particle-in-cell plasma simulation.
//!
//! Each step deposits particle charge onto a periodic mesh with
//! cloud-in-cell weighting, solves Poisson's equation spectrally, gathers the
//! field back to the particles with the same weighting and advances them with
//! a leapfrog (Boris when a magnetic field is present) push.

pub mod config;
pub mod diagnostics;
pub mod error;
pub mod field;
pub mod grid;
pub mod particle;
pub mod shape;
pub mod simulation;
pub mod snapshot;
pub mod solver;
pub mod species;
pub mod spectral;
pub mod storage;
pub mod vector;

pub use config::Config;
pub use diagnostics::{energy_drift, EnergyDrift, EnergyRecord};
pub use error::{PicError, Result};
pub use field::Field;
pub use grid::Grid;
pub use particle::Particle;
pub use simulation::{
    FaultPolicy, Simulation, SimulationBuilder, SimulationParams, SimulationState, SpeciesSpec,
};
pub use snapshot::{PhaseSpace, Snapshot, SnapshotSink, SpeciesSnapshot};
pub use solver::FieldSolver;
pub use species::{BoundaryPolicy, PushOutcome, Species};
pub use storage::{GridStorage, GridStorage1D, GridStorage2D};
pub use vector::Vec3;
