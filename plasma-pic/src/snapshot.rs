//! Read-only views of simulation state handed to output collaborators.

use serde::Serialize;

use crate::diagnostics::EnergyRecord;
use crate::species::Species;
use crate::storage::{GridStorage1D, GridStorage2D};

#[derive(Debug, Clone, Serialize)]
pub struct PhaseSpace {
    pub x: GridStorage1D,
    pub y: GridStorage1D,
    pub px: GridStorage1D,
    pub py: GridStorage1D,
    pub pz: GridStorage1D,
}

impl PhaseSpace {
    pub fn of(species: &Species) -> Self {
        PhaseSpace {
            x: species.x(),
            y: species.y(),
            px: species.px(),
            py: species.py(),
            pz: species.pz(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SpeciesSnapshot {
    pub name: String,
    pub charge: f64,
    pub mass: f64,
    pub count: usize,
    pub density: GridStorage2D,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phase_space: Option<PhaseSpace>,
}

impl SpeciesSnapshot {
    pub fn of(species: &Species, with_phase_space: bool) -> Self {
        SpeciesSnapshot {
            name: species.name().to_string(),
            charge: species.charge(),
            mass: species.mass(),
            count: species.len(),
            density: species.density().clone(),
            phase_space: with_phase_space.then(|| PhaseSpace::of(species)),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct MagneticSnapshot {
    pub bx: GridStorage2D,
    pub by: GridStorage2D,
    pub bz: GridStorage2D,
}

/// Grids and particle data at one step.
#[derive(Debug, Clone, Serialize)]
pub struct Snapshot {
    pub step: u64,
    pub time: f64,
    pub total_density: GridStorage2D,
    pub species: Vec<SpeciesSnapshot>,
    pub ex: GridStorage2D,
    pub ey: GridStorage2D,
    pub ez: GridStorage2D,
    pub phi: GridStorage2D,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub magnetic: Option<MagneticSnapshot>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub energy: Option<EnergyRecord>,
}

/// Consumer of snapshots emitted during a run.
pub trait SnapshotSink {
    fn consume(&mut self, snapshot: &Snapshot) -> anyhow::Result<()>;
}

impl<F> SnapshotSink for F
where
    F: FnMut(&Snapshot) -> anyhow::Result<()>,
{
    fn consume(&mut self, snapshot: &Snapshot) -> anyhow::Result<()> {
        self(snapshot)
    }
}
