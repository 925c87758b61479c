//! Energy bookkeeping over a run.

use serde::Serialize;

/// Guard against dividing by a vanishing reference energy.
const DIVISION_GUARD: f64 = 1e-300;

/// Energies at one integer time level.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct EnergyRecord {
    pub step: u64,
    pub time: f64,
    pub kinetic: f64, // Time-centred particle kinetic energy
    pub field: f64,   // Electrostatic field energy
    pub total: f64,
}

impl EnergyRecord {
    pub fn new(step: u64, time: f64, kinetic: f64, field: f64) -> Self {
        EnergyRecord {
            step,
            time,
            kinetic,
            field,
            total: kinetic + field,
        }
    }
}

/// Drift of the total energy relative to the first record.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct EnergyDrift {
    pub initial_total: f64,
    pub last_total: f64,
    pub max_deviation: f64,  // max |E_n - E_0|
    pub relative_drift: f64, // max_deviation / |E_0|
}

#[must_use]
pub fn energy_drift(history: &[EnergyRecord]) -> Option<EnergyDrift> {
    let first = history.first()?;
    let last = history.last()?;
    let max_deviation = history
        .iter()
        .map(|r| (r.total - first.total).abs())
        .fold(0.0_f64, f64::max);
    let relative_drift = if first.total.abs() > DIVISION_GUARD {
        max_deviation / first.total.abs()
    } else {
        max_deviation
    };
    Some(EnergyDrift {
        initial_total: first.total,
        last_total: last.total,
        max_deviation,
        relative_drift,
    })
}
