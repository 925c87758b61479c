mod common;

use approx::assert_relative_eq;
use common::hash_unit;
use plasma_pic::config::{LoadingConfig, PerturbationConfig};
use plasma_pic::{
    BoundaryPolicy, Grid, Particle, Simulation, SimulationParams, Species, SpeciesSpec, Vec3,
};
use std::f64::consts::PI;

pub fn params(dt: f64) -> SimulationParams {
    SimulationParams::new(dt, BoundaryPolicy::Periodic)
}

/// Species holding one particle at rest at `(x, y)`.
pub fn lone_particle(grid: Grid, x: f64, y: f64, charge: f64) -> Species {
    let mut s = Species::new("probe", charge, 1.0, grid).unwrap();
    s.add_particle(Particle::new(Vec3::new(x, y, 0.0), Vec3::zeros(), 1.0));
    s
}

// ==================================================================================
// Deposition
// ==================================================================================

#[test]
fn deposited_charge_matches_particle_charge() {
    let grid = Grid::new(24, 16, 0.4, 0.3).unwrap();
    let random = |s: &Species, i: usize| {
        let g = s.grid();
        let pos = Vec3::new(hash_unit(i, 1) * g.width(), hash_unit(i, 2) * g.height(), 0.0);
        let mom = Vec3::new(hash_unit(i, 3) - 0.5, hash_unit(i, 4) - 0.5, 0.0) * 0.1;
        (pos, mom)
    };
    let mut sim = Simulation::builder()
        .grid(grid)
        .params(params(0.05))
        .species(
            SpeciesSpec { name: "electrons".into(), charge: -1.0, mass: 1.0, count: 5000, weight: 0.02 },
            random,
        )
        .species(
            SpeciesSpec { name: "ions".into(), charge: 1.0, mass: 100.0, count: 3000, weight: 0.03 },
            random,
        )
        .build()
        .unwrap();

    for _ in 0..3 {
        let expected: f64 = sim.species().iter().map(|s| s.total_charge()).sum();
        let deposited = sim.total_density().sum() * grid.cell_area();
        assert_relative_eq!(deposited, expected, epsilon = 1e-10);

        for s in sim.species() {
            let per_species = s.density().sum() * grid.cell_area();
            assert_relative_eq!(per_species, s.total_charge(), max_relative = 1e-12);
        }
        sim.step().unwrap();
    }
}

// ==================================================================================
// Field solve
// ==================================================================================

#[test]
fn lone_particle_feels_no_self_force() {
    let grid = Grid::new(16, 16, 1.0, 1.0).unwrap();
    for &(x, y) in &[(5.3, 7.8), (0.0, 0.0), (15.9, 3.5), (8.5, 8.5)] {
        let mut p = params(0.1);
        p.leapfrog_init = false;
        let sim = Simulation::builder()
            .grid(grid)
            .params(p)
            .with_species(lone_particle(grid, x, y, 1.0))
            .build()
            .unwrap();

        // The mesh field itself is not zero, only its average over the stencil.
        assert!(sim.field().ex.max_abs() > 1e-3);
        let e = sim.species()[0].particles()[0].local_e_field();
        assert!(e.norm() < 1e-9, "self force at ({x}, {y}): {e:?}");
        assert!(sim.solver().e_at(x, y).norm() < 1e-9);
    }
}

#[test]
fn uniform_plasma_has_no_field() {
    let grid = Grid::new(16, 8, 0.5, 0.5).unwrap();
    // One particle exactly on every node gives a uniform density.
    let on_nodes = |s: &Species, i: usize| {
        let g = s.grid();
        (Vec3::new(g.x_coord(i % g.nx), g.y_coord(i / g.nx), 0.0), Vec3::zeros())
    };
    let sim = Simulation::builder()
        .grid(grid)
        .params(params(0.1))
        .species(
            SpeciesSpec { name: "electrons".into(), charge: -1.0, mass: 1.0, count: 128, weight: 0.25 },
            on_nodes,
        )
        .build()
        .unwrap();

    let density = sim.total_density();
    assert_relative_eq!(density.max_abs(), 1.0, epsilon = 1e-12);
    assert!(sim.field().ex.max_abs() < 1e-12);
    assert!(sim.field().ey.max_abs() < 1e-12);
    assert!(sim.field().phi.max_abs() < 1e-12);
    assert!(sim.field_energy() < 1e-24);
}

// ==================================================================================
// Momentum and energy
// ==================================================================================

#[test]
fn like_charges_repel_with_equal_and_opposite_momentum() {
    let grid = Grid::new(32, 32, 1.0, 1.0).unwrap();
    let mut pair = lone_particle(grid, 14.5, 16.2, 1.0);
    pair.add_particle(Particle::new(Vec3::new(17.5, 16.2, 0.0), Vec3::zeros(), 1.0));
    let mut sim = Simulation::builder()
        .grid(grid)
        .params(params(0.1))
        .with_species(pair)
        .build()
        .unwrap();

    for _ in 0..50 {
        sim.step().unwrap();
    }

    let particles = sim.species()[0].particles();
    let (left, right) = (particles[0].mom(), particles[1].mom());
    assert!(left.x < 0.0, "left particle should move left: {left:?}");
    assert!(right.x > 0.0, "right particle should move right: {right:?}");
    assert_relative_eq!(left.x, -right.x, max_relative = 1e-9);
    assert!(sim.total_momentum().norm() < 1e-12);
}

/// Max relative energy excursion of a cold plasma oscillation run to `t_end`.
fn cold_plasma_drift(dt: f64, t_end: f64) -> f64 {
    let nx = 64;
    let dx = 2.0 * PI / nx as f64;
    let grid = Grid::new(nx, 4, dx, dx).unwrap();
    let loading = LoadingConfig {
        ppc_x: 4,
        ppc_y: 1,
        drift: [0.0; 3],
        offset: 0.5,
        perturbation: Some(PerturbationConfig { amplitude: 0.01, mode: 1 }),
    };
    let spec = SpeciesSpec {
        name: "electrons".into(),
        charge: -1.0,
        mass: 1.0,
        count: loading.count(&grid),
        // Unit density, so omega_p = 1.
        weight: grid.cell_area() / 4.0,
    };
    let mut sim = Simulation::builder()
        .grid(grid)
        .params(params(dt))
        .species(spec, move |s, i| loading.place(s.grid(), i))
        .build()
        .unwrap();

    let steps = (t_end / dt).round() as u64;
    for _ in 0..steps {
        sim.step().unwrap();
    }
    sim.check_health().unwrap();
    sim.energy_drift().unwrap().relative_drift
}

#[test]
fn energy_error_shrinks_with_time_step() {
    let coarse = cold_plasma_drift(0.4, 8.0);
    let medium = cold_plasma_drift(0.2, 8.0);
    let fine = cold_plasma_drift(0.1, 8.0);

    assert!(medium < coarse, "drift {medium} at dt=0.2 vs {coarse} at dt=0.4");
    assert!(fine < medium, "drift {fine} at dt=0.1 vs {medium} at dt=0.2");
    // Leapfrog energy error is second order in dt.
    assert!(coarse / fine > 4.0, "coarse {coarse}, fine {fine}");
    assert!(fine < 0.01, "drift at dt=0.1 is {fine}");
}

#[test]
fn cold_plasma_exchanges_field_and_kinetic_energy() {
    let nx = 64;
    let dx = 2.0 * PI / nx as f64;
    let grid = Grid::new(nx, 4, dx, dx).unwrap();
    let loading = LoadingConfig {
        ppc_x: 4,
        ppc_y: 1,
        drift: [0.0; 3],
        offset: 0.5,
        perturbation: Some(PerturbationConfig { amplitude: 0.01, mode: 1 }),
    };
    let spec = SpeciesSpec {
        name: "electrons".into(),
        charge: -1.0,
        mass: 1.0,
        count: loading.count(&grid),
        weight: grid.cell_area() / 4.0,
    };
    let mut sim = Simulation::builder()
        .grid(grid)
        .params(params(0.05))
        .species(spec, move |s, i| loading.place(s.grid(), i))
        .build()
        .unwrap();

    // A quarter plasma period: field energy turns into kinetic energy.
    for _ in 0..32 {
        sim.step().unwrap();
    }
    let history = sim.energy_history();
    let first = history[0];
    let quarter = history[31];
    assert!(first.field > 10.0 * first.kinetic);
    assert!(quarter.kinetic > 10.0 * quarter.field);
    assert_relative_eq!(quarter.total, first.total, max_relative = 0.01);
}
