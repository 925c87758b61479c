use crate::vector::{self, Vec3};

/// One macro-particle. Momentum is per physical particle (`m v`); charge and
/// mass come from the owning species.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Particle {
    pos: Vec3,
    mom: Vec3,
    local_e: Vec3, // E interpolated at pos
    local_b: Vec3, // B interpolated at pos
    weight: f64,   // Physical particles per macro-particle
}

impl Particle {
    pub fn new(pos: Vec3, mom: Vec3, weight: f64) -> Self {
        Particle {
            pos,
            mom,
            local_e: vector::zero(),
            local_b: vector::zero(),
            weight,
        }
    }

    pub fn pos(&self) -> Vec3 {
        self.pos
    }

    pub fn mom(&self) -> Vec3 {
        self.mom
    }

    pub fn local_e_field(&self) -> Vec3 {
        self.local_e
    }

    pub fn local_b_field(&self) -> Vec3 {
        self.local_b
    }

    pub fn weight(&self) -> f64 {
        self.weight
    }

    pub fn set_pos(&mut self, pos: Vec3) {
        self.pos = pos;
    }

    pub fn set_mom(&mut self, mom: Vec3) {
        self.mom = mom;
    }

    pub fn set_local_e_field(&mut self, e: Vec3) {
        self.local_e = e;
    }

    pub fn set_local_b_field(&mut self, b: Vec3) {
        self.local_b = b;
    }

    pub fn is_finite(&self) -> bool {
        vector::is_finite(&self.pos) && vector::is_finite(&self.mom)
    }

    /// Momentum after one leapfrog kick of length `dt` in the cached fields.
    ///
    /// Without a magnetic field this is `p + qE dt`. Otherwise the Boris
    /// split is used: half electric kick, magnetic rotation, half kick.
    pub fn kicked_momentum(&self, charge: f64, mass: f64, dt: f64, magnetic: bool) -> Vec3 {
        let impulse = self.local_e * (charge * dt);
        if !magnetic {
            return self.mom + impulse;
        }
        let p_minus = self.mom + impulse * 0.5;
        let t = self.local_b * (charge * dt / (2.0 * mass));
        vector::boris_rotate(&p_minus, &t) + impulse * 0.5
    }

    /// Kinetic energy of the whole macro-particle for momentum `p`.
    pub fn kinetic_energy_of(&self, p: &Vec3, mass: f64) -> f64 {
        self.weight * p.norm_squared() / (2.0 * mass)
    }
}
