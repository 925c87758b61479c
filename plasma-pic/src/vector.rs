use nalgebra::Vector3;

/// Three-component vector used for positions, momenta and local fields.
pub type Vec3 = Vector3<f64>;

pub fn zero() -> Vec3 {
    Vec3::zeros()
}

pub fn is_finite(v: &Vec3) -> bool {
    v.iter().all(|c| c.is_finite())
}

/// Rotate `p` about `t` with the Boris two-step scheme.
///
/// `t` is `q B dt / (2 m)`. The result has the same magnitude as `p`
/// up to rounding.
pub fn boris_rotate(p: &Vec3, t: &Vec3) -> Vec3 {
    let s = t * (2.0 / (1.0 + t.norm_squared()));
    let p_prime = p + p.cross(t);
    p + p_prime.cross(&s)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn cross_and_dot() {
        let a = Vec3::new(1.0, 0.0, 0.0);
        let b = Vec3::new(0.0, 1.0, 0.0);
        assert_relative_eq!(a.cross(&b), Vec3::new(0.0, 0.0, 1.0));
        assert_relative_eq!(a.dot(&b), 0.0);
        assert_relative_eq!((a * 3.0 + b * 4.0).norm(), 5.0);
    }

    #[test]
    fn boris_rotation_keeps_magnitude() {
        let p = Vec3::new(0.3, -1.2, 0.7);
        let t = Vec3::new(0.05, 0.4, -0.9);
        let rotated = boris_rotate(&p, &t);
        assert_relative_eq!(rotated.norm(), p.norm(), epsilon = 1e-12);
        assert!(is_finite(&rotated));
    }

    #[test]
    fn boris_rotation_about_z_turns_in_plane() {
        let p = Vec3::new(1.0, 0.0, 0.0);
        let t = Vec3::new(0.0, 0.0, 0.1);
        let rotated = boris_rotate(&p, &t);
        assert_relative_eq!(rotated.z, 0.0);
        // Positive charge in +z field gyrates clockwise.
        assert!(rotated.y < 0.0);
    }
}
