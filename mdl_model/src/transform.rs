//! Quaternion and transform math matching the engine's conventions.
//!
//! The results are intentionally not always identical to the equivalent glam functions.
//! Models rely on the exact slerp behavior for nearly opposite rotations.
use glam::{Affine3A, Quat, Vec3};

/// The local translation and rotation of a bone relative to its parent.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BonePose {
    pub translation: Vec3,
    pub rotation: Quat,
}

impl BonePose {
    pub const IDENTITY: Self = Self {
        translation: Vec3::ZERO,
        rotation: Quat::IDENTITY,
    };

    /// The 4x3 affine transform with rotation and translation.
    pub fn to_affine(self) -> Affine3A {
        Affine3A::from_rotation_translation(self.rotation, self.translation)
    }

    /// Interpolate rotation with [quaternion_slerp] and translation linearly.
    /// The factor `s` is clamped to `0.0..=1.0`.
    pub fn blend(self, other: Self, s: f32) -> Self {
        let s = s.clamp(0.0, 1.0);
        Self {
            translation: self.translation * (1.0 - s) + other.translation * s,
            rotation: quaternion_slerp(self.rotation, other.rotation, s),
        }
    }
}

/// Convert Euler angles in radians for roll (X), pitch (Y), and yaw (Z) to a quaternion.
pub fn angle_quaternion(angles: Vec3) -> Quat {
    let (sy, cy) = (angles.z * 0.5).sin_cos();
    let (sp, cp) = (angles.y * 0.5).sin_cos();
    let (sr, cr) = (angles.x * 0.5).sin_cos();

    Quat::from_xyzw(
        sr * cp * cy - cr * sp * sy,
        cr * sp * cy + sr * cp * sy,
        cr * cp * sy - sr * sp * cy,
        cr * cp * cy + sr * sp * sy,
    )
}

/// Spherical interpolation from `p` to `q` by `t`.
///
/// `q` is negated if that is closer to `p` than `q` itself.
/// Nearly identical rotations use linear interpolation.
/// Nearly opposite rotations interpolate towards a perpendicular rotation.
pub fn quaternion_slerp(p: Quat, q: Quat, t: f32) -> Quat {
    let p = p.to_array();
    let mut q = q.to_array();

    let a: f32 = p.iter().zip(&q).map(|(p, q)| (p - q) * (p - q)).sum();
    let b: f32 = p.iter().zip(&q).map(|(p, q)| (p + q) * (p + q)).sum();
    if a > b {
        q = q.map(|x| -x);
    }

    let cosom = p[0] * q[0] + p[1] * q[1] + p[2] * q[2] + p[3] * q[3];

    if (1.0 + cosom) > 1e-8 {
        let (sclp, sclq) = if (1.0 - cosom) > 1e-8 {
            let omega = cosom.acos();
            let sinom = omega.sin();
            (((1.0 - t) * omega).sin() / sinom, (t * omega).sin() / sinom)
        } else {
            (1.0 - t, t)
        };
        Quat::from_array(std::array::from_fn(|i| sclp * p[i] + sclq * q[i]))
    } else {
        // Only the first three components are interpolated.
        let qt = [-p[1], p[0], -p[3], p[2]];
        let sclp = ((1.0 - t) * 0.5 * std::f32::consts::PI).sin();
        let sclq = (t * 0.5 * std::f32::consts::PI).sin();
        Quat::from_xyzw(
            sclp * p[0] + sclq * qt[0],
            sclp * p[1] + sclq * qt[1],
            sclp * p[2] + sclq * qt[2],
            qt[3],
        )
    }
}

/// Concatenate each pose with its parent's model space transform.
///
/// Bones are processed in order, so parents that appear after their children
/// contribute an identity transform.
pub fn model_space_transforms(poses: &[BonePose], parents: &[Option<usize>]) -> Vec<Affine3A> {
    let mut transforms = vec![Affine3A::IDENTITY; poses.len()];
    for (i, pose) in poses.iter().enumerate() {
        let local = pose.to_affine();
        transforms[i] = match parents.get(i).copied().flatten() {
            Some(parent) if parent < transforms.len() => transforms[parent] * local,
            _ => local,
        };
    }
    transforms
}
