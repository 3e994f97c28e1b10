//! Quaternion pose algebra
//!
//! Tracked tool poses are reported as a unit quaternion plus a
//! translation vector. This module provides the small amount of
//! algebra the engine needs to re-express poses relative to a
//! reference tool: composition, inversion, and vector rotation.
//!
//! Quaternions use the scalar-first component order that the device
//! reports (`q0`, `qx`, `qy`, `qz`) and are assumed to be unit length,
//! which holds for every quaternion the device emits.

/// Unit quaternion in scalar-first component order.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Quaternion {
    /// Scalar component
    pub q0: f32,
    /// First vector component
    pub qx: f32,
    /// Second vector component
    pub qy: f32,
    /// Third vector component
    pub qz: f32,
}

impl Quaternion {
    /// The identity rotation.
    pub const IDENTITY: Quaternion = Quaternion {
        q0: 1.0,
        qx: 0.0,
        qy: 0.0,
        qz: 0.0,
    };

    /// Creates a quaternion from its four components.
    pub fn new(q0: f32, qx: f32, qy: f32, qz: f32) -> Self {
        Quaternion { q0, qx, qy, qz }
    }

    /// Returns the conjugate, which is the inverse for unit quaternions.
    pub fn conjugate(self) -> Self {
        Quaternion {
            q0: self.q0,
            qx: -self.qx,
            qy: -self.qy,
            qz: -self.qz,
        }
    }

    /// Hamilton product `self * other`.
    ///
    /// The result applies `other` first and `self` second when both
    /// quaternions are interpreted as rotations.
    pub fn multiply(self, other: Quaternion) -> Self {
        Quaternion {
            q0: self.q0 * other.q0 - self.qx * other.qx - self.qy * other.qy - self.qz * other.qz,
            qx: self.q0 * other.qx + self.qx * other.q0 + self.qy * other.qz - self.qz * other.qy,
            qy: self.q0 * other.qy - self.qx * other.qz + self.qy * other.q0 + self.qz * other.qx,
            qz: self.q0 * other.qz + self.qx * other.qy - self.qy * other.qx + self.qz * other.q0,
        }
    }

    /// Rotates a vector by this quaternion.
    pub fn rotate(self, v: Vector3) -> Vector3 {
        // v' = v + 2*q0*(u x v) + 2*(u x (u x v)) for unit quaternions
        let tx = 2.0 * (self.qy * v.z - self.qz * v.y);
        let ty = 2.0 * (self.qz * v.x - self.qx * v.z);
        let tz = 2.0 * (self.qx * v.y - self.qy * v.x);
        Vector3 {
            x: v.x + self.q0 * tx + (self.qy * tz - self.qz * ty),
            y: v.y + self.q0 * ty + (self.qz * tx - self.qx * tz),
            z: v.z + self.q0 * tz + (self.qx * ty - self.qy * tx),
        }
    }
}

/// Three-component translation vector in millimeters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Vector3 {
    /// X component
    pub x: f32,
    /// Y component
    pub y: f32,
    /// Z component
    pub z: f32,
}

impl Vector3 {
    /// The zero vector.
    pub const ZERO: Vector3 = Vector3 {
        x: 0.0,
        y: 0.0,
        z: 0.0,
    };

    /// Creates a vector from its three components.
    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Vector3 { x, y, z }
    }

    /// Component-wise sum.
    pub fn add(self, other: Vector3) -> Self {
        Vector3 {
            x: self.x + other.x,
            y: self.y + other.y,
            z: self.z + other.z,
        }
    }

    /// Component-wise negation.
    pub fn negate(self) -> Self {
        Vector3 {
            x: -self.x,
            y: -self.y,
            z: -self.z,
        }
    }
}

/// Rigid transform combining a rotation and a translation.
///
/// A pose reported by the device maps tool coordinates into the
/// tracker frame. [`QuatTransform::then`] and [`QuatTransform::inverse`]
/// are sufficient to re-express one tool's pose in another tool's
/// coordinate frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QuatTransform {
    /// Rotation part
    pub rotation: Quaternion,
    /// Translation part
    pub translation: Vector3,
}

impl QuatTransform {
    /// The identity transform.
    pub const IDENTITY: QuatTransform = QuatTransform {
        rotation: Quaternion::IDENTITY,
        translation: Vector3::ZERO,
    };

    /// Returns the inverse transform.
    pub fn inverse(self) -> Self {
        let rotation = self.rotation.conjugate();
        QuatTransform {
            rotation,
            translation: rotation.rotate(self.translation).negate(),
        }
    }

    /// Composes `self` with `outer`, applying `self` first.
    ///
    /// Given a tool pose `P` and a reference pose `R`, the tool's pose
    /// in the reference frame is `P.then(R.inverse())`.
    pub fn then(self, outer: QuatTransform) -> Self {
        QuatTransform {
            rotation: outer.rotation.multiply(self.rotation),
            translation: outer.rotation.rotate(self.translation).add(outer.translation),
        }
    }

    /// Applies this transform to a point.
    pub fn apply(self, point: Vector3) -> Vector3 {
        self.rotation.rotate(point).add(self.translation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPSILON: f32 = 1e-5;

    fn assert_close(actual: f32, expected: f32) {
        assert!(
            (actual - expected).abs() < EPSILON,
            "expected {}, got {}",
            expected,
            actual
        );
    }

    fn quarter_turn_z() -> Quaternion {
        let half = std::f32::consts::FRAC_1_SQRT_2;
        Quaternion::new(half, 0.0, 0.0, half)
    }

    #[test]
    fn test_identity_composition() {
        let pose = QuatTransform {
            rotation: quarter_turn_z(),
            translation: Vector3::new(10.0, -4.0, 2.5),
        };
        let composed = pose.then(QuatTransform::IDENTITY);
        assert_close(composed.rotation.q0, pose.rotation.q0);
        assert_close(composed.rotation.qz, pose.rotation.qz);
        assert_close(composed.translation.x, pose.translation.x);
        assert_close(composed.translation.y, pose.translation.y);
    }

    #[test]
    fn test_rotate_quarter_turn() {
        // A 90 degree rotation about z maps +x onto +y.
        let rotated = quarter_turn_z().rotate(Vector3::new(1.0, 0.0, 0.0));
        assert_close(rotated.x, 0.0);
        assert_close(rotated.y, 1.0);
        assert_close(rotated.z, 0.0);
    }

    #[test]
    fn test_inverse_cancels() {
        let pose = QuatTransform {
            rotation: quarter_turn_z(),
            translation: Vector3::new(100.0, 25.0, -3.0),
        };
        let round_trip = pose.then(pose.inverse());
        assert_close(round_trip.rotation.q0, 1.0);
        assert_close(round_trip.rotation.qx, 0.0);
        assert_close(round_trip.rotation.qy, 0.0);
        assert_close(round_trip.rotation.qz, 0.0);
        assert_close(round_trip.translation.x, 0.0);
        assert_close(round_trip.translation.y, 0.0);
        assert_close(round_trip.translation.z, 0.0);
    }

    #[test]
    fn test_relative_pose() {
        // Reference at (10, 0, 0) with no rotation; tool at (10, 5, 0).
        // Relative to the reference the tool sits at (0, 5, 0).
        let reference = QuatTransform {
            rotation: Quaternion::IDENTITY,
            translation: Vector3::new(10.0, 0.0, 0.0),
        };
        let tool = QuatTransform {
            rotation: Quaternion::IDENTITY,
            translation: Vector3::new(10.0, 5.0, 0.0),
        };
        let relative = tool.then(reference.inverse());
        assert_close(relative.translation.x, 0.0);
        assert_close(relative.translation.y, 5.0);
        assert_close(relative.translation.z, 0.0);
    }

    #[test]
    fn test_apply_rotates_then_translates() {
        let pose = QuatTransform {
            rotation: quarter_turn_z(),
            translation: Vector3::new(1.0, 2.0, 3.0),
        };
        let moved = pose.apply(Vector3::new(1.0, 0.0, 0.0));
        assert_close(moved.x, 1.0);
        assert_close(moved.y, 3.0);
        assert_close(moved.z, 3.0);
    }
}
