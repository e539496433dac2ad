use std::f32::consts::FRAC_PI_4;

use glam::Vec3;
use serde::{Deserialize, Serialize};

use chunkworld_common::WorldCoordinate;

use crate::frustum::Frustum;

/// Read-only view description consumed by the streaming core.
///
/// Positions are in chunk units. Camera motion is driven by the caller;
/// the core only ever reads a copy.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Camera {
    pub position: Vec3,
    pub front: Vec3,
    pub up: Vec3,
    /// Vertical field of view in radians.
    pub fov_y: f32,
    pub ratio: f32,
    pub near: f32,
    pub far: f32,
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            front: Vec3::NEG_Z,
            up: Vec3::Y,
            fov_y: FRAC_PI_4,
            ratio: 4.0 / 3.0,
            near: 0.005,
            far: 30.0,
        }
    }
}

impl Camera {
    /// A default camera at `position` facing `target`.
    pub fn looking_at(position: Vec3, target: Vec3) -> Self {
        Self {
            position,
            front: (target - position).normalize(),
            ..Self::default()
        }
    }

    pub fn with_far(mut self, far: f32) -> Self {
        self.far = far;
        self
    }

    pub fn frustum(&self) -> Frustum {
        let mut frustum = Frustum::new(self.fov_y, self.ratio, self.near, self.far);
        frustum.update(self.position, self.front, self.up);
        frustum
    }

    /// The chunk the camera currently sits in.
    pub fn referential(&self) -> WorldCoordinate {
        WorldCoordinate::from_position(self.position)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_camera_looks_down_neg_z() {
        let cam = Camera::default();
        let f = cam.frustum();
        assert!(f.contains(Vec3::new(0.0, 0.0, -2.0)));
        assert!(!f.contains(Vec3::new(0.0, 0.0, 2.0)));
    }

    #[test]
    fn looking_at_normalizes_front() {
        let cam = Camera::looking_at(Vec3::new(0.0, 0.0, 5.0), Vec3::ZERO);
        assert!((cam.front.length() - 1.0).abs() < 1e-6);
        assert_eq!(cam.referential(), WorldCoordinate::new(0, 0, 5));
    }
}
