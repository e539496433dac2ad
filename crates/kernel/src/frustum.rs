use glam::{Vec3, Vec4};

use chunkworld_common::Sphere;

pub const PLANE_LEFT: usize = 0;
pub const PLANE_RIGHT: usize = 1;
pub const PLANE_BOTTOM: usize = 2;
pub const PLANE_TOP: usize = 3;
pub const PLANE_NEAR: usize = 4;
pub const PLANE_FAR: usize = 5;

/// Six-plane view volume.
///
/// Each plane is `(A, B, C, D)` with `(A, B, C)` the inward unit normal, so a
/// point `p` is on the visible side when `A*x + B*y + C*z + D >= 0`.
/// Projection parameters are fixed at construction; orientation and position
/// are applied by [`Frustum::update`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Frustum {
    fov_y: f32,
    ratio: f32,
    near: f32,
    far: f32,
    planes: [Vec4; 6],
}

impl Frustum {
    /// Create a frustum at the origin looking down `-z`.
    ///
    /// `fov_y` is the vertical field of view in radians, `ratio` is
    /// width / height.
    pub fn new(fov_y: f32, ratio: f32, near: f32, far: f32) -> Self {
        let mut frustum = Self {
            fov_y,
            ratio,
            near,
            far,
            planes: [Vec4::ZERO; 6],
        };
        frustum.update(Vec3::ZERO, Vec3::NEG_Z, Vec3::Y);
        frustum
    }

    /// Recompute the clip planes for a camera at `position` facing `front`.
    ///
    /// `up` only needs to be non-parallel to `front`; the orthogonal up
    /// vector is derived from it.
    pub fn update(&mut self, position: Vec3, front: Vec3, up: Vec3) {
        let front = front.normalize();
        let right = front.cross(up).normalize();
        let up = right.cross(front);

        let tan_v = (self.fov_y * 0.5).tan();
        let tan_h = tan_v * self.ratio;

        let right_edge = front + right * tan_h;
        let left_edge = front - right * tan_h;
        let top_edge = front + up * tan_v;
        let bottom_edge = front - up * tan_v;

        let through = |normal: Vec3, point: Vec3| {
            let n = normal.normalize();
            n.extend(-n.dot(point))
        };

        self.planes[PLANE_LEFT] = through(left_edge.cross(up), position);
        self.planes[PLANE_RIGHT] = through(up.cross(right_edge), position);
        self.planes[PLANE_BOTTOM] = through(right.cross(bottom_edge), position);
        self.planes[PLANE_TOP] = through(top_edge.cross(right), position);
        self.planes[PLANE_NEAR] = through(front, position + front * self.near);
        self.planes[PLANE_FAR] = through(-front, position + front * self.far);
    }

    /// Signed distance from `point` to a plane; positive on the inside.
    pub fn distance(&self, plane: usize, point: Vec3) -> f32 {
        let p = self.planes[plane];
        p.truncate().dot(point) + p.w
    }

    pub fn planes(&self) -> &[Vec4; 6] {
        &self.planes
    }

    pub fn near(&self) -> f32 {
        self.near
    }

    pub fn far(&self) -> f32 {
        self.far
    }

    pub fn contains(&self, point: Vec3) -> bool {
        (0..6).all(|i| self.distance(i, point) >= 0.0)
    }

    /// Conservative sphere test: `false` only when the sphere lies entirely
    /// outside one of the planes. A sphere tangent to a plane intersects.
    pub fn intersects(&self, sphere: &Sphere) -> bool {
        (0..6).all(|i| self.distance(i, sphere.center) >= -sphere.radius)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::FRAC_PI_4;

    fn looking_down_neg_z() -> Frustum {
        Frustum::new(FRAC_PI_4, 4.0 / 3.0, 0.005, 30.0)
    }

    #[test]
    fn point_ahead_is_contained() {
        let f = looking_down_neg_z();
        assert!(f.contains(Vec3::new(0.0, 0.0, -1.0)));
        assert!(f.contains(Vec3::new(0.0, 0.0, -29.0)));
    }

    #[test]
    fn point_behind_is_not_contained() {
        let f = looking_down_neg_z();
        assert!(!f.contains(Vec3::new(0.0, 0.0, 1.0)));
    }

    #[test]
    fn points_beyond_far_or_sides_are_not_contained() {
        let f = looking_down_neg_z();
        assert!(!f.contains(Vec3::new(0.0, 0.0, -31.0)));
        assert!(!f.contains(Vec3::new(10.0, 0.0, -1.0)));
        assert!(!f.contains(Vec3::new(0.0, -10.0, -1.0)));
    }

    #[test]
    fn planes_face_inward() {
        let f = looking_down_neg_z();
        let ahead = Vec3::new(0.0, 0.0, -5.0);
        for i in 0..6 {
            assert!(f.distance(i, ahead) > 0.0, "plane {i} faces outward");
        }
    }

    #[test]
    fn growing_sphere_keeps_intersection() {
        let f = looking_down_neg_z();
        let center = Vec3::new(0.0, 0.0, -1.0);
        assert!(f.intersects(&Sphere::new(center, 0.1)));
        assert!(f.intersects(&Sphere::new(center, 1000.0)));
    }

    #[test]
    fn sphere_behind_camera_is_culled() {
        let f = looking_down_neg_z();
        assert!(!f.intersects(&Sphere::new(Vec3::new(0.0, 0.0, 5.0), 1.0)));
        assert!(f.intersects(&Sphere::new(Vec3::new(0.0, 0.0, 5.0), 6.0)));
    }

    #[test]
    fn tangent_sphere_intersects() {
        let f = looking_down_neg_z();
        // Near plane sits at z = -0.005 facing -z.
        let sphere = Sphere::new(Vec3::new(0.0, 0.0, 0.995), 1.0);
        let d = f.distance(PLANE_NEAR, sphere.center);
        assert!((d + 1.0).abs() < 1e-5);
        assert!(f.intersects(&Sphere::new(sphere.center, -d)));
    }

    #[test]
    fn update_follows_orientation() {
        let mut f = looking_down_neg_z();
        f.update(Vec3::new(10.0, 0.0, 0.0), Vec3::X, Vec3::Y);
        assert!(f.contains(Vec3::new(15.0, 0.0, 0.0)));
        assert!(!f.contains(Vec3::new(0.0, 0.0, -1.0)));
    }
}
