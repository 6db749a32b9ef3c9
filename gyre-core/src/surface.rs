//! A minimal planar surface: the stand-in for the external geometry layer.
//!
//! The stepper needs surfaces for exactly three things: building the
//! bound-to-free Jacobian that anchors a covariance to a local frame,
//! projecting free parameters back into that frame, and intersecting a
//! straight line for step-size targeting. Everything else about geometry
//! stays outside this workspace.

use crate::types::{BoundToFreeMatrix, BoundVector, FreeToBoundMatrix, FreeVector, Vector2, Vector3, bound, free};

/// Above this |direction·ẑ| the standard curvilinear frame degenerates and
/// the frame is seeded from the x axis instead.
const GRAZING_TOLERANCE: f64 = 0.999_999;

/// The local orthonormal frame `(u, v)` of a curvilinear system whose
/// normal is `direction`; `(u, v, direction)` is right-handed.
#[must_use]
pub fn curvilinear_frame(direction: &Vector3) -> (Vector3, Vector3) {
    let w = direction.normalize();
    let u = if w.z.abs() < GRAZING_TOLERANCE {
        Vector3::z_axis().cross(&w).normalize()
    } else {
        Vector3::x_axis().cross(&w).normalize()
    };
    let v = w.cross(&u);
    (u, v)
}

fn polar_angles(direction: &Vector3) -> (f64, f64) {
    let phi = direction.y.atan2(direction.x);
    let theta = direction.z.clamp(-1.0, 1.0).acos();
    (phi, theta)
}

/// An unbounded plane with an orthonormal local frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlaneSurface {
    center: Vector3,
    u: Vector3,
    v: Vector3,
    normal: Vector3,
}

impl PlaneSurface {
    /// Creates a plane through `center` with the given (not necessarily
    /// normalized) normal.
    #[must_use]
    pub fn new(center: Vector3, normal: Vector3) -> Self {
        let normal = normal.normalize();
        let (u, v) = curvilinear_frame(&normal);
        Self { center, u, v, normal }
    }

    /// The curvilinear frame of a track: a plane at its position, normal to
    /// its direction.
    #[must_use]
    pub fn curvilinear(position: Vector3, direction: Vector3) -> Self {
        Self::new(position, direction)
    }

    #[must_use]
    pub fn center(&self) -> Vector3 {
        self.center
    }

    #[must_use]
    pub fn normal(&self) -> Vector3 {
        self.normal
    }

    #[must_use]
    pub fn local_to_global(&self, local: &Vector2) -> Vector3 {
        self.center + local.x * self.u + local.y * self.v
    }

    /// Projects a global position into the local frame. Positions off the
    /// plane are projected along the normal.
    #[must_use]
    pub fn global_to_local(&self, position: &Vector3) -> Vector2 {
        let delta = position - self.center;
        Vector2::new(delta.dot(&self.u), delta.dot(&self.v))
    }

    /// Signed path length along `direction` from `position` to the plane,
    /// or `None` for a trajectory parallel to it.
    #[must_use]
    pub fn intersect(&self, position: &Vector3, direction: &Vector3) -> Option<f64> {
        let denom = self.normal.dot(direction);
        if denom.abs() < 1e-12 {
            return None;
        }
        Some(self.normal.dot(&(self.center - position)) / denom)
    }

    /// Converts free parameters into this surface's bound parameters.
    #[must_use]
    pub fn free_to_bound_parameters(&self, parameters: &FreeVector) -> BoundVector {
        let position = Vector3::new(
            parameters[free::X],
            parameters[free::Y],
            parameters[free::Z],
        );
        let direction = Vector3::new(
            parameters[free::DX],
            parameters[free::DY],
            parameters[free::DZ],
        )
        .normalize();
        let local = self.global_to_local(&position);
        let (phi, theta) = polar_angles(&direction);

        let mut bound = BoundVector::zeros();
        bound[bound::LOC0] = local.x;
        bound[bound::LOC1] = local.y;
        bound[bound::PHI] = phi;
        bound[bound::THETA] = theta;
        bound[bound::QOP] = parameters[free::QOP];
        bound[bound::T] = parameters[free::T];
        bound
    }

    /// Converts bound parameters at this surface into free parameters.
    #[must_use]
    pub fn bound_to_free_parameters(&self, parameters: &BoundVector) -> FreeVector {
        let local = Vector2::new(parameters[bound::LOC0], parameters[bound::LOC1]);
        let position = self.local_to_global(&local);
        let (phi, theta) = (parameters[bound::PHI], parameters[bound::THETA]);
        let direction = Vector3::new(
            theta.sin() * phi.cos(),
            theta.sin() * phi.sin(),
            theta.cos(),
        );

        let mut f = FreeVector::zeros();
        f[free::X] = position.x;
        f[free::Y] = position.y;
        f[free::Z] = position.z;
        f[free::T] = parameters[bound::T];
        f[free::DX] = direction.x;
        f[free::DY] = direction.y;
        f[free::DZ] = direction.z;
        f[free::QOP] = parameters[bound::QOP];
        f
    }

    /// Jacobian of free with respect to bound parameters at a track
    /// crossing this surface with the given direction.
    #[must_use]
    pub fn bound_to_free_jacobian(&self, direction: &Vector3) -> BoundToFreeMatrix {
        bound_to_free_jacobian_from(&self.u, &self.v, direction)
    }

    /// Jacobian of bound with respect to free parameters at a track
    /// crossing this surface with the given direction.
    #[must_use]
    pub fn free_to_bound_jacobian(&self, direction: &Vector3) -> FreeToBoundMatrix {
        free_to_bound_jacobian_from(&self.u, &self.v, direction)
    }
}

/// Builds the bound-to-free Jacobian from an explicit local frame.
#[must_use]
pub fn bound_to_free_jacobian_from(
    u: &Vector3,
    v: &Vector3,
    direction: &Vector3,
) -> BoundToFreeMatrix {
    let (phi, theta) = polar_angles(direction);
    let (sin_phi, cos_phi) = phi.sin_cos();
    let (sin_theta, cos_theta) = theta.sin_cos();

    let mut jac = BoundToFreeMatrix::zeros();
    for row in 0..3 {
        jac[(row, bound::LOC0)] = u[row];
        jac[(row, bound::LOC1)] = v[row];
    }
    jac[(free::T, bound::T)] = 1.0;
    jac[(free::DX, bound::PHI)] = -sin_theta * sin_phi;
    jac[(free::DX, bound::THETA)] = cos_theta * cos_phi;
    jac[(free::DY, bound::PHI)] = sin_theta * cos_phi;
    jac[(free::DY, bound::THETA)] = cos_theta * sin_phi;
    jac[(free::DZ, bound::THETA)] = -sin_theta;
    jac[(free::QOP, bound::QOP)] = 1.0;
    jac
}

/// Builds the free-to-bound Jacobian from an explicit local frame.
#[must_use]
pub fn free_to_bound_jacobian_from(
    u: &Vector3,
    v: &Vector3,
    direction: &Vector3,
) -> FreeToBoundMatrix {
    let (phi, theta) = polar_angles(direction);
    let (sin_phi, cos_phi) = phi.sin_cos();
    let inv_sin_theta = 1.0 / theta.sin();

    let mut jac = FreeToBoundMatrix::zeros();
    for col in 0..3 {
        jac[(bound::LOC0, col)] = u[col];
        jac[(bound::LOC1, col)] = v[col];
    }
    jac[(bound::PHI, free::DX)] = -sin_phi * inv_sin_theta;
    jac[(bound::PHI, free::DY)] = cos_phi * inv_sin_theta;
    jac[(bound::THETA, free::DZ)] = -inv_sin_theta;
    jac[(bound::QOP, free::QOP)] = 1.0;
    jac[(bound::T, free::T)] = 1.0;
    jac
}

#[cfg(test)]
mod tests {
    use approx::{assert_abs_diff_eq, assert_relative_eq};
    use nalgebra::Matrix6;

    use super::*;

    #[test]
    fn curvilinear_frame_is_orthonormal() {
        let dir = Vector3::new(4.0, 5.0, 6.0).normalize();
        let (u, v) = curvilinear_frame(&dir);
        assert_abs_diff_eq!(u.dot(&v), 0.0, epsilon = 1e-14);
        assert_abs_diff_eq!(u.dot(&dir), 0.0, epsilon = 1e-14);
        assert_relative_eq!(u.norm(), 1.0, epsilon = 1e-14);
        assert_relative_eq!(v.norm(), 1.0, epsilon = 1e-14);
        assert_relative_eq!(u.cross(&v), dir, epsilon = 1e-14);
    }

    #[test]
    fn curvilinear_frame_handles_grazing_incidence() {
        let dir = Vector3::new(1e-9, 0.0, 1.0).normalize();
        let (u, v) = curvilinear_frame(&dir);
        assert_relative_eq!(u.cross(&v), dir, epsilon = 1e-12);
    }

    #[test]
    fn local_global_roundtrip() {
        let plane = PlaneSurface::new(Vector3::new(1.0, 2.0, 3.0), Vector3::new(0.0, 1.0, 1.0));
        let local = Vector2::new(-4.5, 7.25);
        let global = plane.local_to_global(&local);
        assert_relative_eq!(plane.global_to_local(&global), local, epsilon = 1e-12);
    }

    #[test]
    fn line_intersection_distance() {
        let plane = PlaneSurface::new(Vector3::new(2.0, 0.0, 0.0), Vector3::new(1.0, 0.0, 0.0));
        let s = plane
            .intersect(&Vector3::zeros(), &Vector3::x())
            .expect("non-parallel");
        assert_relative_eq!(s, 2.0);
        assert!(
            plane
                .intersect(&Vector3::zeros(), &Vector3::y())
                .is_none()
        );
    }

    #[test]
    fn parameter_roundtrip_through_bound_frame() {
        let plane = PlaneSurface::new(Vector3::new(0.0, 0.0, 5.0), Vector3::new(0.3, -0.2, 1.0));
        let mut f = FreeVector::zeros();
        let dir = Vector3::new(0.3, -0.2, 1.0).normalize();
        let pos = plane.local_to_global(&Vector2::new(3.0, -2.0));
        f[free::X] = pos.x;
        f[free::Y] = pos.y;
        f[free::Z] = pos.z;
        f[free::T] = 7.0;
        f[free::DX] = dir.x;
        f[free::DY] = dir.y;
        f[free::DZ] = dir.z;
        f[free::QOP] = -0.25;

        let bound = plane.free_to_bound_parameters(&f);
        let back = plane.bound_to_free_parameters(&bound);
        assert_relative_eq!(back, f, epsilon = 1e-12);
    }

    #[test]
    fn jacobians_compose_to_identity_in_curvilinear_frame() {
        let dir = Vector3::new(1.0, -2.0, 0.5).normalize();
        let frame = PlaneSurface::curvilinear(Vector3::zeros(), dir);
        let product = frame.free_to_bound_jacobian(&dir) * frame.bound_to_free_jacobian(&dir);
        assert_relative_eq!(product, Matrix6::identity(), epsilon = 1e-12);
    }
}
