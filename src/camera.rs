//! Camera frame derivation from a bounding volume.
//!
//! The viewpoint is defined in a unit model frame and carried into world
//! space by the translate-then-scale transform of a [`BoundingDescriptor`].
//! The result is a pinhole [`CameraFrame`]: an eye point plus `U`, `V`, `W`
//! vectors whose lengths encode the half-width, half-height and distance of
//! the view plane.

use crate::util::{Error, Mat4, Result, Vec3, Vec4};

/// Offset applied to the canonical on-axis eye so the gaze is never exactly
/// parallel to the up hint.
pub const EYE_OFFSET: f32 = 1e-5;

/// Center-extent description of a cube-shaped object frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingDescriptor {
    pub center: Vec3,
    /// Half the edge length of the cube. Must be positive.
    pub extent: f32,
}

impl BoundingDescriptor {
    /// Create a descriptor, rejecting non-positive or non-finite extents.
    pub fn new(center: Vec3, extent: f32) -> Result<Self> {
        let d = Self { center, extent };
        d.validate()?;
        Ok(d)
    }

    /// Descriptor from a packed `(x, y, z, extent)` vector.
    pub fn from_center_extent(ce: Vec4) -> Result<Self> {
        Self::new(ce.truncate(), ce.w)
    }

    pub fn validate(&self) -> Result<()> {
        if self.extent > 0.0 && self.extent.is_finite() && self.center.is_finite() {
            Ok(())
        } else {
            Err(Error::InvalidExtent(self.extent))
        }
    }

    /// Transform from unit model coordinates to world coordinates.
    pub fn model_to_world(&self) -> Mat4 {
        Mat4::from_translation(self.center) * Mat4::from_scale(Vec3::splat(self.extent))
    }
}

/// Viewpoint definition in the unit model frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraConfig {
    pub eye: Vec3,
    pub look: Vec3,
    pub up: Vec3,
    /// Tangent of the vertical half field of view (1.0 = 45 degrees).
    pub tan_yfov: f32,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            eye: Vec3::new(EYE_OFFSET, EYE_OFFSET, 2.0),
            look: Vec3::ZERO,
            up: Vec3::Z,
            tan_yfov: 1.0,
        }
    }
}

/// Eye point and view-plane basis in world space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraFrame {
    pub eye: Vec3,
    /// Right axis scaled to the half-width of the view plane.
    pub u: Vec3,
    /// Top axis scaled to the half-height of the view plane.
    pub v: Vec3,
    /// Gaze axis scaled to the distance of the view plane.
    pub w: Vec3,
}

impl CameraFrame {
    /// Unit right, top and forward axes.
    pub fn axes(&self) -> (Vec3, Vec3, Vec3) {
        (self.u.normalize(), self.v.normalize(), self.w.normalize())
    }
}

/// Compute the camera frame for `descriptor` with the default viewpoint.
pub fn compute_frame(descriptor: &BoundingDescriptor, width: u32, height: u32) -> Result<CameraFrame> {
    compute_frame_with(descriptor, width, height, &CameraConfig::default())
}

/// Compute the camera frame for `descriptor` with an explicit viewpoint.
pub fn compute_frame_with(
    descriptor: &BoundingDescriptor,
    width: u32,
    height: u32,
    config: &CameraConfig,
) -> Result<CameraFrame> {
    if width == 0 || height == 0 {
        return Err(Error::InvalidDimensions { width, height });
    }
    descriptor.validate()?;

    let m2w = descriptor.model_to_world();
    let eye = m2w.transform_point3(config.eye);
    let gaze = m2w.transform_vector3(config.look - config.eye);
    let up = m2w.transform_vector3(config.up);

    let degenerate = || Error::unsupported("camera gaze is zero or parallel to the up hint");
    let forward = gaze.try_normalize().ok_or_else(degenerate)?;
    let right = forward.cross(up).try_normalize().ok_or_else(degenerate)?;
    let top = right.cross(forward).try_normalize().ok_or_else(degenerate)?;

    let aspect = width as f32 / height as f32;
    let gaze_length = gaze.length();
    let half_height = gaze_length * config.tan_yfov;
    let half_width = half_height * aspect;

    Ok(CameraFrame {
        eye,
        u: right * half_width,
        v: top * half_height,
        w: forward * gaze_length,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOL: f32 = 1e-5;

    fn plate() -> BoundingDescriptor {
        BoundingDescriptor::new(Vec3::ZERO, 0.5).unwrap()
    }

    #[test]
    fn test_plate_scenario() {
        let frame = compute_frame(&plate(), 1024, 768).unwrap();

        // Eye sits one unit above the origin, nudged off-axis.
        assert!((frame.eye.z - 1.0).abs() < TOL);
        assert!(frame.eye.x > 0.0 && frame.eye.x < 1e-4);
        assert!(frame.eye.y > 0.0 && frame.eye.y < 1e-4);

        assert!((frame.w.length() - 1.0).abs() < TOL);
        assert!(frame.w.z < 0.0);

        let aspect = frame.u.length() / frame.v.length();
        assert!((aspect - 1024.0 / 768.0).abs() < 1e-4);
    }

    #[test]
    fn test_basis_orthonormal() {
        let descriptors = [
            plate(),
            BoundingDescriptor::new(Vec3::new(10.0, -3.0, 7.5), 120.0).unwrap(),
            BoundingDescriptor::new(Vec3::new(-0.25, 0.0, 0.0), 0.001).unwrap(),
        ];
        for d in &descriptors {
            for (w, h) in [(1, 1), (640, 480), (100, 900), (4096, 16)] {
                let frame = compute_frame(d, w, h).unwrap();
                let (right, top, forward) = frame.axes();
                assert!((forward.length() - 1.0).abs() < TOL);
                assert!(right.dot(forward).abs() < 1e-4);
                assert!(top.dot(right).abs() < 1e-4);
                assert!(top.dot(forward).abs() < 1e-4);

                let ratio = frame.u.length() / frame.v.length();
                let expected = w as f32 / h as f32;
                assert!((ratio - expected).abs() / expected < 1e-4);
            }
        }
    }

    #[test]
    fn test_w_parallel_to_world_gaze() {
        let d = BoundingDescriptor::new(Vec3::new(1.0, 2.0, 3.0), 4.0).unwrap();
        let frame = compute_frame(&d, 800, 600).unwrap();
        let cfg = CameraConfig::default();
        let gaze = d.model_to_world().transform_vector3(cfg.look - cfg.eye);
        assert!(frame.w.cross(gaze).length() < 1e-3);
        assert!(frame.w.dot(gaze) > 0.0);
    }

    #[test]
    fn test_deterministic() {
        let a = compute_frame(&plate(), 1024, 768).unwrap();
        let b = compute_frame(&plate(), 1024, 768).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_rejects_zero_dimensions() {
        assert!(matches!(
            compute_frame(&plate(), 1024, 0),
            Err(Error::InvalidDimensions { width: 1024, height: 0 })
        ));
        assert!(compute_frame(&plate(), 0, 768).is_err());
    }

    #[test]
    fn test_rejects_bad_extent() {
        assert!(matches!(
            BoundingDescriptor::new(Vec3::ZERO, 0.0),
            Err(Error::InvalidExtent(_))
        ));
        assert!(BoundingDescriptor::new(Vec3::ZERO, -1.0).is_err());
        assert!(BoundingDescriptor::new(Vec3::ZERO, f32::NAN).is_err());

        let raw = BoundingDescriptor { center: Vec3::ZERO, extent: 0.0 };
        assert!(compute_frame(&raw, 10, 10).is_err());
    }

    #[test]
    fn test_on_axis_eye_is_degenerate() {
        let cfg = CameraConfig {
            eye: Vec3::new(0.0, 0.0, 2.0),
            ..CameraConfig::default()
        };
        assert!(matches!(
            compute_frame_with(&plate(), 10, 10, &cfg),
            Err(Error::Unsupported(_))
        ));
    }

    #[test]
    fn test_center_extent_packing() {
        let d = BoundingDescriptor::from_center_extent(Vec4::new(1.0, 2.0, 3.0, 0.5)).unwrap();
        assert_eq!(d.center, Vec3::new(1.0, 2.0, 3.0));
        assert_eq!(d.extent, 0.5);
        let p = d.model_to_world().transform_point3(Vec3::ONE);
        assert_eq!(p, Vec3::new(1.5, 2.5, 3.5));
    }
}
