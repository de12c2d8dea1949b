//! Camera parameters.
//!
//! In an AR session the camera never moves: the tracker reports target poses
//! relative to a fixed camera whose intrinsics match the video feed.

/// Perspective projection of the video camera.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CameraProjection {
    pub fov_y: cgmath::Deg<f32>,
    pub aspect: f32,
    pub near: f32,
    pub far: f32,
}

impl Default for CameraProjection {
    fn default() -> Self {
        Self {
            fov_y: cgmath::Deg(45.0),
            aspect: 4.0 / 3.0,
            near: 0.1,
            far: 10_000.0,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Camera {
    pub projection: CameraProjection,
}

impl Camera {
    pub fn new(projection: CameraProjection) -> Self {
        Self { projection }
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        if width > 0 && height > 0 {
            self.projection.aspect = width as f32 / height as f32;
        }
    }

    pub fn projection_matrix(&self) -> cgmath::Matrix4<f32> {
        let p = &self.projection;
        cgmath::perspective(p.fov_y, p.aspect, p.near, p.far)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resize_updates_aspect() {
        let mut camera = Camera::new(CameraProjection::default());
        camera.resize(1920, 1080);
        assert!((camera.projection.aspect - 16.0 / 9.0).abs() < 1e-6);
        camera.resize(0, 1080);
        assert!((camera.projection.aspect - 16.0 / 9.0).abs() < 1e-6);
    }

    #[test]
    fn projection_is_perspective() {
        let m = Camera::new(CameraProjection::default()).projection_matrix();
        assert_eq!(m.z.w, -1.0);
    }
}
