//! The image tracking seam.
//!
//! Feature extraction and pose estimation belong to an external tracking
//! library. The session only needs target poses per frame and a start/stop
//! lifecycle; the handle is always passed in explicitly.

use crate::camera::CameraProjection;

#[allow(async_fn_in_trait)]
pub trait ImageTracker {
    /// Loads a compiled target descriptor and returns the number of targets in it.
    fn load_targets(&mut self, descriptor: &[u8]) -> anyhow::Result<usize>;

    /// Opens the video feed and begins tracking.
    async fn start(&mut self) -> anyhow::Result<()>;

    fn stop(&mut self);

    /// Camera-space pose of target `index` if it is currently tracked.
    fn target_pose(&self, index: usize) -> Option<cgmath::Matrix4<f32>>;

    /// Intrinsics of the video camera.
    fn projection(&self) -> CameraProjection {
        CameraProjection::default()
    }
}

/// Visibility transitions of an anchor.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AnchorEvent {
    TargetFound { target_index: usize },
    TargetLost { target_index: usize },
}
