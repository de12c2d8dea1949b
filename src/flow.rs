//! Frame loop and deferred scene mutations.
//!
//! Once the bootstrap finished, the host calls [`FrameLoop::frame`] from its
//! display callback (`requestAnimationFrame` on the web, a redraw event
//! natively). Each frame:
//! 1. Apply deferred mutations whose futures resolved since the last frame
//! 2. Advance the animation mixer by the elapsed wall-clock time
//! 3. Copy tracker poses onto anchors and refresh world transforms
//! 4. Hand the scene to the [`FrameRenderer`]
//!
//! Deferred mutations are how late content (the overlay plane) reaches the
//! scene without blocking the loop: a [`PendingMutation`] resolves to a
//! closure over `&mut Scene`, or to `None` when there is nothing to apply.
//!
//! Natively the futures may rely on tokio (file reads through
//! [`FsSource`](crate::resources::FsSource)) while the display callback runs
//! outside of it, so the loop keeps a handle to the runtime that was current
//! when it was created and polls inside that runtime's context.

use std::{fmt::Debug, pin::Pin};

use futures::FutureExt;
use instant::Instant;

use crate::{
    animation::AnimationMixer,
    context::SessionContext,
    data_structures::scene_graph::Scene,
    render::FrameRenderer,
    tracker::{AnchorEvent, ImageTracker},
};

pub type SceneMutation = Box<dyn FnOnce(&mut Scene) -> anyhow::Result<()>>;

pub type PendingMutation = Pin<Box<dyn Future<Output = Option<SceneMutation>>>>;

/// Wall-clock time between consecutive frames.
#[derive(Debug)]
pub struct Clock {
    last: Instant,
}

impl Clock {
    pub fn new() -> Self {
        Self {
            last: Instant::now(),
        }
    }

    /// Seconds since the previous call (or since creation).
    pub fn delta(&mut self) -> f32 {
        let now = Instant::now();
        let dt = now.duration_since(self.last);
        self.last = now;
        dt.as_secs_f32()
    }
}

impl Default for Clock {
    fn default() -> Self {
        Self::new()
    }
}

pub struct FrameLoop {
    mixer: AnimationMixer,
    clock: Clock,
    pending: Vec<PendingMutation>,
    frames: u64,
    #[cfg(not(target_arch = "wasm32"))]
    runtime: Option<tokio::runtime::Handle>,
}

// Dummy impl, the pending futures are opaque
impl Debug for FrameLoop {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameLoop")
            .field("mixer", &self.mixer)
            .field("pending", &self.pending.len())
            .field("frames", &self.frames)
            .finish()
    }
}

impl FrameLoop {
    pub fn new(mixer: AnimationMixer) -> Self {
        Self {
            mixer,
            clock: Clock::new(),
            pending: Vec::new(),
            frames: 0,
            #[cfg(not(target_arch = "wasm32"))]
            runtime: tokio::runtime::Handle::try_current().ok(),
        }
    }

    /// Polls deferred futures inside `runtime` instead of the one captured on creation.
    #[cfg(not(target_arch = "wasm32"))]
    pub fn with_runtime(mut self, runtime: tokio::runtime::Handle) -> Self {
        self.runtime = Some(runtime);
        self
    }

    /// Queues a future whose resulting mutation is applied at the start of the
    /// first frame after it resolves.
    pub fn defer(&mut self, pending: PendingMutation) {
        self.pending.push(pending);
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }

    pub fn mixer(&self) -> &AnimationMixer {
        &self.mixer
    }

    pub fn mixer_mut(&mut self) -> &mut AnimationMixer {
        &mut self.mixer
    }

    /// Renders one frame, advancing animations by the time since the last frame.
    pub fn frame<T: ImageTracker, R: FrameRenderer>(
        &mut self,
        session: &mut SessionContext<T>,
        renderer: &mut R,
    ) -> anyhow::Result<Vec<AnchorEvent>> {
        let dt = self.clock.delta();
        self.frame_with_delta(session, renderer, dt)
    }

    /// Like [`FrameLoop::frame`] with an explicit time step in seconds.
    pub fn frame_with_delta<T: ImageTracker, R: FrameRenderer>(
        &mut self,
        session: &mut SessionContext<T>,
        renderer: &mut R,
        dt: f32,
    ) -> anyhow::Result<Vec<AnchorEvent>> {
        self.apply_resolved(&mut session.scene);
        self.mixer.update(dt, &mut session.scene);
        let events = session.sync_anchors();
        renderer.render(&session.scene, &session.camera, &session.settings)?;
        self.frames += 1;
        Ok(events)
    }

    fn apply_resolved(&mut self, scene: &mut Scene) {
        if self.pending.is_empty() {
            return;
        }
        #[cfg(not(target_arch = "wasm32"))]
        let _runtime = self.runtime.as_ref().map(|handle| handle.enter());

        let mut still_pending = Vec::with_capacity(self.pending.len());
        for mut fut in self.pending.drain(..) {
            match fut.as_mut().now_or_never() {
                None => still_pending.push(fut),
                Some(None) => (),
                Some(Some(mutation)) => {
                    if let Err(e) = mutation(scene) {
                        log::error!("Deferred scene mutation failed: {:#}", e);
                    }
                }
            }
        }
        self.pending = still_pending;
    }
}

/// Installs the platform logger. Safe to call more than once.
pub fn init_logger() {
    #[cfg(not(target_arch = "wasm32"))]
    {
        if let Err(e) = env_logger::try_init() {
            log::debug!("logger already installed: {}", e);
        }
    }

    #[cfg(target_arch = "wasm32")]
    {
        if let Err(e) = console_log::init_with_level(log::Level::Info) {
            log::debug!("logger already installed: {}", e);
        }
    }
}
