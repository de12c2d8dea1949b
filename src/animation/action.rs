use std::sync::Arc;

use crate::animation::clip::AnimationClip;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopMode {
    Once,
    Repeat,
    PingPong,
}

/// Playback state of a single clip.
#[derive(Debug, Clone)]
pub struct AnimationAction {
    clip: Arc<AnimationClip>,

    pub time: f32,
    pub time_scale: f32,
    pub loop_mode: LoopMode,
    /// With [`LoopMode::Once`]: keep the last pose after the end instead of
    /// disabling the action.
    pub clamp_when_finished: bool,
    pub paused: bool,
    pub enabled: bool,

    running: bool,
    finished: bool,
}

impl AnimationAction {
    pub fn new(clip: Arc<AnimationClip>) -> Self {
        Self {
            clip,
            time: 0.0,
            time_scale: 1.0,
            loop_mode: LoopMode::Repeat,
            clamp_when_finished: false,
            paused: false,
            enabled: true,
            running: false,
            finished: false,
        }
    }

    pub fn clip(&self) -> &Arc<AnimationClip> {
        &self.clip
    }

    pub fn play(&mut self) -> &mut Self {
        self.running = true;
        self.enabled = true;
        self
    }

    pub fn stop(&mut self) -> &mut Self {
        self.running = false;
        self.reset()
    }

    pub fn reset(&mut self) -> &mut Self {
        self.time = 0.0;
        self.finished = false;
        self.enabled = true;
        self
    }

    /// Whether the action contributes a pose.
    pub fn is_running(&self) -> bool {
        self.running && self.enabled
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Advances time by `dt` seconds and applies the loop mode.
    pub fn update(&mut self, dt: f32) {
        if !self.is_running() || self.paused || self.finished {
            return;
        }

        let duration = self.clip.duration;
        if duration <= 0.0 {
            return;
        }

        self.time += dt * self.time_scale;

        match self.loop_mode {
            LoopMode::Once => {
                if self.time >= duration || self.time < 0.0 {
                    self.time = self.time.clamp(0.0, duration);
                    self.finished = true;
                    if !self.clamp_when_finished {
                        self.enabled = false;
                    }
                }
            }
            LoopMode::Repeat => {
                self.time = self.time.rem_euclid(duration);
            }
            LoopMode::PingPong => {
                let t = self.time.rem_euclid(duration * 2.0);
                self.time = if t > duration { duration * 2.0 - t } else { t };
            }
        }
    }
}
