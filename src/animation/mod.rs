//! Keyframe animation.
//!
//! - `track` samples keyframes with linear, step or cubic-spline interpolation
//! - `clip` groups node tracks under a name and a duration
//! - `action` is the playback state of one clip (time, loop mode, clamping)
//! - `mixer` binds clips to an attached model and writes poses into the scene

pub mod action;
pub mod clip;
pub mod mixer;
pub mod track;

pub use action::{AnimationAction, LoopMode};
pub use clip::{AnimationClip, Track, TrackData};
pub use mixer::{ActionId, AnimationMixer};
pub use track::{InterpolationMode, KeyframeTrack};
