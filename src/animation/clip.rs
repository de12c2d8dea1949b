use cgmath::{Quaternion, Vector3};

use crate::{
    animation::track::KeyframeTrack,
    data_structures::{instance::Instance, scene_graph::NodeId},
};

#[derive(Debug, Clone)]
pub enum TrackData {
    Translation(KeyframeTrack<Vector3<f32>>),
    Rotation(KeyframeTrack<Quaternion<f32>>),
    Scale(KeyframeTrack<Vector3<f32>>),
}

/// Keyframes for one transform component of one node.
#[derive(Debug, Clone)]
pub struct Track {
    /// Node id inside the tree the clip was loaded with.
    pub target: NodeId,
    pub data: TrackData,
}

impl Track {
    pub fn end_time(&self) -> f32 {
        match &self.data {
            TrackData::Translation(t) | TrackData::Scale(t) => t.end_time(),
            TrackData::Rotation(t) => t.end_time(),
        }
    }

    /// Overwrites the animated component of `local` with its value at `time`.
    pub fn apply(&self, time: f32, local: &mut Instance) {
        match &self.data {
            TrackData::Translation(t) => local.position = t.sample(time),
            TrackData::Rotation(t) => local.rotation = t.sample(time),
            TrackData::Scale(t) => local.scale = t.sample(time),
        }
    }
}

/// A named animation: tracks that play together over `duration` seconds.
#[derive(Debug, Clone)]
pub struct AnimationClip {
    pub name: String,
    pub tracks: Vec<Track>,
    pub duration: f32,
}

impl AnimationClip {
    /// The duration is the end time of the longest track.
    pub fn new(name: &str, tracks: Vec<Track>) -> Self {
        let duration = tracks.iter().map(Track::end_time).fold(0.0, f32::max);
        Self {
            name: name.to_string(),
            tracks,
            duration,
        }
    }
}
