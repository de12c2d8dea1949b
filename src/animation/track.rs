use anyhow::ensure;
use cgmath::{InnerSpace, Quaternion, Vector3};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterpolationMode {
    Linear,
    Step,
    /// Values are stored as `(in-tangent, value, out-tangent)` triplets.
    CubicSpline,
}

/// Values that can be blended between two keyframes.
pub trait Interpolate: Clone {
    fn lerp(a: &Self, b: &Self, t: f32) -> Self;

    /// Cubic Hermite spline between `v0` and `v1` with tangents scaled by `dt`.
    fn hermite(v0: &Self, out0: &Self, in1: &Self, v1: &Self, t: f32, dt: f32) -> Self;
}

fn hermite_basis(t: f32) -> (f32, f32, f32, f32) {
    let t2 = t * t;
    let t3 = t2 * t;
    (
        2.0 * t3 - 3.0 * t2 + 1.0,
        t3 - 2.0 * t2 + t,
        -2.0 * t3 + 3.0 * t2,
        t3 - t2,
    )
}

impl Interpolate for Vector3<f32> {
    fn lerp(a: &Self, b: &Self, t: f32) -> Self {
        a + (b - a) * t
    }

    fn hermite(v0: &Self, out0: &Self, in1: &Self, v1: &Self, t: f32, dt: f32) -> Self {
        let (h00, h10, h01, h11) = hermite_basis(t);
        v0 * h00 + out0 * (h10 * dt) + v1 * h01 + in1 * (h11 * dt)
    }
}

impl Interpolate for Quaternion<f32> {
    fn lerp(a: &Self, b: &Self, t: f32) -> Self {
        // take the short way round
        let b = if a.dot(*b) < 0.0 { -*b } else { *b };
        a.slerp(b, t)
    }

    fn hermite(v0: &Self, out0: &Self, in1: &Self, v1: &Self, t: f32, dt: f32) -> Self {
        let (h00, h10, h01, h11) = hermite_basis(t);
        (v0 * h00 + out0 * (h10 * dt) + v1 * h01 + in1 * (h11 * dt)).normalize()
    }
}

#[derive(Debug, Clone)]
pub struct KeyframeTrack<T: Interpolate> {
    times: Vec<f32>,
    values: Vec<T>,
    interpolation: InterpolationMode,
}

impl<T: Interpolate> KeyframeTrack<T> {
    pub fn new(
        times: Vec<f32>,
        values: Vec<T>,
        interpolation: InterpolationMode,
    ) -> anyhow::Result<Self> {
        ensure!(!times.is_empty(), "keyframe track without keyframes");
        let expected = match interpolation {
            InterpolationMode::CubicSpline => times.len() * 3,
            _ => times.len(),
        };
        ensure!(
            values.len() == expected,
            "keyframe track has {} values for {} keyframes ({:?})",
            values.len(),
            times.len(),
            interpolation
        );
        ensure!(
            times.windows(2).all(|w| w[0] <= w[1]),
            "keyframe times must not decrease"
        );
        Ok(Self {
            times,
            values,
            interpolation,
        })
    }

    pub fn times(&self) -> &[f32] {
        &self.times
    }

    pub fn interpolation(&self) -> InterpolationMode {
        self.interpolation
    }

    /// Time of the last keyframe.
    pub fn end_time(&self) -> f32 {
        self.times.last().copied().unwrap_or(0.0)
    }

    fn value_at(&self, index: usize) -> &T {
        match self.interpolation {
            InterpolationMode::CubicSpline => &self.values[index * 3 + 1],
            _ => &self.values[index],
        }
    }

    /// Value at `time`, clamped to the first/last keyframe outside the track.
    pub fn sample(&self, time: f32) -> T {
        let len = self.times.len();
        // first keyframe strictly after `time`
        let next = self.times.partition_point(|&t| t <= time);
        if next == 0 {
            return self.value_at(0).clone();
        }
        if next >= len {
            return self.value_at(len - 1).clone();
        }
        let index = next - 1;
        let t0 = self.times[index];
        let t1 = self.times[next];
        let dt = t1 - t0;
        let t = if dt > 1e-6 { ((time - t0) / dt).clamp(0.0, 1.0) } else { 0.0 };

        match self.interpolation {
            InterpolationMode::Step => self.value_at(index).clone(),
            InterpolationMode::Linear => T::lerp(self.value_at(index), self.value_at(next), t),
            InterpolationMode::CubicSpline => T::hermite(
                &self.values[index * 3 + 1],
                &self.values[index * 3 + 2],
                &self.values[next * 3],
                &self.values[next * 3 + 1],
                t,
                dt,
            ),
        }
    }
}
