//! Dense per frame samples for a single animation.
use glam::{Quat, Vec3};

use crate::Transform;

/// A single animation with one [Controller] for each animated bone.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, PartialEq, Clone)]
pub struct Clip {
    /// The file path or name that identifies the clip.
    pub name: String,
    pub ticks_per_frame: u32,
    pub seconds_per_tick: f32,
    pub start_tick: u32,
    pub end_tick: u32,
    #[cfg_attr(feature = "serde", serde(default))]
    pub blend_mode: BlendMode,
    pub controllers: Vec<Controller>,
}

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, PartialEq, Eq, Clone, Copy, Default)]
pub enum BlendMode {
    /// Replace the current pose.
    #[default]
    Override,
    /// Apply the difference from the first frame on top of another animation.
    Additive,
}

/// The animated channels for a single bone.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, PartialEq, Clone)]
pub struct Controller {
    pub bone_name: String,
    /// Procedurally driven bones are kept even if they look redundant.
    #[cfg_attr(feature = "serde", serde(default))]
    pub dynamic: bool,
    pub rotation: Option<Track<Quat>>,
    pub position: Option<Track<Vec3>>,
}

/// Keyframes ordered by time.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, PartialEq, Clone)]
pub struct Track<T> {
    pub keys: Vec<Key<T>>,
}

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, PartialEq, Clone, Copy)]
pub struct Key<T> {
    /// The time in ticks.
    pub time: u32,
    pub value: T,
}

/// Interpolation between keyframe values.
pub trait Interpolate: Copy {
    fn interpolate(self, other: Self, factor: f32) -> Self;
}

impl Interpolate for Quat {
    fn interpolate(self, other: Self, factor: f32) -> Self {
        self.slerp(other, factor)
    }
}

impl Interpolate for Vec3 {
    fn interpolate(self, other: Self, factor: f32) -> Self {
        self.lerp(other, factor)
    }
}

/// The interpolation factor of `time` between `start` and `end`.
pub fn interpolation_factor(start: u32, end: u32, time: f32) -> f32 {
    if end > start {
        ((time - start as f32) / (end - start) as f32).clamp(0.0, 1.0)
    } else {
        0.0
    }
}

impl<T> Track<T> {
    pub fn new(keys: Vec<Key<T>>) -> Self {
        Self { keys }
    }

    /// Create a track with one key every `ticks_per_frame` ticks starting from `start_tick`.
    pub fn from_samples(values: Vec<T>, start_tick: u32, ticks_per_frame: u32) -> Self {
        Self {
            keys: values
                .into_iter()
                .enumerate()
                .map(|(i, value)| Key {
                    time: start_tick + i as u32 * ticks_per_frame,
                    value,
                })
                .collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// The index of the first key with a time not greater than the previous key.
    pub fn first_non_increasing(&self) -> Option<usize> {
        self.keys
            .windows(2)
            .position(|w| w[1].time <= w[0].time)
            .map(|i| i + 1)
    }

    pub fn times(&self) -> Vec<u32> {
        self.keys.iter().map(|k| k.time).collect()
    }
}

impl<T: Interpolate> Track<T> {
    /// Sample the track at `time` in ticks.
    /// Times outside the track use the first or last key.
    pub fn sample(&self, time: f32) -> Option<T> {
        let first = self.keys.first()?;
        let last = self.keys.last()?;
        if time <= first.time as f32 {
            return Some(first.value);
        }
        if time >= last.time as f32 {
            return Some(last.value);
        }

        // The key times are increasing, so the next key can be found with a binary search.
        let next = self.keys.partition_point(|k| k.time as f32 <= time);
        let start = &self.keys[next - 1];
        let end = &self.keys[next];
        let factor = interpolation_factor(start.time, end.time, time);
        Some(start.value.interpolate(end.value, factor))
    }
}

impl Clip {
    /// The length of the clip in seconds.
    pub fn duration(&self) -> f32 {
        self.end_tick.saturating_sub(self.start_tick) as f32 * self.seconds_per_tick
    }

    /// The number of sampled frames including the first and last frame.
    pub fn frame_count(&self) -> usize {
        let ticks_per_frame = self.ticks_per_frame.max(1);
        (self.end_tick.saturating_sub(self.start_tick) / ticks_per_frame) as usize + 1
    }

    /// The tick for a time in the range `0.0` to `1.0`.
    pub fn normalized_tick(&self, normalized_time: f32) -> f32 {
        self.start_tick as f32
            + self.end_tick.saturating_sub(self.start_tick) as f32 * normalized_time
    }

    /// Find a controller by bone name ignoring ASCII case.
    pub fn controller(&self, bone_name: &str) -> Option<&Controller> {
        self.controllers
            .iter()
            .find(|c| c.bone_name.eq_ignore_ascii_case(bone_name))
    }

    #[cfg(feature = "serde")]
    pub fn from_json<P: AsRef<std::path::Path>>(path: P) -> Result<Self, crate::error::LoadError> {
        let json = std::fs::read_to_string(path)?;
        serde_json::from_str(&json).map_err(Into::into)
    }
}

impl Controller {
    /// The local transform at `time` in ticks using `default` for missing channels.
    pub fn sample_transform(&self, time: f32, default: Transform) -> Transform {
        Transform {
            translation: self
                .position
                .as_ref()
                .and_then(|t| t.sample(time))
                .unwrap_or(default.translation),
            rotation: self
                .rotation
                .as_ref()
                .and_then(|t| t.sample(time))
                .unwrap_or(default.rotation),
        }
    }
}
