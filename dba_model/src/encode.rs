//! Converting reduced keys into packed tracks.
use dba_lib::{
    format::{KeyTimeTrack, PositionTrack, RotationFormat, RotationTrack, bitset_word_count},
    hash::bone_id,
};
use glam::{Quat, Vec3};
use strum::IntoEnumIterator;

use crate::{
    BlendMode, Channel,
    clip::{Controller, Key, Track},
    config::BoneCompressionPolicy,
    error::EncodeError,
    policy::{CompressionOperation, Operations},
    quantize::{encode_rotations, quantize_rotation},
    reduce::{ReduceMode, reduce_positions, reduce_rotations},
};

/// The largest integer that [f32] represents exactly.
const MAX_F32_TIME: u32 = 1 << 24;

/// The packed channels for a single bone.
#[derive(Debug, PartialEq, Clone)]
pub struct EncodedController {
    pub bone_name: String,
    pub bone_id: u32,
    pub rotation: Option<EncodedChannel<RotationTrack>>,
    pub position: Option<EncodedChannel<PositionTrack>>,
}

#[derive(Debug, PartialEq, Clone)]
pub struct EncodedChannel<T> {
    pub values: T,
    pub key_times: KeyTimeTrack,
}

impl EncodedChannel<RotationTrack> {
    /// The packed size of the values and key times without padding.
    pub fn byte_size(&self) -> usize {
        self.values.byte_size() + self.key_times.byte_size()
    }
}

impl EncodedChannel<PositionTrack> {
    pub fn byte_size(&self) -> usize {
        self.values.byte_size() + self.key_times.byte_size()
    }
}

impl EncodedController {
    /// Controllers without any channels are not stored.
    pub fn is_empty(&self) -> bool {
        self.rotation.is_none() && self.position.is_none()
    }
}

/// Reduce and pack the channels of `controller` based on `operations`.
///
/// Additive channels store the difference from the first key, and the first key is removed.
pub fn encode_controller(
    controller: &Controller,
    operations: Operations,
    policy: &BoneCompressionPolicy,
    blend_mode: BlendMode,
) -> Result<EncodedController, EncodeError> {
    let rotation = match (&controller.rotation, operations.rotation) {
        (_, CompressionOperation::Delete) | (None, _) => None,
        (Some(track), operation) => {
            check_key_times(track, &controller.bone_name, Channel::Rotation)?;
            let keys = match blend_mode {
                BlendMode::Override => track.keys.clone(),
                BlendMode::Additive => additive_rotations(&track.keys),
            };
            encode_rotation_channel(&keys, operation, policy, &controller.bone_name)?
        }
    };

    let position = match (&controller.position, operations.position) {
        (_, CompressionOperation::Delete) | (None, _) => None,
        (Some(track), operation) => {
            check_key_times(track, &controller.bone_name, Channel::Position)?;
            let keys = match blend_mode {
                BlendMode::Override => track.keys.clone(),
                BlendMode::Additive => additive_positions(&track.keys),
            };
            encode_position_channel(&keys, operation, policy, &controller.bone_name)?
        }
    };

    Ok(EncodedController {
        bone_name: controller.bone_name.clone(),
        bone_id: bone_id(&controller.bone_name),
        rotation,
        position,
    })
}

fn check_key_times<T>(track: &Track<T>, bone_name: &str, channel: Channel) -> Result<(), EncodeError> {
    match track.first_non_increasing() {
        Some(index) => Err(EncodeError::NonMonotonicKeyTimes {
            bone_name: bone_name.to_string(),
            channel,
            index,
        }),
        None => Ok(()),
    }
}

/// The rotation relative to the first key for each remaining key.
pub fn additive_rotations(keys: &[Key<Quat>]) -> Vec<Key<Quat>> {
    match keys.split_first() {
        Some((first, rest)) => {
            let inverse = first.value.inverse();
            rest.iter()
                .map(|k| Key {
                    time: k.time,
                    value: (inverse * k.value).normalize(),
                })
                .collect()
        }
        None => Vec::new(),
    }
}

/// The offset from the first key for each remaining key.
pub fn additive_positions(keys: &[Key<Vec3>]) -> Vec<Key<Vec3>> {
    match keys.split_first() {
        Some((first, rest)) => rest
            .iter()
            .map(|k| Key {
                time: k.time,
                value: k.value - first.value,
            })
            .collect(),
        None => Vec::new(),
    }
}

fn encode_rotation_channel(
    keys: &[Key<Quat>],
    operation: CompressionOperation,
    policy: &BoneCompressionPolicy,
    bone_name: &str,
) -> Result<Option<EncodedChannel<RotationTrack>>, EncodeError> {
    if keys.is_empty() {
        return Ok(None);
    }

    let (formats, mode) = match operation {
        CompressionOperation::Compress => (
            RotationFormat::iter().collect(),
            ReduceMode::from(policy.rotation_tolerance),
        ),
        _ => (vec![RotationFormat::NoCompress], ReduceMode::KeepAll),
    };

    // Reduce separately for each format to account for its precision.
    let mut best: Option<EncodedChannel<RotationTrack>> = None;
    for format in formats {
        let reduced = reduce_rotations(keys, mode, |q| quantize_rotation(q, format));
        let values: Vec<_> = reduced.iter().map(|k| k.value).collect();
        let times: Vec<_> = reduced.iter().map(|k| k.time).collect();

        let channel = EncodedChannel {
            values: encode_rotations(&values, format),
            key_times: encode_key_times(&times, bone_name, Channel::Rotation)?,
        };
        if best
            .as_ref()
            .is_none_or(|b| channel.byte_size() < b.byte_size())
        {
            best = Some(channel);
        }
    }

    Ok(best)
}

fn encode_position_channel(
    keys: &[Key<Vec3>],
    operation: CompressionOperation,
    policy: &BoneCompressionPolicy,
    bone_name: &str,
) -> Result<Option<EncodedChannel<PositionTrack>>, EncodeError> {
    if keys.is_empty() {
        return Ok(None);
    }

    let mode = match operation {
        CompressionOperation::Compress => ReduceMode::from(policy.position_tolerance),
        _ => ReduceMode::KeepAll,
    };

    let reduced = reduce_positions(keys, mode);
    let times: Vec<_> = reduced.iter().map(|k| k.time).collect();
    Ok(Some(EncodedChannel {
        values: PositionTrack::NoCompress(reduced.iter().map(|k| k.value.to_array()).collect()),
        key_times: encode_key_times(&times, bone_name, Channel::Position)?,
    }))
}

/// Pack strictly increasing `times` using the smallest lossless encoding.
pub fn encode_key_times(
    times: &[u32],
    bone_name: &str,
    channel: Channel,
) -> Result<KeyTimeTrack, EncodeError> {
    let (Some(first), Some(last)) = (times.first().copied(), times.last().copied()) else {
        return Ok(KeyTimeTrack::U8(Vec::new()));
    };

    let mut candidates = Vec::new();
    if let Ok(times) = times.iter().map(|t| u8::try_from(*t)).collect::<Result<Vec<_>, _>>() {
        candidates.push(KeyTimeTrack::U8(times));
    }
    if let Ok(times) = times.iter().map(|t| u16::try_from(*t)).collect::<Result<Vec<_>, _>>() {
        candidates.push(KeyTimeTrack::U16(times));
    }
    if last <= MAX_F32_TIME {
        candidates.push(KeyTimeTrack::F32(times.iter().map(|t| *t as f32).collect()));
    }
    if let (Ok(start), Ok(end)) = (u16::try_from(first), u16::try_from(last)) {
        let mut bits = vec![0u16; bitset_word_count(start, end)];
        for time in times {
            let i = (time - first) as usize;
            bits[i / 16] |= 1 << (i % 16);
        }
        candidates.push(KeyTimeTrack::Bitset { start, end, bits });
    }

    // Use the first encoding in case of ties.
    candidates
        .into_iter()
        .reduce(|a, b| if b.byte_size() < a.byte_size() { b } else { a })
        .ok_or_else(|| EncodeError::KeyTimeOutOfRange {
            bone_name: bone_name.to_string(),
            channel,
            time: last,
        })
}
