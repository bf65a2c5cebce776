//! Deciding which channels to store, compress, or delete.
use glam::{Quat, Vec3};
use log::{debug, warn};

use crate::{
    BlendMode, Channel, CompressionConfig, Skeleton, Transform,
    clip::{Controller, Track},
    config::{BoneCompressionPolicy, DeleteMode},
    reduce::rotation_within,
};

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum CompressionOperation {
    /// Store every key without quantization.
    DoNotCompress,
    /// Remove keys within tolerance and quantize the values.
    Compress,
    /// Do not store the channel.
    Delete,
}

/// The operation for each channel of a controller.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct Operations {
    pub position: CompressionOperation,
    pub rotation: CompressionOperation,
}

impl Operations {
    pub const DELETE: Self = Self {
        position: CompressionOperation::Delete,
        rotation: CompressionOperation::Delete,
    };
}

/// The inputs for deciding the [Operations] of a single controller.
#[derive(Debug, Clone, Copy)]
pub struct DecisionContext<'a> {
    /// The index of the controller in the clip.
    pub controller_index: usize,
    pub blend_mode: BlendMode,
    pub policy: BoneCompressionPolicy,
    pub skeleton: &'a Skeleton,
    pub config: &'a CompressionConfig,
}

/// Decide the operation for each channel of `controller`.
///
/// This only inspects the keys and never modifies them.
pub fn decide_operations(controller: &Controller, context: &DecisionContext) -> Operations {
    let bone_index = context.skeleton.bone_index(&controller.bone_name);
    if bone_index.is_none() && !controller.dynamic {
        warn!(
            "Deleting controller for bone {:?} not found in the skeleton",
            controller.bone_name
        );
        return Operations::DELETE;
    }

    let rig = bone_index.and_then(|i| context.skeleton.rig_transform(i));

    let rotation = decide(
        controller,
        context,
        Channel::Rotation,
        controller.rotation.as_ref().map(Track::len).unwrap_or_default(),
        || match &controller.rotation {
            Some(track) => rotation_deletable(track, rig, context),
            None => true,
        },
    );
    let position = decide(
        controller,
        context,
        Channel::Position,
        controller.position.as_ref().map(Track::len).unwrap_or_default(),
        || match &controller.position {
            Some(track) => position_deletable(track, rig, context),
            None => true,
        },
    );

    Operations { position, rotation }
}

fn decide(
    controller: &Controller,
    context: &DecisionContext,
    channel: Channel,
    key_count: usize,
    deletable: impl FnOnce() -> bool,
) -> CompressionOperation {
    if key_count == 0 {
        return CompressionOperation::Delete;
    }

    if context.blend_mode == BlendMode::Additive && key_count <= 1 {
        warn!(
            "Deleting additive {channel} channel for bone {:?} with {key_count} key",
            controller.bone_name
        );
        return CompressionOperation::Delete;
    }

    let keep = match channel_tolerance(&context.policy, channel) {
        Some(_) => CompressionOperation::Compress,
        None => CompressionOperation::DoNotCompress,
    };

    match context.policy.delete_mode {
        DeleteMode::Always => CompressionOperation::Delete,
        DeleteMode::Never => keep,
        DeleteMode::Auto => {
            if controller.dynamic
                || (context.config.protect_first_controller && context.controller_index == 0)
            {
                keep
            } else if deletable() {
                debug!(
                    "Deleting redundant {channel} channel for bone {:?}",
                    controller.bone_name
                );
                CompressionOperation::Delete
            } else {
                keep
            }
        }
    }
}

fn channel_tolerance(policy: &BoneCompressionPolicy, channel: Channel) -> Option<f32> {
    match channel {
        Channel::Rotation => policy.rotation_tolerance,
        Channel::Position => policy.position_tolerance,
    }
}

fn rotation_deletable(
    track: &Track<Quat>,
    rig: Option<Transform>,
    context: &DecisionContext,
) -> bool {
    let degrees = context.policy.rotation_tolerance.unwrap_or_default();
    let min_dot = (degrees.to_radians() * 0.5).cos();
    let all_within = |target: Quat| {
        track
            .keys
            .iter()
            .all(|k| rotation_within(k.value, target, min_dot))
    };

    let Some(first) = track.keys.first().map(|k| k.value) else {
        return true;
    };
    match context.blend_mode {
        // The deltas from the first key are all identity.
        BlendMode::Additive => all_within(first),
        BlendMode::Override => all_within(first) || rig.is_some_and(|r| all_within(r.rotation)),
    }
}

fn position_deletable(
    track: &Track<Vec3>,
    rig: Option<Transform>,
    context: &DecisionContext,
) -> bool {
    let tolerance = context
        .policy
        .position_tolerance
        .unwrap_or_default()
        .max(context.config.thresholds.delete_position_floor);
    let all_within = |target: Vec3| {
        track
            .keys
            .iter()
            .all(|k| k.value.distance(target) <= tolerance)
    };

    let Some(first) = track.keys.first().map(|k| k.value) else {
        return true;
    };
    match context.blend_mode {
        BlendMode::Additive => all_within(first),
        BlendMode::Override => {
            all_within(first) || rig.is_some_and(|r| all_within(r.translation))
        }
    }
}
