//! The full compression pipeline for clips.
use std::sync::{Mutex, PoisonError};

use dba_lib::dba::MotionParams;
use log::{debug, error};
use rayon::prelude::*;

use crate::{
    BlendMode, Clip, CompressionConfig, Database, Skeleton,
    database::CompressedClip,
    encode::encode_controller,
    foot_plant::detect_foot_plants,
    policy::{DecisionContext, decide_operations},
    root_motion::extract_root_motion,
};

/// Compress a single clip.
///
/// Controllers that fail to encode are logged and skipped.
#[tracing::instrument(skip_all)]
pub fn compress_clip(clip: &Clip, skeleton: &Skeleton, config: &CompressionConfig) -> CompressedClip {
    let root_motion = extract_root_motion(clip, config);
    let foot_plants = detect_foot_plants(clip, skeleton, config);

    let controllers = clip
        .controllers
        .iter()
        .enumerate()
        .filter_map(|(i, controller)| {
            let context = DecisionContext {
                controller_index: i,
                blend_mode: clip.blend_mode,
                policy: config.policy(&controller.bone_name),
                skeleton,
                config,
            };
            let operations = decide_operations(controller, &context);
            debug!("{:?}: {operations:?}", controller.bone_name);

            encode_controller(controller, operations, &context.policy, clip.blend_mode)
                .inspect_err(|e| {
                    error!(
                        "Skipping controller {i} in clip {:?}: {e}",
                        clip.name
                    )
                })
                .ok()
        })
        .collect();

    let mut flags = 0;
    if root_motion.is_loop {
        flags |= MotionParams::LOOP;
    }
    if clip.blend_mode == BlendMode::Additive {
        flags |= MotionParams::ADDITIVE;
    }

    CompressedClip {
        name: clip.name.clone(),
        motion: MotionParams {
            ticks_per_frame: clip.ticks_per_frame,
            seconds_per_tick: clip.seconds_per_tick,
            start_tick: clip.start_tick,
            end_tick: clip.end_tick,
            flags,
            start_location: root_motion.start_location.into(),
            end_location: root_motion.end_location.into(),
            slope: root_motion.slope,
            turn_angle: root_motion.turn_angle,
            turn_speed: root_motion.turn_speed,
            distance: root_motion.distance,
            speed: root_motion.speed,
            foot_count: foot_plants.foot_count,
            foot_plant_frames: foot_plants.frame_count,
        },
        foot_plant_bits: foot_plants.bits,
        controllers,
    }
}

/// Compress all `clips` in parallel and add them to a new [Database].
///
/// Clips are added as soon as they finish compressing.
/// The order of clips and stored tracks may differ between runs,
/// but the stored track content is always the same.
#[tracing::instrument(skip_all)]
pub fn build_database(clips: &[Clip], skeleton: &Skeleton, config: &CompressionConfig) -> Database {
    let database = Mutex::new(Database::new());
    clips.par_iter().for_each(|clip| {
        let compressed = compress_clip(clip, skeleton, config);
        database
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .add_clip(compressed);
    });
    database.into_inner().unwrap_or_else(PoisonError::into_inner)
}
