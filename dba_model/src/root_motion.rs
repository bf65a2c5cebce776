//! Locomotion metadata derived from the root motion bone.
//!
//! Positions use Z up with Y as the forward direction.
use glam::{Quat, Vec3, Vec3Swizzles};
use log::warn;

use crate::{Clip, CompressionConfig, Transform, config::Thresholds};

/// Locomotion and loop information for a clip.
#[derive(Debug, PartialEq, Clone, Copy)]
pub struct RootMotion {
    /// The locomotion transform at the start of the clip.
    pub start_location: Transform,
    /// The locomotion transform at the end of the clip.
    pub end_location: Transform,
    /// The incline of the net displacement in radians.
    pub slope: f32,
    /// The change in heading in radians with positive values turning left.
    pub turn_angle: f32,
    /// The change in heading in radians per second.
    pub turn_speed: f32,
    /// The length of the path traveled by the locomotion bone.
    pub distance: f32,
    /// The average speed in world units per second.
    pub speed: f32,
    /// The first and last pose of every bone match.
    pub is_loop: bool,
}

impl Default for RootMotion {
    fn default() -> Self {
        Self {
            start_location: Transform::IDENTITY,
            end_location: Transform::IDENTITY,
            slope: 0.0,
            turn_angle: 0.0,
            turn_speed: 0.0,
            distance: 0.0,
            speed: 0.0,
            is_loop: false,
        }
    }
}

/// Calculate the root motion for `clip` using the
/// [locomotion_bone](crate::CompressionConfig#structfield.locomotion_bone).
///
/// Clips without the locomotion bone use zeroed values.
/// The loop flag is calculated for all clips.
#[tracing::instrument(skip_all)]
pub fn extract_root_motion(clip: &Clip, config: &CompressionConfig) -> RootMotion {
    let thresholds = &config.thresholds;
    let is_loop = is_looping(clip, thresholds.loop_component_tolerance);

    let Some(controller) = clip.controller(&config.locomotion_bone) else {
        warn!(
            "Locomotion bone {:?} not found for clip {:?}. Skipping root motion.",
            config.locomotion_bone, clip.name
        );
        return RootMotion {
            is_loop,
            ..Default::default()
        };
    };

    let sample =
        |t: f32| controller.sample_transform(clip.normalized_tick(t), Transform::IDENTITY);

    let start = sample(0.0);
    let middle = sample(0.5);
    let end = sample(1.0);

    let turn_angle = heading_change(start.rotation, middle.rotation)
        + heading_change(middle.rotation, end.rotation);

    let distance = path_length(thresholds, |t| sample(t).translation);

    let duration = clip.duration();
    let per_second = |value: f32| {
        if duration > 0.0 {
            value / duration
        } else {
            0.0
        }
    };

    RootMotion {
        start_location: snap_identity(start, thresholds.identity_snap_epsilon),
        end_location: snap_identity(end, thresholds.identity_snap_epsilon),
        slope: slope(start, end, thresholds.min_slope_displacement),
        turn_angle,
        turn_speed: per_second(turn_angle),
        distance,
        speed: per_second(distance),
        is_loop,
    }
}

fn snap_identity(transform: Transform, epsilon: f32) -> Transform {
    let rotation = transform.rotation;
    let near_identity = |q: Quat| q.abs_diff_eq(Quat::IDENTITY, epsilon);
    if near_identity(rotation) || near_identity(-rotation) {
        Transform {
            rotation: Quat::IDENTITY,
            ..transform
        }
    } else {
        transform
    }
}

/// The angle of the displacement from `start` to `end` relative to the horizontal plane of `start`.
fn slope(start: Transform, end: Transform, min_displacement: f32) -> f32 {
    let displacement = end.translation - start.translation;
    if displacement.length() < min_displacement {
        return 0.0;
    }

    let local = (start.rotation.inverse() * displacement).normalize();
    let horizontal = local.xy().length();
    local.z.atan2(horizontal)
}

/// The signed yaw angle between the forward directions of `a` and `b`.
fn heading_change(a: Quat, b: Quat) -> f32 {
    let a = (a * Vec3::Y).xy();
    let b = (b * Vec3::Y).xy();
    a.perp_dot(b).atan2(a.dot(b))
}

/// Integrate the distance traveled by sampling `position` over normalized time.
fn path_length(thresholds: &Thresholds, position: impl Fn(f32) -> Vec3) -> f32 {
    let mut step = thresholds.root_motion_step;
    if !(1e-4..=1.0).contains(&step) {
        let default = Thresholds::default().root_motion_step;
        warn!("Root motion step {step} is not in 0.0001 to 1.0. Using {default} instead.");
        step = default;
    }
    let steps = (1.0 / step).round().max(1.0) as usize;

    let mut distance = 0.0;
    let mut previous = position(0.0);
    for i in 1..=steps {
        let current = position(i as f32 / steps as f32);
        distance += current.distance(previous);
        previous = current;
    }
    distance
}

/// Check if every animated bone starts and ends with the same rotation.
///
/// Each quaternion component must be within `tolerance` for either sign of the end rotation.
pub fn is_looping(clip: &Clip, tolerance: f32) -> bool {
    clip.controllers.iter().all(|controller| {
        let Some(track) = &controller.rotation else {
            return true;
        };
        match (
            track.sample(clip.start_tick as f32),
            track.sample(clip.end_tick as f32),
        ) {
            (Some(start), Some(end)) => {
                start.abs_diff_eq(end, tolerance) || start.abs_diff_eq(-end, tolerance)
            }
            _ => true,
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::{
        BlendMode,
        clip::{Controller, Track},
    };
    use approx::assert_relative_eq;
    use glam::vec3;
    use std::f32::consts::{FRAC_PI_2, FRAC_PI_4};

    fn clip(controllers: Vec<Controller>) -> Clip {
        Clip {
            name: "test".to_string(),
            ticks_per_frame: 1,
            seconds_per_tick: 1.0 / 30.0,
            start_tick: 0,
            end_tick: 30,
            blend_mode: BlendMode::Override,
            controllers,
        }
    }

    fn locomotion(rotations: Vec<Quat>, positions: Vec<Vec3>) -> Controller {
        Controller {
            bone_name: "Locator_Locomotion".to_string(),
            dynamic: false,
            rotation: Some(Track::from_samples(rotations, 0, 30 / 2)),
            position: Some(Track::from_samples(positions, 0, 30 / 2)),
        }
    }

    #[test]
    fn missing_locomotion_bone() {
        let clip = clip(vec![Controller {
            bone_name: "Bip01".to_string(),
            dynamic: false,
            rotation: Some(Track::from_samples(vec![Quat::IDENTITY; 2], 0, 30)),
            position: None,
        }]);
        assert_eq!(
            RootMotion {
                is_loop: true,
                ..Default::default()
            },
            extract_root_motion(&clip, &CompressionConfig::default())
        );
    }

    #[test]
    fn walk_forward() {
        let clip = clip(vec![locomotion(
            vec![Quat::IDENTITY; 3],
            vec![Vec3::ZERO, vec3(0.0, 1.0, 0.0), vec3(0.0, 2.0, 0.0)],
        )]);
        let motion = extract_root_motion(&clip, &CompressionConfig::default());
        assert_eq!(Transform::IDENTITY, motion.start_location);
        assert_eq!(vec3(0.0, 2.0, 0.0), motion.end_location.translation);
        assert_eq!(0.0, motion.slope);
        assert_eq!(0.0, motion.turn_angle);
        assert_relative_eq!(2.0, motion.distance, epsilon = 1e-4);
        assert_relative_eq!(2.0, motion.speed, epsilon = 1e-4);
        assert!(motion.is_loop);
    }

    #[test]
    fn walk_forward_invalid_step() {
        let clip = clip(vec![locomotion(
            vec![Quat::IDENTITY; 3],
            vec![Vec3::ZERO, vec3(0.0, 1.0, 0.0), vec3(0.0, 2.0, 0.0)],
        )]);
        for step in [0.0, -0.5, 1e-9, 2.0, f32::NAN, f32::INFINITY] {
            let mut config = CompressionConfig::default();
            config.thresholds.root_motion_step = step;
            let motion = extract_root_motion(&clip, &config);
            assert_relative_eq!(2.0, motion.distance, epsilon = 1e-4);
        }
    }

    #[test]
    fn turn_left() {
        let clip = clip(vec![locomotion(
            vec![
                Quat::IDENTITY,
                Quat::from_rotation_z(FRAC_PI_4),
                Quat::from_rotation_z(FRAC_PI_2),
            ],
            vec![Vec3::ZERO; 3],
        )]);
        let motion = extract_root_motion(&clip, &CompressionConfig::default());
        assert_relative_eq!(FRAC_PI_2, motion.turn_angle, epsilon = 1e-5);
        assert_relative_eq!(FRAC_PI_2, motion.turn_speed, epsilon = 1e-4);
        assert_eq!(0.0, motion.distance);
        assert!(!motion.is_loop);
    }

    #[test]
    fn walk_uphill() {
        let clip = clip(vec![locomotion(
            vec![Quat::IDENTITY; 3],
            vec![Vec3::ZERO, vec3(0.0, 0.5, 0.5), vec3(0.0, 1.0, 1.0)],
        )]);
        let motion = extract_root_motion(&clip, &CompressionConfig::default());
        assert_relative_eq!(FRAC_PI_4, motion.slope, epsilon = 1e-5);
    }

    #[test]
    fn slope_small_displacement() {
        let clip = clip(vec![locomotion(
            vec![Quat::IDENTITY; 3],
            vec![Vec3::ZERO, vec3(0.0, 0.0, 0.002), vec3(0.0, 0.0, 0.005)],
        )]);
        let motion = extract_root_motion(&clip, &CompressionConfig::default());
        assert_eq!(0.0, motion.slope);
    }

    #[test]
    fn snap_rotation_noise() {
        let noisy = Quat::from_xyzw(1e-6, -2e-6, 0.0, 1.0);
        let clip = clip(vec![locomotion(vec![noisy; 3], vec![Vec3::ZERO; 3])]);
        let motion = extract_root_motion(&clip, &CompressionConfig::default());
        assert_eq!(Quat::IDENTITY, motion.start_location.rotation);
        assert_eq!(Quat::IDENTITY, motion.end_location.rotation);
    }

    #[test]
    fn loop_within_tolerance() {
        let start = Quat::from_rotation_x(0.5);
        let end = Quat::from_xyzw(start.x + 0.05, start.y, start.z - 0.05, start.w);
        let clip = clip(vec![locomotion(vec![start, start, end], vec![Vec3::ZERO; 3])]);
        assert!(is_looping(&clip, 0.1));
    }

    #[test]
    fn loop_opposite_sign() {
        let start = Quat::from_rotation_x(0.5);
        let clip = clip(vec![locomotion(vec![start, start, -start], vec![Vec3::ZERO; 3])]);
        assert!(is_looping(&clip, 0.1));
    }

    #[test]
    fn loop_any_bone_outside_tolerance() {
        let start = Quat::from_rotation_x(0.5);
        let end = Quat::from_xyzw(start.x + 0.15, start.y, start.z, start.w);
        let clip = clip(vec![
            locomotion(vec![Quat::IDENTITY; 3], vec![Vec3::ZERO; 3]),
            Controller {
                bone_name: "Bip01 Head".to_string(),
                dynamic: false,
                rotation: Some(Track::from_samples(vec![start, end], 0, 30)),
                position: None,
            },
        ]);
        assert!(!is_looping(&clip, 0.1));
    }
}
