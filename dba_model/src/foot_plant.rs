use log::warn;

use crate::{BlendMode, Clip, CompressionConfig, Skeleton, clip::Controller};

/// Per frame flags for feet that are not moving in model space.
#[derive(Debug, PartialEq, Eq, Clone, Default)]
pub struct FootPlants {
    pub foot_count: u16,
    pub frame_count: u16,
    /// The flag for each foot and frame packed least significant bit first.
    /// The bit index is `foot * frame_count + frame`.
    pub bits: Vec<u8>,
}

impl FootPlants {
    pub fn is_planted(&self, foot: usize, frame: usize) -> bool {
        let index = foot * self.frame_count as usize + frame;
        self.bits
            .get(index / 8)
            .is_some_and(|b| b & (1 << (index % 8)) != 0)
    }
}

/// Detect planted frames for each of the
/// [foot_bones](crate::CompressionConfig#structfield.foot_bones) in the skeleton.
///
/// Bones without a controller use their rig pose. Additive clips have no foot plants.
#[tracing::instrument(skip_all)]
pub fn detect_foot_plants(clip: &Clip, skeleton: &Skeleton, config: &CompressionConfig) -> FootPlants {
    if clip.blend_mode == BlendMode::Additive {
        return FootPlants::default();
    }

    let feet: Vec<_> = config
        .foot_bones
        .iter()
        .filter_map(|name| {
            let index = skeleton.bone_index(name);
            if index.is_none() {
                warn!("Foot bone {name:?} not found in the skeleton");
            }
            index
        })
        .collect();
    if feet.is_empty() {
        return FootPlants::default();
    }

    let frame_count = clip.frame_count();
    let (Ok(foot_count), Ok(frame_count_u16)) =
        (u16::try_from(feet.len()), u16::try_from(frame_count))
    else {
        warn!(
            "Skipping foot plants for clip {:?} with {frame_count} frames",
            clip.name
        );
        return FootPlants::default();
    };

    // Only the controllers matching a bone affect the pose.
    let mut controllers: Vec<Option<&Controller>> = vec![None; skeleton.bones.len()];
    for controller in &clip.controllers {
        if let Some(index) = skeleton.bone_index(&controller.bone_name) {
            controllers[index] = Some(controller);
        }
    }
    let rig = skeleton.rig_transforms();

    let ticks_per_frame = clip.ticks_per_frame.max(1);
    let positions: Vec<Vec<_>> = (0..frame_count)
        .map(|frame| {
            let tick = (clip.start_tick + frame as u32 * ticks_per_frame) as f32;
            let local: Vec<_> = controllers
                .iter()
                .zip(&rig)
                .map(|(controller, rig)| match controller {
                    Some(c) => c.sample_transform(tick, *rig),
                    None => *rig,
                })
                .collect();
            let model = skeleton.model_space_transforms(&local);
            feet.iter().map(|foot| model[*foot].translation).collect()
        })
        .collect();

    let frame_seconds = ticks_per_frame as f32 * clip.seconds_per_tick;
    let mut bits = vec![0u8; (feet.len() * frame_count).div_ceil(8)];
    for foot in 0..feet.len() {
        for frame in 0..frame_count {
            let speed = if frame_count > 1 && frame_seconds > 0.0 {
                let neighbor = if frame + 1 < frame_count {
                    frame + 1
                } else {
                    frame - 1
                };
                positions[frame][foot].distance(positions[neighbor][foot]) / frame_seconds
            } else {
                0.0
            };

            if speed < config.thresholds.foot_plant_speed {
                let index = foot * frame_count + frame;
                bits[index / 8] |= 1 << (index % 8);
            }
        }
    }

    FootPlants {
        foot_count,
        frame_count: frame_count_u16,
        bits,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::{Bone, clip::Track};
    use glam::{Mat4, Quat, vec3};

    fn skeleton() -> Skeleton {
        Skeleton {
            bones: vec![
                Bone {
                    name: "Bip01 Pelvis".to_string(),
                    parent_index: None,
                    bind_to_world: Mat4::from_translation(vec3(0.0, 0.0, 1.0)),
                },
                Bone {
                    name: "Bip01 L Foot".to_string(),
                    parent_index: Some(0),
                    bind_to_world: Mat4::from_translation(vec3(0.2, 0.0, 0.1)),
                },
                Bone {
                    name: "Bip01 R Foot".to_string(),
                    parent_index: Some(0),
                    bind_to_world: Mat4::from_translation(vec3(-0.2, 0.0, 0.1)),
                },
            ],
        }
    }

    fn config() -> CompressionConfig {
        CompressionConfig {
            foot_bones: vec!["Bip01 L Foot".to_string(), "Bip01 R Foot".to_string()],
            ..Default::default()
        }
    }

    fn clip(blend_mode: BlendMode) -> Clip {
        // The left foot moves for the first 5 frames and stays planted after.
        let positions = (0..10u32)
            .map(|i| vec3(0.2, (i.min(5) as f32) * 0.1, -0.9))
            .collect();
        Clip {
            name: "walk".to_string(),
            ticks_per_frame: 1,
            seconds_per_tick: 1.0 / 30.0,
            start_tick: 0,
            end_tick: 9,
            blend_mode,
            controllers: vec![Controller {
                bone_name: "bip01 l foot".to_string(),
                dynamic: false,
                rotation: Some(Track::from_samples(vec![Quat::IDENTITY; 10], 0, 1)),
                position: Some(Track::from_samples(positions, 0, 1)),
            }],
        }
    }

    #[test]
    fn detect_moving_and_planted_feet() {
        let plants = detect_foot_plants(&clip(BlendMode::Override), &skeleton(), &config());
        assert_eq!(2, plants.foot_count);
        assert_eq!(10, plants.frame_count);
        assert_eq!(3, plants.bits.len());

        // Moving at 3 units per second.
        for frame in 0..5 {
            assert!(!plants.is_planted(0, frame));
        }
        for frame in 5..10 {
            assert!(plants.is_planted(0, frame));
        }
        // The right foot stays in its rig pose.
        for frame in 0..10 {
            assert!(plants.is_planted(1, frame));
        }
    }

    #[test]
    fn detect_additive() {
        assert_eq!(
            FootPlants::default(),
            detect_foot_plants(&clip(BlendMode::Additive), &skeleton(), &config())
        );
    }

    #[test]
    fn detect_missing_feet() {
        let config = CompressionConfig {
            foot_bones: vec!["foot".to_string()],
            ..Default::default()
        };
        assert_eq!(
            FootPlants::default(),
            detect_foot_plants(&clip(BlendMode::Override), &skeleton(), &config)
        );
    }

    #[test]
    fn foot_plant_bit_order() {
        let plants = FootPlants {
            foot_count: 2,
            frame_count: 5,
            bits: vec![0b1000_0001, 0b10],
        };
        assert!(plants.is_planted(0, 0));
        assert!(plants.is_planted(1, 2));
        assert!(plants.is_planted(1, 4));
        assert!(!plants.is_planted(0, 1));
    }
}
