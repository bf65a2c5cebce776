//! Compression settings resolved per bone.
use indexmap::IndexMap;
use log::warn;

/// Whether a channel may be removed from the compressed clip.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum DeleteMode {
    /// Always remove the channel.
    Always,
    /// Always store the channel.
    Never,
    /// Remove channels that match the rig pose or do not change.
    Auto,
}

/// Error tolerances and deletion behavior for a single bone.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, PartialEq, Clone, Copy)]
pub struct BoneCompressionPolicy {
    /// The maximum position error in world units or `None` to keep every key.
    pub position_tolerance: Option<f32>,
    /// The maximum rotation error in degrees or `None` to keep every key.
    pub rotation_tolerance: Option<f32>,
    pub delete_mode: DeleteMode,
}

impl BoneCompressionPolicy {
    /// Keep every key and never delete.
    pub const CONSERVATIVE: Self = Self {
        position_tolerance: None,
        rotation_tolerance: None,
        delete_mode: DeleteMode::Never,
    };

    /// Scale both tolerances by `multiplier`.
    pub fn scaled(self, multiplier: f32) -> Self {
        Self {
            position_tolerance: self.position_tolerance.map(|t| t * multiplier),
            rotation_tolerance: self.rotation_tolerance.map(|t| t * multiplier),
            delete_mode: self.delete_mode,
        }
    }
}

/// Tuned constants used during compression.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
#[derive(Debug, PartialEq, Clone, Copy)]
pub struct Thresholds {
    /// Locator rotation components closer than this to identity are snapped to identity.
    pub identity_snap_epsilon: f32,
    /// The minimum root displacement in world units for a non zero slope.
    pub min_slope_displacement: f32,
    /// The normalized time step for integrating the root path length.
    pub root_motion_step: f32,
    /// The per component quaternion tolerance for detecting looping clips.
    pub loop_component_tolerance: f32,
    /// The smallest position tolerance used when checking if a channel can be deleted.
    pub delete_position_floor: f32,
    /// Feet moving slower than this in world units per second are planted.
    pub foot_plant_speed: f32,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            identity_snap_epsilon: 1e-5,
            min_slope_displacement: 0.01,
            root_motion_step: 0.01,
            loop_component_tolerance: 0.1,
            delete_position_floor: 0.02,
            foot_plant_speed: 0.2,
        }
    }
}

/// Settings for compressing all clips in a database.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
#[derive(Debug, PartialEq, Clone)]
pub struct CompressionConfig {
    /// The policy for bones without an entry in [bone_policies](#structfield.bone_policies).
    pub default_policy: Option<BoneCompressionPolicy>,
    /// Policies by bone name.
    /// Names ending in `*` match any bone starting with the preceding text.
    pub bone_policies: IndexMap<String, BoneCompressionPolicy>,
    /// Scales all tolerances for the target platform.
    pub compression_multiplier: f32,
    /// The bone used for root motion.
    pub locomotion_bone: String,
    /// Bones checked for foot plants in order.
    pub foot_bones: Vec<String>,
    /// Prevent automatic deletion for the first controller in each clip.
    pub protect_first_controller: bool,
    pub thresholds: Thresholds,
}

impl Default for CompressionConfig {
    fn default() -> Self {
        Self {
            default_policy: None,
            bone_policies: IndexMap::new(),
            compression_multiplier: 1.0,
            locomotion_bone: "Locator_Locomotion".to_string(),
            foot_bones: Vec::new(),
            protect_first_controller: true,
            thresholds: Thresholds::default(),
        }
    }
}

impl CompressionConfig {
    /// Find the policy for `bone_name` scaled by the
    /// [compression_multiplier](#structfield.compression_multiplier).
    ///
    /// Exact matches ignoring ASCII case take priority over wildcard matches.
    /// Wildcard matches are checked in order.
    pub fn policy(&self, bone_name: &str) -> BoneCompressionPolicy {
        self.find_policy(bone_name)
            .or(self.default_policy)
            .unwrap_or_else(|| {
                warn!("No compression policy for bone {bone_name:?}. Keeping all keys.");
                BoneCompressionPolicy::CONSERVATIVE
            })
            .scaled(self.compression_multiplier)
    }

    fn find_policy(&self, bone_name: &str) -> Option<BoneCompressionPolicy> {
        let lower = bone_name.to_ascii_lowercase();
        self.bone_policies
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(bone_name))
            .or_else(|| {
                self.bone_policies.iter().find(|(name, _)| {
                    name.strip_suffix('*')
                        .is_some_and(|prefix| lower.starts_with(&prefix.to_ascii_lowercase()))
                })
            })
            .map(|(_, policy)| *policy)
    }

    #[cfg(feature = "serde")]
    pub fn from_json<P: AsRef<std::path::Path>>(path: P) -> Result<Self, crate::error::LoadError> {
        let json = std::fs::read_to_string(path)?;
        serde_json::from_str(&json).map_err(Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use pretty_assertions::assert_eq;

    fn policy(tolerance: f32) -> BoneCompressionPolicy {
        BoneCompressionPolicy {
            position_tolerance: Some(tolerance),
            rotation_tolerance: Some(tolerance),
            delete_mode: DeleteMode::Auto,
        }
    }

    #[test]
    fn policy_exact_before_wildcard() {
        let config = CompressionConfig {
            bone_policies: [
                ("Bip01*".to_string(), policy(1.0)),
                ("Bip01 Head".to_string(), policy(2.0)),
            ]
            .into_iter()
            .collect(),
            ..Default::default()
        };
        assert_eq!(policy(2.0), config.policy("bip01 head"));
        assert_eq!(policy(1.0), config.policy("Bip01 L Hand"));
    }

    #[test]
    fn policy_default() {
        let config = CompressionConfig {
            default_policy: Some(policy(0.5)),
            compression_multiplier: 2.0,
            ..Default::default()
        };
        assert_eq!(policy(1.0), config.policy("weapon_bone"));
    }

    #[test]
    fn policy_missing() {
        let config = CompressionConfig::default();
        assert_eq!(BoneCompressionPolicy::CONSERVATIVE, config.policy("weapon_bone"));
    }
}
