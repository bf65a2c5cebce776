use glam::Mat4;
use log::warn;

use crate::Transform;

/// The bind pose hierarchy used to resolve controllers and rig values.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, PartialEq, Clone)]
pub struct Skeleton {
    pub bones: Vec<Bone>,
}

/// A single node in the skeleton heirarchy.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, PartialEq, Clone)]
pub struct Bone {
    /// The name used by animation controllers to identify this bone.
    pub name: String,
    /// The index of the parent [Bone] in [bones](struct.Skeleton.html#structfield.bones)
    /// or `None` if this is a root bone.
    pub parent_index: Option<usize>,
    /// The model space bind pose transform of this bone.
    pub bind_to_world: Mat4,
}

impl Skeleton {
    pub fn parent_index(&self, index: usize) -> Option<usize> {
        self.bones.get(index)?.parent_index
    }

    pub fn bind_to_world(&self, index: usize) -> Option<Mat4> {
        self.bones.get(index).map(|b| b.bind_to_world)
    }

    /// Find a bone by name ignoring ASCII case.
    pub fn bone_index(&self, name: &str) -> Option<usize> {
        self.bones
            .iter()
            .position(|b| b.name.eq_ignore_ascii_case(name))
    }

    #[cfg(feature = "serde")]
    pub fn from_json<P: AsRef<std::path::Path>>(path: P) -> Result<Self, crate::error::LoadError> {
        let json = std::fs::read_to_string(path)?;
        serde_json::from_str(&json).map_err(Into::into)
    }

    /// The bind pose of bone `index` relative to its parent.
    /// This is the value a deleted channel falls back to at runtime.
    pub fn rig_transform(&self, index: usize) -> Option<Transform> {
        let bind_to_world = self.bind_to_world(index)?;
        let parent_to_world = self
            .parent_index(index)
            .and_then(|p| self.bind_to_world(p))
            .unwrap_or(Mat4::IDENTITY);
        Some(Transform::from_matrix(
            parent_to_world.inverse() * bind_to_world,
        ))
    }

    /// The rig transform of every bone.
    pub fn rig_transforms(&self) -> Vec<Transform> {
        (0..self.bones.len())
            .map(|i| self.rig_transform(i).unwrap_or(Transform::IDENTITY))
            .collect()
    }

    /// Accumulate `local_transforms` with the parent of each bone.
    ///
    /// Parents do not need to appear before their children.
    pub fn model_space_transforms(&self, local_transforms: &[Transform]) -> Vec<Transform> {
        let mut model_transforms: Vec<Option<Transform>> = vec![None; self.bones.len()];

        for i in 0..self.bones.len() {
            // Find the ancestors that still need to be calculated.
            let mut chain = vec![i];
            let mut current = i;
            while let Some(parent) = self.parent_index(current) {
                if parent >= self.bones.len() || model_transforms[parent].is_some() {
                    break;
                }
                if chain.len() > self.bones.len() {
                    warn!("Cycle detected in parents of bone {:?}", self.bones[i].name);
                    break;
                }
                chain.push(parent);
                current = parent;
            }

            for bone in chain.into_iter().rev() {
                if model_transforms[bone].is_some() {
                    continue;
                }
                let local = local_transforms
                    .get(bone)
                    .copied()
                    .unwrap_or(Transform::IDENTITY);
                let parent = self
                    .parent_index(bone)
                    .and_then(|p| model_transforms.get(p).copied().flatten());
                model_transforms[bone] = Some(match parent {
                    Some(parent) => parent * local,
                    None => local,
                });
            }
        }

        model_transforms
            .into_iter()
            .map(|t| t.unwrap_or(Transform::IDENTITY))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use approx::assert_relative_eq;
    use glam::{Quat, Vec3, vec3};

    fn bone(name: &str, parent_index: Option<usize>, translation: Vec3) -> Bone {
        Bone {
            name: name.to_string(),
            parent_index,
            bind_to_world: Mat4::from_translation(translation),
        }
    }

    #[test]
    fn rig_transform_relative_to_parent() {
        let skeleton = Skeleton {
            bones: vec![
                bone("root", None, vec3(0.0, 0.0, 1.0)),
                bone("child", Some(0), vec3(0.0, 2.0, 1.0)),
            ],
        };
        assert_eq!(
            Some(vec3(0.0, 0.0, 1.0)),
            skeleton.rig_transform(0).map(|t| t.translation)
        );
        assert_eq!(
            Some(vec3(0.0, 2.0, 0.0)),
            skeleton.rig_transform(1).map(|t| t.translation)
        );
        assert_eq!(None, skeleton.rig_transform(2));
    }

    #[test]
    fn bone_index_ignores_case() {
        let skeleton = Skeleton {
            bones: vec![bone("Bip01 Pelvis", None, Vec3::ZERO)],
        };
        assert_eq!(Some(0), skeleton.bone_index("bip01 pelvis"));
        assert_eq!(None, skeleton.bone_index("Bip01 Spine"));
    }

    #[test]
    fn model_space_transforms_children_before_parents() {
        let skeleton = Skeleton {
            bones: vec![
                bone("hand", Some(1), Vec3::ZERO),
                bone("arm", Some(2), Vec3::ZERO),
                bone("root", None, Vec3::ZERO),
            ],
        };
        let local = [
            Transform {
                translation: vec3(1.0, 0.0, 0.0),
                rotation: Quat::IDENTITY,
            },
            Transform {
                translation: vec3(1.0, 0.0, 0.0),
                rotation: Quat::from_rotation_z(std::f32::consts::FRAC_PI_2),
            },
            Transform {
                translation: vec3(0.0, 0.0, 1.0),
                rotation: Quat::IDENTITY,
            },
        ];

        let transforms = skeleton.model_space_transforms(&local);
        assert_relative_eq!(
            [1.0, 1.0, 1.0][..],
            transforms[0].translation.to_array()[..],
            epsilon = 1e-6
        );
        assert_relative_eq!(
            [1.0, 0.0, 1.0][..],
            transforms[1].translation.to_array()[..],
            epsilon = 1e-6
        );
        assert_eq!(vec3(0.0, 0.0, 1.0), transforms[2].translation);
    }

    #[test]
    fn model_space_transforms_parent_cycle() {
        let skeleton = Skeleton {
            bones: vec![
                bone("a", Some(1), Vec3::ZERO),
                bone("b", Some(0), Vec3::ZERO),
            ],
        };
        let transforms = skeleton.model_space_transforms(&[Transform::IDENTITY; 2]);
        assert_eq!(vec![Transform::IDENTITY; 2], transforms);
    }
}
