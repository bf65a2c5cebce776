//! Sharing identical tracks between many compressed clips.
//!
//! Stored tracks live in arenas owned by the [Database].
//! Controllers only store indices into these arenas, and stored tracks are never modified.
//!
//! Lookups first check tracks with the same format and key count before comparing bytes.
//! This avoids comparing every pair of tracks for large databases.
//! The first instance added becomes the stored instance for identical tracks.
//! Adding clips in a different order produces the same content but may change the stored order.
use std::path::Path;

use ahash::AHashMap;
use binrw::Endian;
use dba_lib::{
    dba::{Clip, Controller, Dba, MotionParams, TrackLayout},
    error::WriteDbaError,
    format::{KeyTimeTrack, PositionTrack, RotationTrack},
};
use log::{error, info, warn};

use crate::{
    encode::{EncodedChannel, EncodedController},
    error::SerializeError,
};

/// A clip after compression that is ready to be added to a [Database].
#[derive(Debug, PartialEq, Clone)]
pub struct CompressedClip {
    pub name: String,
    pub motion: MotionParams,
    pub foot_plant_bits: Vec<u8>,
    pub controllers: Vec<EncodedController>,
}

/// Output settings for [Database::serialize].
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct SerializeOptions {
    pub big_endian: bool,
    pub layout: TrackLayout,
    /// The size of a pointer on the target platform in bytes.
    pub pointer_size: u32,
}

impl Default for SerializeOptions {
    fn default() -> Self {
        Self {
            big_endian: false,
            layout: TrackLayout::Forward,
            pointer_size: 8,
        }
    }
}

impl SerializeOptions {
    pub fn endian(&self) -> Endian {
        if self.big_endian {
            Endian::Big
        } else {
            Endian::Little
        }
    }
}

#[derive(Debug, Default)]
pub struct Database {
    rotations: TrackStore<RotationTrack>,
    positions: TrackStore<PositionTrack>,
    key_times: TrackStore<KeyTimeTrack>,
    clips: Vec<StoredClip>,
}

#[derive(Debug, PartialEq, Clone)]
pub struct StoredClip {
    pub name: String,
    pub motion: MotionParams,
    pub foot_plant_bits: Vec<u8>,
    pub controllers: Vec<StoredController>,
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct StoredController {
    pub bone_id: u32,
    pub rotation: Option<ChannelIndices>,
    pub position: Option<ChannelIndices>,
}

/// Indices into the stored tracks of a [Database].
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct ChannelIndices {
    pub key_times: usize,
    pub values: usize,
}

/// Counts of unique stored tracks and the references to them.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Default)]
pub struct DatabaseStats {
    pub clips: usize,
    pub controllers: usize,
    pub rotation_tracks: usize,
    pub rotation_references: usize,
    pub position_tracks: usize,
    pub position_references: usize,
    pub key_time_tracks: usize,
    pub key_time_references: usize,
}

#[derive(Debug)]
struct TrackStore<T> {
    tracks: Vec<T>,
    /// The little endian bytes of each track for exact comparisons.
    bytes: Vec<Vec<u8>>,
    /// Track indices by format tag and key count.
    buckets: AHashMap<(u8, usize), Vec<usize>>,
    references: usize,
}

impl<T> Default for TrackStore<T> {
    fn default() -> Self {
        Self {
            tracks: Vec::new(),
            bytes: Vec::new(),
            buckets: AHashMap::new(),
            references: 0,
        }
    }
}

trait StoredTrack {
    fn format_tag(&self) -> u8;
    fn key_count(&self) -> usize;
    fn to_le_bytes(&self) -> Vec<u8>;
}

impl StoredTrack for RotationTrack {
    fn format_tag(&self) -> u8 {
        self.format() as u8
    }

    fn key_count(&self) -> usize {
        self.key_count()
    }

    fn to_le_bytes(&self) -> Vec<u8> {
        match self {
            RotationTrack::NoCompress(v) => v.iter().flatten().flat_map(|f| f.to_le_bytes()).collect(),
            RotationTrack::SmallTree48Bit(v) => {
                v.iter().flatten().flat_map(|c| c.to_le_bytes()).collect()
            }
            RotationTrack::SmallTree64Bit(v) | RotationTrack::SmallTree64BitExt(v) => {
                v.iter().flat_map(|c| c.to_le_bytes()).collect()
            }
        }
    }
}

impl StoredTrack for PositionTrack {
    fn format_tag(&self) -> u8 {
        self.format() as u8
    }

    fn key_count(&self) -> usize {
        self.key_count()
    }

    fn to_le_bytes(&self) -> Vec<u8> {
        match self {
            PositionTrack::NoCompress(v) => v.iter().flatten().flat_map(|f| f.to_le_bytes()).collect(),
        }
    }
}

impl StoredTrack for KeyTimeTrack {
    fn format_tag(&self) -> u8 {
        self.format() as u8
    }

    fn key_count(&self) -> usize {
        self.key_count()
    }

    fn to_le_bytes(&self) -> Vec<u8> {
        match self {
            KeyTimeTrack::F32(v) => v.iter().flat_map(|t| t.to_le_bytes()).collect(),
            KeyTimeTrack::U16(v) => v.iter().flat_map(|t| t.to_le_bytes()).collect(),
            KeyTimeTrack::U8(v) => v.clone(),
            KeyTimeTrack::Bitset { start, end, bits } => start
                .to_le_bytes()
                .into_iter()
                .chain(end.to_le_bytes())
                .chain(bits.iter().flat_map(|b| b.to_le_bytes()))
                .collect(),
        }
    }
}

impl<T: StoredTrack> TrackStore<T> {
    /// Find an identical stored track or store a new track.
    fn insert(&mut self, track: T) -> usize {
        self.references += 1;

        let bytes = track.to_le_bytes();
        let bucket = self
            .buckets
            .entry((track.format_tag(), track.key_count()))
            .or_default();
        if let Some(index) = bucket.iter().find(|i| self.bytes[**i] == bytes) {
            return *index;
        }

        let index = self.tracks.len();
        bucket.push(index);
        self.tracks.push(track);
        self.bytes.push(bytes);
        index
    }

    /// The new index for each used track with tracks sorted by format.
    fn grouped_indices(&self, used: &[bool]) -> (Vec<usize>, Vec<Option<usize>>) {
        let mut order: Vec<_> = (0..self.tracks.len()).filter(|i| used[*i]).collect();
        // The sort is stable, so tracks with the same format keep their relative order.
        order.sort_by_key(|i| self.tracks[*i].format_tag());

        let mut remap = vec![None; self.tracks.len()];
        for (new_index, old_index) in order.iter().enumerate() {
            remap[*old_index] = Some(new_index);
        }
        (order, remap)
    }
}

impl Database {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add the tracks for `clip` and return the index of the clip.
    ///
    /// Controllers without any tracks are skipped.
    /// Clips with names that do not fit in a 16-bit length are skipped and return `None`.
    /// Foot plants that do not fit in a 16-bit length are removed.
    pub fn add_clip(&mut self, clip: CompressedClip) -> Option<usize> {
        if u16::try_from(clip.name.len()).is_err() {
            error!(
                "Skipping clip with a name of {} bytes starting with {:?}",
                clip.name.len(),
                clip.name.chars().take(32).collect::<String>()
            );
            return None;
        }

        let (motion, foot_plant_bits) = if u16::try_from(clip.foot_plant_bits.len()).is_err() {
            warn!(
                "Removing {} bytes of foot plants from clip {:?}",
                clip.foot_plant_bits.len(),
                clip.name
            );
            let motion = MotionParams {
                foot_count: 0,
                foot_plant_frames: 0,
                ..clip.motion
            };
            (motion, Vec::new())
        } else {
            (clip.motion, clip.foot_plant_bits)
        };

        let mut controllers = Vec::new();
        for controller in clip.controllers {
            if controller.is_empty() {
                warn!(
                    "Skipping controller for bone {:?} in clip {:?} without tracks",
                    controller.bone_name, clip.name
                );
                continue;
            }

            let rotation = controller
                .rotation
                .map(|channel| insert_channel(&mut self.rotations, &mut self.key_times, channel));
            let position = controller
                .position
                .map(|channel| insert_channel(&mut self.positions, &mut self.key_times, channel));

            controllers.push(StoredController {
                bone_id: controller.bone_id,
                rotation,
                position,
            });
        }

        self.clips.push(StoredClip {
            name: clip.name,
            motion,
            foot_plant_bits,
            controllers,
        });
        Some(self.clips.len() - 1)
    }

    pub fn clips(&self) -> &[StoredClip] {
        &self.clips
    }

    pub fn rotation_track(&self, index: usize) -> Option<&RotationTrack> {
        self.rotations.tracks.get(index)
    }

    pub fn position_track(&self, index: usize) -> Option<&PositionTrack> {
        self.positions.tracks.get(index)
    }

    pub fn key_time_track(&self, index: usize) -> Option<&KeyTimeTrack> {
        self.key_times.tracks.get(index)
    }

    pub fn stats(&self) -> DatabaseStats {
        DatabaseStats {
            clips: self.clips.len(),
            controllers: self.clips.iter().map(|c| c.controllers.len()).sum(),
            rotation_tracks: self.rotations.tracks.len(),
            rotation_references: self.rotations.references,
            position_tracks: self.positions.tracks.len(),
            position_references: self.positions.references,
            key_time_tracks: self.key_times.tracks.len(),
            key_time_references: self.key_times.references,
        }
    }

    /// Create the file representation with tracks grouped by format.
    ///
    /// Controllers with key times that are not strictly increasing are skipped.
    /// Controllers with tracks of more than [u16::MAX] keys are skipped.
    /// Tracks not used by any remaining controller are not included.
    #[tracing::instrument(skip_all)]
    pub fn to_dba(&self, options: &SerializeOptions) -> Result<Dba, SerializeError> {
        let valid_key_times: Vec<_> = self
            .key_times
            .tracks
            .iter()
            .map(|t| t.times().windows(2).all(|w| w[0] < w[1]))
            .collect();

        let mut used_rotations = vec![false; self.rotations.tracks.len()];
        let mut used_positions = vec![false; self.positions.tracks.len()];
        let mut used_key_times = vec![false; self.key_times.tracks.len()];

        let mut clip_controllers = Vec::new();
        for clip in &self.clips {
            let mut controllers = Vec::new();
            for controller in &clip.controllers {
                let channels = [controller.rotation, controller.position];
                if channels
                    .iter()
                    .flatten()
                    .any(|c| !valid_key_times[c.key_times])
                {
                    error!(
                        "Skipping controller {:#010x} in clip {:?} with key times that are not strictly increasing",
                        controller.bone_id, clip.name
                    );
                    continue;
                }
                let key_count = self.max_key_count(controller);
                if key_count > u16::MAX as usize {
                    error!(
                        "Skipping controller {:#010x} in clip {:?} with {key_count} keys",
                        controller.bone_id, clip.name
                    );
                    continue;
                }

                if let Some(rotation) = controller.rotation {
                    used_rotations[rotation.values] = true;
                    used_key_times[rotation.key_times] = true;
                }
                if let Some(position) = controller.position {
                    used_positions[position.values] = true;
                    used_key_times[position.key_times] = true;
                }
                controllers.push(*controller);
            }
            clip_controllers.push(controllers);
        }

        let (rotation_order, rotation_remap) = self.rotations.grouped_indices(&used_rotations);
        let (position_order, position_remap) = self.positions.grouped_indices(&used_positions);
        let (key_time_order, key_time_remap) = self.key_times.grouped_indices(&used_key_times);

        let index = |i: Option<usize>| i.and_then(|i| i32::try_from(i).ok()).unwrap_or(-1);

        let clips = self
            .clips
            .iter()
            .zip(clip_controllers)
            .map(|(clip, controllers)| Clip {
                name: clip.name.clone(),
                motion: clip.motion,
                foot_plant_bits: clip.foot_plant_bits.clone(),
                controllers: controllers
                    .iter()
                    .map(|c| Controller {
                        bone_id: c.bone_id,
                        rotation_key_times: index(c.rotation.and_then(|r| key_time_remap[r.key_times])),
                        rotation_values: index(c.rotation.and_then(|r| rotation_remap[r.values])),
                        position_key_times: index(c.position.and_then(|p| key_time_remap[p.key_times])),
                        position_values: index(c.position.and_then(|p| position_remap[p.values])),
                    })
                    .collect(),
            })
            .collect();

        let mut dba = Dba {
            layout: options.layout,
            padding: 0,
            rotation_tracks: rotation_order
                .iter()
                .map(|i| self.rotations.tracks[*i].clone())
                .collect(),
            position_tracks: position_order
                .iter()
                .map(|i| self.positions.tracks[*i].clone())
                .collect(),
            key_time_tracks: key_time_order
                .iter()
                .map(|i| self.key_times.tracks[*i].clone())
                .collect(),
            clips,
        };

        if options.layout == TrackLayout::EndAnchored {
            // Reserve the space the runtime needs beyond the track data itself.
            let estimate = runtime_size(&dba, options.pointer_size);
            let padding = estimate - dba.track_data_size();
            dba.padding = u32::try_from(padding)
                .map_err(|_| WriteDbaError::FileTooLarge(estimate))?;
        }

        Ok(dba)
    }

    /// Write the database to `path` and return the size in bytes.
    ///
    /// Missing parent directories are created.
    #[tracing::instrument(skip_all)]
    pub fn serialize<P: AsRef<Path>>(
        &self,
        path: P,
        options: &SerializeOptions,
    ) -> Result<u64, SerializeError> {
        let path = path.as_ref();

        let dba = self.to_dba(options)?;
        let bytes = dba.to_bytes(options.endian())?;

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|source| SerializeError::CreateDirectory {
                path: parent.to_owned(),
                source,
            })?;
        }
        std::fs::write(path, &bytes)?;

        info!(
            "Wrote {} clips and {} tracks to {path:?} ({} bytes)",
            dba.clips.len(),
            dba.rotation_tracks.len() + dba.position_tracks.len() + dba.key_time_tracks.len(),
            bytes.len()
        );
        Ok(bytes.len() as u64)
    }
}

impl Database {
    /// The largest key count of any track used by `controller`.
    fn max_key_count(&self, controller: &StoredController) -> usize {
        let rotation = controller.rotation.into_iter().flat_map(|c| {
            [
                self.rotations.tracks[c.values].key_count(),
                self.key_times.tracks[c.key_times].key_count(),
            ]
        });
        let position = controller.position.into_iter().flat_map(|c| {
            [
                self.positions.tracks[c.values].key_count(),
                self.key_times.tracks[c.key_times].key_count(),
            ]
        });
        rotation.chain(position).max().unwrap_or_default()
    }
}

fn insert_channel<T: StoredTrack>(
    values: &mut TrackStore<T>,
    key_times: &mut TrackStore<KeyTimeTrack>,
    channel: EncodedChannel<T>,
) -> ChannelIndices {
    ChannelIndices {
        key_times: key_times.insert(channel.key_times),
        values: values.insert(channel.values),
    }
}

/// The estimated runtime allocation for the track data of `dba`.
///
/// Each stored track needs two pointers in addition to its aligned data.
pub fn runtime_size(dba: &Dba, pointer_size: u32) -> u64 {
    let track_count =
        dba.rotation_tracks.len() + dba.position_tracks.len() + dba.key_time_tracks.len();
    dba.track_data_size() + track_count as u64 * 2 * pointer_size as u64
}
