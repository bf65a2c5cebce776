//! Compressed animation databases in `.dba` files.
//!
//! A database stores the deduplicated tracks for many clips.
//! Clips only store indices into the shared track lists.
//!
//! # Layout
//! The header and tables are followed by the clip list and the raw track data.
//! Tracks are addressed by 32-bit offsets that either grow forward from the start of
//! the track data ([TrackLayout::Forward]) or are negative offsets from the end of the file
//! ([TrackLayout::EndAnchored]).
//! The end anchored layout lets a runtime reserve a single buffer of the
//! estimated size and load the file at the end of that buffer without patching offsets.
use std::io::{Read, Seek, SeekFrom, Write};

use binrw::{BinRead, BinResult, BinWrite, Endian, VecArgs, binrw};
use strum::EnumCount;

use crate::format::{
    KeyTimeFormat, KeyTimeTrack, PositionFormat, PositionTrack, RotationFormat, RotationTrack,
};

pub const VERSION: u32 = 0x0000_0901;

/// How track data offsets are stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, BinRead, BinWrite)]
#[brw(repr(u32))]
pub enum TrackLayout {
    /// Non negative offsets from the start of the track data.
    Forward = 0,
    /// Negative offsets from the end of the file.
    EndAnchored = 1,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Dba {
    pub layout: TrackLayout,
    /// Zero bytes before the track data for [TrackLayout::EndAnchored].
    /// This is always `0` for [TrackLayout::Forward].
    pub padding: u32,
    /// Rotation tracks grouped by [RotationFormat] in increasing order.
    pub rotation_tracks: Vec<RotationTrack>,
    /// Position tracks grouped by [PositionFormat] in increasing order.
    pub position_tracks: Vec<PositionTrack>,
    /// Key time tracks grouped by [KeyTimeFormat] in increasing order.
    pub key_time_tracks: Vec<KeyTimeTrack>,
    pub clips: Vec<Clip>,
}

#[binrw]
#[brw(magic(b"ADBA"))]
#[derive(Debug)]
struct Header {
    #[br(assert(version == VERSION))]
    version: u32,
    layout: TrackLayout,
    rotation_track_count: u32,
    position_track_count: u32,
    key_time_track_count: u32,
    clip_count: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Clip {
    pub name: String,
    pub motion: MotionParams,
    /// One bit per foot per frame packed least significant bit first.
    /// See [foot_count](struct.MotionParams.html#structfield.foot_count).
    pub foot_plant_bits: Vec<u8>,
    pub controllers: Vec<Controller>,
}

/// Locomotion and timing metadata for a clip.
#[derive(Debug, Clone, Copy, PartialEq, BinRead, BinWrite)]
pub struct MotionParams {
    pub ticks_per_frame: u32,
    pub seconds_per_tick: f32,
    pub start_tick: u32,
    pub end_tick: u32,
    pub flags: u32,
    /// The locomotion transform at the start of the clip.
    pub start_location: Locator,
    /// The locomotion transform at the end of the clip.
    pub end_location: Locator,
    /// The slope angle in radians.
    pub slope: f32,
    /// The total turn angle in radians.
    pub turn_angle: f32,
    /// The turn angle in radians per second.
    pub turn_speed: f32,
    /// The path length of the locomotion bone.
    pub distance: f32,
    /// The average speed of the locomotion bone.
    pub speed: f32,
    pub foot_count: u16,
    pub foot_plant_frames: u16,
}

impl MotionParams {
    pub const LOOP: u32 = 0x1;
    pub const ADDITIVE: u32 = 0x2;

    pub fn is_loop(&self) -> bool {
        self.flags & Self::LOOP != 0
    }

    pub fn is_additive(&self) -> bool {
        self.flags & Self::ADDITIVE != 0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, BinRead, BinWrite)]
pub struct Locator {
    /// Quaternion in xyzw order.
    pub rotation: [f32; 4],
    pub translation: [f32; 3],
}

/// Track indices for a single animated bone.
/// Each index is `-1` if the channel is not stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, BinRead, BinWrite)]
pub struct Controller {
    /// See [bone_id](crate::hash::bone_id).
    pub bone_id: u32,
    /// Index into [key_time_tracks](struct.Dba.html#structfield.key_time_tracks).
    pub rotation_key_times: i32,
    /// Index into [rotation_tracks](struct.Dba.html#structfield.rotation_tracks).
    pub rotation_values: i32,
    /// Index into [key_time_tracks](struct.Dba.html#structfield.key_time_tracks).
    pub position_key_times: i32,
    /// Index into [position_tracks](struct.Dba.html#structfield.position_tracks).
    pub position_values: i32,
}

impl Controller {
    pub fn rotation(&self) -> Option<(usize, usize)> {
        Some((
            usize::try_from(self.rotation_key_times).ok()?,
            usize::try_from(self.rotation_values).ok()?,
        ))
    }

    pub fn position(&self) -> Option<(usize, usize)> {
        Some((
            usize::try_from(self.position_key_times).ok()?,
            usize::try_from(self.position_values).ok()?,
        ))
    }
}

impl Dba {
    /// Detect the byte order from the version field.
    pub fn detect_endian(bytes: &[u8]) -> Option<Endian> {
        let version: [u8; 4] = bytes.get(4..8)?.try_into().ok()?;
        if u32::from_le_bytes(version) == VERSION {
            Some(Endian::Little)
        } else if u32::from_be_bytes(version) == VERSION {
            Some(Endian::Big)
        } else {
            None
        }
    }

    /// The size in bytes of all track data including alignment but excluding
    /// [padding](#structfield.padding).
    pub fn track_data_size(&self) -> u64 {
        let sizes = self
            .rotation_tracks
            .iter()
            .map(|t| t.byte_size())
            .chain(self.position_tracks.iter().map(|t| t.byte_size()))
            .chain(self.key_time_tracks.iter().map(|t| t.byte_size()));
        sizes.map(|s| round_up(s as u64, 4)).sum()
    }

    fn rotation_formats(&self) -> impl Iterator<Item = RotationFormat> + '_ {
        self.rotation_tracks.iter().map(|t| t.format())
    }

    fn position_formats(&self) -> impl Iterator<Item = PositionFormat> + '_ {
        self.position_tracks.iter().map(|t| t.format())
    }

    fn key_time_formats(&self) -> impl Iterator<Item = KeyTimeFormat> + '_ {
        self.key_time_tracks.iter().map(|t| t.format())
    }

    /// Check the constraints that the writer relies on.
    pub fn validate(&self) -> Result<(), crate::error::WriteDbaError> {
        check_grouped("rotation", self.rotation_formats())?;
        check_grouped("position", self.position_formats())?;
        check_grouped("key time", self.key_time_formats())?;

        check_key_counts("rotation", self.rotation_tracks.iter().map(|t| t.key_count()))?;
        check_key_counts("position", self.position_tracks.iter().map(|t| t.key_count()))?;
        check_key_counts("key time", self.key_time_tracks.iter().map(|t| t.key_count()))?;
        Ok(())
    }
}

fn check_grouped<F: Ord + Copy>(
    category: &'static str,
    formats: impl Iterator<Item = F>,
) -> Result<(), crate::error::WriteDbaError> {
    let mut previous = None;
    for (index, format) in formats.enumerate() {
        if previous.is_some_and(|p| format < p) {
            return Err(crate::error::WriteDbaError::UngroupedTracks { category, index });
        }
        previous = Some(format);
    }
    Ok(())
}

fn check_key_counts(
    category: &'static str,
    counts: impl Iterator<Item = usize>,
) -> Result<(), crate::error::WriteDbaError> {
    for (index, key_count) in counts.enumerate() {
        if u16::try_from(key_count).is_err() {
            return Err(crate::error::WriteDbaError::TooManyKeys {
                category,
                index,
                key_count,
            });
        }
    }
    Ok(())
}

impl BinRead for Dba {
    type Args<'a> = ();

    fn read_options<R: Read + Seek>(
        reader: &mut R,
        endian: Endian,
        _args: Self::Args<'_>,
    ) -> BinResult<Self> {
        let header = Header::read_options(reader, endian, ())?;

        let rotation_key_counts: Vec<u16> =
            read_vec(reader, endian, header.rotation_track_count as usize)?;
        let rotation_histogram: Vec<u32> = read_vec(reader, endian, RotationFormat::COUNT)?;
        let position_key_counts: Vec<u16> =
            read_vec(reader, endian, header.position_track_count as usize)?;
        let position_histogram: Vec<u32> = read_vec(reader, endian, PositionFormat::COUNT)?;
        let key_time_key_counts: Vec<u16> =
            read_vec(reader, endian, header.key_time_track_count as usize)?;
        let key_time_histogram: Vec<u32> = read_vec(reader, endian, KeyTimeFormat::COUNT)?;
        align_reader(reader, 4)?;

        let rotation_offsets: Vec<i32> =
            read_vec(reader, endian, header.rotation_track_count as usize)?;
        let position_offsets: Vec<i32> =
            read_vec(reader, endian, header.position_track_count as usize)?;
        let key_time_offsets: Vec<i32> =
            read_vec(reader, endian, header.key_time_track_count as usize)?;

        let padding = match header.layout {
            TrackLayout::Forward => 0,
            TrackLayout::EndAnchored => u32::read_options(reader, endian, ())?,
        };

        let clips = (0..header.clip_count)
            .map(|_| Clip::read_options(reader, endian, (header.layout,)))
            .collect::<BinResult<Vec<_>>>()?;

        let data_start = round_up(reader.stream_position()?, 4);
        let file_end = reader.seek(SeekFrom::End(0))?;
        let base = match header.layout {
            TrackLayout::Forward => data_start,
            TrackLayout::EndAnchored => file_end,
        };

        let rotation_formats = track_formats(
            reader,
            &rotation_histogram,
            rotation_key_counts.len(),
            RotationFormat::from_repr,
        )?;
        let rotation_tracks = rotation_formats
            .into_iter()
            .zip(rotation_key_counts.iter().zip(&rotation_offsets))
            .map(|(format, (count, offset))| {
                seek_offset(reader, base, *offset, header.layout)?;
                RotationTrack::read_options(reader, endian, (format, *count as usize))
            })
            .collect::<BinResult<Vec<_>>>()?;

        let position_formats = track_formats(
            reader,
            &position_histogram,
            position_key_counts.len(),
            PositionFormat::from_repr,
        )?;
        let position_tracks = position_formats
            .into_iter()
            .zip(position_key_counts.iter().zip(&position_offsets))
            .map(|(format, (count, offset))| {
                seek_offset(reader, base, *offset, header.layout)?;
                PositionTrack::read_options(reader, endian, (format, *count as usize))
            })
            .collect::<BinResult<Vec<_>>>()?;

        let key_time_formats = track_formats(
            reader,
            &key_time_histogram,
            key_time_key_counts.len(),
            KeyTimeFormat::from_repr,
        )?;
        let key_time_tracks = key_time_formats
            .into_iter()
            .zip(key_time_key_counts.iter().zip(&key_time_offsets))
            .map(|(format, (count, offset))| {
                seek_offset(reader, base, *offset, header.layout)?;
                KeyTimeTrack::read_options(reader, endian, (format, *count as usize))
            })
            .collect::<BinResult<Vec<_>>>()?;

        Ok(Self {
            layout: header.layout,
            padding,
            rotation_tracks,
            position_tracks,
            key_time_tracks,
            clips,
        })
    }
}

impl BinWrite for Dba {
    type Args<'a> = ();

    fn write_options<W: Write + Seek>(
        &self,
        writer: &mut W,
        endian: Endian,
        _args: Self::Args<'_>,
    ) -> BinResult<()> {
        Header {
            version: VERSION,
            layout: self.layout,
            rotation_track_count: count32(writer, self.rotation_tracks.len())?,
            position_track_count: count32(writer, self.position_tracks.len())?,
            key_time_track_count: count32(writer, self.key_time_tracks.len())?,
            clip_count: count32(writer, self.clips.len())?,
        }
        .write_options(writer, endian, ())?;

        write_key_counts(writer, endian, self.rotation_tracks.iter().map(|t| t.key_count()))?;
        histogram::<RotationFormat>(self.rotation_formats(), RotationFormat::COUNT)
            .write_options(writer, endian, ())?;
        write_key_counts(writer, endian, self.position_tracks.iter().map(|t| t.key_count()))?;
        histogram::<PositionFormat>(self.position_formats(), PositionFormat::COUNT)
            .write_options(writer, endian, ())?;
        write_key_counts(writer, endian, self.key_time_tracks.iter().map(|t| t.key_count()))?;
        histogram::<KeyTimeFormat>(self.key_time_formats(), KeyTimeFormat::COUNT)
            .write_options(writer, endian, ())?;
        align_writer(writer, 4)?;

        // Offsets depend on the size of the clips, so write placeholders for now.
        let offsets_position = writer.stream_position()?;
        let track_count =
            self.rotation_tracks.len() + self.position_tracks.len() + self.key_time_tracks.len();
        vec![0i32; track_count].write_options(writer, endian, ())?;

        if self.layout == TrackLayout::EndAnchored {
            self.padding.write_options(writer, endian, ())?;
        }

        for clip in &self.clips {
            clip.write_options(writer, endian, (self.layout,))?;
        }
        align_writer(writer, 4)?;

        let data_start = writer.stream_position()?;
        if self.layout == TrackLayout::EndAnchored {
            writer.write_all(&vec![0u8; self.padding as usize])?;
        }

        let mut positions = Vec::with_capacity(track_count);
        for track in &self.rotation_tracks {
            positions.push(writer.stream_position()?);
            track.write_options(writer, endian, ())?;
            align_writer(writer, 4)?;
        }
        for track in &self.position_tracks {
            positions.push(writer.stream_position()?);
            track.write_options(writer, endian, ())?;
            align_writer(writer, 4)?;
        }
        for track in &self.key_time_tracks {
            positions.push(writer.stream_position()?);
            track.write_options(writer, endian, ())?;
            align_writer(writer, 4)?;
        }
        let file_end = writer.stream_position()?;

        let offsets = positions
            .iter()
            .map(|position| {
                let offset = match self.layout {
                    TrackLayout::Forward => *position as i64 - data_start as i64,
                    TrackLayout::EndAnchored => *position as i64 - file_end as i64,
                };
                i32::try_from(offset).map_err(|_| binrw::Error::AssertFail {
                    pos: *position,
                    message: format!("track offset {offset} does not fit in 32 bits"),
                })
            })
            .collect::<BinResult<Vec<_>>>()?;

        writer.seek(SeekFrom::Start(offsets_position))?;
        offsets.write_options(writer, endian, ())?;
        writer.seek(SeekFrom::Start(file_end))?;

        Ok(())
    }
}

impl BinRead for Clip {
    type Args<'a> = (TrackLayout,);

    fn read_options<R: Read + Seek>(
        reader: &mut R,
        endian: Endian,
        (layout,): Self::Args<'_>,
    ) -> BinResult<Self> {
        let name_pos = reader.stream_position()?;
        let name_bytes = read_bytes16(reader, endian)?;
        let name = String::from_utf8(name_bytes).map_err(|e| binrw::Error::AssertFail {
            pos: name_pos,
            message: format!("invalid clip name: {e}"),
        })?;

        let motion = MotionParams::read_options(reader, endian, ())?;
        let foot_plant_bits = read_bytes16(reader, endian)?;

        let controller_count = u32::read_options(reader, endian, ())?;
        if layout == TrackLayout::EndAnchored {
            let controllers_offset = u32::read_options(reader, endian, ())?;
            reader.seek(SeekFrom::Start(controllers_offset as u64))?;
        }
        let controllers = read_vec(reader, endian, controller_count as usize)?;

        Ok(Self {
            name,
            motion,
            foot_plant_bits,
            controllers,
        })
    }
}

impl BinWrite for Clip {
    type Args<'a> = (TrackLayout,);

    fn write_options<W: Write + Seek>(
        &self,
        writer: &mut W,
        endian: Endian,
        (layout,): Self::Args<'_>,
    ) -> BinResult<()> {
        write_bytes16(writer, endian, self.name.as_bytes())?;
        self.motion.write_options(writer, endian, ())?;
        write_bytes16(writer, endian, &self.foot_plant_bits)?;

        count32(writer, self.controllers.len())?.write_options(writer, endian, ())?;
        if layout == TrackLayout::EndAnchored {
            // The controllers start immediately after this field.
            let position = writer.stream_position()? + 4;
            let offset = u32::try_from(position).map_err(|_| binrw::Error::AssertFail {
                pos: position,
                message: "controller offset does not fit in 32 bits".to_string(),
            })?;
            offset.write_options(writer, endian, ())?;
        }
        self.controllers.write_options(writer, endian, ())
    }
}

fn track_formats<F, R: Seek>(
    reader: &mut R,
    histogram: &[u32],
    track_count: usize,
    from_repr: impl Fn(u8) -> Option<F>,
) -> BinResult<Vec<F>>
where
    F: Copy,
{
    // Tracks are sorted by format, so the histogram determines each track's format.
    let total: u64 = histogram.iter().map(|c| *c as u64).sum();
    if total != track_count as u64 {
        return Err(binrw::Error::AssertFail {
            pos: reader.stream_position()?,
            message: format!("format histogram total {total} does not match count {track_count}"),
        });
    }

    let mut formats = Vec::with_capacity(track_count);
    for (i, count) in histogram.iter().enumerate() {
        let format = u8::try_from(i)
            .ok()
            .and_then(&from_repr)
            .ok_or_else(|| binrw::Error::AssertFail {
                pos: 0,
                message: format!("unknown format {i}"),
            })?;
        formats.extend(std::iter::repeat_n(format, *count as usize));
    }
    Ok(formats)
}

fn histogram<F: Into<u8>>(formats: impl Iterator<Item = F>, format_count: usize) -> Vec<u32> {
    let mut counts = vec![0u32; format_count];
    for format in formats {
        counts[format.into() as usize] += 1;
    }
    counts
}

impl From<RotationFormat> for u8 {
    fn from(value: RotationFormat) -> Self {
        value as u8
    }
}

impl From<PositionFormat> for u8 {
    fn from(value: PositionFormat) -> Self {
        value as u8
    }
}

impl From<KeyTimeFormat> for u8 {
    fn from(value: KeyTimeFormat) -> Self {
        value as u8
    }
}

fn seek_offset<R: Seek>(reader: &mut R, base: u64, offset: i32, layout: TrackLayout) -> BinResult<()> {
    let valid = match layout {
        TrackLayout::Forward => offset >= 0,
        TrackLayout::EndAnchored => offset <= 0,
    };
    let position = base as i64 + offset as i64;
    if !valid || position < 0 {
        return Err(binrw::Error::AssertFail {
            pos: base,
            message: format!("invalid track offset {offset} for {layout:?} layout"),
        });
    }
    reader.seek(SeekFrom::Start(position as u64))?;
    Ok(())
}

fn write_key_counts<W: Write + Seek>(
    writer: &mut W,
    endian: Endian,
    counts: impl Iterator<Item = usize>,
) -> BinResult<()> {
    for count in counts {
        let count = u16::try_from(count).map_err(|_| binrw::Error::AssertFail {
            pos: 0,
            message: format!("key count {count} does not fit in 16 bits"),
        })?;
        count.write_options(writer, endian, ())?;
    }
    Ok(())
}

fn count32<W: Seek>(writer: &mut W, count: usize) -> BinResult<u32> {
    u32::try_from(count).map_err(|_| binrw::Error::AssertFail {
        pos: writer.stream_position().unwrap_or_default(),
        message: format!("count {count} does not fit in 32 bits"),
    })
}

fn read_bytes16<R: Read + Seek>(reader: &mut R, endian: Endian) -> BinResult<Vec<u8>> {
    let len = u16::read_options(reader, endian, ())?;
    let bytes = read_vec(reader, endian, len as usize)?;
    align_reader(reader, 4)?;
    Ok(bytes)
}

fn write_bytes16<W: Write + Seek>(writer: &mut W, endian: Endian, bytes: &[u8]) -> BinResult<()> {
    let len = u16::try_from(bytes.len()).map_err(|_| binrw::Error::AssertFail {
        pos: writer.stream_position().unwrap_or_default(),
        message: format!("length {} does not fit in 16 bits", bytes.len()),
    })?;
    len.write_options(writer, endian, ())?;
    writer.write_all(bytes)?;
    align_writer(writer, 4)
}

fn read_vec<T, R>(reader: &mut R, endian: Endian, count: usize) -> BinResult<Vec<T>>
where
    for<'a> T: BinRead<Args<'a> = ()> + 'static,
    R: Read + Seek,
{
    <Vec<T>>::read_options(reader, endian, VecArgs { count, inner: () })
}

fn align_reader<R: Seek>(reader: &mut R, alignment: u64) -> BinResult<()> {
    let position = reader.stream_position()?;
    reader.seek(SeekFrom::Start(round_up(position, alignment)))?;
    Ok(())
}

fn align_writer<W: Write + Seek>(writer: &mut W, alignment: u64) -> BinResult<()> {
    let position = writer.stream_position()?;
    let padding = round_up(position, alignment) - position;
    writer.write_all(&vec![0u8; padding as usize])?;
    Ok(())
}

pub(crate) const fn round_up(x: u64, n: u64) -> u64 {
    x.div_ceil(n) * n
}

#[cfg(test)]
mod tests {
    use super::*;

    use binrw::{BinReaderExt, BinWriterExt};
    use hexlit::hex;
    use pretty_assertions::assert_eq;
    use std::io::Cursor;

    fn motion() -> MotionParams {
        MotionParams {
            ticks_per_frame: 1,
            seconds_per_tick: 1.0 / 30.0,
            start_tick: 0,
            end_tick: 30,
            flags: MotionParams::LOOP,
            start_location: Locator {
                rotation: [0.0, 0.0, 0.0, 1.0],
                translation: [0.0; 3],
            },
            end_location: Locator {
                rotation: [0.0, 0.0, 0.0, 1.0],
                translation: [0.0, 2.0, 0.0],
            },
            slope: 0.0,
            turn_angle: 0.0,
            turn_speed: 0.0,
            distance: 2.0,
            speed: 2.0,
            foot_count: 0,
            foot_plant_frames: 0,
        }
    }

    #[test]
    fn write_controller_little_endian() {
        let controller = Controller {
            bone_id: 0x11223344,
            rotation_key_times: 1,
            rotation_values: 2,
            position_key_times: -1,
            position_values: -1,
        };
        let mut writer = Cursor::new(Vec::new());
        writer.write_le(&controller).unwrap();
        assert_eq!(
            hex!(0x44332211 01000000 02000000 ffffffff ffffffff),
            writer.into_inner()[..]
        );
    }

    #[test]
    fn motion_params_size() {
        let mut writer = Cursor::new(Vec::new());
        writer.write_le(&motion()).unwrap();
        assert_eq!(100, writer.into_inner().len());
    }

    #[test]
    fn write_read_empty() {
        let dba = Dba {
            layout: TrackLayout::Forward,
            padding: 0,
            rotation_tracks: Vec::new(),
            position_tracks: Vec::new(),
            key_time_tracks: Vec::new(),
            clips: Vec::new(),
        };

        let mut writer = Cursor::new(Vec::new());
        writer.write_le(&dba).unwrap();
        let bytes = writer.into_inner();

        // header + 4 + 1 + 4 format counts
        assert_eq!(28 + 36, bytes.len());
        assert_eq!(Some(Endian::Little), Dba::detect_endian(&bytes));

        let mut reader = Cursor::new(bytes);
        assert_eq!(dba, reader.read_le::<Dba>().unwrap());
    }

    #[test]
    fn write_read_clip_end_anchored() {
        let clip = Clip {
            name: "walk".to_string(),
            motion: motion(),
            foot_plant_bits: vec![0b101],
            controllers: vec![Controller {
                bone_id: 1,
                rotation_key_times: 0,
                rotation_values: 0,
                position_key_times: -1,
                position_values: -1,
            }],
        };

        let mut writer = Cursor::new(Vec::new());
        clip.write_options(&mut writer, Endian::Big, (TrackLayout::EndAnchored,))
            .unwrap();
        let bytes = writer.into_inner();
        // name 8, motion 100, foot plants 4, count 4, offset 4, controllers 20
        assert_eq!(140, bytes.len());
        // The controllers start right after the offset field.
        assert_eq!(hex!(0x00000078), bytes[116..120]);

        let mut reader = Cursor::new(bytes);
        assert_eq!(
            clip,
            Clip::read_options(&mut reader, Endian::Big, (TrackLayout::EndAnchored,)).unwrap()
        );
    }

    #[test]
    fn histogram_counts() {
        assert_eq!(
            vec![1, 2, 0, 1],
            histogram(
                [
                    KeyTimeFormat::F32,
                    KeyTimeFormat::U16,
                    KeyTimeFormat::U16,
                    KeyTimeFormat::Bitset
                ]
                .into_iter(),
                KeyTimeFormat::COUNT
            )
        );
    }

    #[test]
    fn validate_ungrouped() {
        let dba = Dba {
            layout: TrackLayout::Forward,
            padding: 0,
            rotation_tracks: Vec::new(),
            position_tracks: Vec::new(),
            key_time_tracks: vec![KeyTimeTrack::U8(vec![0]), KeyTimeTrack::F32(vec![0.0])],
            clips: Vec::new(),
        };
        assert!(matches!(
            dba.validate(),
            Err(crate::error::WriteDbaError::UngroupedTracks {
                category: "key time",
                index: 1
            })
        ));
    }
}
