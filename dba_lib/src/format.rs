//! Track value and key time encodings.
//!
//! Each stored track has a fixed encoding chosen at compression time.
//! The format tags are never stored per track.
//! Tracks are grouped by format in the file and the per format counts
//! are stored as a histogram instead.
use binrw::{BinRead, BinResult, BinWrite, Endian, VecArgs};
use strum::{EnumCount, EnumIter, FromRepr};

/// The encoding for each rotation key.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, EnumIter, EnumCount, FromRepr,
)]
#[repr(u8)]
pub enum RotationFormat {
    /// Four 32-bit floats in xyzw order.
    NoCompress = 0,
    /// Smallest three encoding with 15 bits per component.
    SmallTree48Bit = 1,
    /// Smallest three encoding with 20 bits per component.
    SmallTree64Bit = 2,
    /// Smallest three encoding with 21, 21, and 20 bits per component.
    SmallTree64BitExt = 3,
}

impl RotationFormat {
    /// The size in bytes of a single key.
    pub const fn key_size(self) -> usize {
        match self {
            RotationFormat::NoCompress => 16,
            RotationFormat::SmallTree48Bit => 6,
            RotationFormat::SmallTree64Bit => 8,
            RotationFormat::SmallTree64BitExt => 8,
        }
    }
}

/// The encoding for each position key.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, EnumIter, EnumCount, FromRepr,
)]
#[repr(u8)]
pub enum PositionFormat {
    /// Three 32-bit floats in xyz order.
    NoCompress = 0,
}

impl PositionFormat {
    /// The size in bytes of a single key.
    pub const fn key_size(self) -> usize {
        match self {
            PositionFormat::NoCompress => 12,
        }
    }
}

/// The encoding for the times of each key in ticks.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, EnumIter, EnumCount, FromRepr,
)]
#[repr(u8)]
pub enum KeyTimeFormat {
    F32 = 0,
    U16 = 1,
    U8 = 2,
    /// Start and end tick followed by one bit for each tick in the range.
    Bitset = 3,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RotationTrack {
    NoCompress(Vec<[f32; 4]>),
    SmallTree48Bit(Vec<[u16; 3]>),
    SmallTree64Bit(Vec<u64>),
    SmallTree64BitExt(Vec<u64>),
}

impl RotationTrack {
    pub fn format(&self) -> RotationFormat {
        match self {
            RotationTrack::NoCompress(_) => RotationFormat::NoCompress,
            RotationTrack::SmallTree48Bit(_) => RotationFormat::SmallTree48Bit,
            RotationTrack::SmallTree64Bit(_) => RotationFormat::SmallTree64Bit,
            RotationTrack::SmallTree64BitExt(_) => RotationFormat::SmallTree64BitExt,
        }
    }

    pub fn key_count(&self) -> usize {
        match self {
            RotationTrack::NoCompress(v) => v.len(),
            RotationTrack::SmallTree48Bit(v) => v.len(),
            RotationTrack::SmallTree64Bit(v) => v.len(),
            RotationTrack::SmallTree64BitExt(v) => v.len(),
        }
    }

    /// The size in bytes of the packed values without padding.
    pub fn byte_size(&self) -> usize {
        self.format().key_size() * self.key_count()
    }
}

impl BinRead for RotationTrack {
    type Args<'a> = (RotationFormat, usize);

    fn read_options<R: std::io::Read + std::io::Seek>(
        reader: &mut R,
        endian: Endian,
        (format, count): Self::Args<'_>,
    ) -> BinResult<Self> {
        Ok(match format {
            RotationFormat::NoCompress => Self::NoCompress(read_vec(reader, endian, count)?),
            RotationFormat::SmallTree48Bit => {
                Self::SmallTree48Bit(read_vec(reader, endian, count)?)
            }
            RotationFormat::SmallTree64Bit => Self::SmallTree64Bit(read_vec(reader, endian, count)?),
            RotationFormat::SmallTree64BitExt => {
                Self::SmallTree64BitExt(read_vec(reader, endian, count)?)
            }
        })
    }
}

impl BinWrite for RotationTrack {
    type Args<'a> = ();

    fn write_options<W: std::io::Write + std::io::Seek>(
        &self,
        writer: &mut W,
        endian: Endian,
        _args: Self::Args<'_>,
    ) -> BinResult<()> {
        match self {
            RotationTrack::NoCompress(v) => v.write_options(writer, endian, ()),
            RotationTrack::SmallTree48Bit(v) => v.write_options(writer, endian, ()),
            RotationTrack::SmallTree64Bit(v) => v.write_options(writer, endian, ()),
            RotationTrack::SmallTree64BitExt(v) => v.write_options(writer, endian, ()),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum PositionTrack {
    NoCompress(Vec<[f32; 3]>),
}

impl PositionTrack {
    pub fn format(&self) -> PositionFormat {
        match self {
            PositionTrack::NoCompress(_) => PositionFormat::NoCompress,
        }
    }

    pub fn key_count(&self) -> usize {
        match self {
            PositionTrack::NoCompress(v) => v.len(),
        }
    }

    /// The size in bytes of the packed values without padding.
    pub fn byte_size(&self) -> usize {
        self.format().key_size() * self.key_count()
    }
}

impl BinRead for PositionTrack {
    type Args<'a> = (PositionFormat, usize);

    fn read_options<R: std::io::Read + std::io::Seek>(
        reader: &mut R,
        endian: Endian,
        (format, count): Self::Args<'_>,
    ) -> BinResult<Self> {
        Ok(match format {
            PositionFormat::NoCompress => Self::NoCompress(read_vec(reader, endian, count)?),
        })
    }
}

impl BinWrite for PositionTrack {
    type Args<'a> = ();

    fn write_options<W: std::io::Write + std::io::Seek>(
        &self,
        writer: &mut W,
        endian: Endian,
        _args: Self::Args<'_>,
    ) -> BinResult<()> {
        match self {
            PositionTrack::NoCompress(v) => v.write_options(writer, endian, ()),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum KeyTimeTrack {
    F32(Vec<f32>),
    U16(Vec<u16>),
    U8(Vec<u8>),
    /// Bit `i` of `bits` marks a key at tick `start + i`.
    /// Bits are stored least significant bit first in each word.
    Bitset {
        start: u16,
        end: u16,
        bits: Vec<u16>,
    },
}

impl KeyTimeTrack {
    pub fn format(&self) -> KeyTimeFormat {
        match self {
            KeyTimeTrack::F32(_) => KeyTimeFormat::F32,
            KeyTimeTrack::U16(_) => KeyTimeFormat::U16,
            KeyTimeTrack::U8(_) => KeyTimeFormat::U8,
            KeyTimeTrack::Bitset { .. } => KeyTimeFormat::Bitset,
        }
    }

    pub fn key_count(&self) -> usize {
        match self {
            KeyTimeTrack::F32(v) => v.len(),
            KeyTimeTrack::U16(v) => v.len(),
            KeyTimeTrack::U8(v) => v.len(),
            KeyTimeTrack::Bitset { bits, .. } => {
                bits.iter().map(|w| w.count_ones() as usize).sum()
            }
        }
    }

    /// The size in bytes of the packed times without padding.
    pub fn byte_size(&self) -> usize {
        match self {
            KeyTimeTrack::F32(v) => v.len() * 4,
            KeyTimeTrack::U16(v) => v.len() * 2,
            KeyTimeTrack::U8(v) => v.len(),
            KeyTimeTrack::Bitset { bits, .. } => 4 + bits.len() * 2,
        }
    }

    /// The time in ticks for each key.
    pub fn times(&self) -> Vec<f32> {
        match self {
            KeyTimeTrack::F32(v) => v.clone(),
            KeyTimeTrack::U16(v) => v.iter().map(|t| *t as f32).collect(),
            KeyTimeTrack::U8(v) => v.iter().map(|t| *t as f32).collect(),
            KeyTimeTrack::Bitset { start, end, bits } => (0..=end.saturating_sub(*start) as usize)
                .filter(|i| bits.get(i / 16).is_some_and(|w| w & (1 << (i % 16)) != 0))
                .map(|i| (*start as usize + i) as f32)
                .collect(),
        }
    }
}

/// The number of 16-bit words needed to mark every tick in `[start, end]`.
pub fn bitset_word_count(start: u16, end: u16) -> usize {
    end.saturating_sub(start) as usize / 16 + 1
}

impl BinRead for KeyTimeTrack {
    type Args<'a> = (KeyTimeFormat, usize);

    fn read_options<R: std::io::Read + std::io::Seek>(
        reader: &mut R,
        endian: Endian,
        (format, count): Self::Args<'_>,
    ) -> BinResult<Self> {
        Ok(match format {
            KeyTimeFormat::F32 => Self::F32(read_vec(reader, endian, count)?),
            KeyTimeFormat::U16 => Self::U16(read_vec(reader, endian, count)?),
            KeyTimeFormat::U8 => Self::U8(read_vec(reader, endian, count)?),
            KeyTimeFormat::Bitset => {
                let start = u16::read_options(reader, endian, ())?;
                let end = u16::read_options(reader, endian, ())?;
                let bits = read_vec(reader, endian, bitset_word_count(start, end))?;
                Self::Bitset { start, end, bits }
            }
        })
    }
}

impl BinWrite for KeyTimeTrack {
    type Args<'a> = ();

    fn write_options<W: std::io::Write + std::io::Seek>(
        &self,
        writer: &mut W,
        endian: Endian,
        _args: Self::Args<'_>,
    ) -> BinResult<()> {
        match self {
            KeyTimeTrack::F32(v) => v.write_options(writer, endian, ()),
            KeyTimeTrack::U16(v) => v.write_options(writer, endian, ()),
            KeyTimeTrack::U8(v) => v.write_options(writer, endian, ()),
            KeyTimeTrack::Bitset { start, end, bits } => {
                start.write_options(writer, endian, ())?;
                end.write_options(writer, endian, ())?;
                bits.write_options(writer, endian, ())
            }
        }
    }
}

fn read_vec<T, R>(reader: &mut R, endian: Endian, count: usize) -> BinResult<Vec<T>>
where
    for<'a> T: BinRead<Args<'a> = ()> + 'static,
    R: std::io::Read + std::io::Seek,
{
    <Vec<T>>::read_options(reader, endian, VecArgs { count, inner: () })
}

#[cfg(test)]
mod tests {
    use super::*;

    use binrw::BinWriterExt;
    use hexlit::hex;
    use std::io::Cursor;

    #[test]
    fn key_sizes() {
        assert_eq!(16, RotationFormat::NoCompress.key_size());
        assert_eq!(6, RotationFormat::SmallTree48Bit.key_size());
        assert_eq!(8, RotationFormat::SmallTree64Bit.key_size());
        assert_eq!(8, RotationFormat::SmallTree64BitExt.key_size());
        assert_eq!(12, PositionFormat::NoCompress.key_size());
    }

    #[test]
    fn bitset_times() {
        // Ticks 2, 3, 5, and 19.
        let track = KeyTimeTrack::Bitset {
            start: 2,
            end: 19,
            bits: vec![0b1011, 0b10],
        };
        assert_eq!(4, track.key_count());
        assert_eq!(vec![2.0, 3.0, 5.0, 19.0], track.times());
        assert_eq!(8, track.byte_size());
    }

    #[test]
    fn bitset_word_counts() {
        assert_eq!(1, bitset_word_count(0, 0));
        assert_eq!(1, bitset_word_count(0, 15));
        assert_eq!(2, bitset_word_count(0, 16));
        assert_eq!(2, bitset_word_count(10, 30));
    }

    #[test]
    fn write_bitset_big_endian() {
        let track = KeyTimeTrack::Bitset {
            start: 1,
            end: 17,
            bits: vec![0x8001, 0x0001],
        };
        let mut writer = Cursor::new(Vec::new());
        writer.write_be(&track).unwrap();
        assert_eq!(hex!(0x00010011 80010001), writer.into_inner()[..]);
    }

    #[test]
    fn read_small_tree_48_little_endian() {
        let mut reader = Cursor::new(hex!(0x01000200 03000400 05000600));
        let track = RotationTrack::read_options(
            &mut reader,
            Endian::Little,
            (RotationFormat::SmallTree48Bit, 2),
        )
        .unwrap();
        assert_eq!(RotationTrack::SmallTree48Bit(vec![[1, 2, 3], [4, 5, 6]]), track);
        assert_eq!(12, track.byte_size());
    }
}
