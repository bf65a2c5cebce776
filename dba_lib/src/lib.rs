//! A library for reading and writing compressed animation databases.
//!
//! # Getting Started
//! The root of the file is [Dba](crate::dba::Dba).
//! Files may be little or big endian. Reading detects the byte order from the version.
//!
//! ```rust no_run
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! // Read from disk.
//! let dba = dba_lib::dba::Dba::from_file("animations.dba")?;
//! println!("{}", dba.clips.len());
//!
//! // Save to disk after making any changes.
//! dba.write_to_file("out.dba", binrw::Endian::Big)?;
//! # Ok(())
//! # }
//! ```
//!
//! # Design
//! dba_lib only handles the binary layout. Tracks are stored already encoded and
//! deduplicated, and no attempt is made to check that controller indices are in range.
//! Compressing animations and building databases is handled by higher level libraries like dba_model.
use std::{
    io::{BufWriter, Cursor, Read, Seek, Write},
    path::Path,
};

use binrw::{BinRead, BinWrite, Endian};

use dba::Dba;
use error::{ReadDbaError, WriteDbaError};

pub mod dba;
pub mod error;
pub mod format;
pub mod hash;

/// The largest output size addressable by 32-bit offsets.
pub const MAX_FILE_SIZE: u64 = u32::MAX as u64;

impl Dba {
    pub fn read<R: Read + Seek>(reader: &mut R, endian: Endian) -> Result<Self, ReadDbaError> {
        Self::read_options(reader, endian, ()).map_err(Into::into)
    }

    /// Read from `path` using a fully buffered reader for performance.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ReadDbaError> {
        Self::from_bytes(std::fs::read(path)?)
    }

    /// Read from `bytes` using the byte order of the version field.
    pub fn from_bytes<T: AsRef<[u8]>>(bytes: T) -> Result<Self, ReadDbaError> {
        let bytes = bytes.as_ref();
        let endian = Self::detect_endian(bytes).ok_or_else(|| {
            let version = bytes
                .get(4..8)
                .and_then(|b| b.try_into().ok())
                .map(u32::from_le_bytes)
                .unwrap_or_default();
            ReadDbaError::UnsupportedVersion(version)
        })?;
        Self::read(&mut Cursor::new(bytes), endian)
    }

    pub fn write<W: Write + Seek>(&self, writer: &mut W, endian: Endian) -> Result<(), WriteDbaError> {
        self.validate()?;
        self.write_options(writer, endian, ())?;

        let size = writer.stream_position()?;
        if size > MAX_FILE_SIZE {
            return Err(WriteDbaError::FileTooLarge(size));
        }
        Ok(())
    }

    pub fn to_bytes(&self, endian: Endian) -> Result<Vec<u8>, WriteDbaError> {
        let mut writer = Cursor::new(Vec::new());
        self.write(&mut writer, endian)?;
        Ok(writer.into_inner())
    }

    /// Write to `path` using a buffered writer for better performance.
    pub fn write_to_file<P: AsRef<Path>>(&self, path: P, endian: Endian) -> Result<(), WriteDbaError> {
        // Oversized outputs never create a file.
        let bytes = self.to_bytes(endian)?;
        let mut writer = BufWriter::new(std::fs::File::create(path)?);
        writer.write_all(&bytes)?;
        writer.flush()?;
        Ok(())
    }
}
