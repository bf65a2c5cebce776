use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReadDbaError {
    #[error("error reading data: {0}")]
    Io(#[from] std::io::Error),

    #[error("error reading data: {0}")]
    Binrw(#[from] binrw::Error),

    #[error("unsupported database version {0:#010x}")]
    UnsupportedVersion(u32),
}

#[derive(Debug, Error)]
pub enum WriteDbaError {
    #[error("error writing data: {0}")]
    Io(#[from] std::io::Error),

    #[error("error writing data: {0}")]
    Binrw(#[from] binrw::Error),

    #[error("{category} tracks are not grouped by format at track {index}")]
    UngroupedTracks {
        category: &'static str,
        index: usize,
    },

    #[error("{category} track {index} has {key_count} keys which exceeds the 16-bit key count")]
    TooManyKeys {
        category: &'static str,
        index: usize,
        key_count: usize,
    },

    #[error("output size of {0} bytes exceeds the 32-bit size limit")]
    FileTooLarge(u64),
}
