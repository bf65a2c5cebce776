use std::path::PathBuf;

use dba_lib::error::WriteDbaError;
use thiserror::Error;

use crate::Channel;

#[derive(Debug, Error)]
pub enum EncodeError {
    #[error("{channel} key times for bone {bone_name:?} are not strictly increasing at key {index}")]
    NonMonotonicKeyTimes {
        bone_name: String,
        channel: Channel,
        index: usize,
    },

    #[error("{channel} key time {time} for bone {bone_name:?} cannot be stored exactly")]
    KeyTimeOutOfRange {
        bone_name: String,
        channel: Channel,
        time: u32,
    },
}

#[derive(Debug, Error)]
pub enum SerializeError {
    #[error("error creating output directory {path:?}")]
    CreateDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("error writing database")]
    Write(#[from] WriteDbaError),

    #[error("error writing database file")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("error reading file")]
    Io(#[from] std::io::Error),

    #[cfg(feature = "serde")]
    #[error("error parsing JSON")]
    Json(#[from] serde_json::Error),
}
