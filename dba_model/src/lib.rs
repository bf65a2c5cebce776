//! # dba_model
//! dba_model compresses skeletal animation clips and deduplicates their tracks into a single database.
//!
//! # Getting Started
//! Each [Clip] is compressed independently using the per bone policies of a [CompressionConfig].
//! The compressed tracks are then added to a [Database] that stores identical tracks only once.
//!
//! ```rust no_run
//! use dba_model::{CompressionConfig, Skeleton, compress::build_database, database::SerializeOptions};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! # let clips: Vec<dba_model::Clip> = Vec::new();
//! # let skeleton = Skeleton { bones: Vec::new() };
//! let config = CompressionConfig::default();
//! let database = build_database(&clips, &skeleton, &config);
//! database.serialize("animations.dba", &SerializeOptions::default())?;
//! # Ok(())
//! # }
//! ```
//!
//! # Coordinate System
//! Positions use Z up with Y as the forward direction for root motion.
//! Rotations are unit quaternions. Times are in ticks.

pub use clip::{BlendMode, Clip};
pub use config::CompressionConfig;
pub use database::Database;
pub use skeleton::{Bone, Skeleton};
pub use transform::Transform;

pub mod clip;
pub mod compress;
pub mod config;
pub mod database;
pub mod encode;
pub mod error;
pub mod foot_plant;
pub mod policy;
pub mod quantize;
pub mod reduce;
pub mod root_motion;
pub mod skeleton;
pub mod transform;

/// An animated channel of a controller.
#[derive(Debug, PartialEq, Eq, Clone, Copy, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum Channel {
    Rotation,
    Position,
}
