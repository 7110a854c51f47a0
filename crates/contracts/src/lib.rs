//! # Contracts
//!
//! Frozen interface contracts (ICD) shared by every crate in the radar fusion pipeline.
//! Business crates depend only on this crate, reverse dependencies are prohibited.
//!
//! ## Time Model
//! - Timestamps are monotonic seconds (f64) measured from pipeline start
//! - `frame_number` comes from the radar header and is used for diagnostics only

mod blueprint;
mod byte_source;
mod clock;
mod error;
mod fused;
mod sensor_id;
mod sink;
mod track;
pub mod wire;

pub use blueprint::*;
pub use byte_source::{ByteSource, LocalByteSource};
pub use clock::PipelineClock;
pub use error::*;
pub use fused::*;
pub use sensor_id::SensorId;
pub use sink::*;
pub use track::*;
