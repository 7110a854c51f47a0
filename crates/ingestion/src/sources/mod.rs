//! Byte sources feeding the ingest loop

mod replay;
mod synthetic;
mod tcp;

pub use replay::{ReplayByteSource, ReplayConfig};
pub use synthetic::SyntheticByteSource;
pub use tcp::TcpByteSource;
