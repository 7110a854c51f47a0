//! Dispatcher error types

use contracts::SinkType;
use thiserror::Error;

/// Failures while wiring sinks, nothing here is raised per frame
#[derive(Debug, Error)]
pub enum DispatcherError {
    /// A configured sink could not be opened (bad params, unwritable path, bind failure)
    #[error("cannot open {kind:?} sink '{name}': {reason}")]
    SinkOpen {
        name: String,
        kind: SinkType,
        reason: String,
    },

    /// Two sinks share a name, their metrics would collide
    #[error("sink name '{0}' is configured more than once")]
    DuplicateSink(String),
}

impl DispatcherError {
    pub fn sink_open(name: impl Into<String>, kind: SinkType, reason: impl ToString) -> Self {
        Self::SinkOpen {
            name: name.into(),
            kind,
            reason: reason.to_string(),
        }
    }
}
