//! Errors shared across crate boundaries
//!
//! Config errors stop the process before any task starts; sink errors are
//! counted per frame and never stop the pipeline.

use thiserror::Error;

type BoxedSource = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, Error)]
pub enum ContractError {
    /// Config text could not be deserialized
    #[error("config parse error: {message}")]
    ConfigParse {
        message: String,
        #[source]
        source: Option<BoxedSource>,
    },

    /// Config deserialized but breaks a rule, `field` is a dotted path like `radars[left].xlim`
    #[error("invalid config at '{field}': {message}")]
    ConfigValidation { field: String, message: String },

    #[error("sink '{sink_name}' failed to write: {message}")]
    SinkWrite { sink_name: String, message: String },

    /// Sink destination unreachable or unusable (bind, connect, open)
    #[error("sink '{sink_name}' cannot reach its destination: {message}")]
    SinkConnection { sink_name: String, message: String },

    /// Encoded frame does not fit in one datagram
    #[error("sink '{sink_name}': {size} byte payload exceeds the {max} byte limit")]
    PayloadTooLarge {
        sink_name: String,
        size: usize,
        max: usize,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl ContractError {
    pub fn config_parse(message: impl Into<String>) -> Self {
        Self::ConfigParse {
            message: message.into(),
            source: None,
        }
    }

    /// Parse error keeping the deserializer error as source
    pub fn config_parse_from(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::ConfigParse {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    pub fn config_validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ConfigValidation {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn sink_write(sink_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::SinkWrite {
            sink_name: sink_name.into(),
            message: message.into(),
        }
    }

    pub fn sink_connection(sink_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::SinkConnection {
            sink_name: sink_name.into(),
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_message_names_the_field() {
        let err = ContractError::config_validation("radars[left].xlim", "min must be < max");
        assert_eq!(
            err.to_string(),
            "invalid config at 'radars[left].xlim': min must be < max"
        );
    }
}
