//! Error handling types

use thiserror::Error;

/// Result type alias for operations that can fail
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the rule engine
#[derive(Error, Debug)]
pub enum Error {
    /// A composite condition (AND/OR/CHAIN) had no entries
    #[error("conditions must not be empty")]
    EmptyComposite,

    /// A `From` reference pointed at a template entry that was never produced
    #[error("unable to find context value: {name}")]
    MissingContext {
        /// The `From` name that could not be resolved
        name: String,
    },

    /// A provider leaf returned an error while evaluating a condition
    #[error("provider error: {message}")]
    Provider {
        /// Description of the provider failure
        message: String,
        /// Optional source error
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Rule or ruleset configuration is malformed
    #[error("configuration error: {message}")]
    Configuration {
        /// Description of the configuration error
        message: String,
        /// Optional source error
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Invalid regular expression pattern
    #[error("invalid regex pattern '{pattern}': {message}")]
    InvalidRegex {
        /// The regex pattern that failed to compile
        pattern: String,
        /// The compilation error message
        message: String,
    },

    /// Incident selector expression could not be parsed
    #[error("invalid selector expression '{expression}': {message}")]
    InvalidSelector {
        /// The selector text that failed to parse
        expression: String,
        /// The parse error message
        message: String,
    },

    /// I/O operation error (simple form)
    #[error("I/O error: {source}")]
    IoSimple {
        /// The underlying I/O error
        #[from]
        source: std::io::Error,
    },

    /// I/O operation error (with context)
    #[error("I/O error: {message}")]
    Io {
        /// Description of the I/O error
        message: String,
        /// Optional source error
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// YAML parsing error
    #[error("YAML parsing error: {source}")]
    Yaml {
        /// The underlying YAML error
        #[from]
        source: serde_yaml::Error,
    },

    /// JSON parsing or serialization error
    #[error("JSON parsing error: {source}")]
    Json {
        /// The underlying JSON error
        #[from]
        source: serde_json::Error,
    },

    /// Invalid argument provided to a function
    #[error("invalid argument: {message}")]
    InvalidArgument {
        /// Description of the invalid argument
        message: String,
    },

    /// Internal system error (should not normally occur)
    #[error("internal error: {message}")]
    Internal {
        /// Description of the internal error
        message: String,
    },
}

// Context and provider error creation methods
impl Error {
    /// Create a missing-context error
    pub fn missing_context<S: Into<String>>(name: S) -> Self {
        Self::MissingContext { name: name.into() }
    }

    /// Create a provider error
    pub fn provider<S: Into<String>>(message: S) -> Self {
        Self::Provider {
            message: message.into(),
            source: None,
        }
    }

    /// Create a provider error with source
    pub fn provider_with_source<S: Into<String>, E: std::error::Error + Send + Sync + 'static>(
        message: S,
        source: E,
    ) -> Self {
        Self::Provider {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }
}

// Configuration error creation methods
impl Error {
    /// Create a configuration error
    pub fn configuration<S: Into<String>>(message: S) -> Self {
        Self::Configuration {
            message: message.into(),
            source: None,
        }
    }

    /// Create a configuration error with source
    pub fn configuration_with_source<
        S: Into<String>,
        E: std::error::Error + Send + Sync + 'static,
    >(
        message: S,
        source: E,
    ) -> Self {
        Self::Configuration {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create an invalid regex error
    pub fn invalid_regex<S: Into<String>, M: Into<String>>(pattern: S, message: M) -> Self {
        Self::InvalidRegex {
            pattern: pattern.into(),
            message: message.into(),
        }
    }

    /// Create an invalid selector error
    pub fn invalid_selector<S: Into<String>, M: Into<String>>(expression: S, message: M) -> Self {
        Self::InvalidSelector {
            expression: expression.into(),
            message: message.into(),
        }
    }
}

// I/O and misc error creation methods
impl Error {
    /// Create an I/O error with context
    pub fn io<S: Into<String>>(message: S) -> Self {
        Self::Io {
            message: message.into(),
            source: None,
        }
    }

    /// Create an I/O error with context and source
    pub fn io_with_source<S: Into<String>, E: std::error::Error + Send + Sync + 'static>(
        message: S,
        source: E,
    ) -> Self {
        Self::Io {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create an invalid argument error
    pub fn invalid_argument<S: Into<String>>(message: S) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    /// Create an internal error
    pub fn internal<S: Into<String>>(message: S) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }
}

// Note: this type intentionally stays free of provider-transport-specific
// conversions (HTTP, gRPC, etc.); those belong to whatever crate implements
// a concrete `ProviderClient`.
