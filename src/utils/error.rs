use thiserror::Error;

#[derive(Error, Debug)]
pub enum ClassifyError {
    #[error("Invalid connection address '{address}': {reason}")]
    InvalidAddress { address: String, reason: String },

    #[error("Connection to {address} lost: {message}")]
    ConnectionLost { address: String, message: String },

    #[error("Remote call to {address} timed out after {seconds}s")]
    RemoteTimeout { address: String, seconds: u64 },

    #[error("Remote service raised {name}: {message}")]
    RemoteError { name: String, message: String },

    #[error("Malformed response from {address}: {message}")]
    ProtocolError { address: String, message: String },

    #[error("Shape mismatch: {message}")]
    ShapeMismatch { message: String },

    #[error("Coordinate out of range: {field}={value} (expected {expected})")]
    OutOfRange {
        field: String,
        value: f64,
        expected: String,
    },

    #[error("Light curve is missing required field '{field}'")]
    MissingField { field: String },

    #[error("Unknown band index {index}")]
    UnknownBand { index: i64 },

    #[error("Invalid observation record at line {line}: {message}")]
    InvalidRecord { line: u64, message: String },

    #[error("Light curve {object_id} has no observations")]
    EmptyLightCurve { object_id: String },

    #[error("Unable to load dust map from {path}: {message}")]
    DustMapError { path: String, message: String },

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Invalid configuration value for '{field}' = '{value}': {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("CSV processing error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Configuration,
    Transport,
    Remote,
    Data,
    System,
}

impl ClassifyError {
    /// Only a lost connection is worth retrying; everything else is terminal on first sight.
    pub fn is_transient(&self) -> bool {
        matches!(self, ClassifyError::ConnectionLost { .. })
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            ClassifyError::InvalidAddress { .. }
            | ClassifyError::DustMapError { .. }
            | ClassifyError::ConfigError { .. }
            | ClassifyError::InvalidConfigValueError { .. }
            | ClassifyError::TomlError(_) => ErrorCategory::Configuration,
            ClassifyError::ConnectionLost { .. } | ClassifyError::RemoteTimeout { .. } => {
                ErrorCategory::Transport
            }
            ClassifyError::RemoteError { .. } | ClassifyError::ProtocolError { .. } => {
                ErrorCategory::Remote
            }
            ClassifyError::ShapeMismatch { .. }
            | ClassifyError::OutOfRange { .. }
            | ClassifyError::MissingField { .. }
            | ClassifyError::UnknownBand { .. }
            | ClassifyError::EmptyLightCurve { .. }
            | ClassifyError::InvalidRecord { .. }
            | ClassifyError::CsvError(_) => ErrorCategory::Data,
            ClassifyError::IoError(_) | ClassifyError::SerializationError(_) => {
                ErrorCategory::System
            }
        }
    }

    /// Data errors belong to a single light curve; the host marks them `ERROR` rather than
    /// `EXCEPTION`.
    pub fn is_data_error(&self) -> bool {
        self.category() == ErrorCategory::Data
    }

    pub fn user_friendly_message(&self) -> String {
        match self.category() {
            ErrorCategory::Configuration => format!("Configuration problem: {}", self),
            ErrorCategory::Transport => {
                format!("Classification service unreachable: {}", self)
            }
            ErrorCategory::Remote => format!("Classification service failed: {}", self),
            ErrorCategory::Data => format!("Light curve rejected: {}", self),
            ErrorCategory::System => format!("System error: {}", self),
        }
    }
}

pub type Result<T> = std::result::Result<T, ClassifyError>;
