//! Domain error types.

/// Top-level error type for meanrevert.
#[derive(Debug, thiserror::Error)]
pub enum MeanRevertError {
    #[error("insufficient data for {symbol}: have {points} points, need {window}")]
    InsufficientData {
        symbol: String,
        points: usize,
        window: usize,
    },

    #[error("invalid configuration: {reason}")]
    InvalidConfig { reason: String },

    #[error("invalid position quantity {quantity}: must be positive")]
    InvalidQuantity { quantity: i64 },

    #[error("unknown position id {id}")]
    UnknownPosition { id: u64 },

    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("missing config key [{section}] {key}")]
    ConfigMissing { section: String, key: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error("market data error: {reason}")]
    DataSource { reason: String },

    #[error("database error: {reason}")]
    Database { reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl MeanRevertError {
    pub(crate) fn invalid_config(reason: impl Into<String>) -> Self {
        MeanRevertError::InvalidConfig {
            reason: reason.into(),
        }
    }
}

impl From<&MeanRevertError> for std::process::ExitCode {
    fn from(err: &MeanRevertError) -> Self {
        let code: u8 = match err {
            MeanRevertError::Io(_) => 1,
            MeanRevertError::InvalidConfig { .. }
            | MeanRevertError::ConfigParse { .. }
            | MeanRevertError::ConfigMissing { .. }
            | MeanRevertError::ConfigInvalid { .. } => 2,
            MeanRevertError::DataSource { .. } | MeanRevertError::Database { .. } => 3,
            MeanRevertError::InvalidQuantity { .. } | MeanRevertError::UnknownPosition { .. } => 4,
            MeanRevertError::InsufficientData { .. } => 5,
        };
        std::process::ExitCode::from(code)
    }
}
