// Error handling for COMTRADE parsing

use thiserror::Error;

pub type Result<T> = std::result::Result<T, ComtradeError>;

/// Which of the two input files an error came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Cfg,
    Dat,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Stage::Cfg => f.write_str("CFG"),
            Stage::Dat => f.write_str("DAT"),
        }
    }
}

#[derive(Error, Debug)]
pub enum ComtradeError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid {what} at line {line}: {text}")]
    Format {
        line: usize,
        what: &'static str,
        text: String,
    },

    #[error("unsupported COMTRADE version: {0}")]
    UnsupportedRevision(String),

    #[error("unsupported data file type: {0}")]
    UnsupportedDataFileType(String),

    #[error("unexpected extra line {line}: {text}")]
    UnexpectedTrailingLine { line: usize, text: String },

    #[error("sample line {line}: {message}")]
    Sample { line: usize, message: String },

    #[error("record {record} truncated: expected {expected} bytes, got {available}")]
    TruncatedRecord {
        record: usize,
        expected: usize,
        available: usize,
    },

    #[error("failed to parse {stage} data: {source}")]
    Stage {
        stage: Stage,
        #[source]
        source: Box<ComtradeError>,
    },
}

impl ComtradeError {
    pub(crate) fn format(line: usize, what: &'static str, text: impl Into<String>) -> Self {
        ComtradeError::Format {
            line,
            what,
            text: text.into(),
        }
    }

    pub fn in_stage(self, stage: Stage) -> Self {
        ComtradeError::Stage {
            stage,
            source: Box::new(self),
        }
    }

    /// Stable code for API clients.
    pub fn code(&self) -> &'static str {
        match self {
            ComtradeError::Io(_) => "IO_ERROR",
            ComtradeError::UnsupportedRevision(_) => "VERSION_UNSUPPORTED",
            ComtradeError::UnsupportedDataFileType(_) => "DATA_TYPE_UNSUPPORTED",
            ComtradeError::Stage { stage, source } => match source.as_ref() {
                ComtradeError::UnsupportedRevision(_) | ComtradeError::UnsupportedDataFileType(_) => {
                    source.code()
                }
                _ => match stage {
                    Stage::Cfg => "CFG_PARSE_FAILED",
                    Stage::Dat => "DAT_PARSE_FAILED",
                },
            },
            ComtradeError::Format { .. }
            | ComtradeError::UnexpectedTrailingLine { .. }
            | ComtradeError::Sample { .. }
            | ComtradeError::TruncatedRecord { .. } => "FORMAT_INVALID",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_codes() {
        let err = ComtradeError::format(3, "analog channel", "1,Ia").in_stage(Stage::Cfg);
        assert_eq!(err.code(), "CFG_PARSE_FAILED");
        assert!(err.to_string().starts_with("failed to parse CFG data"));

        let err = ComtradeError::UnsupportedDataFileType("hex".into()).in_stage(Stage::Dat);
        assert_eq!(err.code(), "DATA_TYPE_UNSUPPORTED");
    }
}
