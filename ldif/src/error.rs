use std::io;

#[derive(Debug, thiserror::Error)]
pub enum LdifError {
    #[error("format error at line {line}: {message}")]
    Format { line: u64, message: String },

    #[error("invalid base64 value at line {line}")]
    Base64Decode { line: u64 },

    #[error("changetype value {0:?} is invalid")]
    InvalidChangeType(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl LdifError {
    pub(crate) fn format(line: u64, message: impl Into<String>) -> LdifError {
        LdifError::Format {
            line,
            message: message.into(),
        }
    }

    /// True for errors caused by malformed input data, which lenient
    /// parsing may report and skip.  I/O errors never qualify.
    pub fn is_format_error(&self) -> bool {
        matches!(
            self,
            LdifError::Format { .. } | LdifError::Base64Decode { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, LdifError>;
