/// A report line that could not be split into tokens.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LineError {
    /// The line ends inside an escape sequence or a quoted field.
    #[error("malformed line: {reason}")]
    MalformedLine { reason: String },
}

impl LineError {
    pub fn malformed(reason: impl Into<String>) -> Self {
        LineError::MalformedLine {
            reason: reason.into(),
        }
    }
}

/// Errors raised while building a [`crate::PartyRegistry`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    #[error("party registry is empty")]
    Empty,

    #[error("party registry entry {index} has an empty code")]
    EmptyCode { index: usize },

    #[error("party code '{code}' appears more than once in the registry")]
    DuplicateCode { code: String },
}
