#[derive(Debug, strum::EnumIter)]
pub enum ErrorKind {
    InvalidInput(String),
    InvalidConfig(String),
    StructuralMismatch(String),
    SerializeError(String),
    InternalError(String),
}

/// Indexing failures never surface as transport errors to the block-save
/// orchestrator; rich errors are returned using this object so the caller
/// can decide between retrying the whole block and skipping it.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Error {
    /// Code is an indexer-specific error code. If desired, this code can be
    /// equivalent to an HTTP status code.
    pub code: u32,

    /// Message is an indexer-specific error message.
    pub message: String,

    /// An error is retriable if the same block may index successfully if
    /// submitted again.
    pub retriable: bool,
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let retriable = if self.retriable { " (retriable)" } else { "" };
        write!(f, "Error #{}{}: {}", self.code, retriable, self.message)
    }
}

impl std::error::Error for Error {}

impl Error {
    pub fn from_error_kind(err: ErrorKind) -> Self {
        match err {
            ErrorKind::InvalidInput(message) => Self {
                code: 400,
                message: format!("Invalid Input: {}", message),
                retriable: false,
            },
            ErrorKind::InvalidConfig(message) => Self {
                code: 500,
                message: format!("Invalid Config: {}", message),
                retriable: false,
            },
            ErrorKind::StructuralMismatch(message) => Self {
                code: 500,
                message: format!("Structural Mismatch: {}", message),
                retriable: true,
            },
            ErrorKind::SerializeError(message) => Self {
                code: 500,
                message: format!("Serialization failure: {}", message),
                retriable: false,
            },
            ErrorKind::InternalError(message) => Self {
                code: 500,
                message: format!("Internal Error: {}", message),
                retriable: true,
            },
        }
    }
}

impl<T> From<T> for Error
where
    T: Into<ErrorKind>,
{
    fn from(err: T) -> Self {
        Self::from_error_kind(err.into())
    }
}

impl From<serde_json::Error> for ErrorKind {
    fn from(error: serde_json::Error) -> Self {
        Self::SerializeError(format!("{:#?}", error))
    }
}

impl From<Box<bincode::ErrorKind>> for ErrorKind {
    fn from(error: Box<bincode::ErrorKind>) -> Self {
        Self::SerializeError(format!("{:#?}", error))
    }
}

impl From<bech32::Error> for ErrorKind {
    fn from(error: bech32::Error) -> Self {
        Self::InvalidInput(format!("Could not parse address: {:#?}", error))
    }
}

impl From<hex::FromHexError> for ErrorKind {
    fn from(error: hex::FromHexError) -> Self {
        Self::InvalidInput(format!("Could not parse hex hash: {:#?}", error))
    }
}
