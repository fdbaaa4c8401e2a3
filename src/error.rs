use thiserror::Error;

/// Status code carried by faults raised before or instead of an HTTP response.
pub const LOCAL_FAULT_CODE: i32 = -1;

/// Failure to obtain a page from the catalog API.
///
/// `code` is the HTTP status when the server answered, or
/// [`LOCAL_FAULT_CODE`] for timeouts, connection failures and bodies that
/// could not be decoded.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("transport error {code}: {message}")]
pub struct TransportError {
    pub code: i32,
    pub message: String,
}

impl TransportError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    /// Wrap a local fault (anything that is not an HTTP status).
    pub fn local(err: impl std::fmt::Display) -> Self {
        Self::new(LOCAL_FAULT_CODE, format!("Something went wrong: {}", err))
    }

    pub fn is_local(&self) -> bool {
        self.code == LOCAL_FAULT_CODE
    }
}
