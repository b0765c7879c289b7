use thiserror::Error;

/// Per-item transfer failures. These are recovered at the item level:
/// the run continues and the error string lands in the failure ledger.
#[derive(Error, Debug)]
pub enum TransferError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("server returned status {0}")]
    Status(reqwest::StatusCode),
}
