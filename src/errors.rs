use std::collections::BTreeMap;

use thiserror::Error;

/// All errors that can occur when talking to the Incentive Management API.
#[derive(Error, Debug)]
pub enum Error {
    /// The request never completed: connection refused, DNS failure, or the
    /// configured timeout elapsed. The only kind eligible for automatic retry.
    #[error("connection failed: {message}")]
    Connection { message: String },

    /// HTTP 304. The server returns no body on 304, so this is raised before
    /// any JSON handling. `update` folds it into a no-op success.
    #[error("response not modified")]
    NotModified,

    /// The response did not match the vendor's envelope conventions: wrong
    /// content-type, missing collection key, or a record that failed to
    /// decode. The message carries the raw payload for diagnosis. Never
    /// retried, since it indicates a protocol mismatch rather than transience.
    #[error("malformed response: {message}")]
    Malformed { message: String },

    /// The status code fell outside the per-method whitelist and the body
    /// parsed as JSON. Intermediate: every public operation re-classifies
    /// this into a more specific kind before returning.
    #[error("request rejected with status {status}: {body}")]
    Rejected { status: u16, body: serde_json::Value },

    /// Create conflict: another record already holds the same key
    /// (vendor code `TCMP_35004`).
    #[error("resource already exists: {0}")]
    AlreadyExists(String),

    /// One or more required fields were missing on create (vendor code
    /// `TCMP_1002`). Carries the full per-field error map from the server.
    #[error("missing required field(s): {fields:?}")]
    MissingFields { fields: BTreeMap<String, String> },

    /// A required single-result query matched nothing, or an identity
    /// operation was attempted on a resource without a `seq`.
    #[error("not found: {0}")]
    NotFound(String),

    /// The server refused to delete the record, or the resource carries no
    /// `seq` to delete by.
    #[error("delete failed: {0}")]
    DeleteFailed(String),
}

impl Error {
    /// `true` only for [`Error::Connection`]; everything else indicates a
    /// non-transient failure.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::Connection { .. })
    }
}

/// A convenience alias for `Result<T, Error>`.
pub type Result<T> = std::result::Result<T, Error>;
