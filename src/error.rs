//! Defines the ways handling a batch can fail.

use reqwest::StatusCode;
use thiserror::Error;

/// The batch payload is not a well-formed change notification batch.
#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("batch payload is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("unexpected batch payload shape: {0}")]
    Shape(String),
}

/// A record's resource URI doesn't contain the configured server path.
#[derive(Error, Debug, PartialEq)]
#[error("uri {uri:?} doesn't contain the server path {serverpath:?}")]
pub struct MalformedUriError {
    pub uri: String,
    pub serverpath: String,
}

/// The provisioning API didn't accept a container group.
#[derive(Error, Debug)]
pub enum SubmissionError {
    #[error("couldn't obtain a management API token: {0}")]
    Credential(String),

    #[error("request to the management API failed")]
    Transport(#[from] reqwest::Error),

    #[error("management API rejected the request: {0} {1}")]
    Rejected(StatusCode, String),
}

/// Errors that abort the handling of a batch.
#[derive(Error, Debug)]
pub enum HandlerError {
    #[error("couldn't decode batch")]
    Decode(#[from] DecodeError),

    #[error("couldn't submit container group {name:?} for {filename:?}")]
    Submission {
        name: String,
        filename: String,
        #[source]
        source: SubmissionError,
    },
}
