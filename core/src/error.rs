//! Error types for the Staffomatic client.
//!
//! # Design
//! Pagination and name resolution failures abort the whole call, so each has
//! its own variant. Rejected mutations are not errors: they come back as a
//! `MutationOutcome` carrying the raw status.

use thiserror::Error;

/// Errors returned by `StaffoClient` parse methods, the `Paginator` and the
/// `Session`.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The first request of a fetch was refused (bad credentials, revoked
    /// access, wrong subdomain).
    #[error("authentication failed (HTTP {status}): {body}")]
    Authentication { status: u16, body: String },

    /// A page after the first one came back with a non-success status.
    #[error("page {page} failed (HTTP {status}): {body}")]
    PageFailed { page: u32, status: u16, body: String },

    /// A name is unknown to the local index, or the backend answered 404.
    #[error("not found: {0}")]
    NotFound(String),

    /// A single-record request returned a non-success status other than 404.
    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },

    /// The transport could not complete the round-trip.
    #[error("transport failure: {0}")]
    Transport(String),

    /// The response body could not be deserialized into the expected type.
    #[error("deserialization failed: {0}")]
    Deserialization(String),

    /// The request payload could not be serialized to JSON.
    #[error("serialization failed: {0}")]
    Serialization(String),

    /// The account reported a time zone missing from the tz database.
    #[error("unknown time zone: {0}")]
    UnknownTimezone(String),

    #[error("invalid configuration: {0}")]
    Config(String),
}
