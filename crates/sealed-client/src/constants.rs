//! Wire constants shared with the API server
//!
//! Header names are fixed by the server contract. Error sentinels are the
//! `errorCode` values the client assigns to failures that never produced a
//! server body.

/// Session identifier, stable for the lifetime of one client instance
pub const SESSION_ID_HEADER: &str = "x-session-id";

/// Fresh identifier generated for every attempt
pub const REQUEST_ID_HEADER: &str = "x-request-id";

pub const API_KEY_HEADER: &str = "x-api-key";

/// Alternate name for the bearer credential (selectable per client)
pub const AUTH_TOKEN_HEADER: &str = "x-auth-token";

/// Default name for the bearer credential
pub const ACCESS_TOKEN_HEADER: &str = "x-access-token";

/// Server public key the request body was sealed for
pub const ENCRYPTION_KEY_HEADER: &str = "x-encryption-key";

pub const CLIENT_ID_HEADER: &str = "x-client-id";

/// Response-only: rotated refresh token
pub const REFRESH_TOKEN_HEADER: &str = "x-refresh-token";

/// Client identifier used when none is configured
pub const DEFAULT_CLIENT_ID: &str = "web";

/// Server `errorCode` signalling that it no longer holds the private key
/// matching the client's public key
pub const KEY_MISSING_ERROR_CODE: &str = "ApiCrypto::PRIVATE_KEY_NOT_FOUND";

/// `errorCode` for requests that were sent but got no response
pub const NETWORK_ERROR_CODE: &str = "NETWORK_ERROR";

/// `errorCode` for calls cancelled by the caller
pub const CANCELLED_ERROR_CODE: &str = "REQUEST_CANCELLED";

/// `errorCode` for failures with neither request nor response
pub const UNKNOWN_ERROR_CODE: &str = "UNKNOWN_ERROR";

/// `statusCode` sentinel: no response received
pub const NO_RESPONSE_STATUS: i32 = -1;

/// `statusCode` sentinel: neither request nor response available
pub const UNKNOWN_STATUS: i32 = -2;
