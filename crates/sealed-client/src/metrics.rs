//! Client metrics
//!
//! Emitted through the `metrics` facade; the embedding application decides
//! whether and where to export them.
//!
//! - `sealed_client_requests_total` (counter): labels `method`, `outcome`
//! - `sealed_client_request_duration_seconds` (histogram): label `outcome`
//! - `sealed_client_key_exchanges_total` (counter): label `result`
//! - `sealed_client_errors_total` (counter): label `kind`

pub const REQUESTS_TOTAL: &str = "sealed_client_requests_total";
pub const REQUEST_DURATION_SECONDS: &str = "sealed_client_request_duration_seconds";
pub const KEY_EXCHANGES_TOTAL: &str = "sealed_client_key_exchanges_total";
pub const ERRORS_TOTAL: &str = "sealed_client_errors_total";

/// Suggested histogram buckets for `sealed_client_request_duration_seconds`,
/// 5ms to 60s.
pub const DURATION_BUCKETS: &[f64] = &[
    0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0,
];

/// Record one finished logical call. `outcome` is "success" or an error kind label.
pub fn record_request(method: &str, outcome: &'static str, duration_secs: f64) {
    metrics::counter!(REQUESTS_TOTAL, "method" => method.to_string(), "outcome" => outcome)
        .increment(1);
    metrics::histogram!(REQUEST_DURATION_SECONDS, "outcome" => outcome).record(duration_secs);
}

/// Record a key-exchange step: "rotated", "joined", "rejected" or "exhausted".
pub fn record_key_exchange(result: &'static str) {
    metrics::counter!(KEY_EXCHANGES_TOTAL, "result" => result).increment(1);
}

pub fn record_error(kind: &'static str) {
    metrics::counter!(ERRORS_TOTAL, "kind" => kind).increment(1);
}
