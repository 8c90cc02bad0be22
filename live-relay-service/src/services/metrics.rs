//! Relay-specific metrics, recorded through the `metrics` facade.
//!
//! The Prometheus recorder is installed by `service_core::observability`.

use metrics::{counter, gauge};

pub const TOKENS_TOTAL: &str = "live_relay_tokens_total";
pub const SESSIONS_TOTAL: &str = "live_relay_sessions_total";
pub const ACTIVE_SESSIONS: &str = "live_relay_active_sessions";
pub const TURNS_FORWARDED_TOTAL: &str = "live_relay_turns_forwarded_total";
pub const EVENTS_FORWARDED_TOTAL: &str = "live_relay_events_forwarded_total";

pub fn record_token(mode: &'static str, status: &'static str) {
    counter!(TOKENS_TOTAL, "mode" => mode, "status" => status).increment(1);
}

pub fn record_session(outcome: &'static str) {
    counter!(SESSIONS_TOTAL, "outcome" => outcome).increment(1);
}

pub fn session_opened() {
    gauge!(ACTIVE_SESSIONS).increment(1.0);
}

pub fn session_closed() {
    gauge!(ACTIVE_SESSIONS).decrement(1.0);
}

pub fn record_turn_forwarded() {
    counter!(TURNS_FORWARDED_TOTAL).increment(1);
}

pub fn record_event_forwarded(kind: &'static str) {
    counter!(EVENTS_FORWARDED_TOTAL, "kind" => kind).increment(1);
}
