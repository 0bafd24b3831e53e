//! Client metrics.

pub const METRIC_SESSIONS_OPENED: &str = "tessera_client_sessions_opened";
pub const METRIC_OPERATIONS: &str = "tessera_client_operations";
pub const METRIC_ACTIVE_CONTEXTS: &str = "tessera_client_active_contexts";

/// Register the client's metrics with the installed metrics recorder.
///
/// The client records metrics regardless; registration only attaches units & descriptions.
pub fn register_client_metrics() {
    metrics::register_counter!(METRIC_SESSIONS_OPENED, metrics::Unit::Count, "the number of primitive sessions opened");
    metrics::register_counter!(METRIC_OPERATIONS, metrics::Unit::Count, "the number of primitive operations issued");
    metrics::register_gauge!(METRIC_ACTIVE_CONTEXTS, metrics::Unit::Count, "the number of live primitive execution contexts");
}
