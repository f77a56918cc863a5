//! Logging facilities for Horizon Observe.
//!
//! Horizon Observe uses the `tracing` crate for instrumentation. To see
//! logs, install a tracing subscriber in your application:
//!
//! ```ignore
//! use tracing_subscriber;
//!
//! fn main() {
//!     tracing_subscriber::fmt::init();
//!
//!     // Your application code...
//! }
//! ```
//!
//! Dispatch paths log at `trace` level; recoverable degradations (such as a
//! dispatch falling back to the calling thread because its owner is gone)
//! log at `warn`.

/// Target names for log filtering.
///
/// Use these with `tracing` directives to filter logs by subsystem, e.g.
/// `RUST_LOG=horizon_observe_core::event=trace`.
pub mod targets {
    /// Core crate target.
    pub const CORE: &str = "horizon_observe_core";
    /// Multicast event dispatch.
    pub const EVENT: &str = "horizon_observe_core::event";
    /// Change-notification set protocol.
    pub const NOTIFY: &str = "horizon_observe_core::notify";
    /// Disposal lifecycle.
    pub const DISPOSE: &str = "horizon_observe_core::dispose";
    /// Owner-thread delivery.
    pub const OWNER: &str = "horizon_observe_core::owner";
    /// Synchronized sequence (umbrella crate).
    pub const SEQUENCE: &str = "horizon_observe::sequence";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_targets_share_the_crate_prefix() {
        for target in [
            targets::CORE,
            targets::EVENT,
            targets::NOTIFY,
            targets::DISPOSE,
            targets::OWNER,
            targets::SEQUENCE,
        ] {
            assert!(target.starts_with("horizon_observe"));
        }
    }
}
