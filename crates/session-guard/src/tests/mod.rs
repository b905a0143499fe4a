//! Behavioural tests for the session core.
//!
//! - `single_flight.rs` - concurrent refresh sharing and rotation
//! - `expiration.rs`    - session-loss coordination, debounce and logout suppression
//! - `bootstrap.rs`     - startup restore
//! - `authorized.rs`    - refresh-and-retry around API calls
//! - `poller.rs`        - bounded purchase completion polling
//!
//! Timing tests run on a paused tokio clock, so the 500ms / 2s / 10s windows
//! elapse instantly and deterministically.

mod bootstrap;
mod single_flight;
