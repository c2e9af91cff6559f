//! FIFU Testing Framework
//!
//! Mock plugins and helpers for exercising the router and gateway without
//! any network transport.

pub mod converter;
pub mod protocol;

pub use converter::MockConverter;
pub use protocol::MockProtocol;

use std::time::{Duration, Instant};

/// Poll `condition` until it holds or `timeout` elapses. Returns whether it
/// held.
pub fn wait_for<F>(timeout: Duration, mut condition: F) -> bool
where
    F: FnMut() -> bool,
{
    let deadline = Instant::now() + timeout;
    loop {
        if condition() {
            return true;
        }
        if Instant::now() >= deadline {
            return false;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
}
