use crate::driver::{Driver, ElementHandle};
use std::time::Duration;

pub const FIRST: &str = "1";
pub const SECOND: &str = "2";

/// Flips a two-valued field. Unknown or unreadable values reset to [`FIRST`],
/// so the outcome is defined for any starting state and two runs restore
/// the original value.
#[derive(Debug, Clone, Copy, Default)]
pub struct ToggleEngine;

impl ToggleEngine {
    pub fn compute_next(current: &str) -> &'static str {
        match current.trim() {
            FIRST => SECOND,
            SECOND => FIRST,
            _ => FIRST,
        }
    }

    /// Read the field's current value within `timeout`. Any failure reads as
    /// an empty (unknown) value.
    pub async fn read_current<D: Driver + ?Sized>(
        driver: &mut D,
        field: &ElementHandle,
        timeout: Duration,
    ) -> String {
        match tokio::time::timeout(timeout, driver.read_value(field)).await {
            Ok(Ok(value)) => value.trim().to_string(),
            Ok(Err(e)) => {
                tracing::warn!("Could not read toggle field, treating as unknown: {}", e);
                String::new()
            }
            Err(_) => {
                tracing::warn!(
                    timeout_ms = timeout.as_millis() as u64,
                    "Timed out reading toggle field, treating as unknown"
                );
                String::new()
            }
        }
    }
}
