//! Port service task
//!
//! Runs the port's task-context routine at a fixed interval. A stalled
//! transmitter leaves a sticky fault behind; it is logged and cleared so
//! the console keeps working.

use defmt::*;
use embassy_time::{Duration, Ticker};

use crate::ConsolePort;

/// Poll interval in milliseconds
pub const POLL_INTERVAL_MS: u64 = 10;

#[embassy_executor::task]
pub async fn poll_task(port: &'static ConsolePort) {
    info!("Poll task started");

    let mut ticker = Ticker::every(Duration::from_millis(POLL_INTERVAL_MS));

    loop {
        ticker.next().await;

        let fault = port.lock(|port| {
            port.poll();
            port.sticky_status()
        });

        if let Some(status) = fault {
            let diag = port.lock(|port| {
                port.clear_status();
                port.diagnostics()
            });
            warn!(
                "Console TX fault {}, cleared (timeouts={}, rejected={})",
                status, diag.tx_timeouts, diag.tx_rejected
            );
        }
    }
}
