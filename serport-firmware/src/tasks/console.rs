//! Line console on the RX buffer
//!
//! Echoes every received line. `stat` prints the port counters instead.

use defmt::{info, warn};
use embedded_io::Write;
use serport_buffer::Consumer;

use crate::channels::RX_READY;
use crate::ConsolePort;

/// Longest line kept; the rest of an overlong line is dropped
const LINE_LEN: usize = 64;

#[embassy_executor::task]
pub async fn console_task(port: &'static ConsolePort, mut rx: Consumer<'static>) {
    info!("Console task started");

    let mut line = [0u8; LINE_LEN];

    loop {
        RX_READY.wait().await;

        while let Some(end) = rx.find(0, b'\n') {
            let len = (end + 1).min(LINE_LEN);
            let n = rx.get_slice(&mut line[..len]);
            rx.remove(end + 1 - len);
            handle_line(port, trim(&line[..n]));
        }

        // A full buffer without a line break would never drain
        if rx.count() >= LINE_LEN {
            warn!("Console line too long, {} bytes dropped", rx.count());
            rx.clear();
        }
        if rx.has_error() {
            warn!("Console RX overflow");
            rx.clear_error();
        }
    }
}

fn trim(line: &[u8]) -> &[u8] {
    let end = line
        .iter()
        .rposition(|&b| b != b'\r' && b != b'\n')
        .map_or(0, |i| i + 1);
    &line[..end]
}

fn handle_line(port: &ConsolePort, line: &[u8]) {
    let result = port.lock(|port| {
        if line == b"stat" {
            let d = port.diagnostics();
            core::write!(
                port,
                "rx={} tx={} ovf={} oe={} fe={} pe={} to={}\r\n",
                d.rx_bytes,
                d.tx_bytes,
                d.rx_overflows,
                d.overrun_errors,
                d.framing_errors,
                d.parity_errors,
                d.tx_timeouts
            )
            .is_ok()
        } else {
            port.write_array(b"> ").is_ok()
                && port.write_array(line).is_ok()
                && port.write_string("\r\n").is_ok()
        }
    });

    if !result {
        warn!("Console reply dropped");
    }
}
