//! serport demo firmware
//!
//! Runs an interrupt-driven console on UART0 (GPIO0 TX, GPIO1 RX):
//! received lines are echoed back, `stat` prints the port counters.
//!
//! - `UART0_IRQ` services the peripheral through the shared port
//! - the poll task kick-starts transmission and watches for stalls
//! - the console task consumes the RX buffer line by line

#![no_std]
#![no_main]

use defmt::*;
use embassy_executor::Spawner;
use embassy_rp::interrupt::{self, InterruptExt};
use embassy_rp::peripherals::UART0;
use embassy_rp::uart::{Config as UartConfig, Uart};
use static_cell::StaticCell;
use {defmt_rtt as _, panic_probe as _};

use serport_buffer::{BufferFormat, BufferKind, RingBuffer};
use serport_core::{PortConfig, SerialPort, SharedPort};
use serport_hal_rp2040::{EmbassyTicks, Pl011Uart};

use crate::channels::{PORT, RX_READY};

mod channels;
mod tasks;

/// The console's port type
pub type ConsolePort = SharedPort<'static, Pl011Uart<'static, UART0>, EmbassyTicks>;

const TX_BUFFER_LEN: usize = 256;
const RX_BUFFER_LEN: usize = 256;

// Ring storage and the rings themselves must live forever
static TX_STORAGE: StaticCell<[u8; TX_BUFFER_LEN]> = StaticCell::new();
static RX_STORAGE: StaticCell<[u8; RX_BUFFER_LEN]> = StaticCell::new();
static TX_RING: StaticCell<RingBuffer<'static>> = StaticCell::new();
static RX_RING: StaticCell<RingBuffer<'static>> = StaticCell::new();

#[interrupt]
fn UART0_IRQ() {
    if let Some(port) = PORT.try_get() {
        port.on_interrupt();
        RX_READY.signal(());
    }
}

/// Main entry point
#[embassy_executor::main]
async fn main(spawner: Spawner) {
    info!("serport firmware starting...");

    let p = embassy_rp::init(Default::default());

    let tx_ring: &'static RingBuffer<'static> = TX_RING.init(
        RingBuffer::with_config(
            TX_STORAGE.init([0; TX_BUFFER_LEN]),
            BufferKind::Stream,
            BufferFormat::None,
        )
        .unwrap(),
    );
    let rx_ring: &'static RingBuffer<'static> =
        RX_RING.init(RingBuffer::new(RX_STORAGE.init([0; RX_BUFFER_LEN])).unwrap());

    // 115200 8N1; embassy-rp sets up pins and baud rate, the port driver
    // takes over the data path
    let uart = Uart::new_blocking(p.UART0, p.PIN_0, p.PIN_1, UartConfig::default());
    let uart = Pl011Uart::new(uart, embassy_rp::pac::UART0);

    let config = PortConfig::default();
    let port = SerialPort::new(uart, EmbassyTicks, tx_ring, rx_ring, config).unwrap();
    if PORT.init(SharedPort::new(port)).is_err() {
        defmt::panic!("console port initialized twice");
    }
    let port: &'static ConsolePort = unwrap!(PORT.try_get());
    let console_rx = rx_ring.consumer().unwrap();

    interrupt::UART0_IRQ.unpend();
    // SAFETY: the handler only touches PORT, which is initialized above
    unsafe { interrupt::UART0_IRQ.enable() };

    info!("UART0 console ready, TX timeout {} ms", config.tx_timeout_ms);

    spawner.spawn(tasks::poll_task(port)).unwrap();
    spawner.spawn(tasks::console_task(port, console_rx)).unwrap();
}
