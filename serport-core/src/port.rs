//! Interrupt-driven serial port
//!
//! A [`SerialPort`] joins a UART peripheral to a TX and an RX ring buffer.
//! Two contexts drive it:
//!
//! - **Interrupt**: [`on_rx_interrupt`](SerialPort::on_rx_interrupt) drains
//!   the receive register into the RX buffer (and any listeners);
//!   [`on_tx_interrupt`](SerialPort::on_tx_interrupt) feeds the transmit
//!   register from the TX buffer.
//! - **Task**: [`poll`](SerialPort::poll) starts transmission when data is
//!   waiting, feeds the transmitter when no interrupt arrives, and recovers
//!   from a stalled transmitter.
//!
//! ```text
//!            write_*()              poll(): TX has data
//!   task ──► TX buffer ──────► Idle ───────────────────► Transmitting
//!                               ▲                             │
//!                               │ TX drained (interrupt/poll) │
//!                               ├─────────────────────────────┘
//!                               │                             │ no progress
//!                               │ peripheral ready            │ for timeout
//!                               └──────── Stopping ◄──────────┘
//! ```
//!
//! Both contexts need `&mut` access, so on hardware the port lives inside a
//! [`SharedPort`](crate::SharedPort).

use heapless::Vec;
use serport_buffer::{BufferFormat, BufferKind, Consumer, Producer, RingBuffer};
use serport_hal::{deadline_elapsed, LineErrors, SerialPeripheral, TickSource};
use serport_protocol::{AsciiEncoder, EscapeCodec, Symbol};

use crate::config::PortConfig;
use crate::error::PortError;
use crate::listener::{ListenerMask, ListenerRegistry, DEFAULT_LISTENERS};
use crate::status::{AddressStatusRing, TxStatus};

/// Default number of tracked addressed transactions
pub const DEFAULT_STATUS_SLOTS: usize = 8;

/// Received bytes are handed to the buffers in chunks of this size
const RX_CHUNK: usize = 16;

/// Transmitter state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PortState {
    /// Nothing in flight
    #[default]
    Idle,
    /// The TX interrupt chain is running
    Transmitting,
    /// Transmission abandoned; waiting for the peripheral to accept data
    Stopping,
}

/// Port counters
///
/// Byte counters wrap; error counters saturate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PortDiagnostics {
    pub rx_bytes: u32,
    pub tx_bytes: u32,
    /// Receive chunks that did not fit in at least one destination
    pub rx_overflows: u32,
    pub overrun_errors: u16,
    pub framing_errors: u16,
    pub parity_errors: u16,
    pub tx_timeouts: u16,
    /// Writes refused for lack of space
    pub tx_rejected: u16,
}

impl PortDiagnostics {
    fn record_line_errors(&mut self, errors: LineErrors) {
        if errors.overrun() {
            self.overrun_errors = self.overrun_errors.saturating_add(1);
        }
        if errors.framing() {
            self.framing_errors = self.framing_errors.saturating_add(1);
        }
        if errors.parity() {
            self.parity_errors = self.parity_errors.saturating_add(1);
        }
    }
}

/// Serial port driver
///
/// `L` is the number of listener slots, `S` the number of tracked
/// addressed transactions.
pub struct SerialPort<
    'r,
    P,
    T,
    const L: usize = DEFAULT_LISTENERS,
    const S: usize = DEFAULT_STATUS_SLOTS,
> {
    peripheral: P,
    ticks: T,
    config: PortConfig,
    codec: EscapeCodec,
    tx_format: BufferFormat,
    /// Only set for the ASCII formats
    ascii: Option<AsciiEncoder>,
    tx: Producer<'r>,
    tx_drain: Consumer<'r>,
    rx: Producer<'r>,
    listeners: ListenerRegistry<'r, L>,
    rx_route: ListenerMask,
    statuses: AddressStatusRing<S>,
    state: PortState,
    sticky: Option<TxStatus>,
    deadline: u32,
    /// `tx_bytes` when the deadline was last armed
    progress_mark: u32,
    diagnostics: PortDiagnostics,
}

impl<'r, P, T, const L: usize, const S: usize> SerialPort<'r, P, T, L, S>
where
    P: SerialPeripheral,
    T: TickSource,
{
    /// Create a port over a TX and an RX stream buffer
    ///
    /// Claims the TX buffer's producer and consumer and the RX buffer's
    /// producer. The TX buffer's format selects how writes are encoded.
    pub fn new(
        peripheral: P,
        ticks: T,
        tx: &'r RingBuffer<'r>,
        rx: &'r RingBuffer<'r>,
        config: PortConfig,
    ) -> Result<Self, PortError> {
        config.validate()?;
        if tx.kind() != BufferKind::Stream || rx.kind() != BufferKind::Stream {
            return Err(PortError::WrongFormat);
        }

        let codec = config.codec();
        let tx_format = tx.format();
        let ascii = AsciiEncoder::for_format(codec, tx_format).ok();
        let (tx_producer, tx_consumer) = tx.split().ok_or(PortError::Claimed)?;
        let rx_producer = rx.producer().ok_or(PortError::Claimed)?;

        Ok(Self {
            peripheral,
            ticks,
            config,
            codec,
            tx_format,
            ascii,
            tx: tx_producer,
            tx_drain: tx_consumer,
            rx: rx_producer,
            listeners: ListenerRegistry::new(),
            rx_route: ListenerMask::PRIMARY,
            statuses: AddressStatusRing::new(),
            state: PortState::Idle,
            sticky: None,
            deadline: 0,
            progress_mark: 0,
            diagnostics: PortDiagnostics::default(),
        })
    }

    /// Give back the peripheral and tick source, releasing the buffers
    pub fn release(self) -> (P, T) {
        (self.peripheral, self.ticks)
    }

    pub fn peripheral(&self) -> &P {
        &self.peripheral
    }

    pub fn peripheral_mut(&mut self) -> &mut P {
        &mut self.peripheral
    }

    pub fn config(&self) -> &PortConfig {
        &self.config
    }

    pub fn state(&self) -> PortState {
        self.state
    }

    pub fn diagnostics(&self) -> PortDiagnostics {
        self.diagnostics
    }

    /// Whether data is queued or in flight
    pub fn is_busy(&self) -> bool {
        self.state != PortState::Idle || !self.tx_drain.is_empty()
    }

    /// Sticky status refusing writes, if any
    pub fn sticky_status(&self) -> Option<TxStatus> {
        self.sticky
    }

    /// Clear the sticky status and the TX buffer's error flag
    pub fn clear_status(&mut self) {
        self.sticky = None;
        self.tx.ring().clear_error();
    }

    // ---- Interrupt context ----

    /// Service a receive interrupt
    ///
    /// Line error flags are cleared before the receive register is drained.
    pub fn on_rx_interrupt(&mut self) {
        let errors = self.peripheral.clear_error_flags();
        if !errors.is_empty() {
            self.diagnostics.record_line_errors(errors);
        }

        let mut chunk: Vec<u8, RX_CHUNK> = Vec::new();
        while self.peripheral.has_rx_byte() {
            let byte = self.peripheral.take_rx_byte();
            // Never full here: the chunk is flushed as soon as it fills
            let _ = chunk.push(byte);
            if chunk.is_full() {
                self.deliver(&chunk);
                chunk.clear();
            }
        }
        if !chunk.is_empty() {
            self.deliver(&chunk);
        }
    }

    /// Service a transmit interrupt
    pub fn on_tx_interrupt(&mut self) {
        if self.state != PortState::Transmitting {
            return;
        }
        self.service_tx();
    }

    /// Service a shared RX/TX interrupt vector
    pub fn on_interrupt(&mut self) {
        self.on_rx_interrupt();
        self.on_tx_interrupt();
    }

    fn deliver(&mut self, bytes: &[u8]) {
        self.diagnostics.rx_bytes = self.diagnostics.rx_bytes.wrapping_add(bytes.len() as u32);

        let mut overflow = false;
        if self.rx_route.has_primary() && self.rx.put_slice(bytes) < bytes.len() {
            overflow = true;
        }

        let selected = self.rx_route.listeners().bits() & self.listeners.registered().bits();
        if selected != 0 {
            let accepted = self
                .listeners
                .fan_out(ListenerMask::from_bits(selected), bytes);
            if accepted < selected.count_ones() as usize {
                overflow = true;
            }
        }

        if overflow {
            self.diagnostics.rx_overflows = self.diagnostics.rx_overflows.saturating_add(1);
        }
    }

    /// Feed the transmitter until it is full or the TX buffer is empty
    ///
    /// Once every queued byte is in the peripheral the transmission is
    /// finished, whether or not another transmit interrupt will follow.
    fn service_tx(&mut self) {
        while self.peripheral.can_tx_byte() {
            let Some(byte) = self.tx_drain.get() else {
                break;
            };
            self.send(byte);
        }
        if self.tx_drain.is_empty() {
            self.finish_transmission();
        }
    }

    fn send(&mut self, byte: u8) {
        self.peripheral.put_tx_byte(byte);
        self.diagnostics.tx_bytes = self.diagnostics.tx_bytes.wrapping_add(1);
    }

    fn finish_transmission(&mut self) {
        self.state = PortState::Idle;
        self.peripheral.stop_tx();
        let done = self
            .statuses
            .mark_pending(TxStatus::AddedToBuf, TxStatus::Transmitted);
        if done > 0 {
            trace!("TX drained, {} transactions sent", done);
        }
    }

    // ---- Task context ----

    /// Task-context service routine
    ///
    /// Call at a bounded interval. Starts transmission when the port is
    /// idle and data is waiting, keeps the transmitter fed when its
    /// interrupt does not fire (a FIFO that never reaches its trigger
    /// level), and abandons a transmission that made no progress for
    /// `tx_timeout_ms`.
    pub fn poll(&mut self) {
        if self.state == PortState::Stopping {
            self.finish_stopping();
        }
        match self.state {
            PortState::Idle => self.kick(),
            PortState::Transmitting => {
                self.service_tx();
                if self.state == PortState::Transmitting {
                    self.check_progress();
                }
            }
            PortState::Stopping => {}
        }
    }

    fn kick(&mut self) {
        if self.state != PortState::Idle || self.tx_drain.is_empty() {
            return;
        }
        self.state = PortState::Transmitting;
        self.peripheral.start_tx();
        self.service_tx();
        if self.state == PortState::Transmitting {
            self.arm_deadline();
        }
    }

    fn arm_deadline(&mut self) {
        self.deadline = self.ticks.deadline_after(self.config.tx_timeout_ms);
        self.progress_mark = self.diagnostics.tx_bytes;
    }

    fn check_progress(&mut self) {
        if self.diagnostics.tx_bytes != self.progress_mark {
            self.arm_deadline();
        } else if deadline_elapsed(self.ticks.now_ms(), self.deadline) {
            self.recover_timeout();
        }
    }

    fn recover_timeout(&mut self) {
        warn!(
            "TX stalled for {} ms, dropping {} bytes",
            self.config.tx_timeout_ms,
            self.tx_drain.count()
        );
        self.diagnostics.tx_timeouts = self.diagnostics.tx_timeouts.saturating_add(1);
        self.sticky = Some(TxStatus::Timeout);
        self.stop();
    }

    fn stop(&mut self) -> usize {
        self.state = PortState::Stopping;
        self.peripheral.stop_tx();
        let dropped = self.tx_drain.count();
        self.tx_drain.clear();
        self.statuses
            .mark_pending(TxStatus::AddedToBuf, TxStatus::Timeout);
        self.finish_stopping();
        dropped
    }

    fn finish_stopping(&mut self) {
        if self.peripheral.can_tx_byte() {
            self.state = PortState::Idle;
        }
    }

    /// Abandon everything queued for transmission
    ///
    /// Pending addressed transactions report `Timeout`. Returns the number
    /// of bytes discarded.
    pub fn abort(&mut self) -> usize {
        let dropped = self.stop();
        debug!("TX aborted, {} bytes dropped", dropped);
        dropped
    }

    // ---- Write API ----

    /// Queue one data byte
    pub fn write_byte(&mut self, byte: u8) -> Result<usize, PortError> {
        self.write_array(&[byte])
    }

    /// Queue data bytes, encoded for the TX buffer's format
    ///
    /// All or nothing. Returns the number of buffer bytes written.
    pub fn write_array(&mut self, data: &[u8]) -> Result<usize, PortError> {
        self.guarded(|port| port.put_data(data))
    }

    /// Queue text
    ///
    /// The ASCII formats carry it as a quoted run; the binary formats as
    /// plain data bytes.
    pub fn write_string(&mut self, text: &str) -> Result<usize, PortError> {
        self.guarded(|port| match port.ascii.as_mut() {
            Some(encoder) => Ok(encoder.put_text(&mut port.tx, text.as_bytes())?),
            None => port.put_data(text.as_bytes()),
        })
    }

    /// Queue a control code (escaped formats only)
    pub fn write_control(&mut self, code: u8) -> Result<usize, PortError> {
        self.guarded(|port| match port.tx_format {
            BufferFormat::BinaryEscaped => Ok(port.codec.put_control(&mut port.tx, code)?),
            BufferFormat::Ascii | BufferFormat::AsciiEscaped => match port.ascii.as_mut() {
                Some(encoder) => Ok(encoder.put_control(&mut port.tx, code)?),
                None => Err(PortError::WrongFormat),
            },
            BufferFormat::None | BufferFormat::Binary => Err(PortError::WrongFormat),
        })
    }

    /// Queue an addressed bus frame and track its outcome
    ///
    /// Writes the start control, the address byte, the payload and the stop
    /// control to a BinaryEscaped TX buffer. The result is recorded for
    /// [`transaction_status`](Self::transaction_status).
    pub fn write_addressed(&mut self, address: u8, payload: &[u8]) -> Result<usize, PortError> {
        if let Some(status) = self.sticky {
            return Err(PortError::Faulted(status));
        }
        if self.tx_format != BufferFormat::BinaryEscaped {
            self.statuses.record(address, TxStatus::BufferFormat);
            return Err(PortError::WrongFormat);
        }

        let result = self.guarded(|port| {
            let codec = port.codec;
            let frame = port.config.frame();
            let mut shadow = port.tx.begin();
            codec.encode_into(Symbol::Control(frame.start), &mut shadow)?;
            codec.encode_into(Symbol::Data(address), &mut shadow)?;
            codec.encode_data(payload, &mut shadow)?;
            codec.encode_into(Symbol::Control(frame.stop), &mut shadow)?;
            Ok(shadow.commit())
        });

        let status = match result {
            Ok(_) => TxStatus::AddedToBuf,
            Err(PortError::NoSpace) => TxStatus::NoSpace,
            Err(_) => TxStatus::Error,
        };
        self.statuses.record(address, status);
        result
    }

    /// Queue as much of `data` as fits without splitting an encoded byte
    ///
    /// Unlike the other writes this never latches a sticky status. Returns
    /// `Busy` when not even one byte fits.
    pub fn write_available(&mut self, data: &[u8]) -> Result<usize, PortError> {
        if let Some(status) = self.sticky {
            return Err(PortError::Faulted(status));
        }
        let free = self.tx.free();
        let mut needed = 0;
        let mut fits = 0;
        for &byte in data {
            needed += self.encoded_len(byte);
            if needed > free {
                break;
            }
            fits += 1;
        }
        if fits == 0 && !data.is_empty() {
            return Err(PortError::Busy);
        }
        self.put_data(&data[..fits])?;
        self.kick();
        Ok(fits)
    }

    fn encoded_len(&self, byte: u8) -> usize {
        match self.tx_format {
            BufferFormat::None | BufferFormat::Binary => 1,
            BufferFormat::BinaryEscaped => self.codec.required_len(byte),
            BufferFormat::Ascii | BufferFormat::AsciiEscaped => 2,
        }
    }

    fn put_data(&mut self, data: &[u8]) -> Result<usize, PortError> {
        match self.tx_format {
            BufferFormat::None | BufferFormat::Binary => {
                let mut shadow = self.tx.begin();
                shadow.write_slice(data)?;
                Ok(shadow.commit())
            }
            BufferFormat::BinaryEscaped => Ok(self.codec.put_escaped_slice(&mut self.tx, data)?),
            BufferFormat::Ascii | BufferFormat::AsciiEscaped => match self.ascii.as_mut() {
                Some(encoder) => Ok(encoder.put_data(&mut self.tx, data)?),
                None => Err(PortError::WrongFormat),
            },
        }
    }

    /// Run a write unless a sticky status is set, then start transmission
    ///
    /// A write that does not fit latches the `NoSpace` status.
    fn guarded(
        &mut self,
        write: impl FnOnce(&mut Self) -> Result<usize, PortError>,
    ) -> Result<usize, PortError> {
        if let Some(status) = self.sticky {
            return Err(PortError::Faulted(status));
        }
        match write(self) {
            Ok(written) => {
                self.kick();
                Ok(written)
            }
            Err(PortError::NoSpace) => {
                debug!("TX write rejected, {} bytes free", self.tx.free());
                self.sticky = Some(TxStatus::NoSpace);
                self.diagnostics.tx_rejected = self.diagnostics.tx_rejected.saturating_add(1);
                Err(PortError::NoSpace)
            }
            Err(err) => Err(err),
        }
    }

    // ---- Addressed transaction status ----

    /// Take the recorded outcome for `address`, clearing it
    pub fn transaction_status(&mut self, address: u8) -> Option<TxStatus> {
        self.statuses.take(address)
    }

    /// Recorded outcome for `address`, left in place
    pub fn peek_status(&self, address: u8) -> Option<TxStatus> {
        self.statuses.peek(address)
    }

    /// Record an outcome reported by a higher protocol layer (e.g. a NACK)
    pub fn record_status(&mut self, address: u8, status: TxStatus) {
        self.statuses.record(address, status);
    }

    // ---- Listeners ----

    /// Register a stream buffer to receive a copy of incoming data
    ///
    /// The returned mask is added to nothing by itself; include it in
    /// [`set_rx_route`](Self::set_rx_route) to start delivery.
    pub fn register_listener(
        &mut self,
        buffer: &'r RingBuffer<'r>,
    ) -> Result<ListenerMask, PortError> {
        if buffer.kind() != BufferKind::Stream {
            return Err(PortError::WrongFormat);
        }
        Ok(self.listeners.register(buffer)?)
    }

    /// Remove listeners, returning how many were registered
    pub fn unregister_listener(&mut self, mask: ListenerMask) -> usize {
        self.listeners.unregister(mask)
    }

    /// Select where received bytes go
    pub fn set_rx_route(&mut self, route: ListenerMask) {
        self.rx_route = route;
    }

    pub fn rx_route(&self) -> ListenerMask {
        self.rx_route
    }

    pub fn listeners(&self) -> &ListenerRegistry<'r, L> {
        &self.listeners
    }
}

impl<P, T, const L: usize, const S: usize> core::fmt::Debug for SerialPort<'_, P, T, L, S> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("SerialPort")
            .field("state", &self.state)
            .field("format", &self.tx_format)
            .field("sticky", &self.sticky)
            .field("queued", &self.tx_drain.count())
            .field("rx_route", &self.rx_route)
            .finish()
    }
}
