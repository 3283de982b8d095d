//! Receive fan-out
//!
//! One physical receive stream can feed several independent consumers (a
//! console, a bus monitor, a packet relay) without duplicating the
//! peripheral driver. Each extra buffer registers as a listener and is
//! addressed by one bit of a [`ListenerMask`]; callers OR bits together to
//! write to several listeners at once.

use core::ops::{BitOr, BitOrAssign};

use serport_buffer::{Producer, RingBuffer};

/// Default number of listener slots
pub const DEFAULT_LISTENERS: usize = 4;

/// Maximum number of listener slots (bit 0 belongs to the primary buffer)
pub const MAX_LISTENERS: usize = 7;

/// Set of receive destinations
///
/// Bit 0 is the port's primary RX buffer; listener slot `i` is bit `i + 1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ListenerMask(u8);

impl ListenerMask {
    pub const NONE: Self = Self(0);
    pub const PRIMARY: Self = Self(0x01);
    pub const ALL: Self = Self(0xFF);

    pub const fn from_bits(bits: u8) -> Self {
        Self(bits)
    }

    pub const fn bits(self) -> u8 {
        self.0
    }

    /// Mask of listener slot `index`
    pub const fn slot(index: usize) -> Self {
        Self(1 << (index + 1))
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    pub const fn intersects(self, other: Self) -> bool {
        self.0 & other.0 != 0
    }

    /// Whether the primary RX buffer is selected
    pub const fn has_primary(self) -> bool {
        self.intersects(Self::PRIMARY)
    }

    /// The mask without the primary bit
    pub const fn listeners(self) -> Self {
        Self(self.0 & !Self::PRIMARY.0)
    }
}

impl BitOr for ListenerMask {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for ListenerMask {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

/// Listener registration error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ListenerError {
    /// Every slot is taken
    Full,
    /// The buffer's producer handle is owned elsewhere
    ProducerBusy,
}

/// Fixed table of secondary receive buffers
///
/// The registry owns each listener's producer handle, so nothing else can
/// write into a registered buffer until it is unregistered.
pub struct ListenerRegistry<'r, const N: usize = DEFAULT_LISTENERS> {
    slots: [Option<Producer<'r>>; N],
}

impl<'r, const N: usize> Default for ListenerRegistry<'r, N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'r, const N: usize> ListenerRegistry<'r, N> {
    const SIZE_OK: () = assert!(
        N >= 1 && N <= MAX_LISTENERS,
        "listener registry holds 1 to 7 slots"
    );

    pub fn new() -> Self {
        #[allow(clippy::let_unit_value)]
        let () = Self::SIZE_OK;
        Self {
            slots: core::array::from_fn(|_| None),
        }
    }

    /// Register `buffer` as a listener
    ///
    /// Returns the existing mask if the buffer is already registered.
    pub fn register(&mut self, buffer: &'r RingBuffer<'r>) -> Result<ListenerMask, ListenerError> {
        if let Some(mask) = self.mask_of(buffer) {
            return Ok(mask);
        }
        let index = self
            .slots
            .iter()
            .position(Option::is_none)
            .ok_or(ListenerError::Full)?;
        let producer = buffer.producer().ok_or(ListenerError::ProducerBusy)?;
        self.slots[index] = Some(producer);
        Ok(ListenerMask::slot(index))
    }

    /// Release every slot selected by `mask`
    ///
    /// Returns the number of listeners removed. Their producer handles are
    /// dropped, so the buffers can be claimed again.
    pub fn unregister(&mut self, mask: ListenerMask) -> usize {
        let mut removed = 0;
        for (index, slot) in self.slots.iter_mut().enumerate() {
            if mask.intersects(ListenerMask::slot(index)) && slot.take().is_some() {
                removed += 1;
            }
        }
        removed
    }

    /// Mask of the slot holding `buffer`
    pub fn mask_of(&self, buffer: &RingBuffer<'_>) -> Option<ListenerMask> {
        self.slots
            .iter()
            .position(|slot| {
                slot.as_ref()
                    .is_some_and(|p| core::ptr::eq(p.ring(), buffer))
            })
            .map(ListenerMask::slot)
    }

    pub fn contains(&self, buffer: &RingBuffer<'_>) -> bool {
        self.mask_of(buffer).is_some()
    }

    /// Number of registered listeners
    pub fn len(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Mask of every registered listener
    pub fn registered(&self) -> ListenerMask {
        self.slots
            .iter()
            .enumerate()
            .filter(|(_, s)| s.is_some())
            .fold(ListenerMask::NONE, |acc, (i, _)| acc | ListenerMask::slot(i))
    }

    /// Write `bytes` to every listener selected by `mask`
    ///
    /// A listener without room for all of `bytes` takes what fits and has
    /// its sticky error flag set. Returns the number of listeners that
    /// accepted every byte.
    pub fn fan_out(&mut self, mask: ListenerMask, bytes: &[u8]) -> usize {
        let mut accepted = 0;
        for (index, slot) in self.slots.iter_mut().enumerate() {
            if !mask.intersects(ListenerMask::slot(index)) {
                continue;
            }
            if let Some(producer) = slot {
                if producer.put_slice(bytes) == bytes.len() {
                    accepted += 1;
                }
            }
        }
        accepted
    }
}

impl<const N: usize> core::fmt::Debug for ListenerRegistry<'_, N> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ListenerRegistry")
            .field("registered", &self.registered())
            .finish()
    }
}
