//! Board identity records
//!
//! Every board on the bus owns a block of 16 consecutive addresses starting at `label * 16`. The
//! first eight offsets carry switch inputs or LED/PWM outputs, the upper eight carry board
//! services such as power control.
use snafu::Snafu;

use crate::constants::{LINK_NONE, MAX_BUS_ADDRESS, OFFSET_MASK, SLOTS_PER_BOARD, UID_UNASSIGNED};

/// A 48-bit truncated hardware UID
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct Uid(u64);

impl Uid {
    /// The UID of boards which have not been assigned
    pub const UNASSIGNED: Uid = Uid(UID_UNASSIGNED);

    /// Number of bytes in the wire representation
    pub const LENGTH: usize = 6;

    /// Create a UID, keeping only the lower 48 bits
    pub const fn new(value: u64) -> Self {
        Uid(value & UID_UNASSIGNED)
    }

    /// Get the raw 48-bit value
    pub const fn raw(&self) -> u64 {
        self.0
    }

    /// Returns true unless this is [`Uid::UNASSIGNED`]
    pub const fn is_assigned(&self) -> bool {
        self.0 != UID_UNASSIGNED
    }
}

/// An 11-bit bus address: board base plus a 4-bit offset
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BusAddress(u16);

/// Error returned when a bus address or offset is out of range
#[derive(Debug, Clone, Copy, PartialEq, Eq, Snafu)]
pub enum AddressError {
    /// The value does not fit in an 11-bit identifier
    #[snafu(display("Address {value:#05x} is outside the 11-bit range"))]
    OutOfRange {
        /// Offending value
        value: u16,
    },
    /// The offset does not select one of a board's 16 slots
    #[snafu(display("Offset {offset} is not a valid slot"))]
    InvalidOffset {
        /// Offending offset
        offset: u8,
    },
}

impl BusAddress {
    /// Create a bus address
    pub const fn new(value: u16) -> Result<Self, AddressError> {
        if value > MAX_BUS_ADDRESS {
            Err(AddressError::OutOfRange { value })
        } else {
            Ok(BusAddress(value))
        }
    }

    /// The base address of the board with the given label
    pub const fn for_label(label: u8) -> Self {
        BusAddress(((label as u16) & 0x7F) << 4)
    }

    /// Combine a board base with an offset
    pub fn with_offset(self, offset: u8) -> Result<Self, AddressError> {
        if offset as usize >= SLOTS_PER_BOARD {
            return Err(AddressError::InvalidOffset { offset });
        }
        Ok(BusAddress(self.base().0 | offset as u16))
    }

    /// Get the raw value
    pub const fn raw(&self) -> u16 {
        self.0
    }

    /// The base address of the board owning this address
    pub const fn base(&self) -> BusAddress {
        BusAddress(self.0 & !OFFSET_MASK)
    }

    /// The slot within the owning board
    pub const fn offset(&self) -> u8 {
        (self.0 & OFFSET_MASK) as u8
    }

    /// The label of the owning board
    pub const fn label(&self) -> u8 {
        (self.0 >> 4) as u8
    }
}

impl From<BusAddress> for u16 {
    fn from(value: BusAddress) -> Self {
        value.raw()
    }
}

impl TryFrom<u16> for BusAddress {
    type Error = AddressError;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        BusAddress::new(value)
    }
}

/// Kind of board installed at a label
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "std", derive(serde::Deserialize))]
#[cfg_attr(feature = "std", serde(rename_all = "lowercase"))]
#[repr(u8)]
pub enum BoardType {
    /// No board is installed
    #[default]
    Undefined = 0,
    /// Eight push buttons and eight indicator LEDs
    Switch = 1,
    /// Low power outputs with software PWM
    #[cfg_attr(feature = "std", serde(alias = "lpower"))]
    LowPower = 2,
    /// Medium power outputs
    #[cfg_attr(feature = "std", serde(alias = "mpower"))]
    MediumPower = 3,
    /// High power outputs
    #[cfg_attr(feature = "std", serde(alias = "hpower"))]
    HighPower = 4,
}

impl BoardType {
    /// Short name used in logs and listings
    pub const fn name(&self) -> &'static str {
        match self {
            BoardType::Undefined => "UNDEF",
            BoardType::Switch => "SWITCH",
            BoardType::LowPower => "LPOWER",
            BoardType::MediumPower => "MPOWER",
            BoardType::HighPower => "HPOWER",
        }
    }
}

/// Key selecting the handler run for one address slot
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum HandlerId {
    /// Does nothing
    #[default]
    Noop,
    /// One of the sixteen function handlers, FCT00 to FCT15
    Function(u8),
}

impl HandlerId {
    /// Number of function handlers
    pub const FUNCTION_COUNT: u8 = 16;

    /// Create a function handler key, validating the code
    pub const fn function(code: u8) -> Option<Self> {
        if code < Self::FUNCTION_COUNT {
            Some(HandlerId::Function(code))
        } else {
            None
        }
    }

    /// The sixteen function handlers in slot order
    pub const fn all_functions() -> [HandlerId; SLOTS_PER_BOARD] {
        let mut out = [HandlerId::Noop; SLOTS_PER_BOARD];
        let mut i = 0;
        while i < SLOTS_PER_BOARD {
            out[i] = HandlerId::Function(i as u8);
            i += 1;
        }
        out
    }
}

/// One board in the registry
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct BoardRecord {
    /// Truncated hardware UID
    pub uid: Uid,
    /// Base bus address, `label * 16`
    pub bus_address: BusAddress,
    /// Position of this record in the registry
    pub label: u8,
    /// Kind of board
    pub board_type: BoardType,
    /// Handler run for each address slot
    pub handlers: [HandlerId; SLOTS_PER_BOARD],
    /// Address each slot's output is forwarded to
    pub links: [Option<BusAddress>; SLOTS_PER_BOARD],
}

impl BoardRecord {
    /// A record for a label with no board installed
    pub const fn undefined(label: u8) -> Self {
        Self {
            uid: Uid::UNASSIGNED,
            bus_address: BusAddress::for_label(label),
            label,
            board_type: BoardType::Undefined,
            handlers: [HandlerId::Noop; SLOTS_PER_BOARD],
            links: [None; SLOTS_PER_BOARD],
        }
    }

    /// A record for an installed board with function handlers FCT00..FCT15 and no links
    pub const fn new(label: u8, uid: Uid, board_type: BoardType) -> Self {
        Self {
            uid,
            bus_address: BusAddress::for_label(label),
            label,
            board_type,
            handlers: HandlerId::all_functions(),
            links: [None; SLOTS_PER_BOARD],
        }
    }

    /// Replace the handler table
    pub const fn with_handlers(mut self, handlers: [HandlerId; SLOTS_PER_BOARD]) -> Self {
        self.handlers = handlers;
        self
    }

    /// Link one slot to a target address
    ///
    /// # Panics
    ///
    /// Panics if `offset` is not below [`SLOTS_PER_BOARD`].
    pub const fn with_link(mut self, offset: usize, target: BusAddress) -> Self {
        self.links[offset] = Some(target);
        self
    }

    /// Link slots in order, starting from offset 0
    pub fn with_links(mut self, targets: &[BusAddress]) -> Self {
        for (slot, target) in self.links.iter_mut().zip(targets) {
            *slot = Some(*target);
        }
        self
    }

    /// Links as signed wire values, with -1 for unlinked slots
    pub fn raw_links(&self) -> [i16; SLOTS_PER_BOARD] {
        self.links
            .map(|l| l.map(|a| a.raw() as i16).unwrap_or(LINK_NONE))
    }

    /// Returns true if the record is a consistent placeholder for an empty label
    pub fn is_inert(&self) -> bool {
        !self.uid.is_assigned()
            && self.handlers.iter().all(|h| *h == HandlerId::Noop)
            && self.links.iter().all(|l| l.is_none())
    }
}
