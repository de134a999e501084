//! Constants shared by the router, the PWM engine and the board database
//!
//!

/// Number of board records in the registry, one per label
pub const BOARD_COUNT: usize = 128;

/// Number of address slots owned by each board
pub const SLOTS_PER_BOARD: usize = 16;

/// Mask selecting the offset part of a bus address
pub const OFFSET_MASK: u16 = 0x000F;

/// Highest valid 11-bit CAN identifier
pub const MAX_BUS_ADDRESS: u16 = 0x7FF;

/// Base address of the service channel
pub const SVR: u16 = 0x000;

/// Maximum number of entries in the filter table
pub const MAX_FILTERS: usize = 128;

/// Number of software PWM channels on a low power board
pub const PWM_CHANNELS: usize = 8;

/// Highest duty value; one period is `PWM_RESOLUTION + 1` ticks
pub const PWM_RESOLUTION: u8 = 63;

/// Number of ticks in one PWM period
pub const PWM_PERIOD_TICKS: u8 = PWM_RESOLUTION + 1;

/// Interval between PWM timer ticks (25 kHz base frequency)
pub const TIMER_INTERVAL_US: u32 = 40;

/// A board which has not sent a heartbeat for this long is considered lost
pub const TIMEOUT_MS: u64 = 120_000;

/// Number of configurable I/O pins per board
pub const NB_PINS: usize = 21;

/// Truncated UID value used for boards which are not assigned
pub const UID_UNASSIGNED: u64 = 0xFFFF_FFFF_FFFF;

/// Wire value for an unlinked slot
pub const LINK_NONE: i16 = -1;

/// Number of push buttons on a switch board
pub const SWITCH_COUNT: usize = 8;

/// Interval between switch scans
pub const CLICK_TICK_MS: u32 = 10;

/// A press shorter than this many scan ticks is a short click (~200 ms)
pub const SHORT_TICKS: u8 = 20;

/// A press held this many scan ticks is a very long hold (~1 s)
pub const VERY_LONG_TICKS: u8 = 100;

/// Idle scan ticks after which the click count restarts (~2 s)
pub const WAIT_RESET_TICKS: u8 = 200;

/// Scan ticks to wait after a short click for a second press (~200 ms)
pub const SHORT_DELAY_LIMIT: u8 = 20;

/// Sub-function offsets within a board's address block
///
/// Switch inputs, LED outputs and PWM outputs share the low offsets; which applies depends on the
/// board type.
pub mod offsets {
    /// Switch inputs
    pub const SW: [u16; 8] = [0x0, 0x1, 0x2, 0x3, 0x4, 0x5, 0x6, 0x7];
    /// LED outputs
    pub const LED: [u16; 8] = [0x0, 0x1, 0x2, 0x3, 0x4, 0x5, 0x6, 0x7];
    /// Low power PWM outputs
    pub const PWM: [u16; 9] = [0x0, 0x1, 0x2, 0x3, 0x4, 0x5, 0x6, 0x7, 0x8];
    /// Power control
    pub const PWR: u16 = 0x9;
}
