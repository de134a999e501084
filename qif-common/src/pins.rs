//! Pin profiles for each board type
//!
//! A profile lists the 21 configurable pins of a board together with the function they are set
//! up for at boot. Profiles are shared by every board of the same type.

use crate::board::BoardType;
use crate::constants::NB_PINS;

/// How a pin is configured
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum PinFunction {
    /// Left as analog/input default
    #[default]
    Unset,
    /// Totem-pole output
    Output,
    /// Input with pull-up
    Input,
    /// Software PWM output
    Pwm,
}

/// A single pin and its function
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct PinSpec {
    /// Configured function
    pub function: PinFunction,
    /// Arduino pin number
    pub number: u8,
}

impl PinSpec {
    const fn new(function: PinFunction, number: u8) -> Self {
        Self { function, number }
    }

    /// Returns true if the pin can be driven
    pub const fn is_output(&self) -> bool {
        matches!(self.function, PinFunction::Output | PinFunction::Pwm)
    }
}

/// The pin configuration for one board type
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct PinProfile {
    /// One entry per physical pin
    pub pins: [PinSpec; NB_PINS],
}

use PinFunction::{Input as INP, Output as OUT, Unset as UNSET};

macro_rules! profile {
    ($(($f:ident, $n:literal)),* $(,)?) => {
        PinProfile { pins: [$(PinSpec::new($f, $n)),*] }
    };
}

/// Low power board
pub static LPOWER_PINS: PinProfile = profile![
    (OUT, 0), (OUT, 1), (UNSET, 4), (OUT, 5),
    (OUT, 6), (OUT, 9), (OUT, 10), (OUT, 11),
    (OUT, 12), (OUT, 13), (OUT, 14), (UNSET, 15),
    (UNSET, 16), (UNSET, 17), (UNSET, 18), (UNSET, 19),
    (UNSET, 21), (UNSET, 22), (UNSET, 23), (UNSET, 24),
    (UNSET, 25),
];

/// Medium power board
pub static MPOWER_PINS: PinProfile = profile![
    (OUT, 0), (OUT, 1), (OUT, 4), (OUT, 5),
    (OUT, 6), (OUT, 9), (OUT, 10), (OUT, 11),
    (OUT, 12), (OUT, 13), (UNSET, 14), (UNSET, 15),
    (UNSET, 16), (UNSET, 17), (UNSET, 18), (OUT, 19),
    (UNSET, 21), (UNSET, 22), (OUT, 23), (OUT, 24),
    (UNSET, 25),
];

/// High power board, driven through external drivers only
pub static HPOWER_PINS: PinProfile = profile![
    (UNSET, 0), (UNSET, 1), (UNSET, 4), (UNSET, 5),
    (UNSET, 6), (UNSET, 9), (UNSET, 10), (UNSET, 11),
    (UNSET, 12), (UNSET, 13), (UNSET, 14), (UNSET, 15),
    (UNSET, 16), (UNSET, 17), (UNSET, 18), (UNSET, 19),
    (UNSET, 21), (UNSET, 22), (UNSET, 23), (UNSET, 24),
    (UNSET, 25),
];

/// Switch board
pub static SWITCH_PINS: PinProfile = profile![
    (INP, 0), (OUT, 1), (OUT, 4), (UNSET, 5),
    (OUT, 6), (OUT, 9), (OUT, 10), (OUT, 11),
    (OUT, 12), (OUT, 13), (UNSET, 14), (UNSET, 15),
    (INP, 16), (INP, 17), (INP, 18), (INP, 19),
    (UNSET, 21), (UNSET, 22), (INP, 23), (INP, 24),
    (INP, 25),
];

/// Default profile, every pin left unset
pub static UNSET_PINS: PinProfile = profile![
    (UNSET, 0), (UNSET, 1), (UNSET, 4), (UNSET, 5),
    (UNSET, 6), (UNSET, 9), (UNSET, 10), (UNSET, 11),
    (UNSET, 12), (UNSET, 13), (UNSET, 14), (UNSET, 15),
    (UNSET, 16), (UNSET, 17), (UNSET, 18), (UNSET, 19),
    (UNSET, 21), (UNSET, 22), (UNSET, 23), (UNSET, 24),
    (UNSET, 25),
];

impl PinProfile {
    /// The canonical profile for a board type
    pub fn for_board(board_type: BoardType) -> &'static PinProfile {
        match board_type {
            BoardType::Undefined => &UNSET_PINS,
            BoardType::Switch => &SWITCH_PINS,
            BoardType::LowPower => &LPOWER_PINS,
            BoardType::MediumPower => &MPOWER_PINS,
            BoardType::HighPower => &HPOWER_PINS,
        }
    }

    /// Pins which can be driven, in profile order
    pub fn output_pins(&self) -> impl Iterator<Item = u8> + '_ {
        self.pins.iter().filter(|p| p.is_output()).map(|p| p.number)
    }

    /// Pins configured as inputs, in profile order
    pub fn input_pins(&self) -> impl Iterator<Item = u8> + '_ {
        self.pins
            .iter()
            .filter(|p| p.function == PinFunction::Input)
            .map(|p| p.number)
    }
}
