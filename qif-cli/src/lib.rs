//! Command-line utilities for the QIF router
//!
//! # qif-route
//!
//! Loads a board database and runs frames through the same router the controller runs, printing
//! what happens to each frame and which frames would be forwarded. Frames use the `candump -L`
//! text format, so a capture can be replayed directly.
//!
//! Usage example: `candump -L can0 | qif-route --config boards.toml route`
//!
//! The `boards` subcommand checks a database file and lists the installed boards, `pwm` shows the
//! waveform of a set of duty cycles and `filter` encodes a filter update frame for `cansend`.

pub mod command;
pub mod frame;
