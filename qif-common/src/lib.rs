//! Common functionality shared among the qif crates.
//!
//! Most users will have no reason to depend on this crate directly, as it is re-exported by
//! `qif-node`.
#![cfg_attr(not(feature = "std"), no_std)]
#![warn(missing_docs, missing_copy_implementations)]
#![cfg_attr(docsrs, feature(doc_cfg))]

mod atomic_cell;
pub use atomic_cell::AtomicCell;
pub mod board;
#[cfg(feature = "std")]
#[cfg_attr(docsrs, doc(cfg(feature = "std")))]
pub mod board_config;
pub mod constants;
pub mod messages;
pub mod pins;
pub mod traits;

pub use board::{BoardRecord, BoardType, BusAddress, HandlerId, Uid};
pub use messages::{CanId, CanMessage, MessageError};
