//! Frame routing for the QIF CAN-FD controller board
//!
//! Every board on the bus owns a block of sixteen 11-bit addresses. A controller running this
//! crate receives every frame on the bus and decides, for each one, what to do with it. It is
//! primarily intended to be run on microcontrollers, and so it is no_std compatible and performs
//! no heap allocation. It is also possible to use it on std environments, for example to replay
//! captured traffic on linux. It provides the following features:
//!
//! * A [`Registry`] of the 128 boards on the bus, with the handler and link of every address
//!   slot.
//! * A [`FilterTable`] deciding which frames are processed, reconfigurable at runtime through
//!   the service channel.
//! * A [`Router`] which runs slot handlers and forwards their output to linked addresses.
//! * A software PWM engine for low power boards, see [`PwmScheduler`].
//! * Heartbeat tracking of the other boards, and status reporting for an RGB LED.
//! * Push button gesture recognition for switch boards, see [`ClickDetector`].
//!
//! # Getting Started
//!
//! ## Board database
//!
//! The registry is built once at startup. On a host it is typically loaded from a
//! [BoardConfig](common::board_config::BoardConfig) TOML file; on the target it is usually baked
//! in with [`Registry::builder`].
//!
//! ```ignore
//! let registry = Registry::builder()
//!     .board(BoardRecord::new(2, Uid::new(0xc7e869175348), BoardType::Switch)
//!         .with_links(&leds_of_board_4))
//!     .build()
//!     .unwrap();
//! ```
//!
//! ## Handlers
//!
//! Each slot of a board names one of sixteen function handlers. The application provides them
//! in a [`HandlerTable`]. Closures can be used directly.
//!
//! ```ignore
//! let mut relay = RelayHandler;
//! let mut pwm = PwmHandler::new(&PWM_DUTY);
//! let handlers = HandlerTable::new()
//!     .with(0, &mut relay)
//!     .with(1, &mut pwm);
//! let router = Router::new(&registry, handlers);
//! ```
//!
//! ## Handling CAN messages
//!
//! Received messages should be passed to a static [`NodeMbox`]. This can be done in any thread
//! -- a good way to do it is to have the CAN controller receive interrupt store messages here
//! directly.
//!
//! ```ignore
//! static NODE_MBOX: NodeMbox = NodeMbox::new();
//!
//! // In the receive interrupt
//! NODE_MBOX.store_message(msg).ok();
//! ```
//!
//! The [`Node::process`] function must then be called from the main loop. It is provided a
//! callback for transmitting messages.
//!
//! ```ignore
//! let mut node = Node::new(&NODE_MBOX, router).with_status(&STATUS_LED);
//! loop {
//!     node.process(millis(), &mut |msg| {
//!         if can_tx.send(msg).is_err() {
//!             defmt::error!("Error transmitting CAN message");
//!         }
//!     });
//! }
//! ```
//!
//! ## PWM
//!
//! The PWM duty cycles live in a static [`PwmDuty`], written by [`PwmHandler`] from the main
//! loop. A hardware timer firing every 40 us calls [`PwmScheduler::tick`].
//!
//! ```ignore
//! static PWM_DUTY: PwmDuty = PwmDuty::new();
//!
//! #[interrupt]
//! fn TC3() {
//!     PWM.tick(&PWM_DUTY, &mut gpio);
//! }
//! ```
#![cfg_attr(all(not(test), not(feature = "std")), no_std)]
#![warn(missing_docs, missing_debug_implementations)]
#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod click;
pub mod filter;
pub mod handlers;
mod liveness;
mod node;
mod node_mbox;
pub mod pwm;
pub mod registry;
pub mod router;
pub mod sensor;
mod status;

// Re-export types used by applications
pub use critical_section;
pub use qif_common as common;

pub use click::{ClickDetector, SwitchState};
pub use filter::{Decision, FilterEntry, FilterError, FilterTable};
pub use handlers::{FrameContext, FrameHandler, HandlerTable, PwmHandler, RelayHandler};
pub use liveness::LivenessMonitor;
pub use node::Node;
pub use node_mbox::{NodeMbox, RX_QUEUE_SIZE};
pub use pwm::{PwmDuty, PwmError, PwmScheduler};
pub use registry::{Registry, RegistryBuilder, RegistryError};
pub use router::{DropReason, Router, RoutingOutcome, ServiceHandler};
pub use status::{LastStatus, StatusEvent, StatusIndicator};
