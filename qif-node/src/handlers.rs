//! Frame handlers
//!
//! Every address slot of a board names a [`HandlerId`]. The router resolves it against a
//! [`HandlerTable`], which maps the sixteen function codes to application handlers. A handler
//! may return a payload, which the router forwards to the slot's link if one is configured.
use defmt_or_log::{debug, warn};
use qif_common::{
    board::{BoardType, BusAddress, HandlerId},
    constants::{PWM_CHANNELS, SLOTS_PER_BOARD},
    messages::{CanMessage, Payload},
};

use crate::pwm::PwmDuty;

/// Everything a handler knows about the frame it is called for
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct FrameContext {
    /// Destination address of the frame
    pub address: BusAddress,
    /// Label of the owning board
    pub label: u8,
    /// Slot within the owning board
    pub offset: u8,
    /// Type of the owning board
    pub board_type: BoardType,
    /// Function address reported by the filter
    pub function_address: u8,
}

/// A unit of work attached to one or more address slots
pub trait FrameHandler {
    /// Handle a frame, optionally producing a payload to forward
    fn handle(&mut self, ctx: &FrameContext, frame: &CanMessage) -> Option<Payload>;
}

impl<F> FrameHandler for F
where
    F: FnMut(&FrameContext, &CanMessage) -> Option<Payload>,
{
    fn handle(&mut self, ctx: &FrameContext, frame: &CanMessage) -> Option<Payload> {
        self(ctx, frame)
    }
}

/// Maps function codes to handlers
///
/// Codes without a registered handler behave like [`HandlerId::Noop`].
#[allow(missing_debug_implementations)]
pub struct HandlerTable<'a> {
    functions: [Option<&'a mut dyn FrameHandler>; SLOTS_PER_BOARD],
}

impl Default for HandlerTable<'_> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a> HandlerTable<'a> {
    /// Create a table with no handlers
    pub fn new() -> Self {
        Self {
            functions: core::array::from_fn(|_| None),
        }
    }

    /// Register the handler for a function code, returning the previous one
    ///
    /// Codes of 16 and above are ignored and the handler is handed back.
    pub fn register(
        &mut self,
        code: u8,
        handler: &'a mut dyn FrameHandler,
    ) -> Result<Option<&'a mut dyn FrameHandler>, &'a mut dyn FrameHandler> {
        match self.functions.get_mut(code as usize) {
            Some(slot) => Ok(slot.replace(handler)),
            None => Err(handler),
        }
    }

    /// Register the handler for a function code, builder form
    pub fn with(mut self, code: u8, handler: &'a mut dyn FrameHandler) -> Self {
        if self.register(code, handler).is_err() {
            warn!("Function code {} is out of range", code);
        }
        self
    }

    /// Returns true if a handler is registered for the code
    pub fn is_registered(&self, code: u8) -> bool {
        matches!(self.functions.get(code as usize), Some(Some(_)))
    }

    /// Run the handler selected by `id`
    pub fn dispatch(
        &mut self,
        id: HandlerId,
        ctx: &FrameContext,
        frame: &CanMessage,
    ) -> Option<Payload> {
        match id {
            HandlerId::Noop => None,
            HandlerId::Function(code) => match self.functions.get_mut(code as usize) {
                Some(Some(handler)) => handler.handle(ctx, frame),
                _ => {
                    debug!("No handler for function {}", code);
                    None
                }
            },
        }
    }
}

/// Forwards the frame payload unchanged
///
/// This is what a switch board uses to mirror its button presses onto the outputs of a power
/// board.
#[derive(Copy, Clone, Debug, Default)]
pub struct RelayHandler;

impl FrameHandler for RelayHandler {
    fn handle(&mut self, _ctx: &FrameContext, frame: &CanMessage) -> Option<Payload> {
        Payload::from_slice(frame.data()).ok()
    }
}

/// Sets the duty cycle of the PWM channel matching the frame offset from the first payload byte
///
/// Only frames for low power boards are acted upon. Offsets beyond the eighth channel are
/// ignored.
#[derive(Debug)]
pub struct PwmHandler<'a> {
    duty: &'a PwmDuty,
}

impl<'a> PwmHandler<'a> {
    /// Create a handler writing into `duty`
    pub fn new(duty: &'a PwmDuty) -> Self {
        Self { duty }
    }
}

impl FrameHandler for PwmHandler<'_> {
    fn handle(&mut self, ctx: &FrameContext, frame: &CanMessage) -> Option<Payload> {
        if ctx.board_type != BoardType::LowPower {
            return None;
        }
        let channel = ctx.offset as usize;
        if channel >= PWM_CHANNELS {
            warn!("Offset {} has no PWM channel", ctx.offset);
            return None;
        }
        let Some(&value) = frame.data().first() else {
            warn!("Empty PWM frame for 0x{:x}", ctx.address.raw());
            return None;
        };
        match self.duty.set_duty(channel, value) {
            Ok(applied) => debug!("PWM channel {} set to {}", channel, applied),
            Err(_) => warn!("PWM channel {} rejected", channel),
        }
        None
    }
}
