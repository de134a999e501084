//! Common traits
//!
//! These are the seams to the hardware: the CAN transceiver, the GPIO port and the environmental
//! sensor are all provided by the application.

use crate::messages::CanMessage;

/// Error type for CAN send operations containing the failed message
#[derive(Debug, Clone, PartialEq, Eq, Copy)]
pub struct CanSendError(pub CanMessage);

impl core::fmt::Display for CanSendError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "Failed to send CAN message: {:?}", self.0.id())
    }
}

impl core::error::Error for CanSendError {}

/// A synchronous can sender
pub trait CanSender {
    /// Send a message to the bus
    fn send(&mut self, msg: CanMessage) -> Result<(), CanSendError>;
}

/// A synchronous can receiver
pub trait CanReceiver {
    /// Attempt to read a message from the receiver, and return None immediately if no message is
    /// available
    fn try_recv(&mut self) -> Option<CanMessage>;
}

/// Access to the GPIO outputs driven by the PWM engine and output handlers
///
/// Implementations are called from the timer interrupt and must not block.
pub trait PinDriver {
    /// Drive a pin high or low
    fn set_pin(&mut self, pin: u8, high: bool);
}

/// One complete set of values computed by the BSEC library
#[derive(Debug, Clone, Copy, Default, PartialEq)]
#[allow(missing_docs)]
pub struct BsecReading {
    pub iaq: f32,
    pub co2: f32,
    pub voc: f32,
    pub pressure: f32,
    pub temperature: f32,
    pub humidity: f32,
    pub gas: f32,
}

/// Provider of environmental readings
pub trait SensorSource {
    /// Error returned when the sensor cannot be read
    type Error: core::fmt::Debug;

    /// Read the latest values, if a new set is available
    fn read_sensor(&mut self) -> Result<Option<BsecReading>, Self::Error>;
}
