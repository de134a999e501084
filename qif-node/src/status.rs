//! Status indicator
//!
//! The board has a single RGB LED which shows what the router is doing. The router never talks
//! to the LED directly; it reports [`StatusEvent`]s to a [`StatusIndicator`] provided by the
//! application.
use qif_common::AtomicCell;

/// Something worth showing on the status LED
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum StatusEvent {
    /// Main loop running with nothing to do
    #[default]
    Idle,
    /// A frame was received
    Receiving,
    /// A frame was sent
    Sending,
    /// A frame was dropped by the filter, or a filter update was rejected
    FilterFailure,
    /// A frame could not be routed
    Error,
    /// Environmental sensor was read
    SensorRead,
    /// Environmental sensor failed
    SensorError,
}

impl StatusEvent {
    /// LED colour for this event, as `(red, green, blue)`
    pub const fn rgb(self) -> (u8, u8, u8) {
        match self {
            StatusEvent::Idle => (0, 255, 0),
            StatusEvent::Receiving => (0, 0, 255),
            StatusEvent::Sending => (255, 0, 255),
            StatusEvent::FilterFailure => (142, 68, 173),
            StatusEvent::Error => (255, 0, 0),
            StatusEvent::SensorRead => (255, 255, 0),
            StatusEvent::SensorError => (255, 165, 0),
        }
    }
}

/// Receiver of status events
///
/// Called from the main loop. Implementations driving an LED strip should keep the write short.
pub trait StatusIndicator {
    /// Show an event
    fn signal(&self, event: StatusEvent);
}

/// Indicator which only remembers the last event
///
/// Useful on hosts without an LED, and for reading the status from another context.
#[derive(Debug, Default)]
pub struct LastStatus {
    last: AtomicCell<StatusEvent>,
}

impl LastStatus {
    /// Create, starting at [`StatusEvent::Idle`]
    pub const fn new() -> Self {
        Self {
            last: AtomicCell::new(StatusEvent::Idle),
        }
    }

    /// The most recent event
    pub fn last(&self) -> StatusEvent {
        self.last.load()
    }
}

impl StatusIndicator for LastStatus {
    fn signal(&self, event: StatusEvent) {
        self.last.store(event);
    }
}
