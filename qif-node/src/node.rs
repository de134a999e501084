//! The top level object tying the mailbox, the router and the board monitors together
use defmt_or_log::{debug, warn};
use qif_common::{
    board::Uid,
    messages::{CanMessage, Heartbeat, Service},
    traits::SensorSource,
};

use crate::{
    liveness::LivenessMonitor,
    node_mbox::NodeMbox,
    router::{DropReason, Router, RoutingOutcome},
    sensor::sensor_frames,
    status::{StatusEvent, StatusIndicator},
};

/// The main object representing the controller on the bus
///
/// Received frames are queued in the [`NodeMbox`] by the receive interrupt, and routed when
/// [`Node::process`] is called from the main loop.
#[allow(missing_debug_implementations)]
pub struct Node<'a> {
    mbox: &'a NodeMbox,
    router: Router<'a>,
    liveness: LivenessMonitor,
    status: Option<&'a dyn StatusIndicator>,
    rx_message_count: u32,
    tx_message_count: u32,
}

impl<'a> Node<'a> {
    /// Create a new [`Node`]
    ///
    /// # Arguments
    ///
    /// * `mbox` - The mailbox filled by the CAN receive interrupt
    /// * `router` - A router holding the registry and the application handlers
    pub fn new(mbox: &'a NodeMbox, router: Router<'a>) -> Self {
        Self {
            mbox,
            router,
            liveness: LivenessMonitor::default(),
            status: None,
            rx_message_count: 0,
            tx_message_count: 0,
        }
    }

    /// Report activity to a status indicator
    pub fn with_status(mut self, status: &'a dyn StatusIndicator) -> Self {
        self.status = Some(status);
        self
    }

    /// Replace the liveness monitor, e.g. to use a shorter timeout
    pub fn with_liveness(mut self, liveness: LivenessMonitor) -> Self {
        self.liveness = liveness;
        self
    }

    fn signal(&self, event: StatusEvent) {
        if let Some(status) = self.status {
            status.signal(event);
        }
    }

    /// Run periodic processing
    ///
    /// Routes every frame waiting in the mailbox, then checks for boards whose heartbeat lapsed.
    /// Returns the number of frames routed.
    ///
    /// # Arguments
    ///
    /// * `now_ms` - Monotonic time in milliseconds
    /// * `send_cb` - Called for every frame to transmit
    pub fn process(&mut self, now_ms: u64, send_cb: &mut dyn FnMut(CanMessage)) -> usize {
        let mut routed = 0;
        while let Some(msg) = self.mbox.read_message() {
            routed += 1;
            self.rx_message_count = self.rx_message_count.wrapping_add(1);
            self.signal(StatusEvent::Receiving);

            let mut sent = 0u32;
            let outcome = self.router.route(&msg, &mut |out| {
                sent += 1;
                send_cb(out);
            });
            if sent > 0 {
                self.tx_message_count = self.tx_message_count.wrapping_add(sent);
                self.signal(StatusEvent::Sending);
            }

            match outcome {
                RoutingOutcome::Service(Service::Heartbeat) => self.record_heartbeat(msg, now_ms),
                RoutingOutcome::Dropped(DropReason::Filtered)
                | RoutingOutcome::Dropped(DropReason::FilterSlotOutOfRange) => {
                    self.signal(StatusEvent::FilterFailure)
                }
                RoutingOutcome::Dropped(_) => self.signal(StatusEvent::Error),
                _ => (),
            }
        }

        self.liveness.poll_expired(now_ms, |label| {
            warn!("Board {} missed its heartbeat", label);
        });
        if routed == 0 {
            self.signal(StatusEvent::Idle);
        }
        routed
    }

    fn record_heartbeat(&mut self, msg: CanMessage, now_ms: u64) {
        match Heartbeat::try_from(msg) {
            Ok(heartbeat) => {
                let registry = self.router.registry();
                if let Some(label) = self.liveness.record_heartbeat(registry, &heartbeat, now_ms)
                {
                    debug!("Heartbeat from board {}", label);
                }
            }
            Err(_) => {
                warn!("Malformed heartbeat");
                self.signal(StatusEvent::Error);
            }
        }
    }

    /// Send this controller's own heartbeat
    pub fn send_heartbeat(&mut self, uid: Uid, send_cb: &mut dyn FnMut(CanMessage)) {
        send_cb(Heartbeat { uid }.into());
        self.tx_message_count = self.tx_message_count.wrapping_add(1);
    }

    /// Read the environmental sensor and broadcast a new reading if there is one
    ///
    /// Returns true if frames were sent.
    pub fn publish_sensor<S: SensorSource>(
        &mut self,
        source: &mut S,
        send_cb: &mut dyn FnMut(CanMessage),
    ) -> Result<bool, S::Error> {
        let reading = match source.read_sensor() {
            Ok(Some(reading)) => reading,
            Ok(None) => return Ok(false),
            Err(e) => {
                warn!("Sensor read failed");
                self.signal(StatusEvent::SensorError);
                return Err(e);
            }
        };
        self.signal(StatusEvent::SensorRead);
        for frame in sensor_frames(&reading, Service::Bme) {
            send_cb(frame);
            self.tx_message_count = self.tx_message_count.wrapping_add(1);
        }
        Ok(true)
    }

    /// The router
    pub fn router(&self) -> &Router<'a> {
        &self.router
    }

    /// The router, for changing the filter table from the application
    pub fn router_mut(&mut self) -> &mut Router<'a> {
        &mut self.router
    }

    /// The heartbeat monitor
    pub fn liveness(&self) -> &LivenessMonitor {
        &self.liveness
    }

    /// Get the number of received messages
    pub fn rx_message_count(&self) -> u32 {
        self.rx_message_count
    }

    /// Get the number of transmitted messages
    pub fn tx_message_count(&self) -> u32 {
        self.tx_message_count
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{handlers::HandlerTable, registry::Registry, status::LastStatus};
    use qif_common::{
        board::{BoardRecord, BoardType},
        messages::{CanId, FilterType},
        traits::BsecReading,
    };

    fn test_registry() -> Registry {
        Registry::builder()
            .board(BoardRecord::new(
                1,
                Uid::new(0x4fc844355348),
                BoardType::LowPower,
            ))
            .build()
            .unwrap()
    }

    #[test]
    fn test_process_drains_mailbox() {
        let registry = test_registry();
        let mbox = NodeMbox::new();
        let status = LastStatus::new();
        let mut node = Node::new(&mbox, Router::new(&registry, HandlerTable::new()))
            .with_status(&status);

        mbox.store_message(CanMessage::new(CanId::Std(0x013), &[1])).unwrap();
        mbox.store_message(CanMessage::new(CanId::Std(0x033), &[1])).unwrap();
        let mut sent = Vec::new();
        assert_eq!(2, node.process(0, &mut |m| sent.push(m)));
        assert_eq!(0, mbox.pending());
        assert_eq!(2, node.rx_message_count());
        // The second frame was for an undefined board
        assert_eq!(StatusEvent::Error, status.last());

        assert_eq!(0, node.process(1, &mut |m| sent.push(m)));
        assert_eq!(StatusEvent::Idle, status.last());
        assert!(sent.is_empty());
    }

    #[test]
    fn test_filter_failure_is_signalled() {
        let registry = test_registry();
        let mbox = NodeMbox::new();
        let status = LastStatus::new();
        let mut node = Node::new(&mbox, Router::new(&registry, HandlerTable::new()))
            .with_status(&status);
        node.router_mut()
            .update_filter(0, 0x011, FilterType::Pass, 0)
            .unwrap();

        mbox.store_message(CanMessage::new(CanId::Std(0x012), &[])).unwrap();
        node.process(0, &mut |_| {});
        assert_eq!(StatusEvent::FilterFailure, status.last());
    }

    #[test]
    fn test_heartbeats_feed_liveness() {
        let registry = test_registry();
        let mbox = NodeMbox::new();
        let mut node = Node::new(&mbox, Router::new(&registry, HandlerTable::new()))
            .with_liveness(LivenessMonitor::new(1000));

        let mut own = Vec::new();
        node.send_heartbeat(Uid::new(0x4fc844355348), &mut |m| own.push(m));
        mbox.store_message(own[0]).unwrap();
        node.process(10, &mut |_| {});
        assert!(node.liveness().is_alive(1, 500));
        assert!(!node.liveness().is_alive(1, 1010));
    }

    struct FixedSensor(Option<Result<BsecReading, ()>>);

    impl SensorSource for FixedSensor {
        type Error = ();

        fn read_sensor(&mut self) -> Result<Option<BsecReading>, ()> {
            self.0.take().transpose()
        }
    }

    #[test]
    fn test_publish_sensor() {
        let registry = test_registry();
        let mbox = NodeMbox::new();
        let status = LastStatus::new();
        let mut node = Node::new(&mbox, Router::new(&registry, HandlerTable::new()))
            .with_status(&status);

        let mut sent = Vec::new();
        let mut sensor = FixedSensor(Some(Ok(BsecReading::default())));
        assert_eq!(Ok(true), node.publish_sensor(&mut sensor, &mut |m| sent.push(m)));
        assert_eq!(7, sent.len());
        assert_eq!(StatusEvent::SensorRead, status.last());
        assert_eq!(Ok(false), node.publish_sensor(&mut sensor, &mut |m| sent.push(m)));

        let mut broken = FixedSensor(Some(Err(())));
        assert_eq!(Err(()), node.publish_sensor(&mut broken, &mut |m| sent.push(m)));
        assert_eq!(StatusEvent::SensorError, status.last());
        assert_eq!(7, node.tx_message_count());
    }
}
