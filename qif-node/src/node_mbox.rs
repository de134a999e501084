//! Implements mailbox for receiving CAN messages
use core::cell::RefCell;

use critical_section::Mutex;
use defmt_or_log::warn;
use heapless::Deque;
use qif_common::{messages::CanMessage, AtomicCell};

/// Number of frames the mailbox can hold before new ones are rejected
pub const RX_QUEUE_SIZE: usize = 32;

/// A data structure to be shared between a receiving thread (e.g. a CAN controller IRQ) and the
/// [`Node`](crate::Node) object.
///
/// Incoming messages should be passed to [NodeMbox::store_message]. Frames are handed to the
/// router in the order they arrived.
#[allow(missing_debug_implementations)]
pub struct NodeMbox {
    queue: Mutex<RefCell<Deque<CanMessage, RX_QUEUE_SIZE>>>,
    overflow_count: AtomicCell<u32>,
    notify_cb: AtomicCell<Option<&'static (dyn Fn() + Sync)>>,
}

impl Default for NodeMbox {
    fn default() -> Self {
        Self::new()
    }
}

impl NodeMbox {
    /// Create a new, empty NodeMbox
    pub const fn new() -> Self {
        Self {
            queue: Mutex::new(RefCell::new(Deque::new())),
            overflow_count: AtomicCell::new(0),
            notify_cb: AtomicCell::new(None),
        }
    }

    /// Set a callback for notification when a message is received and requires processing.
    ///
    /// It must be static. Usually this will be a static fn, but in some circumstances, it may be
    /// desirable to use Box::leak to pass a heap allocated closure instead.
    pub fn set_process_notify_callback(&self, callback: &'static (dyn Fn() + Sync)) {
        self.notify_cb.store(Some(callback));
    }

    fn notify(&self) {
        if let Some(notify_cb) = self.notify_cb.load() {
            notify_cb();
        }
    }

    /// Store a received CAN message
    ///
    /// Extended frames are not routed and are returned in an `Err`, as are frames which do not
    /// fit because the queue is full.
    pub fn store_message(&self, msg: CanMessage) -> Result<(), CanMessage> {
        if msg.id().is_extended() {
            return Err(msg);
        }
        let stored = critical_section::with(|cs| self.queue.borrow_ref_mut(cs).push_back(msg));
        match stored {
            Ok(()) => {
                self.notify();
                Ok(())
            }
            Err(msg) => {
                let _ = self.overflow_count.fetch_update(|n| Some(n.saturating_add(1)));
                warn!("Receive queue full, dropping frame");
                Err(msg)
            }
        }
    }

    pub(crate) fn read_message(&self) -> Option<CanMessage> {
        critical_section::with(|cs| self.queue.borrow_ref_mut(cs).pop_front())
    }

    /// Number of frames waiting to be processed
    pub fn pending(&self) -> usize {
        critical_section::with(|cs| self.queue.borrow_ref(cs).len())
    }

    /// Number of frames rejected because the queue was full
    pub fn overflow_count(&self) -> u32 {
        self.overflow_count.load()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use qif_common::messages::CanId;

    #[test]
    fn test_messages_come_out_in_order() {
        let mbox = NodeMbox::new();
        for i in 0..3u16 {
            mbox.store_message(CanMessage::new(CanId::Std(0x20 + i), &[])).unwrap();
        }
        assert_eq!(3, mbox.pending());
        let ids: Vec<CanId> = core::iter::from_fn(|| mbox.read_message())
            .map(|m| m.id())
            .collect();
        assert_eq!(
            vec![CanId::Std(0x20), CanId::Std(0x21), CanId::Std(0x22)],
            ids
        );
    }

    #[test]
    fn test_full_queue_rejects() {
        let mbox = NodeMbox::new();
        for _ in 0..RX_QUEUE_SIZE {
            mbox.store_message(CanMessage::new(CanId::Std(0x20), &[])).unwrap();
        }
        let msg = CanMessage::new(CanId::Std(0x21), &[1]);
        assert_eq!(Err(msg), mbox.store_message(msg));
        assert_eq!(1, mbox.overflow_count());
    }

    #[test]
    fn test_extended_frames_rejected() {
        let mbox = NodeMbox::new();
        let msg = CanMessage::new(CanId::Extended(0x20), &[]);
        assert_eq!(Err(msg), mbox.store_message(msg));
        assert_eq!(0, mbox.pending());
    }
}
