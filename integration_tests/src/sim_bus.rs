//! An in-memory CAN bus connecting node mailboxes and test observers
use std::sync::{Arc, Mutex};

use crossbeam::channel::{unbounded, Receiver, Sender};
use qif_common::{
    messages::CanMessage,
    traits::{CanReceiver, CanSendError, CanSender},
};
use qif_node::{Node, NodeMbox};

type ChannelList = Arc<Mutex<Vec<Sender<CanMessage>>>>;

/// A simulated bus
///
/// Every frame sent on the bus is stored in each attached node mailbox, except the sender's
/// own, and copied to every receiver created with [`SimBus::new_receiver`].
pub struct SimBus<'a> {
    node_states: Vec<&'a NodeMbox>,
    external_channels: ChannelList,
}

impl<'a> SimBus<'a> {
    pub fn new(node_states: Vec<&'a NodeMbox>) -> Self {
        Self {
            node_states,
            external_channels: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// A sender which delivers to every node
    pub fn new_sender(&mut self) -> SimBusSender<'a> {
        SimBusSender {
            node_states: self.node_states.clone(),
            external_channels: self.external_channels.clone(),
        }
    }

    fn sender_excluding(&self, index: usize) -> SimBusSender<'a> {
        let node_states = self
            .node_states
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != index)
            .map(|(_, mbox)| *mbox)
            .collect();
        SimBusSender {
            node_states,
            external_channels: self.external_channels.clone(),
        }
    }

    /// A receiver which sees every frame sent on the bus from now on
    pub fn new_receiver(&mut self) -> SimBusReceiver {
        let (tx, rx) = unbounded();
        self.external_channels.lock().unwrap().push(tx);
        SimBusReceiver { channel_rx: rx }
    }

    /// Run `process` on every node until none of them has anything left to route
    ///
    /// `nodes[i]` must be the node reading from the i-th mailbox given to [`SimBus::new`].
    pub fn process(&mut self, nodes: &mut [&mut Node], now_ms: u64) {
        loop {
            let mut routed = 0;
            for (i, node) in nodes.iter_mut().enumerate() {
                let mut sender = self.sender_excluding(i);
                routed += node.process(now_ms, &mut |msg| {
                    sender.send(msg).unwrap();
                });
            }
            if routed == 0 {
                break;
            }
        }
    }
}

#[derive(Clone)]
pub struct SimBusSender<'a> {
    node_states: Vec<&'a NodeMbox>,
    external_channels: ChannelList,
}

impl CanSender for SimBusSender<'_> {
    fn send(&mut self, msg: CanMessage) -> Result<(), CanSendError> {
        for mbox in &self.node_states {
            // Frames a node does not accept are lost, as on a real bus
            mbox.store_message(msg).ok();
        }
        for channel in self.external_channels.lock().unwrap().iter() {
            channel.send(msg).map_err(|_| CanSendError(msg))?;
        }
        Ok(())
    }
}

pub struct SimBusReceiver {
    channel_rx: Receiver<CanMessage>,
}

impl SimBusReceiver {
    pub fn flush(&mut self) {
        while self.channel_rx.try_recv().is_ok() {}
    }

    /// Collect every frame received so far
    pub fn drain(&mut self) -> Vec<CanMessage> {
        self.channel_rx.try_iter().collect()
    }
}

impl CanReceiver for SimBusReceiver {
    fn try_recv(&mut self) -> Option<CanMessage> {
        self.channel_rx.try_recv().ok()
    }
}
