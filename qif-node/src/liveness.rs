//! Heartbeat tracking
//!
//! Boards announce themselves with a heartbeat on the service channel carrying their UID. The
//! monitor maps the UID to a label through the registry and remembers when each label was last
//! heard from. A board is lost once [`TIMEOUT_MS`] has passed without a heartbeat; each loss is
//! reported once, until the board is heard from again.
use defmt_or_log::{debug, info};
use qif_common::{constants::BOARD_COUNT, constants::TIMEOUT_MS, messages::Heartbeat};

use crate::registry::Registry;

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
enum Liveness {
    #[default]
    Unseen,
    Alive { last_seen_ms: u64 },
    Lost { last_seen_ms: u64 },
}

/// Tracks the last heartbeat of every board
#[derive(Debug, Clone)]
pub struct LivenessMonitor {
    boards: [Liveness; BOARD_COUNT],
    timeout_ms: u64,
}

impl Default for LivenessMonitor {
    fn default() -> Self {
        Self::new(TIMEOUT_MS)
    }
}

impl LivenessMonitor {
    /// Create a monitor with a custom timeout
    pub const fn new(timeout_ms: u64) -> Self {
        Self {
            boards: [Liveness::Unseen; BOARD_COUNT],
            timeout_ms,
        }
    }

    /// Record that `label` was heard from at `now_ms`
    pub fn record(&mut self, label: u8, now_ms: u64) {
        if let Some(state) = self.boards.get_mut(label as usize) {
            if matches!(state, Liveness::Lost { .. }) {
                info!("Board {} is back", label);
            }
            *state = Liveness::Alive {
                last_seen_ms: now_ms,
            };
        }
    }

    /// Record a heartbeat, returning the label of the sender
    ///
    /// Heartbeats from UIDs which are not in the registry are ignored.
    pub fn record_heartbeat(
        &mut self,
        registry: &Registry,
        heartbeat: &Heartbeat,
        now_ms: u64,
    ) -> Option<u8> {
        let Some(record) = registry.find_by_uid(heartbeat.uid) else {
            debug!("Heartbeat from unknown UID 0x{:x}", heartbeat.uid.raw());
            return None;
        };
        self.record(record.label, now_ms);
        Some(record.label)
    }

    /// Returns true if `label` sent a heartbeat within the timeout
    pub fn is_alive(&self, label: u8, now_ms: u64) -> bool {
        match self.boards.get(label as usize) {
            Some(Liveness::Alive { last_seen_ms }) => {
                now_ms.saturating_sub(*last_seen_ms) < self.timeout_ms
            }
            _ => false,
        }
    }

    /// Time of the last heartbeat from `label`
    pub fn last_seen(&self, label: u8) -> Option<u64> {
        match self.boards.get(label as usize)? {
            Liveness::Unseen => None,
            Liveness::Alive { last_seen_ms } | Liveness::Lost { last_seen_ms } => {
                Some(*last_seen_ms)
            }
        }
    }

    /// Call `on_lost` for each board whose heartbeat lapsed since the last poll
    pub fn poll_expired(&mut self, now_ms: u64, mut on_lost: impl FnMut(u8)) {
        for (label, state) in self.boards.iter_mut().enumerate() {
            if let Liveness::Alive { last_seen_ms } = *state {
                if now_ms.saturating_sub(last_seen_ms) >= self.timeout_ms {
                    *state = Liveness::Lost { last_seen_ms };
                    on_lost(label as u8);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use qif_common::board::{BoardRecord, BoardType, Uid};

    #[test]
    fn test_heartbeat_keeps_board_alive() {
        let registry = Registry::builder()
            .board(BoardRecord::new(
                101,
                Uid::new(0x88F918495348),
                BoardType::MediumPower,
            ))
            .build()
            .unwrap();
        let mut monitor = LivenessMonitor::default();
        let hb = Heartbeat {
            uid: Uid::new(0x88F918495348),
        };

        assert_eq!(Some(101), monitor.record_heartbeat(&registry, &hb, 1000));
        assert!(monitor.is_alive(101, 1000 + TIMEOUT_MS - 1));
        assert!(!monitor.is_alive(101, 1000 + TIMEOUT_MS));
        assert!(!monitor.is_alive(100, 1000));

        let unknown = Heartbeat { uid: Uid::new(42) };
        assert_eq!(None, monitor.record_heartbeat(&registry, &unknown, 1000));
    }

    #[test]
    fn test_loss_reported_once() {
        let mut monitor = LivenessMonitor::new(100);
        monitor.record(3, 0);
        monitor.record(4, 50);

        let mut lost = Vec::new();
        monitor.poll_expired(120, |label| lost.push(label));
        assert_eq!(vec![3], lost);
        monitor.poll_expired(500, |label| lost.push(label));
        assert_eq!(vec![3, 4], lost);
        monitor.poll_expired(1000, |label| lost.push(label));
        assert_eq!(vec![3, 4], lost);
        assert_eq!(Some(0), monitor.last_seen(3));

        monitor.record(3, 1000);
        assert!(monitor.is_alive(3, 1050));
        assert_eq!(None, monitor.last_seen(7));
    }
}
