//! Lock-free intent buffer
//!
//! Network handlers push fire/move intents through crossbeam-channel; the
//! simulation drains everything pending at the start of each tick, so no
//! intent ever touches simulation state from a network callback.

use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use serde::{Deserialize, Serialize};

use crate::game::ecs::DriveInput;
use crate::game::SessionId;

/// Desired drive state sent by a client
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MoveIntent {
    /// -1 (full reverse) to 1 (full forward)
    pub throttle: f64,
    /// -1 (right) to 1 (left)
    pub turn: f64,
    /// Desired turret yaw relative to the hull (rad)
    pub turret_yaw: f64,
    /// Desired gun pitch (rad)
    pub gun_pitch: f64,
}

impl From<MoveIntent> for DriveInput {
    fn from(intent: MoveIntent) -> Self {
        DriveInput {
            throttle: intent.throttle,
            turn: intent.turn,
            turret_yaw_target: intent.turret_yaw,
            gun_pitch_target: intent.gun_pitch,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum IntentKind {
    Fire { ammo: String },
    Move(MoveIntent),
}

/// Intent message from a player connection
#[derive(Debug, Clone, PartialEq)]
pub struct Intent {
    pub session: SessionId,
    pub kind: IntentKind,
}

/// Bounded intent queue
///
/// Multiple connection handlers can submit without blocking; when the buffer
/// is full further intents are dropped.
pub struct IntentBuffer {
    sender: Sender<Intent>,
    receiver: Receiver<Intent>,
    capacity: usize,
}

impl IntentBuffer {
    pub fn new(capacity: usize) -> Self {
        let (sender, receiver) = bounded(capacity);
        Self {
            sender,
            receiver,
            capacity,
        }
    }

    /// New sender handle for a connection
    pub fn sender(&self) -> IntentSender {
        IntentSender {
            sender: self.sender.clone(),
        }
    }

    /// Try to submit an intent (non-blocking). Returns false if the buffer is full.
    #[inline]
    pub fn try_submit(&self, session: SessionId, kind: IntentKind) -> bool {
        self.sender.try_send(Intent { session, kind }).is_ok()
    }

    /// Drain all pending intents for this tick
    pub fn drain(&self) -> Vec<Intent> {
        self.receiver.try_iter().collect()
    }

    #[inline]
    pub fn pending_count(&self) -> usize {
        self.receiver.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.receiver.is_empty()
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for IntentBuffer {
    fn default() -> Self {
        Self::new(crate::game::constants::net::INTENT_BUFFER_CAPACITY)
    }
}

/// Clonable sender handle for connection handlers
#[derive(Clone)]
pub struct IntentSender {
    sender: Sender<Intent>,
}

impl IntentSender {
    #[inline]
    pub fn try_send(&self, session: SessionId, kind: IntentKind) -> Result<(), IntentBufferError> {
        self.sender
            .try_send(Intent { session, kind })
            .map_err(|e| match e {
                TrySendError::Full(_) => IntentBufferError::Full,
                TrySendError::Disconnected(_) => IntentBufferError::Disconnected,
            })
    }

    pub fn fire(&self, session: SessionId, ammo: impl Into<String>) -> Result<(), IntentBufferError> {
        self.try_send(session, IntentKind::Fire { ammo: ammo.into() })
    }

    pub fn drive(&self, session: SessionId, intent: MoveIntent) -> Result<(), IntentBufferError> {
        self.try_send(session, IntentKind::Move(intent))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum IntentBufferError {
    /// Buffer is full (backpressure)
    #[error("intent buffer full")]
    Full,
    /// Simulation stopped
    #[error("intent buffer disconnected")]
    Disconnected,
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn create_test_move(throttle: f64) -> IntentKind {
        IntentKind::Move(MoveIntent {
            throttle,
            ..Default::default()
        })
    }

    #[test]
    fn test_submit_and_drain_in_order() {
        let buffer = IntentBuffer::new(10);
        let session = Uuid::new_v4();

        assert!(buffer.try_submit(session, create_test_move(0.1)));
        assert!(buffer.try_submit(session, IntentKind::Fire { ammo: "AP".into() }));
        assert!(buffer.try_submit(session, create_test_move(0.3)));
        assert_eq!(buffer.pending_count(), 3);

        let intents = buffer.drain();
        assert_eq!(intents.len(), 3);
        assert_eq!(intents[0].kind, create_test_move(0.1));
        assert_eq!(intents[1].kind, IntentKind::Fire { ammo: "AP".into() });
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_backpressure_drops_excess() {
        let buffer = IntentBuffer::new(2);
        let session = Uuid::new_v4();

        assert!(buffer.try_submit(session, create_test_move(1.0)));
        assert!(buffer.try_submit(session, create_test_move(1.0)));
        assert!(!buffer.try_submit(session, create_test_move(1.0)));

        buffer.drain();
        assert!(buffer.try_submit(session, create_test_move(1.0)));
    }

    #[test]
    fn test_sender_handles() {
        let buffer = IntentBuffer::new(2);
        let session = Uuid::new_v4();
        let sender = buffer.sender();

        assert!(sender.fire(session, "AP").is_ok());
        assert!(sender.clone().drive(session, MoveIntent::default()).is_ok());
        assert_eq!(sender.fire(session, "AP"), Err(IntentBufferError::Full));
        assert_eq!(buffer.drain().len(), 2);
    }

    #[test]
    fn test_move_intent_into_drive_input() {
        let drive: DriveInput = MoveIntent {
            throttle: 0.5,
            turn: -1.0,
            turret_yaw: 0.2,
            gun_pitch: 0.1,
        }
        .into();
        assert_eq!(drive.turret_yaw_target, 0.2);
        assert_eq!(drive.gun_pitch_target, 0.1);
    }

    #[test]
    fn test_default_capacity() {
        let buffer = IntentBuffer::default();
        assert_eq!(buffer.capacity(), crate::game::constants::net::INTENT_BUFFER_CAPACITY);
    }
}
