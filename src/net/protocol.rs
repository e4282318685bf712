use serde::{Deserialize, Serialize};

use crate::game::ecs::AmmoRounds;
use crate::game::events::SimEvent;
use crate::game::input_buffer::{IntentKind, MoveIntent};
use crate::game::SessionId;
use crate::net::snapshot::SnapshotBuffer;

/// Messages from client to server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ClientMessage {
    /// Request a tank of the named catalog type
    Join { tank: String, loadout: Vec<AmmoRounds> },
    /// Fire one round of the named ammo
    Fire { ammo: String },
    /// Desired drive state
    Move(MoveIntent),
    /// Request to leave the arena
    Leave,
    /// Ping for latency measurement
    Ping { timestamp: u64 },
}

impl ClientMessage {
    /// Intent to queue for the simulation, if this message carries one
    pub fn into_intent(self) -> Option<IntentKind> {
        match self {
            ClientMessage::Fire { ammo } => Some(IntentKind::Fire { ammo }),
            ClientMessage::Move(intent) => Some(IntentKind::Move(intent)),
            ClientMessage::Join { .. } | ClientMessage::Leave | ClientMessage::Ping { .. } => None,
        }
    }
}

/// Messages from server to client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ServerMessage {
    /// Join succeeded; `session` identifies the player's tank
    JoinAccepted { session: SessionId, tank: String },
    /// Join was rejected
    JoinRejected { reason: String },
    /// Full component state for one tick
    Snapshot(SnapshotBuffer),
    /// Events produced during one tick
    Events { tick: u64, events: Vec<SimEvent> },
    /// Pong response with server timestamp
    Pong {
        client_timestamp: u64,
        server_timestamp: u64,
    },
}

/// Encode a message using bincode
pub fn encode<T: Serialize>(message: &T) -> Result<Vec<u8>, EncodeError> {
    bincode::serde::encode_to_vec(message, bincode::config::legacy())
        .map_err(|e| EncodeError(e.to_string()))
}

/// Decode a message using bincode
pub fn decode<T: for<'de> Deserialize<'de>>(data: &[u8]) -> Result<T, DecodeError> {
    bincode::serde::decode_from_slice(data, bincode::config::legacy())
        .map(|(msg, _)| msg)
        .map_err(|e| DecodeError(e.to_string()))
}

#[derive(Debug, thiserror::Error)]
#[error("Encode error: {0}")]
pub struct EncodeError(String);

#[derive(Debug, thiserror::Error)]
#[error("Decode error: {0}")]
pub struct DecodeError(String);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::ecs::Entity;
    use crate::game::events::ProjectileOutcome;
    use crate::game::physics::ProjectileId;
    use crate::util::vec3::Vec3;
    use uuid::Uuid;

    #[test]
    fn test_client_message_join() {
        let msg = ClientMessage::Join {
            tank: "Heavy".to_string(),
            loadout: vec![AmmoRounds::new("AP", 20), AmmoRounds::new("HE", 10)],
        };

        let encoded = encode(&msg).unwrap();
        let decoded: ClientMessage = decode(&encoded).unwrap();
        assert_eq!(decoded, msg);
    }

    #[test]
    fn test_into_intent() {
        let fire = ClientMessage::Fire {
            ammo: "HEAT".to_string(),
        };
        assert_eq!(
            fire.into_intent(),
            Some(IntentKind::Fire {
                ammo: "HEAT".to_string()
            })
        );

        let intent = MoveIntent {
            throttle: 1.0,
            turn: -0.5,
            ..Default::default()
        };
        assert_eq!(
            ClientMessage::Move(intent).into_intent(),
            Some(IntentKind::Move(intent))
        );
        assert_eq!(ClientMessage::Leave.into_intent(), None);
        assert_eq!(ClientMessage::Ping { timestamp: 9 }.into_intent(), None);
    }

    #[test]
    fn test_events_message() {
        let shooter = Uuid::new_v4();
        let target = Uuid::new_v4();
        let msg = ServerMessage::Events {
            tick: 314,
            events: vec![
                SimEvent::ProjectileFired {
                    projectile_id: ProjectileId::new(),
                    entity: Entity::from_raw(3),
                    shooter,
                    ammo: "AP".to_string(),
                    position: Vec3::new(0.0, 2.0, -3.0),
                    velocity: Vec3::new(0.0, 0.0, -820.0),
                },
                SimEvent::TankDestroyed {
                    session: target,
                    killer: shooter,
                },
                SimEvent::ProjectileResolved {
                    projectile_id: ProjectileId::new(),
                    shooter,
                    ammo: "AP".to_string(),
                    position: Vec3::new(0.0, 1.5, -30.0),
                    outcome: ProjectileOutcome::Tank {
                        hit_session_id: target,
                        damage: 220.0,
                    },
                },
            ],
        };

        let encoded = encode(&msg).unwrap();
        let decoded: ServerMessage = decode(&encoded).unwrap();
        assert_eq!(decoded, msg);
    }

    #[test]
    fn test_snapshot_message() {
        let mut snapshot = SnapshotBuffer {
            tick: 1000,
            ..Default::default()
        };
        snapshot.tanks.ids.push(0);
        snapshot.tanks.x.push(1.5);

        let encoded = encode(&ServerMessage::Snapshot(snapshot.clone())).unwrap();
        match decode::<ServerMessage>(&encoded).unwrap() {
            ServerMessage::Snapshot(decoded) => {
                assert_eq!(decoded.tick, 1000);
                assert_eq!(decoded.tanks.x, vec![1.5]);
            }
            other => panic!("Expected snapshot, got {:?}", other),
        }
    }

    #[test]
    fn test_invalid_decode() {
        let garbage = vec![0xFF, 0xFE, 0xFD];
        let result: Result<ClientMessage, _> = decode(&garbage);
        assert!(result.is_err());
    }
}
