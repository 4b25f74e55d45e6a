// libs/video-conferencing-cell/src/services/signaling.rs
//! In-memory pairing of the two browser peers of an appointment.
//!
//! The registry maps appointment ids to rooms and is only locked to find, create or
//! evict a room. Each room guards its two peer slots with its own lock, so forwarding
//! a frame never touches the registry.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::{mpsc, oneshot, Mutex};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::models::ParticipantRole;

/// Opaque signaling payload. The relay never inspects it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayFrame {
    Text(String),
    Binary(Vec<u8>),
}

struct PeerHandle {
    connection_id: u64,
    outbound: mpsc::UnboundedSender<RelayFrame>,
    evict: Option<oneshot::Sender<()>>,
}

impl PeerHandle {
    fn evict(mut self) {
        if let Some(evict) = self.evict.take() {
            let _ = evict.send(());
        }
    }
}

#[derive(Default)]
struct RoomPeers {
    doctor: Option<PeerHandle>,
    patient: Option<PeerHandle>,
}

impl RoomPeers {
    fn slot(&self, role: ParticipantRole) -> &Option<PeerHandle> {
        match role {
            ParticipantRole::Doctor => &self.doctor,
            ParticipantRole::Patient => &self.patient,
        }
    }

    fn slot_mut(&mut self, role: ParticipantRole) -> &mut Option<PeerHandle> {
        match role {
            ParticipantRole::Doctor => &mut self.doctor,
            ParticipantRole::Patient => &mut self.patient,
        }
    }

    fn is_empty(&self) -> bool {
        self.doctor.is_none() && self.patient.is_none()
    }
}

#[derive(Default)]
struct Room {
    peers: Mutex<RoomPeers>,
}

/// A connection's place in a room. Needed to forward frames and to leave.
pub struct Membership {
    appointment_id: Uuid,
    role: ParticipantRole,
    connection_id: u64,
    room: Arc<Room>,
}

impl Membership {
    pub fn appointment_id(&self) -> Uuid {
        self.appointment_id
    }

    pub fn role(&self) -> ParticipantRole {
        self.role
    }

    pub fn connection_id(&self) -> u64 {
        self.connection_id
    }
}

pub struct PeerConnection {
    pub membership: Membership,
    /// Frames sent by the other peer. Closes when this connection is replaced or leaves.
    pub outbound: mpsc::UnboundedReceiver<RelayFrame>,
    /// Resolves when a newer connection took over this role.
    pub evicted: oneshot::Receiver<()>,
}

pub struct SignalingRelay {
    rooms: Mutex<HashMap<Uuid, Arc<Room>>>,
    next_connection_id: AtomicU64,
}

impl Default for SignalingRelay {
    fn default() -> Self {
        Self::new()
    }
}

impl SignalingRelay {
    pub fn new() -> Self {
        Self {
            rooms: Mutex::new(HashMap::new()),
            next_connection_id: AtomicU64::new(1),
        }
    }

    /// Places a connection into the appointment's room. An existing connection holding
    /// the same role is evicted before the new one takes the slot.
    pub async fn join(&self, appointment_id: Uuid, role: ParticipantRole) -> PeerConnection {
        let connection_id = self.next_connection_id.fetch_add(1, Ordering::Relaxed);
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let (evict_tx, evict_rx) = oneshot::channel();

        let mut rooms = self.rooms.lock().await;
        let room = rooms.entry(appointment_id).or_default().clone();

        let mut peers = room.peers.lock().await;
        let previous = peers.slot_mut(role).replace(PeerHandle {
            connection_id,
            outbound: outbound_tx,
            evict: Some(evict_tx),
        });

        if let Some(previous) = previous {
            warn!(
                "Replacing {} connection {} in room {}",
                role, previous.connection_id, appointment_id
            );
            previous.evict();
        }

        info!("{} joined signaling room {} (connection {})", role, appointment_id, connection_id);
        drop(peers);
        drop(rooms);

        PeerConnection {
            membership: Membership {
                appointment_id,
                role,
                connection_id,
                room,
            },
            outbound: outbound_rx,
            evicted: evict_rx,
        }
    }

    /// Hands a frame to the other peer of the room. Returns `false` when the frame was
    /// dropped: the other slot is empty, or the sender no longer owns its own slot.
    pub async fn forward(&self, from: &Membership, frame: RelayFrame) -> bool {
        let peers = from.room.peers.lock().await;

        let still_owner = peers
            .slot(from.role)
            .as_ref()
            .map(|own| own.connection_id == from.connection_id)
            .unwrap_or(false);
        if !still_owner {
            debug!("Dropping frame from stale {} connection {}", from.role, from.connection_id);
            return false;
        }

        match peers.slot(from.role.counterpart()) {
            Some(peer) => peer.outbound.send(frame).is_ok(),
            None => {
                debug!(
                    "No {} in room {} yet, dropping frame",
                    from.role.counterpart(),
                    from.appointment_id
                );
                false
            }
        }
    }

    /// Clears the connection's slot if it still owns it and evicts the room once empty.
    pub async fn leave(&self, membership: Membership) {
        let mut rooms = self.rooms.lock().await;
        let mut peers = membership.room.peers.lock().await;

        let slot = peers.slot_mut(membership.role);
        let owns_slot = slot
            .as_ref()
            .map(|own| own.connection_id == membership.connection_id)
            .unwrap_or(false);
        if owns_slot {
            slot.take();
            info!(
                "{} left signaling room {} (connection {})",
                membership.role, membership.appointment_id, membership.connection_id
            );
        }

        if peers.is_empty() {
            let registered_here = rooms
                .get(&membership.appointment_id)
                .map(|room| Arc::ptr_eq(room, &membership.room))
                .unwrap_or(false);
            if registered_here {
                rooms.remove(&membership.appointment_id);
                debug!("Signaling room {} evicted", membership.appointment_id);
            }
        }
    }

    pub async fn active_rooms(&self) -> usize {
        self.rooms.lock().await.len()
    }

    /// Roles currently connected in a room, doctor first.
    pub async fn connected_roles(&self, appointment_id: Uuid) -> Vec<ParticipantRole> {
        let room = match self.rooms.lock().await.get(&appointment_id) {
            Some(room) => room.clone(),
            None => return Vec::new(),
        };

        let peers = room.peers.lock().await;
        [ParticipantRole::Doctor, ParticipantRole::Patient]
            .into_iter()
            .filter(|role| peers.slot(*role).is_some())
            .collect()
    }
}
