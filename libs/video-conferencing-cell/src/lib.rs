// libs/video-conferencing-cell/src/lib.rs
//! # Video Conferencing Cell
//!
//! Peer-to-peer calls between a doctor and a patient. The server never touches media:
//! it creates one session (room name and join URL) per appointment and relays opaque
//! signaling frames between the two browsers.
//!
//! ```text
//! +-----------------------------------------------------+
//! |  handlers.rs      |  ws upgrade, session lookup      |
//! |  router.rs        |  routes and shared cell state    |
//! |  models.rs        |  sessions, roles, join links     |
//! |  services/        |                                  |
//! |    session.rs     |  session store + manager         |
//! |    signaling.rs   |  two-slot room relay             |
//! |    join_link.rs   |  relative join URL builder       |
//! +-----------------------------------------------------+
//! ```
//!
//! ## API Endpoints
//!
//! - `GET /video/ws?appointment_id=<id>&role=doctor|patient` - signaling websocket
//! - `GET /video/appointments/{id}/session` - current session of an appointment
//! - `GET /video/health` - relay health and active room count

pub mod handlers;
pub mod models;
pub mod router;
pub mod services;

pub use models::{JoinLink, ParticipantRole, VideoConferencingError, VideoSession};

pub use services::{
    InMemoryVideoSessionStore, JoinLinkBuilder, SignalingRelay, SupabaseVideoSessionStore,
    VideoSessionManager, VideoSessionStore,
};

pub use router::{video_conferencing_routes, VideoCellState};
