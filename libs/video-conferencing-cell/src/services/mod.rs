// libs/video-conferencing-cell/src/services/mod.rs

pub mod join_link;
pub mod session;
pub mod signaling;
pub mod supabase_store;

pub use join_link::JoinLinkBuilder;
pub use session::{InMemoryVideoSessionStore, VideoSessionManager, VideoSessionStore};
pub use signaling::{Membership, PeerConnection, RelayFrame, SignalingRelay};
pub use supabase_store::SupabaseVideoSessionStore;
