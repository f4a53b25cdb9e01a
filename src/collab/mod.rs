//! # Collaboration
//!
//! Multi-session editing of one document: presence, change broadcast,
//! caret re-anchoring, bounded reconnection, and the session façade that
//! ties them to the save path.
//!
//! ## Architecture
//!
//! - **Presence**: who has the document open
//! - **Hub**: best-effort pub/sub fan-out between sessions
//! - **Caret**: bookmark heuristic for remote-apply
//! - **Reconnect**: bounded-retry state machine
//! - **Session**: the per-connection façade

pub mod caret;
pub mod errors;
pub mod event;
pub mod hub;
pub mod presence;
pub mod reconnect;
pub mod session;

pub use caret::CaretBookmark;
pub use errors::{CollabError, CollabResult};
pub use event::{CollabMessage, UserInfo};
pub use hub::{BroadcastHub, DeliveryReport, MessageReceiver};
pub use presence::{PresenceEntry, PresenceRegistry};
pub use reconnect::{ReconnectPolicy, ReconnectState, Reconnector};
pub use session::{CollaborationSession, EditorIdentity, RemoteApply, SessionDeps};
