//! # Collaboration Session
//!
//! The stateful façade bound to one open editing connection. Owns the local
//! buffer, applies remote changes when the user is not actively typing, and
//! drives the Autosave Scheduler and Broadcast Hub.
//!
//! Conflict policy is last-writer-wins by design: while a local edit is in
//! flight (the suppression window), remote changes are dropped, not queued.
//! Two users typing simultaneously will have one edit overwritten; there is
//! no operational-transform or CRDT merge in this engine.

use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde_json::Value;
use uuid::Uuid;

use super::caret::{self, CaretBookmark};
use super::errors::{CollabError, CollabResult};
use super::event::{CollabMessage, UserInfo};
use super::hub::{BroadcastHub, MessageReceiver};
use super::presence::{PresenceEntry, PresenceRegistry};
use crate::config::EngineConfig;
use crate::observability::{Logger, Severity};
use crate::save::{AutosaveScheduler, ContentStats, SaveRequest};
use crate::store::DocumentStore;

/// Caller identity, resolved by the auth collaborator and trusted as-is
#[derive(Debug, Clone)]
pub struct EditorIdentity {
    /// User ID
    pub user_id: Uuid,

    /// Display name
    pub display_name: String,

    /// May open the document
    pub can_view: bool,

    /// May change content and trigger saves
    pub can_edit: bool,
}

impl EditorIdentity {
    /// Full edit capability
    pub fn editor(user_id: Uuid, display_name: &str) -> Self {
        Self {
            user_id,
            display_name: display_name.to_string(),
            can_view: true,
            can_edit: true,
        }
    }

    /// Read-only capability
    pub fn viewer(user_id: Uuid, display_name: &str) -> Self {
        Self {
            user_id,
            display_name: display_name.to_string(),
            can_view: true,
            can_edit: false,
        }
    }
}

/// Shared collaborators a session is wired to
#[derive(Clone)]
pub struct SessionDeps {
    /// Document storage seam
    pub documents: Arc<dyn DocumentStore>,

    /// Active session registry
    pub presence: Arc<PresenceRegistry>,

    /// Change fan-out
    pub hub: Arc<BroadcastHub>,

    /// Debounced save path
    pub autosave: Arc<AutosaveScheduler>,
}

/// Outcome of applying a remote change
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteApply {
    /// Buffer replaced; caret re-anchored (0 when the bookmark could not
    /// be resolved)
    Applied { caret: usize },

    /// Our own change echoed back; dropped
    Echo,

    /// A local edit is in flight; dropped, not queued (last-writer-wins)
    Suppressed,
}

/// One open editing connection for one user on one document
pub struct CollaborationSession {
    session_id: Uuid,
    document_id: Uuid,
    identity: EditorIdentity,
    joined_at: DateTime<Utc>,
    buffer: String,
    caret: usize,
    last_local_edit_at: Option<DateTime<Utc>>,
    suppress_until: Option<Instant>,
    last_broadcast_at: Option<Instant>,
    closed: bool,
    config: EngineConfig,
    deps: SessionDeps,
}

impl CollaborationSession {
    /// Open a session against a document
    ///
    /// Fails with `NotFound` if the document does not exist and `Forbidden`
    /// if the identity lacks view capability. On success the session is
    /// registered with presence, subscribed to the hub, and a `user_joined`
    /// event reaches the other open sessions.
    pub fn open(
        document_id: Uuid,
        identity: EditorIdentity,
        config: EngineConfig,
        deps: SessionDeps,
    ) -> CollabResult<(Self, MessageReceiver)> {
        let record = deps.documents.load(document_id)?;

        if !identity.can_view {
            return Err(CollabError::Forbidden("view capability required"));
        }

        let session_id = Uuid::new_v4();

        deps.presence.join(
            document_id,
            PresenceEntry::new(session_id, identity.user_id, identity.display_name.clone()),
        );
        let receiver = deps.hub.subscribe(document_id, session_id);
        deps.hub.publish(
            document_id,
            Some(session_id),
            CollabMessage::UserJoined {
                document_id,
                user: UserInfo {
                    session_id,
                    user_id: identity.user_id,
                    display_name: identity.display_name.clone(),
                },
                timestamp: Utc::now(),
            },
        );

        Logger::log(
            Severity::Info,
            "session.opened",
            &[
                ("document", &document_id.to_string()),
                ("session", &session_id.to_string()),
                ("user", &identity.user_id.to_string()),
            ],
        );

        let session = Self {
            session_id,
            document_id,
            identity,
            joined_at: Utc::now(),
            buffer: record.current_content,
            caret: 0,
            last_local_edit_at: None,
            suppress_until: None,
            last_broadcast_at: None,
            closed: false,
            config,
            deps,
        };

        Ok((session, receiver))
    }

    /// Record a local edit
    ///
    /// Starts (or extends) the remote-change suppression window, hands the
    /// content to the debounced autosave path, and broadcasts it to the
    /// other sessions, throttled: at most one broadcast per throttle
    /// interval. Dropped intermediates are fine under last-writer-wins —
    /// the autosave path always carries the latest content.
    pub fn apply_local_change(&mut self, content: String) -> CollabResult<()> {
        if self.closed {
            return Err(CollabError::Internal("session closed".into()));
        }
        if !self.identity.can_edit {
            return Err(CollabError::Forbidden("edit capability required"));
        }

        self.buffer = content;
        self.caret = caret::clamp_to_boundary(&self.buffer, self.caret);
        self.last_local_edit_at = Some(Utc::now());
        self.suppress_until = Some(Instant::now() + self.config.suppression());

        self.deps
            .autosave
            .schedule_debounced(self.session_id, self.save_request(false, Value::Null));

        let throttled = self
            .last_broadcast_at
            .is_some_and(|at| at.elapsed() < self.config.broadcast_throttle());
        if !throttled {
            self.last_broadcast_at = Some(Instant::now());
            self.deps.hub.publish(
                self.document_id,
                Some(self.session_id),
                CollabMessage::DocumentChange {
                    document_id: self.document_id,
                    origin_session: self.session_id,
                    user_id: self.identity.user_id,
                    content: self.buffer.clone(),
                },
            );
        }

        Ok(())
    }

    /// Apply a change originating from another session
    ///
    /// Echoes and suppressed changes are dropped. An applied change replaces
    /// the buffer and re-anchors the caret through a position bookmark; when
    /// the bookmark cannot be resolved the caret resets to the start.
    pub fn receive_remote_change(&mut self, content: &str, origin: Uuid) -> RemoteApply {
        if origin == self.session_id {
            return RemoteApply::Echo;
        }
        if self.is_suppressing() {
            return RemoteApply::Suppressed;
        }

        let bookmark = CaretBookmark::capture(&self.buffer, self.caret);
        self.buffer = content.to_string();
        self.caret = bookmark.resolve(&self.buffer);

        RemoteApply::Applied { caret: self.caret }
    }

    /// Trigger an explicit Save (always cuts a version)
    pub fn manual_save(&self, extra: Value) -> CollabResult<()> {
        if !self.identity.can_edit {
            return Err(CollabError::Forbidden("edit capability required"));
        }
        self.deps
            .autosave
            .schedule_forced(self.session_id, self.save_request(true, extra));
        Ok(())
    }

    /// Close the session
    ///
    /// Flushes any pending autosave, unsubscribes from the hub, and removes
    /// the presence entry. All three steps run even if one fails; the first
    /// failure is reported after the sweep. Closing twice is a no-op.
    pub async fn close(&mut self) -> CollabResult<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;

        let flush_result = self.deps.autosave.flush(self.session_id).await;

        self.deps.hub.unsubscribe(self.document_id, self.session_id);

        if let Some(entry) = self.deps.presence.leave(self.document_id, self.session_id) {
            self.deps.hub.publish(
                self.document_id,
                Some(self.session_id),
                CollabMessage::UserLeft {
                    document_id: self.document_id,
                    session_id: self.session_id,
                    user_id: entry.user_id,
                    timestamp: Utc::now(),
                },
            );
        }

        Logger::log(
            Severity::Info,
            "session.closed",
            &[
                ("document", &self.document_id.to_string()),
                ("session", &self.session_id.to_string()),
            ],
        );

        flush_result.map(|_| ()).map_err(CollabError::from)
    }

    fn save_request(&self, is_major: bool, extra: Value) -> SaveRequest {
        SaveRequest {
            document_id: self.document_id,
            content: self.buffer.clone(),
            author_id: self.identity.user_id,
            author_name: self.identity.display_name.clone(),
            is_major,
            stats: ContentStats::from_content(&self.buffer, extra),
        }
    }

    /// True while the suppression window of the last local edit is open
    pub fn is_suppressing(&self) -> bool {
        self.suppress_until
            .is_some_and(|until| Instant::now() < until)
    }

    /// Session ID
    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    /// Document ID
    pub fn document_id(&self) -> Uuid {
        self.document_id
    }

    /// The identity this session runs as
    pub fn identity(&self) -> &EditorIdentity {
        &self.identity
    }

    /// When the session joined
    pub fn joined_at(&self) -> DateTime<Utc> {
        self.joined_at
    }

    /// Current local buffer
    pub fn buffer(&self) -> &str {
        &self.buffer
    }

    /// Current caret offset into the buffer
    pub fn caret(&self) -> usize {
        self.caret
    }

    /// Timestamp of the last local edit, if any
    pub fn last_local_edit_at(&self) -> Option<DateTime<Utc>> {
        self.last_local_edit_at
    }
}

impl Drop for CollaborationSession {
    /// Abrupt-disconnect safety net: registry membership and the hub
    /// subscription are released even when `close` was never awaited. The
    /// pending autosave cannot be flushed from a destructor; the debounce
    /// timer delivers it instead.
    fn drop(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        self.deps.hub.unsubscribe(self.document_id, self.session_id);
        if let Some(entry) = self.deps.presence.leave(self.document_id, self.session_id) {
            self.deps.hub.publish(
                self.document_id,
                Some(self.session_id),
                CollabMessage::UserLeft {
                    document_id: self.document_id,
                    session_id: self.session_id,
                    user_id: entry.user_id,
                    timestamp: Utc::now(),
                },
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::save::SavePipeline;
    use crate::store::{MemoryDocumentStore, VersionStore};
    use std::time::Duration;

    fn deps() -> (SessionDeps, Arc<MemoryDocumentStore>) {
        let documents: Arc<MemoryDocumentStore> = Arc::new(MemoryDocumentStore::new());
        let hub = Arc::new(BroadcastHub::new());
        let pipeline = Arc::new(SavePipeline::new(
            documents.clone(),
            Arc::new(VersionStore::new()),
            hub.clone(),
            EngineConfig::default(),
        ));
        let autosave = Arc::new(AutosaveScheduler::new(pipeline, Duration::from_millis(20)));
        (
            SessionDeps {
                documents: documents.clone(),
                presence: Arc::new(PresenceRegistry::new()),
                hub,
                autosave,
            },
            documents,
        )
    }

    fn fast_config() -> EngineConfig {
        EngineConfig {
            debounce_ms: 20,
            suppression_ms: 40,
            broadcast_throttle_ms: 0,
            ..EngineConfig::default()
        }
    }

    #[tokio::test]
    async fn test_open_missing_document() {
        let (deps, _documents) = deps();
        let result = CollaborationSession::open(
            Uuid::new_v4(),
            EditorIdentity::editor(Uuid::new_v4(), "ada"),
            fast_config(),
            deps,
        );
        assert!(matches!(result, Err(CollabError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_open_without_view_capability() {
        let (deps, documents) = deps();
        let doc = documents.create("Notes", "v0");

        let mut identity = EditorIdentity::viewer(Uuid::new_v4(), "ada");
        identity.can_view = false;

        let result = CollaborationSession::open(doc, identity, fast_config(), deps);
        assert!(matches!(result, Err(CollabError::Forbidden(_))));
    }

    #[tokio::test]
    async fn test_open_registers_presence_and_seeds_buffer() {
        let (deps, documents) = deps();
        let doc = documents.create("Notes", "v0");

        let (session, _rx) = CollaborationSession::open(
            doc,
            EditorIdentity::editor(Uuid::new_v4(), "ada"),
            fast_config(),
            deps.clone(),
        )
        .unwrap();

        assert_eq!(session.buffer(), "v0");
        assert!(deps.presence.is_present(doc, session.session_id()));
    }

    #[tokio::test]
    async fn test_viewer_cannot_edit() {
        let (deps, documents) = deps();
        let doc = documents.create("Notes", "v0");

        let (mut session, _rx) = CollaborationSession::open(
            doc,
            EditorIdentity::viewer(Uuid::new_v4(), "ada"),
            fast_config(),
            deps,
        )
        .unwrap();

        let result = session.apply_local_change("v1".to_string());
        assert!(matches!(result, Err(CollabError::Forbidden(_))));
        assert!(matches!(
            session.manual_save(Value::Null),
            Err(CollabError::Forbidden(_))
        ));
    }

    #[tokio::test]
    async fn test_echo_is_dropped() {
        let (deps, documents) = deps();
        let doc = documents.create("Notes", "v0");

        let (mut session, _rx) = CollaborationSession::open(
            doc,
            EditorIdentity::editor(Uuid::new_v4(), "ada"),
            fast_config(),
            deps,
        )
        .unwrap();

        let own = session.session_id();
        assert_eq!(session.receive_remote_change("v1", own), RemoteApply::Echo);
        assert_eq!(session.buffer(), "v0");
    }

    #[tokio::test]
    async fn test_suppression_window_is_bounded() {
        let (deps, documents) = deps();
        let doc = documents.create("Notes", "v0");

        let (mut session, _rx) = CollaborationSession::open(
            doc,
            EditorIdentity::editor(Uuid::new_v4(), "ada"),
            fast_config(),
            deps,
        )
        .unwrap();

        session.apply_local_change("local".to_string()).unwrap();
        let other = Uuid::new_v4();

        // Dropped while typing
        assert_eq!(
            session.receive_remote_change("remote", other),
            RemoteApply::Suppressed
        );
        assert_eq!(session.buffer(), "local");

        // The window clears after the configured inactivity
        tokio::time::sleep(Duration::from_millis(60)).await;
        assert!(!session.is_suppressing());
        assert!(matches!(
            session.receive_remote_change("remote", other),
            RemoteApply::Applied { .. }
        ));
        assert_eq!(session.buffer(), "remote");
    }

    #[tokio::test]
    async fn test_local_change_keeps_caret_on_char_boundary() {
        let (deps, documents) = deps();
        let doc = documents.create("Notes", "hello");

        let (mut session, _rx) = CollaborationSession::open(
            doc,
            EditorIdentity::editor(Uuid::new_v4(), "ada"),
            fast_config(),
            deps,
        )
        .unwrap();

        // The suffix anchor shifts the caret to byte offset 3
        let other = Uuid::new_v4();
        assert_eq!(
            session.receive_remote_change("é hello", other),
            RemoteApply::Applied { caret: 3 }
        );

        // Byte 3 of the new buffer lands inside the two-byte 'é'
        session.apply_local_change("xxé".to_string()).unwrap();
        assert!(session.buffer().is_char_boundary(session.caret()));
        assert_eq!(session.caret(), 2);
    }

    #[tokio::test]
    async fn test_close_is_idempotent_and_cleans_up() {
        let (deps, documents) = deps();
        let doc = documents.create("Notes", "v0");

        let (mut session, _rx) = CollaborationSession::open(
            doc,
            EditorIdentity::editor(Uuid::new_v4(), "ada"),
            fast_config(),
            deps.clone(),
        )
        .unwrap();
        let session_id = session.session_id();

        session.close().await.unwrap();
        assert!(!deps.presence.is_present(doc, session_id));
        assert_eq!(deps.hub.subscriber_count(doc), 0);

        session.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_close_flushes_pending_autosave() {
        let (deps, documents) = deps();
        let doc = documents.create("Notes", "v0");

        let mut config = fast_config();
        config.debounce_ms = 10_000;

        // Scheduler with a long debounce so only the flush can save
        let (mut session, _rx) = CollaborationSession::open(
            doc,
            EditorIdentity::editor(Uuid::new_v4(), "ada"),
            config,
            SessionDeps {
                autosave: Arc::new(AutosaveScheduler::new(
                    deps.autosave.pipeline().clone(),
                    Duration::from_secs(10),
                )),
                ..deps
            },
        )
        .unwrap();

        session.apply_local_change("draft".to_string()).unwrap();
        session.close().await.unwrap();

        assert_eq!(documents.load(doc).unwrap().current_content, "draft");
    }

    #[tokio::test]
    async fn test_drop_releases_presence_and_subscription() {
        let (deps, documents) = deps();
        let doc = documents.create("Notes", "v0");

        let (session, _rx) = CollaborationSession::open(
            doc,
            EditorIdentity::editor(Uuid::new_v4(), "ada"),
            fast_config(),
            deps.clone(),
        )
        .unwrap();
        let session_id = session.session_id();

        drop(session);
        assert!(!deps.presence.is_present(doc, session_id));
        assert_eq!(deps.hub.subscriber_count(doc), 0);
    }
}
