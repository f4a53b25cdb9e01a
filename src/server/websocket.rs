//! Real-Time Channel
//!
//! WebSocket server for collaborative editing sessions. Each connection
//! carries at most one editor session; frames are JSON, tagged by type.
//! This is the network layer on top of the Collaboration Session.

use std::net::SocketAddr;

use chrono::Utc;
use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{broadcast, mpsc};
use tokio_tungstenite::{accept_async, tungstenite::Message};
use uuid::Uuid;

use super::config::ServerConfig;
use crate::collab::{
    CollabError, CollabMessage, CollaborationSession, EditorIdentity, MessageReceiver,
    PresenceEntry, RemoteApply, SessionDeps, UserInfo,
};
use crate::config::EngineConfig;
use crate::observability::{Logger, Severity};

/// Message from an editor client
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Open an editing session on a document
    RegisterEditor {
        document_id: Uuid,
        user_id: Uuid,
        display_name: String,
        #[serde(default = "default_true")]
        can_edit: bool,
    },

    /// Full-document content after a local edit
    DocumentChange { content: String },

    /// Explicit Save action
    SaveDocument {
        #[serde(default)]
        stats: Value,
    },

    /// Heartbeat/ping
    Heartbeat {
        #[serde(default)]
        ref_id: Option<String>,
    },
}

fn default_true() -> bool {
    true
}

/// Message to an editor client
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Session opened; lists the peers already editing
    Registered {
        session_id: Uuid,
        peers: Vec<PresenceEntry>,
    },

    /// A peer opened the document
    UserJoined { user: UserInfo },

    /// A peer left the document
    UserLeft { session_id: Uuid, user_id: Uuid },

    /// A peer's change, already filtered for echo and suppression
    DocumentChange {
        origin_session: Uuid,
        user_id: Uuid,
        content: String,
    },

    /// A save was accepted; refresh the version-history view
    DocumentSaved { user_name: String, version: u64 },

    /// Heartbeat response
    Heartbeat {
        ref_id: Option<String>,
        server_time: i64,
    },

    /// Error message
    Error { message: String, code: String },

    /// System message
    System { message: String },
}

impl ServerMessage {
    fn error(err: &CollabError) -> Self {
        let code = match err {
            CollabError::NotFound(_) => "NOT_FOUND",
            CollabError::Forbidden(_) => "FORBIDDEN",
            CollabError::Persistence(_) => "PERSISTENCE_ERROR",
            CollabError::ConnectionLost => "CONNECTION_LOST",
            CollabError::Internal(_) => "INTERNAL",
        };
        ServerMessage::Error {
            message: err.to_string(),
            code: code.to_string(),
        }
    }
}

/// WebSocket server for the collaboration channel
pub struct CollabSocketServer {
    server_config: ServerConfig,
    engine_config: EngineConfig,
    deps: SessionDeps,
    shutdown_tx: broadcast::Sender<()>,
}

impl CollabSocketServer {
    /// Create a server over the shared collaborators
    pub fn new(server_config: ServerConfig, engine_config: EngineConfig, deps: SessionDeps) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);
        Self {
            server_config,
            engine_config,
            deps,
            shutdown_tx,
        }
    }

    /// Accept connections until shutdown
    pub async fn run(&self) -> std::io::Result<()> {
        let addr: SocketAddr = self
            .server_config
            .ws_addr()
            .parse()
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidInput, e))?;

        let listener = TcpListener::bind(&addr).await?;

        Logger::log(
            Severity::Info,
            "ws.listening",
            &[("addr", &addr.to_string())],
        );

        let mut shutdown_rx = self.shutdown_tx.subscribe();

        loop {
            tokio::select! {
                accept_result = listener.accept() => {
                    match accept_result {
                        Ok((stream, peer_addr)) => {
                            let deps = self.deps.clone();
                            let engine_config = self.engine_config.clone();
                            let heartbeat_secs = self.server_config.heartbeat_secs;

                            tokio::spawn(async move {
                                if let Err(e) = handle_connection(
                                    stream,
                                    peer_addr,
                                    deps,
                                    engine_config,
                                    heartbeat_secs,
                                ).await {
                                    Logger::log_stderr(
                                        Severity::Error,
                                        "ws.connection_error",
                                        &[("error", &e), ("peer", &peer_addr.to_string())],
                                    );
                                }
                            });
                        }
                        Err(e) => {
                            Logger::log_stderr(
                                Severity::Error,
                                "ws.accept_failed",
                                &[("error", &e.to_string())],
                            );
                        }
                    }
                }

                _ = shutdown_rx.recv() => {
                    Logger::log(Severity::Info, "ws.shutdown", &[]);
                    break;
                }
            }
        }

        Ok(())
    }

    /// Signal shutdown
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(());
    }
}

/// Drive one editor connection to completion
async fn handle_connection(
    stream: TcpStream,
    peer_addr: SocketAddr,
    deps: SessionDeps,
    engine_config: EngineConfig,
    heartbeat_secs: u64,
) -> Result<(), String> {
    let ws_stream = accept_async(stream)
        .await
        .map_err(|e| format!("WebSocket handshake failed: {}", e))?;

    let (mut ws_sender, mut ws_receiver) = ws_stream.split();

    Logger::log(
        Severity::Info,
        "ws.connected",
        &[("peer", &peer_addr.to_string())],
    );

    let (msg_tx, mut msg_rx) = mpsc::channel::<ServerMessage>(256);

    let mut session: Option<CollaborationSession> = None;
    let mut hub_rx: Option<MessageReceiver> = None;

    let heartbeat_interval = tokio::time::Duration::from_secs(heartbeat_secs);
    let mut heartbeat_timer = tokio::time::interval(heartbeat_interval);

    loop {
        tokio::select! {
            // Incoming frames from the editor
            msg = ws_receiver.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        match serde_json::from_str::<ClientMessage>(&text) {
                            Ok(client_msg) => {
                                process_client_message(
                                    client_msg,
                                    &mut session,
                                    &mut hub_rx,
                                    &deps,
                                    &engine_config,
                                    &msg_tx,
                                );
                            }
                            Err(e) => {
                                let err = ServerMessage::Error {
                                    message: format!("Invalid message format: {}", e),
                                    code: "INVALID_MESSAGE".to_string(),
                                };
                                let _ = msg_tx.try_send(err);
                            }
                        }
                    }
                    Some(Ok(Message::Binary(_))) => {
                        let err = ServerMessage::Error {
                            message: "Binary messages not supported".to_string(),
                            code: "UNSUPPORTED".to_string(),
                        };
                        let _ = msg_tx.try_send(err);
                    }
                    Some(Ok(Message::Ping(data))) => {
                        if ws_sender.send(Message::Pong(data)).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        break;
                    }
                    Some(Err(_)) => {
                        break;
                    }
                    _ => {}
                }
            }

            // Outbound queue
            Some(server_msg) = msg_rx.recv() => {
                match serde_json::to_string(&server_msg) {
                    Ok(json) => {
                        if ws_sender.send(Message::Text(json)).await.is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        Logger::log_stderr(
                            Severity::Error,
                            "ws.serialize_failed",
                            &[("error", &e.to_string())],
                        );
                    }
                }
            }

            // Events fanned out by the hub for our document
            event = async {
                match hub_rx.as_mut() {
                    Some(rx) => rx.recv().await,
                    None => std::future::pending().await,
                }
            } => {
                if let Some(event) = event {
                    forward_hub_event(event, &mut session, &msg_tx);
                }
            }

            // Periodic heartbeat
            _ = heartbeat_timer.tick() => {
                let heartbeat = ServerMessage::Heartbeat {
                    ref_id: None,
                    server_time: Utc::now().timestamp(),
                };
                let _ = msg_tx.try_send(heartbeat);
            }
        }
    }

    // Cleanup runs on every exit path: flush, unsubscribe, presence leave.
    if let Some(mut session) = session {
        if let Err(e) = session.close().await {
            Logger::log_stderr(
                Severity::Warn,
                "ws.close_flush_failed",
                &[("error", &e.to_string())],
            );
        }
    }

    Logger::log(
        Severity::Info,
        "ws.disconnected",
        &[("peer", &peer_addr.to_string())],
    );
    Ok(())
}

/// Apply one client frame to the connection state
///
/// Outbound frames go through `try_send` and are dropped when the queue is
/// full: the producers live in the same select loop as the drain, so an
/// awaited send against a full queue would park the loop with no consumer
/// left. Dropping matches the hub's at-most-once contract.
fn process_client_message(
    message: ClientMessage,
    session: &mut Option<CollaborationSession>,
    hub_rx: &mut Option<MessageReceiver>,
    deps: &SessionDeps,
    engine_config: &EngineConfig,
    msg_tx: &mpsc::Sender<ServerMessage>,
) {
    match message {
        ClientMessage::RegisterEditor {
            document_id,
            user_id,
            display_name,
            can_edit,
        } => {
            if session.is_some() {
                let err = ServerMessage::Error {
                    message: "Already registered".to_string(),
                    code: "ALREADY_REGISTERED".to_string(),
                };
                let _ = msg_tx.try_send(err);
                return;
            }

            let identity = EditorIdentity {
                user_id,
                display_name,
                can_view: true,
                can_edit,
            };

            match CollaborationSession::open(
                document_id,
                identity,
                engine_config.clone(),
                deps.clone(),
            ) {
                Ok((opened, rx)) => {
                    let peers = deps
                        .presence
                        .entries(document_id)
                        .into_iter()
                        .filter(|p| p.session_id != opened.session_id())
                        .collect();
                    let registered = ServerMessage::Registered {
                        session_id: opened.session_id(),
                        peers,
                    };
                    *session = Some(opened);
                    *hub_rx = Some(rx);
                    let _ = msg_tx.try_send(registered);
                }
                Err(e) => {
                    let _ = msg_tx.try_send(ServerMessage::error(&e));
                }
            }
        }

        ClientMessage::DocumentChange { content } => {
            match session.as_mut() {
                Some(session) => {
                    if let Err(e) = session.apply_local_change(content) {
                        let _ = msg_tx.try_send(ServerMessage::error(&e));
                    }
                }
                None => {
                    let _ = msg_tx.try_send(unregistered_error());
                }
            }
        }

        ClientMessage::SaveDocument { stats } => {
            match session.as_ref() {
                Some(session) => {
                    if let Err(e) = session.manual_save(stats) {
                        let _ = msg_tx.try_send(ServerMessage::error(&e));
                    }
                }
                None => {
                    let _ = msg_tx.try_send(unregistered_error());
                }
            }
        }

        ClientMessage::Heartbeat { ref_id } => {
            let response = ServerMessage::Heartbeat {
                ref_id,
                server_time: Utc::now().timestamp(),
            };
            let _ = msg_tx.try_send(response);
        }
    }
}

/// Translate a hub event into a client frame, filtering changes through the
/// session's echo/suppression rules
///
/// Never blocks: a full outbound queue drops the frame. The session buffer
/// is still updated, and the next broadcast carries the latest content.
fn forward_hub_event(
    event: CollabMessage,
    session: &mut Option<CollaborationSession>,
    msg_tx: &mpsc::Sender<ServerMessage>,
) {
    let outbound = match event {
        CollabMessage::DocumentChange {
            origin_session,
            user_id,
            content,
            ..
        } => {
            let Some(session) = session.as_mut() else {
                return;
            };
            match session.receive_remote_change(&content, origin_session) {
                RemoteApply::Applied { .. } => Some(ServerMessage::DocumentChange {
                    origin_session,
                    user_id,
                    content,
                }),
                // Echoes and suppressed changes are dropped, not forwarded.
                RemoteApply::Echo | RemoteApply::Suppressed => None,
            }
        }
        CollabMessage::UserJoined { user, .. } => Some(ServerMessage::UserJoined { user }),
        CollabMessage::UserLeft {
            session_id,
            user_id,
            ..
        } => Some(ServerMessage::UserLeft {
            session_id,
            user_id,
        }),
        CollabMessage::DocumentSaved {
            user_name, version, ..
        } => Some(ServerMessage::DocumentSaved { user_name, version }),
    };

    if let Some(outbound) = outbound {
        let _ = msg_tx.try_send(outbound);
    }
}

fn unregistered_error() -> ServerMessage {
    ServerMessage::Error {
        message: "No session; send register_editor first".to_string(),
        code: "NOT_REGISTERED".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_message_parse() {
        let json = r#"{
            "type": "register_editor",
            "document_id": "6a0f0cde-8b4e-4b7e-9b2e-0f6a3c1d2e3f",
            "user_id": "0e1f2a3b-4c5d-6e7f-8091-a2b3c4d5e6f7",
            "display_name": "ada"
        }"#;
        let msg: ClientMessage = serde_json::from_str(json).unwrap();

        match msg {
            ClientMessage::RegisterEditor {
                display_name,
                can_edit,
                ..
            } => {
                assert_eq!(display_name, "ada");
                assert!(can_edit);
            }
            _ => panic!("Wrong message type"),
        }
    }

    #[test]
    fn test_change_message_parse() {
        let json = r#"{"type": "document_change", "content": "v1"}"#;
        let msg: ClientMessage = serde_json::from_str(json).unwrap();
        assert!(matches!(msg, ClientMessage::DocumentChange { content } if content == "v1"));
    }

    #[test]
    fn test_server_message_serialize() {
        let msg = ServerMessage::DocumentSaved {
            user_name: "ada".to_string(),
            version: 2,
        };
        let json = serde_json::to_string(&msg).unwrap();
        assert!(json.contains("\"type\":\"document_saved\""));
        assert!(json.contains("\"version\":2"));
    }

    #[tokio::test]
    async fn test_full_outbound_queue_never_blocks() {
        use crate::collab::{BroadcastHub, PresenceRegistry};
        use crate::save::{AutosaveScheduler, SavePipeline};
        use crate::store::{MemoryDocumentStore, VersionStore};
        use std::sync::Arc;
        use std::time::Duration;

        let documents = Arc::new(MemoryDocumentStore::new());
        let doc = documents.create("Notes", "v0");
        let hub = Arc::new(BroadcastHub::new());
        let pipeline = Arc::new(SavePipeline::new(
            documents.clone(),
            Arc::new(VersionStore::new()),
            hub.clone(),
            EngineConfig::default(),
        ));
        let deps = SessionDeps {
            documents,
            presence: Arc::new(PresenceRegistry::new()),
            hub,
            autosave: Arc::new(AutosaveScheduler::new(pipeline, Duration::from_secs(60))),
        };

        let (session, _rx) = CollaborationSession::open(
            doc,
            EditorIdentity::editor(Uuid::new_v4(), "ada"),
            EngineConfig::default(),
            deps,
        )
        .unwrap();
        let mut slot = Some(session);

        // A stalled client: queue of one, already full
        let (msg_tx, mut msg_rx) = mpsc::channel::<ServerMessage>(1);
        msg_tx
            .try_send(ServerMessage::System {
                message: "filler".to_string(),
            })
            .unwrap();

        let event = CollabMessage::DocumentChange {
            document_id: doc,
            origin_session: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            content: "v1".to_string(),
        };
        forward_hub_event(event, &mut slot, &msg_tx);

        // The change applied to the session; only the frame was dropped
        assert_eq!(slot.as_ref().unwrap().buffer(), "v1");
        assert!(matches!(
            msg_rx.try_recv().unwrap(),
            ServerMessage::System { .. }
        ));
        assert!(msg_rx.try_recv().is_err());
    }

    #[test]
    fn test_error_codes() {
        let msg = ServerMessage::error(&CollabError::Forbidden("edit capability required"));
        match msg {
            ServerMessage::Error { code, .. } => assert_eq!(code, "FORBIDDEN"),
            _ => panic!("Wrong message type"),
        }
    }
}
