//! The session actor and its handle.

use crate::error::{Result, SessionError};
use chrono::Utc;
use codeflow_core::{Config, Node, Position, SourceRange};
use codeflow_graph::{
    CodeGraph, DropOutcome, DropTarget, GraphDocument, Membership, Snapshot, Viewport,
};
use codeflow_loader::{FileLoader, LoadError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, oneshot};
use tracing::{debug, info, warn};

// ─────────────────────────────────────────────────────────────────────────────
// Types
// ─────────────────────────────────────────────────────────────────────────────

/// Session settings, usually taken from the project config.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Editor line height used to map drop points to lines.
    pub line_height: f64,
    /// Where loaded files appear when no position is given.
    pub load_position: Position,
    /// Capacity of the gesture queue and the broadcast channel.
    pub channel_capacity: usize,
}

impl From<&Config> for SessionConfig {
    fn from(config: &Config) -> Self {
        Self {
            line_height: config.line_height,
            load_position: config.load_position,
            channel_capacity: config.snapshot_channel_capacity,
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self::from(&Config::default())
    }
}

/// Where a loaded file's text goes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum LoadTarget {
    /// A fresh editor node, named after the file.
    NewNode { position: Option<Position> },
    /// Replaces the text of an existing editor.
    Existing { node_id: String },
}

/// One user action against the graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Gesture {
    AddNode {
        node: Node,
    },
    RemoveNode {
        node_id: String,
    },
    UpdateText {
        node_id: String,
        text: String,
    },
    SetSelection {
        node_id: String,
        range: Option<SourceRange>,
    },
    Connect {
        source: String,
        source_handle: String,
        target: String,
        target_handle: String,
    },
    RemoveEdge {
        edge_id: String,
    },
    /// Drag end. `position` is in the node's current frame.
    NodeDragged {
        node_id: String,
        position: Position,
        candidate_groups: Vec<String>,
    },
    /// Connection drag end.
    ConnectionDropped {
        from: String,
        handle_id: String,
        target: DropTarget,
    },
    SetHidden {
        node_id: String,
        hidden: bool,
    },
    RenameNode {
        node_id: String,
        file_name: String,
    },
    UpdateSettings {
        values: BTreeMap<String, String>,
    },
    LoadFile {
        file_id: String,
        target: LoadTarget,
    },
}

/// The result of an applied gesture.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Outcome {
    Applied,
    EdgeCreated { edge_id: String },
    Membership(Membership),
    Dropped(DropOutcome),
    /// The file is being read; a `FileLoaded` or `LoadFailed` message follows.
    LoadStarted { file_id: String },
}

/// Messages broadcast to all subscribers.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", content = "payload")]
pub enum SessionMessage {
    GraphUpdate(GraphUpdatePayload),
    FileLoaded(FileLoadedPayload),
    LoadFailed(LoadFailedPayload),
}

#[derive(Debug, Clone, Serialize)]
pub struct GraphUpdatePayload {
    /// Milliseconds since the Unix epoch.
    pub timestamp: i64,
    pub snapshot: Snapshot,
}

#[derive(Debug, Clone, Serialize)]
pub struct FileLoadedPayload {
    pub file_id: String,
    pub node_id: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct LoadFailedPayload {
    pub file_id: String,
    pub error: String,
}

enum Command {
    Apply {
        gesture: Gesture,
        reply: oneshot::Sender<Result<Outcome>>,
    },
    Snapshot {
        reply: oneshot::Sender<Snapshot>,
    },
    Document {
        viewport: Viewport,
        reply: oneshot::Sender<GraphDocument>,
    },
}

struct Loaded {
    file_id: String,
    target: LoadTarget,
    result: std::result::Result<String, LoadError>,
}

// ─────────────────────────────────────────────────────────────────────────────
// SessionHandle
// ─────────────────────────────────────────────────────────────────────────────

/// A cloneable handle to a running session.
#[derive(Clone)]
pub struct SessionHandle {
    commands: mpsc::Sender<Command>,
    broadcast_tx: broadcast::Sender<SessionMessage>,
}

impl SessionHandle {
    /// Starts a session owning `graph`. Must be called inside a tokio
    /// runtime. The session stops once every handle is dropped.
    pub fn spawn(graph: CodeGraph, loader: FileLoader, config: SessionConfig) -> Self {
        let capacity = config.channel_capacity.max(1);
        let (commands, command_rx) = mpsc::channel(capacity);
        let (broadcast_tx, _) = broadcast::channel(capacity);
        let (session, load_rx) = Session::new(graph, loader, config, broadcast_tx.clone());

        tokio::spawn(session.run(command_rx, load_rx));

        Self {
            commands,
            broadcast_tx,
        }
    }

    /// Returns a broadcast receiver for session messages.
    pub fn subscribe(&self) -> broadcast::Receiver<SessionMessage> {
        self.broadcast_tx.subscribe()
    }

    /// Applies one gesture and waits for its outcome.
    pub async fn apply(&self, gesture: Gesture) -> Result<Outcome> {
        let (reply, rx) = oneshot::channel();
        self.commands
            .send(Command::Apply { gesture, reply })
            .await
            .map_err(|_| SessionError::Closed)?;
        rx.await.map_err(|_| SessionError::Closed)?
    }

    /// Returns the current snapshot.
    pub async fn snapshot(&self) -> Result<Snapshot> {
        let (reply, rx) = oneshot::channel();
        self.commands
            .send(Command::Snapshot { reply })
            .await
            .map_err(|_| SessionError::Closed)?;
        rx.await.map_err(|_| SessionError::Closed)
    }

    /// Returns the saveable form of the current graph.
    pub async fn document(&self, viewport: Viewport) -> Result<GraphDocument> {
        let (reply, rx) = oneshot::channel();
        self.commands
            .send(Command::Document { viewport, reply })
            .await
            .map_err(|_| SessionError::Closed)?;
        rx.await.map_err(|_| SessionError::Closed)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Session actor
// ─────────────────────────────────────────────────────────────────────────────

struct Session {
    graph: CodeGraph,
    loader: Arc<FileLoader>,
    config: SessionConfig,
    broadcast_tx: broadcast::Sender<SessionMessage>,
    load_tx: mpsc::UnboundedSender<Loaded>,
}

impl Session {
    fn new(
        graph: CodeGraph,
        loader: FileLoader,
        config: SessionConfig,
        broadcast_tx: broadcast::Sender<SessionMessage>,
    ) -> (Self, mpsc::UnboundedReceiver<Loaded>) {
        let (load_tx, load_rx) = mpsc::unbounded_channel();
        let session = Self {
            graph,
            loader: Arc::new(loader),
            config,
            broadcast_tx,
            load_tx,
        };
        (session, load_rx)
    }

    async fn run(
        mut self,
        mut commands: mpsc::Receiver<Command>,
        mut loads: mpsc::UnboundedReceiver<Loaded>,
    ) {
        info!(nodes = self.graph.node_count(), "session started");

        loop {
            tokio::select! {
                command = commands.recv() => match command {
                    Some(command) => self.handle(command),
                    None => break,
                },
                Some(loaded) = loads.recv() => self.finish_load(loaded),
            }
        }

        info!("session stopped");
    }

    fn handle(&mut self, command: Command) {
        match command {
            Command::Apply { gesture, reply } => {
                let before = self.graph.revision();
                let result = self.apply(gesture);
                if let Err(e) = &result {
                    warn!("gesture rejected: {}", e);
                }
                if self.graph.revision() != before {
                    self.publish();
                }
                let _ = reply.send(result);
            }
            Command::Snapshot { reply } => {
                let _ = reply.send(self.graph.snapshot());
            }
            Command::Document { viewport, reply } => {
                let _ = reply.send(self.graph.to_document(viewport));
            }
        }
    }

    fn apply(&mut self, gesture: Gesture) -> Result<Outcome> {
        let graph = &mut self.graph;
        let outcome = match gesture {
            Gesture::AddNode { node } => {
                graph.add_node(node)?;
                Outcome::Applied
            }
            Gesture::RemoveNode { node_id } => {
                graph.remove_node(&node_id)?;
                Outcome::Applied
            }
            Gesture::UpdateText { node_id, text } => {
                graph.update_node_text(&node_id, text)?;
                Outcome::Applied
            }
            Gesture::SetSelection { node_id, range } => {
                graph.set_selection(&node_id, range)?;
                Outcome::Applied
            }
            Gesture::Connect {
                source,
                source_handle,
                target,
                target_handle,
            } => {
                let edge_id = graph.connect(&source, &source_handle, &target, &target_handle)?;
                Outcome::EdgeCreated { edge_id }
            }
            Gesture::RemoveEdge { edge_id } => {
                graph.remove_edge(&edge_id)?;
                Outcome::Applied
            }
            Gesture::NodeDragged {
                node_id,
                position,
                candidate_groups,
            } => Outcome::Membership(graph.drop_node(&node_id, position, &candidate_groups)?),
            Gesture::ConnectionDropped {
                from,
                handle_id,
                target,
            } => Outcome::Dropped(graph.connection_dropped(
                &from,
                &handle_id,
                target,
                self.config.line_height,
            )?),
            Gesture::SetHidden { node_id, hidden } => {
                graph.set_hidden(&node_id, hidden)?;
                Outcome::Applied
            }
            Gesture::RenameNode { node_id, file_name } => {
                graph.rename_node(&node_id, file_name)?;
                Outcome::Applied
            }
            Gesture::UpdateSettings { values } => {
                let updated = graph.update_settings(&values);
                debug!(updated, "updated settings nodes");
                Outcome::Applied
            }
            Gesture::LoadFile { file_id, target } => {
                self.start_load(file_id.clone(), target);
                Outcome::LoadStarted { file_id }
            }
        };
        Ok(outcome)
    }

    fn start_load(&self, file_id: String, target: LoadTarget) {
        let loader = Arc::clone(&self.loader);
        let load_tx = self.load_tx.clone();

        tokio::spawn(async move {
            let result = loader.load(&file_id).await;
            let _ = load_tx.send(Loaded {
                file_id,
                target,
                result,
            });
        });
    }

    /// Applies a finished load. A target node removed in the meantime
    /// makes this a no-op.
    fn finish_load(&mut self, loaded: Loaded) {
        let Loaded {
            file_id,
            target,
            result,
        } = loaded;

        let text = match result {
            Ok(text) => text,
            Err(e) => {
                warn!(file = %file_id, "load failed: {}", e);
                self.send(SessionMessage::LoadFailed(LoadFailedPayload {
                    file_id,
                    error: e.to_string(),
                }));
                return;
            }
        };

        let applied = match target {
            LoadTarget::NewNode { position } => {
                let node_id = self.graph.next_node_id();
                let node = Node::editor(&node_id, &file_id, text)
                    .at(position.unwrap_or(self.config.load_position));
                self.graph.add_node(node).map(|()| node_id)
            }
            LoadTarget::Existing { node_id } => {
                if !self.graph.contains(&node_id) {
                    debug!(file = %file_id, node = %node_id, "target node is gone, discarding load");
                    return;
                }
                self.graph
                    .update_node_text(&node_id, text)
                    .map(|()| node_id)
            }
        };

        match applied {
            Ok(node_id) => {
                info!(file = %file_id, node = %node_id, "file loaded");
                self.publish();
                self.send(SessionMessage::FileLoaded(FileLoadedPayload { file_id, node_id }));
            }
            Err(e) => {
                warn!(file = %file_id, "could not apply loaded file: {}", e);
                self.send(SessionMessage::LoadFailed(LoadFailedPayload {
                    file_id,
                    error: e.to_string(),
                }));
            }
        }
    }

    fn publish(&self) {
        self.send(SessionMessage::GraphUpdate(GraphUpdatePayload {
            timestamp: Utc::now().timestamp_millis(),
            snapshot: self.graph.snapshot(),
        }));
    }

    fn send(&self, message: SessionMessage) {
        // No subscribers is fine.
        let _ = self.broadcast_tx.send(message);
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use codeflow_graph::GraphError;
    use std::time::Duration;
    use tempfile::tempdir;

    fn spawn_empty(root: &std::path::Path) -> SessionHandle {
        SessionHandle::spawn(
            CodeGraph::new().unwrap(),
            FileLoader::new(root),
            SessionConfig::default(),
        )
    }

    async fn next_message(rx: &mut broadcast::Receiver<SessionMessage>) -> SessionMessage {
        tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("timed out waiting for session message")
            .unwrap()
    }

    fn editor(id: &str, text: &str) -> Gesture {
        Gesture::AddNode {
            node: Node::editor(id, format!("./{}.js", id), text),
        }
    }

    #[tokio::test]
    async fn test_gestures_apply_in_order() {
        let dir = tempdir().unwrap();
        let session = spawn_empty(dir.path());

        session.apply(editor("1", "export function foo() {}\n")).await.unwrap();
        session
            .apply(editor("2", "import { foo } from './1.js';\n"))
            .await
            .unwrap();
        let outcome = session
            .apply(Gesture::Connect {
                source: "1".into(),
                source_handle: "1:function:foo".into(),
                target: "2".into(),
                target_handle: "2:plain_import:foo".into(),
            })
            .await
            .unwrap();
        assert!(matches!(outcome, Outcome::EdgeCreated { .. }));

        session
            .apply(Gesture::UpdateText {
                node_id: "1".into(),
                text: "export function bar() {}\n".into(),
            })
            .await
            .unwrap();

        let snapshot = session.snapshot().await.unwrap();
        assert_eq!(snapshot.nodes.len(), 2);
        assert!(snapshot.edges.is_empty());
    }

    #[tokio::test]
    async fn test_subscribers_see_each_revision() {
        let dir = tempdir().unwrap();
        let session = spawn_empty(dir.path());
        let mut rx = session.subscribe();

        session.apply(editor("1", "")).await.unwrap();
        session
            .apply(Gesture::SetHidden {
                node_id: "1".into(),
                hidden: true,
            })
            .await
            .unwrap();

        let SessionMessage::GraphUpdate(first) = next_message(&mut rx).await else {
            panic!("expected graph update");
        };
        let SessionMessage::GraphUpdate(second) = next_message(&mut rx).await else {
            panic!("expected graph update");
        };
        assert!(second.snapshot.revision > first.snapshot.revision);
        assert!(second.snapshot.nodes[0].hidden);
    }

    #[tokio::test]
    async fn test_rejected_gesture_changes_nothing() {
        let dir = tempdir().unwrap();
        let session = spawn_empty(dir.path());
        let mut rx = session.subscribe();

        let result = session
            .apply(Gesture::RemoveNode {
                node_id: "ghost".into(),
            })
            .await;
        assert!(matches!(
            result,
            Err(SessionError::Graph(GraphError::NodeNotFound(_)))
        ));
        assert!(matches!(
            rx.try_recv(),
            Err(broadcast::error::TryRecvError::Empty)
        ));
    }

    #[tokio::test]
    async fn test_load_file_creates_editor() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("math.js"), "export function add(a, b) {\n  return a + b;\n}\n").unwrap();
        let session = spawn_empty(dir.path());
        let mut rx = session.subscribe();

        let outcome = session
            .apply(Gesture::LoadFile {
                file_id: "math.js".into(),
                target: LoadTarget::NewNode { position: None },
            })
            .await
            .unwrap();
        assert_eq!(
            outcome,
            Outcome::LoadStarted {
                file_id: "math.js".into()
            }
        );

        let node_id = loop {
            if let SessionMessage::FileLoaded(payload) = next_message(&mut rx).await {
                break payload.node_id;
            }
        };

        let snapshot = session.snapshot().await.unwrap();
        let node = snapshot.nodes.iter().find(|n| n.id == node_id).unwrap();
        assert_eq!(node.position, Position::new(500.0, 500.0));
        let json = serde_json::to_value(node).unwrap();
        assert_eq!(json["data"]["fileName"], "math.js");
        assert_eq!(
            json["data"]["handles"][0]["id"],
            format!("{}:function:add", node_id)
        );
    }

    #[tokio::test]
    async fn test_missing_file_reports_failure() {
        let dir = tempdir().unwrap();
        let session = spawn_empty(dir.path());
        let mut rx = session.subscribe();

        session
            .apply(Gesture::LoadFile {
                file_id: "missing.js".into(),
                target: LoadTarget::NewNode { position: None },
            })
            .await
            .unwrap();

        match next_message(&mut rx).await {
            SessionMessage::LoadFailed(payload) => assert_eq!(payload.file_id, "missing.js"),
            other => panic!("unexpected message {:?}", other),
        }
        assert!(session.snapshot().await.unwrap().nodes.is_empty());
    }

    #[tokio::test]
    async fn test_load_into_removed_node_is_noop() {
        let dir = tempdir().unwrap();
        let (broadcast_tx, mut rx) = broadcast::channel(8);
        let (mut session, _loads) = Session::new(
            CodeGraph::new().unwrap(),
            FileLoader::new(dir.path()),
            SessionConfig::default(),
            broadcast_tx,
        );

        session.finish_load(Loaded {
            file_id: "a.js".into(),
            target: LoadTarget::Existing {
                node_id: "gone".into(),
            },
            result: Ok("export const a = 1;\n".into()),
        });

        assert_eq!(session.graph.node_count(), 0);
        assert_eq!(session.graph.revision(), 0);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_gesture_json_shape() {
        let gesture = Gesture::NodeDragged {
            node_id: "3".into(),
            position: Position::new(1.0, 2.0),
            candidate_groups: vec!["g".into()],
        };
        let json = serde_json::to_value(&gesture).unwrap();
        assert_eq!(json["type"], "node_dragged");
        assert_eq!(json["candidate_groups"][0], "g");

        let back: Gesture = serde_json::from_value(json).unwrap();
        assert_eq!(back, gesture);
    }
}
