//! Codeflow Session - one writer for the graph
//!
//! The session owns the [`CodeGraph`](codeflow_graph::CodeGraph) on a
//! single tokio task. Gestures arrive over a channel and are applied one
//! at a time, so no two mutations ever interleave. After every change the
//! session broadcasts a fresh snapshot to all subscribers.
//!
//! File loads run on their own tasks and feed their result back into the
//! same queue, so a load that finishes late is applied like any other
//! gesture.

mod error;
mod session;

pub use error::{Result, SessionError};
pub use session::{
    FileLoadedPayload, Gesture, GraphUpdatePayload, LoadFailedPayload, LoadTarget, Outcome,
    SessionConfig, SessionHandle, SessionMessage,
};
