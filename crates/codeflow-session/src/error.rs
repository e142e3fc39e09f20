use codeflow_graph::GraphError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Graph(#[from] GraphError),

    #[error("session is no longer running")]
    Closed,
}

pub type Result<T> = std::result::Result<T, SessionError>;
