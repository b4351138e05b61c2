use serde::{Deserialize, Serialize};

/// Every failure the distributed file store reports, locally or over the wire.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DfsError {
    #[error("{target} not found{}", degraded_suffix(.degraded))]
    NotFound { target: String, degraded: bool },
    #[error("{path} already exists")]
    AlreadyExists { path: String },
    #[error("invalid path {path}: {reason}")]
    InvalidPath { path: String, reason: String },
    #[error("node unreachable: {message}")]
    NodeUnreachable { message: String },
    #[error(
        "incomplete download of {path}: expected {expected} chunks, missing {missing:?}, duplicated {duplicates:?}, unexpected {unexpected:?}"
    )]
    IncompleteDownload {
        path: String,
        expected: u64,
        missing: Vec<u64>,
        duplicates: Vec<u64>,
        unexpected: Vec<u64>,
    },
    #[error("chunk {chunk_id} has {live} of {target} wanted copies")]
    ReplicationShortfall {
        chunk_id: String,
        live: usize,
        target: usize,
    },
    #[error("storage node {} is not registered with the coordinator", registration_label(.storage_node_id))]
    RegistrationRequired { storage_node_id: Option<u64> },
    #[error("storage failure: {message}")]
    Storage { message: String },
    #[error("protocol error: {message}")]
    Protocol { message: String },
}

fn degraded_suffix(degraded: &bool) -> &'static str {
    if *degraded {
        " (degraded: no live replica left)"
    } else {
        ""
    }
}

fn registration_label(storage_node_id: &Option<u64>) -> String {
    match storage_node_id {
        Some(id) => id.to_string(),
        None => "(unassigned)".to_owned(),
    }
}

impl DfsError {
    pub fn not_found(target: impl Into<String>) -> Self {
        DfsError::NotFound {
            target: target.into(),
            degraded: false,
        }
    }
    pub fn degraded(target: impl Into<String>) -> Self {
        DfsError::NotFound {
            target: target.into(),
            degraded: true,
        }
    }
    pub fn already_exists(path: impl Into<String>) -> Self {
        DfsError::AlreadyExists { path: path.into() }
    }
    pub fn invalid_path(path: impl Into<String>, reason: impl Into<String>) -> Self {
        DfsError::InvalidPath {
            path: path.into(),
            reason: reason.into(),
        }
    }
    pub fn unreachable(message: impl Into<String>) -> Self {
        DfsError::NodeUnreachable {
            message: message.into(),
        }
    }
    pub fn storage(message: impl Into<String>) -> Self {
        DfsError::Storage {
            message: message.into(),
        }
    }
    pub fn protocol(message: impl Into<String>) -> Self {
        DfsError::Protocol {
            message: message.into(),
        }
    }

    /// Errors that no retry against another node can fix.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            DfsError::NotFound { .. } | DfsError::AlreadyExists { .. } | DfsError::InvalidPath { .. }
        )
    }

    pub fn http_status(&self) -> u16 {
        match self {
            DfsError::NotFound { .. } => 404,
            DfsError::AlreadyExists { .. } => 409,
            DfsError::InvalidPath { .. } => 400,
            DfsError::NodeUnreachable { .. } => 502,
            DfsError::IncompleteDownload { .. } => 500,
            DfsError::ReplicationShortfall { .. } => 503,
            DfsError::RegistrationRequired { .. } => 412,
            DfsError::Storage { .. } => 500,
            DfsError::Protocol { .. } => 400,
        }
    }
}
