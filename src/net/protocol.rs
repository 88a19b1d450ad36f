//! Wire message definitions
//! These are the types exchanged between a client session and the server

use serde::{Deserialize, Serialize};

use crate::game::{InputFrame, ObjectId, Snapshot};

/// Messages sent from client to server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMsg {
    /// Ask the server for a ship
    SpawnRequest,

    /// Batch of input frames for one controlled object
    Input {
        object_id: ObjectId,
        /// Frames in tick order
        frames: Vec<InputFrame>,
    },

    /// Ping for latency measurement
    Ping {
        /// Client timestamp in milliseconds
        value: u64,
    },
}

/// Messages sent from server to client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMsg {
    /// The ship created for this client
    SpawnAssigned { id: ObjectId },

    /// Game state snapshot (sent every packet period)
    Snapshot(Snapshot),

    /// Pong response
    Pong {
        /// Echo back client timestamp
        value: u64,
    },

    /// Error message
    Error { code: String, message: String },
}

impl ServerMsg {
    pub fn error(code: &str, message: impl Into<String>) -> Self {
        Self::Error {
            code: code.to_string(),
            message: message.into(),
        }
    }
}
