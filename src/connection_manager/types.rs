//! Connection handle and related types

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::error::CloseReason;
use crate::identity::UserIdentity;
use crate::websocket::{EncodedFrame, OutboundFrame};

/// Handle for a single chat connection
#[derive(Debug)]
pub struct ConnectionHandle {
    pub id: Uuid,
    pub identity: UserIdentity,
    pub connected_at: DateTime<Utc>,
    sender: mpsc::Sender<OutboundFrame>,
}

/// Why a frame could not be queued for a connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum SendError {
    #[error("outbound queue is full")]
    Full,
    #[error("connection is closed")]
    Closed,
}

impl ConnectionHandle {
    pub fn new(identity: UserIdentity, sender: mpsc::Sender<OutboundFrame>) -> Self {
        Self {
            id: Uuid::new_v4(),
            identity,
            connected_at: Utc::now(),
            sender,
        }
    }

    /// Queue a frame without waiting; a slow peer loses the frame instead of
    /// stalling the caller
    pub fn try_send(&self, frame: EncodedFrame) -> Result<(), SendError> {
        self.sender
            .try_send(OutboundFrame::Text(frame))
            .map_err(Into::into)
    }

    /// Ask the writer task to close the socket with the given code
    pub fn close(&self, reason: CloseReason) -> Result<(), SendError> {
        self.sender
            .try_send(OutboundFrame::Close {
                code: reason.code,
                reason: reason.reason,
            })
            .map_err(Into::into)
    }
}

impl<T> From<mpsc::error::TrySendError<T>> for SendError {
    fn from(e: mpsc::error::TrySendError<T>) -> Self {
        match e {
            mpsc::error::TrySendError::Full(_) => Self::Full,
            mpsc::error::TrySendError::Closed(_) => Self::Closed,
        }
    }
}
