//! Hub wire protocol types.
//!
//! Messages exchanged between `TaskFlow` clients and the hub server over
//! WebSocket binary frames, postcard-encoded via [`crate::codec`].
//!
//! The protocol is deliberately small: a session is scoped to one account
//! by the initial [`ClientMessage::Hello`], requests are answered in order
//! (clients keep at most one request in flight), and every row-level
//! mutation fans a [`ServerMessage::Changed`] notification out to all live
//! sessions of the account — including the one that issued the write. The
//! notification carries no diff; clients react by re-fetching everything.

use serde::{Deserialize, Serialize};

use crate::row::TaskRow;

/// Messages sent from a client to the hub.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClientMessage {
    /// Opens the session and scopes it to an account.
    ///
    /// Must be the first message on the connection. The hub responds with
    /// [`ServerMessage::Welcome`].
    Hello {
        /// Account to scope this session to.
        account_id: String,
    },

    /// Requests all rows of the session's account, newest-created first.
    /// Answered with [`ServerMessage::Rows`].
    FetchAll,

    /// Requests just the row ids of the session's account.
    /// Answered with [`ServerMessage::Ids`]. Used by first-sign-in
    /// migration to compute which local tasks are missing remotely.
    ListIds,

    /// Inserts a single row. Answered with [`ServerMessage::Ack`].
    Insert(TaskRow),

    /// Inserts a batch of rows in one request (migration path).
    /// Answered with [`ServerMessage::Ack`].
    InsertMany(Vec<TaskRow>),

    /// Updates a row by id (whole-record replacement).
    /// Answered with [`ServerMessage::Ack`].
    Update(TaskRow),

    /// Deletes a row by id. Deleting an absent row is not an error.
    /// Answered with [`ServerMessage::Ack`].
    Delete {
        /// Id of the row to delete.
        id: String,
    },
}

/// Messages sent from the hub to a client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ServerMessage {
    /// Session established; echoes the scoped account.
    Welcome {
        /// The account this session is scoped to.
        account_id: String,
    },

    /// Response to [`ClientMessage::FetchAll`].
    Rows(Vec<TaskRow>),

    /// Response to [`ClientMessage::ListIds`].
    Ids(Vec<String>),

    /// Acknowledges a mutating request.
    Ack,

    /// A row of the session's account changed (insert, update, or
    /// delete — the hub does not say which). May arrive at any time.
    Changed,

    /// The request could not be served.
    Error {
        /// Human-readable error description.
        reason: String,
    },
}
