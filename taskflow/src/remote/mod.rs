//! Remote store abstraction for `TaskFlow`.
//!
//! Defines the [`RemoteStore`] trait the sync coordinator talks to when an
//! identity is active. Concrete implementations:
//! - [`memory::MemoryRemote`] — in-process store for tests and offline
//!   development
//! - [`ws::WsRemote`] — WebSocket client for the `TaskFlow` hub
//!
//! An adapter instance is scoped to a single account at construction time
//! and only ever reads or mutates that account's rows. When no identity is
//! active there is no adapter at all; the coordinator then operates
//! local-only.

pub mod memory;
pub mod ws;

use tokio::sync::broadcast;

use taskflow_proto::task::{Task, TaskId};

use crate::identity::AccountId;

/// Errors that can occur during remote store operations.
///
/// Writers swallow these (the local cache already holds the truth);
/// readers fall back to the last local snapshot.
#[derive(Debug, thiserror::Error)]
pub enum RemoteError {
    /// The configured hub URL is not a usable WebSocket URL.
    #[error("invalid hub url: {0}")]
    InvalidUrl(String),

    /// The store is configured but cannot be reached.
    #[error("remote store unreachable: {0}")]
    Unreachable(String),

    /// The store refused the request.
    #[error("remote store rejected request: {0}")]
    Rejected(String),

    /// The operation timed out before a response arrived.
    #[error("remote operation timed out")]
    Timeout,

    /// The connection to the store has been closed.
    #[error("remote connection closed")]
    Closed,

    /// A wire message could not be encoded or decoded.
    #[error("codec error: {0}")]
    Codec(#[from] taskflow_proto::codec::CodecError),

    /// A fetched row could not be decoded into a task.
    #[error("bad row: {0}")]
    BadRow(#[from] taskflow_proto::row::RowError),

    /// The store answered with a message the protocol does not allow here.
    #[error("protocol violation: {0}")]
    Protocol(String),
}

/// Async CRUD plus change notification against an account-scoped store.
///
/// All methods operate on whole task records: updates replace the row,
/// and the change stream carries no diff — one signal per row-level
/// change, answered by callers with a full re-fetch.
pub trait RemoteStore: Send + Sync {
    /// Fetches every task of the account, newest-created first.
    fn fetch_all(&self) -> impl std::future::Future<Output = Result<Vec<Task>, RemoteError>> + Send;

    /// Fetches just the row ids of the account (migration support).
    fn list_ids(
        &self,
    ) -> impl std::future::Future<Output = Result<Vec<String>, RemoteError>> + Send;

    /// Inserts one task.
    fn insert(
        &self,
        task: &Task,
    ) -> impl std::future::Future<Output = Result<(), RemoteError>> + Send;

    /// Inserts a batch of tasks in a single request.
    fn insert_many(
        &self,
        tasks: &[Task],
    ) -> impl std::future::Future<Output = Result<(), RemoteError>> + Send;

    /// Replaces the row for `task.id`.
    fn update(
        &self,
        task: &Task,
    ) -> impl std::future::Future<Output = Result<(), RemoteError>> + Send;

    /// Deletes the row with the given id. Deleting an absent row succeeds.
    fn delete(
        &self,
        id: &TaskId,
    ) -> impl std::future::Future<Output = Result<(), RemoteError>> + Send;

    /// Subscribes to row-level change signals for the account.
    ///
    /// Every insert/update/delete on the account — from this client or any
    /// other — produces one signal. Lagging subscribers may observe fewer
    /// signals than changes, which is harmless because the reaction is a
    /// full re-fetch either way.
    fn changes(&self) -> broadcast::Receiver<()>;

    /// The account this adapter is scoped to.
    fn account_id(&self) -> &AccountId;
}
