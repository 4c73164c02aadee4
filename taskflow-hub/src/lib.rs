//! `TaskFlow` hub library.
//!
//! Exposes the hub server for use in tests and embedding. The hub accepts
//! WebSocket connections, scopes each session to an account, serves CRUD
//! requests against the account's task rows, and pushes change
//! notifications to every live session of the account.

pub mod config;
pub mod hub;
pub mod store;
