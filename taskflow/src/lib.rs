//! `TaskFlow` — offline-first personal task tracker library.

pub mod cache;
pub mod config;
pub mod identity;
pub mod prefs;
pub mod recur;
pub mod remote;
pub mod sync;
