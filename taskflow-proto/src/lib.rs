//! Shared definitions for the `TaskFlow` task model and hub wire format.

pub mod codec;
pub mod row;
pub mod task;
pub mod wire;
