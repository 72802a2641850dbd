//! Data models for the favs backend.
//!
//! Entities are persisted as JSON documents, so the serde shape here is also
//! the storage shape.

mod city;
mod place;
mod purchase;
mod report;
mod user;

pub use city::*;
pub use place::*;
pub use purchase::*;
pub use report::*;
pub use user::*;
