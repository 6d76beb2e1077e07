//! Filesystem primitives for csvlock.
//!
//! `io` holds the raw open/create/close operations with OS advisory locks;
//! `atomic` holds the publish step that turns a staged file into the real one.

pub mod atomic;
pub mod io;

pub use atomic::{publish, sync_staged};
