pub mod auth;
pub mod error;
pub mod model;

mod directory;
mod messages;
mod reactions;
mod read;
mod view;

pub use error::{ChatError, Result};

use std::sync::Arc;

use agora_db::Database;

/// The domain layer: room directory, message store, read-cursor tracker and
/// reaction aggregator over one shared database handle.
///
/// Operations persist synchronously and return the resulting view; callers
/// publish that view to the gateway afterwards, so "persist commits before
/// publish is attempted" holds by construction.
#[derive(Clone)]
pub struct ChatService {
    db: Arc<Database>,
}

impl ChatService {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }
}
