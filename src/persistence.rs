//! Persistence layer for vendor session material
//!
//! This module handles saving and loading the Rivian session tokens across
//! restarts, so the daemon logs in once and reuses the session afterwards.

use crate::error::Result;
use crate::logging::get_logger;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Persisted session tokens
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredSession {
    /// Application session token
    pub app_session_token: String,

    /// User session token
    pub user_session_token: String,

    /// CSRF token bound to the application session
    pub csrf_token: String,
}

/// Session store backed by a JSON file
pub struct SessionStore {
    file_path: String,
    logger: crate::logging::StructuredLogger,
}

impl SessionStore {
    /// Create a new session store
    pub fn new(file_path: &str) -> Self {
        let logger = get_logger("persistence");

        Self {
            file_path: file_path.to_string(),
            logger,
        }
    }

    /// Load the stored session, if any
    pub fn load(&self) -> Result<Option<StoredSession>> {
        let path = Path::new(&self.file_path);

        if !path.exists() {
            self.logger.info("No stored session found");
            return Ok(None);
        }

        let contents = std::fs::read_to_string(path)?;
        let session: StoredSession = serde_json::from_str(&contents)?;
        self.logger.info("Loaded stored session");

        Ok(Some(session))
    }

    /// Save the session to disk
    pub fn save(&self, session: &StoredSession) -> Result<()> {
        let contents = serde_json::to_string_pretty(session)?;
        std::fs::write(&self.file_path, contents)?;
        self.logger.info("Persisted session");

        Ok(())
    }
}
