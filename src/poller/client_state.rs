//! Persisted client state read at poller start
//!
//! Holds the id of the last submitted generation job and the auth token from
//! the last sign-in, as a small JSON file in the platform data directory.

use std::fs;
use std::path::{Path, PathBuf};

use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::engine::PollRequest;
use super::error::PollError;

/// Default location: `<data_local_dir>/campaignd/client_state.json`
pub fn default_path() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("campaignd")
        .join("client_state.json")
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientState {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth_token: Option<String>,
}

impl ClientState {
    /// Load state from `path`; a missing file is an empty state
    pub fn load(path: &Path) -> Result<Self> {
        debug!(path = %path.display(), "ClientState::load: called");
        if !path.exists() {
            debug!("ClientState::load: no state file");
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path).context("Failed to read client state")?;
        let state = serde_json::from_str(&content).context("Failed to parse client state")?;
        Ok(state)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        debug!(path = %path.display(), "ClientState::save: called");
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).context("Failed to create client state directory")?;
        }
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content).context("Failed to write client state")?;
        Ok(())
    }

    pub fn clear(path: &Path) -> Result<()> {
        debug!(path = %path.display(), "ClientState::clear: called");
        if path.exists() {
            fs::remove_file(path).context("Failed to remove client state")?;
        }
        Ok(())
    }

    /// Turn the stored values into a poll request
    pub fn poll_request(&self) -> Result<PollRequest, PollError> {
        PollRequest::from_stored(self.job_id.as_deref(), self.auth_token.as_deref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_is_empty_state() {
        let dir = TempDir::new().unwrap();
        let state = ClientState::load(&dir.path().join("nope.json")).unwrap();
        assert_eq!(state, ClientState::default());
        assert!(matches!(state.poll_request(), Err(PollError::MissingJob)));
    }

    #[test]
    fn test_save_load_clear() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("client_state.json");
        let state = ClientState {
            job_id: Some("job-77".to_string()),
            auth_token: Some("secret".to_string()),
        };

        state.save(&path).unwrap();
        let raw = fs::read_to_string(&path).unwrap();
        assert!(raw.contains("\"jobId\""));

        let loaded = ClientState::load(&path).unwrap();
        assert_eq!(loaded, state);
        assert_eq!(loaded.poll_request().unwrap().job_id().as_str(), "job-77");

        ClientState::clear(&path).unwrap();
        assert!(!path.exists());
    }
}
