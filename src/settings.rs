//! Operator settings and saved sessions
//!
//! [`Settings`] is a plain value handed to each run. [`SharedSettings`] lets a
//! UI change it while a run is in flight; the run keeps the copy it started
//! with. [`PersistedState`] is what survives a restart.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::batch::{Recipient, RecipientBatch};
use crate::chain::NetworkMode;
use crate::error::Result;
use crate::orchestrator::TransferMethod;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    pub network_mode: NetworkMode,
    pub transfer_method: TransferMethod,
    /// Whether a UI should refresh balances and estimates on its own
    pub auto_refresh: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            network_mode: NetworkMode::Mainnet,
            transfer_method: TransferMethod::Fast,
            auto_refresh: true,
        }
    }
}

/// Cloneable handle to settings that may change while runs are in flight
#[derive(Debug, Clone, Default)]
pub struct SharedSettings(Arc<RwLock<Settings>>);

impl SharedSettings {
    pub fn new(settings: Settings) -> Self {
        Self(Arc::new(RwLock::new(settings)))
    }

    /// Current settings, copied
    pub fn snapshot(&self) -> Settings {
        *self.0.read().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn update(&self, f: impl FnOnce(&mut Settings)) {
        let mut settings = self.0.write().unwrap_or_else(PoisonError::into_inner);
        f(&mut settings);
    }

    pub fn set_transfer_method(&self, method: TransferMethod) {
        self.update(|s| s.transfer_method = method);
    }

    pub fn set_network_mode(&self, mode: NetworkMode) {
        self.update(|s| s.network_mode = mode);
    }

    pub fn set_auto_refresh(&self, enabled: bool) {
        self.update(|s| s.auto_refresh = enabled);
    }
}

/// A saved session: recipients plus settings
///
/// The transaction log, the wallet connection and anything in flight are not
/// part of it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedState {
    pub recipients: Vec<Recipient>,
    #[serde(default)]
    pub transfer_method: TransferMethod,
    #[serde(default)]
    pub network_mode: NetworkMode,
    #[serde(default = "default_auto_refresh")]
    pub auto_refresh: bool,
}

fn default_auto_refresh() -> bool {
    true
}

impl PersistedState {
    pub fn capture(batch: &RecipientBatch, settings: &Settings) -> Self {
        Self {
            recipients: batch.snapshot(),
            transfer_method: settings.transfer_method,
            network_mode: settings.network_mode,
            auto_refresh: settings.auto_refresh,
        }
    }

    /// Rebuilds the batch and settings; see [`RecipientBatch::restore`] for how
    /// interrupted recipients are treated
    pub fn restore(self) -> (RecipientBatch, Settings) {
        let settings = Settings {
            network_mode: self.network_mode,
            transfer_method: self.transfer_method,
            auto_refresh: self.auto_refresh,
        };
        (RecipientBatch::restore(self.recipients), settings)
    }
}

/// Where sessions are saved
pub trait StateStore: Send + Sync {
    /// The saved session, or `None` if nothing was saved yet
    fn load(&self) -> Result<Option<PersistedState>>;

    fn save(&self, state: &PersistedState) -> Result<()>;
}

/// Saves sessions as a JSON file
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl StateStore for JsonFileStore {
    fn load(&self) -> Result<Option<PersistedState>> {
        if !self.path.exists() {
            debug!(path = %self.path.display(), event = "state_file_missing");
            return Ok(None);
        }

        let raw = fs::read_to_string(&self.path)?;
        let state: PersistedState = serde_json::from_str(&raw)?;
        info!(
            path = %self.path.display(),
            recipients = state.recipients.len(),
            event = "state_loaded"
        );
        Ok(Some(state))
    }

    fn save(&self, state: &PersistedState) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        // Write then rename so a crash never leaves half a file behind
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, serde_json::to_vec_pretty(state)?)?;
        fs::rename(&tmp, &self.path)?;

        debug!(
            path = %self.path.display(),
            recipients = state.recipients.len(),
            event = "state_saved"
        );
        Ok(())
    }
}
