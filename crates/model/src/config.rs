//! Model configuration.

use serde::{Deserialize, Serialize};

/// Configuration for a `Model`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Display name of the model; also the snapshot name.
    pub name: String,
    /// Persist a snapshot through the model's store after every structural change.
    pub autosave: bool,
    /// Record structural changes in the model's journal.
    pub event_log: bool,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            name: "Untitled".to_string(),
            autosave: false,
            event_log: false,
        }
    }
}

impl ModelConfig {
    /// Creates a configuration with the given name and defaults otherwise.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Enables or disables autosave.
    pub fn with_autosave(mut self, autosave: bool) -> Self {
        self.autosave = autosave;
        self
    }

    /// Enables or disables the change journal.
    pub fn with_event_log(mut self, event_log: bool) -> Self {
        self.event_log = event_log;
        self
    }
}
