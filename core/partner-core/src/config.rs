//! Runtime configuration loaded from `config.toml`.
//!
//! Every field has a default, so a missing file or a partial file is valid.
//!
//! ```toml
//! [panel]
//! expanded_width = 360
//! collapse_delay_ms = 180
//!
//! [capture]
//! min_chars = 24
//! dedupe_window_secs = 480
//!
//! [suggestions]
//! model = "llama-3.3-70b-versatile"
//! ```

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::error::{PartnerError, Result};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RuntimeConfig {
    #[serde(default)]
    pub panel: PanelConfig,
    #[serde(default)]
    pub capture: CaptureConfig,
    #[serde(default)]
    pub suggestions: SuggestionsConfig,
}

/// Panel geometry and timing.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct PanelConfig {
    pub expanded_width: i32,
    pub collapsed_width: i32,
    pub collapsed_height: i32,
    pub top_padding: i32,
    pub bottom_padding: i32,
    pub collapse_delay_ms: u64,
    pub edge_threshold_px: i32,
    pub hover_poll_ms: u64,
    pub heartbeat_ms: u64,
}

impl Default for PanelConfig {
    fn default() -> Self {
        Self {
            expanded_width: 360,
            collapsed_width: 20,
            collapsed_height: 100,
            top_padding: 12,
            bottom_padding: 12,
            collapse_delay_ms: 180,
            edge_threshold_px: 10,
            hover_poll_ms: 120,
            heartbeat_ms: 800,
        }
    }
}

impl PanelConfig {
    pub fn collapse_delay(&self) -> Duration {
        Duration::from_millis(self.collapse_delay_ms)
    }

    pub fn hover_poll_interval(&self) -> Duration {
        Duration::from_millis(self.hover_poll_ms.max(1))
    }

    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_millis(self.heartbeat_ms.max(1))
    }
}

/// Clipboard capture thresholds.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    pub poll_ms: u64,
    pub min_chars: usize,
    pub max_chars: usize,
    pub max_word_count: usize,
    pub dedupe_window_secs: i64,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            poll_ms: 1300,
            min_chars: 24,
            max_chars: 5000,
            max_word_count: 900,
            dedupe_window_secs: 8 * 60,
        }
    }
}

impl CaptureConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_ms.max(1))
    }

    pub fn dedupe_window(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.dedupe_window_secs.max(0))
    }
}

/// Remote prompt-evolution model settings.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct SuggestionsConfig {
    pub endpoint: String,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub limit: usize,
}

impl Default for SuggestionsConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://api.groq.com/openai/v1".to_string(),
            model: "llama-3.3-70b-versatile".to_string(),
            temperature: 0.5,
            max_tokens: 700,
            limit: 6,
        }
    }
}

/// Loads the runtime config, returning defaults if the file doesn't exist.
pub fn load_runtime_config(path: &Path) -> Result<RuntimeConfig> {
    if !path.exists() {
        return Ok(RuntimeConfig::default());
    }

    let content = fs_err::read_to_string(path).map_err(|source| PartnerError::Io {
        context: format!("reading config {}", path.display()),
        source,
    })?;
    toml::from_str::<RuntimeConfig>(&content).map_err(|err| PartnerError::ConfigMalformed {
        path: path.to_path_buf(),
        details: err.to_string(),
    })
}
