//! # partner-core
//!
//! Core library for Thought Partner, the edge-docked companion panel. Holds
//! the three mechanisms every host shares: the docking/visibility state
//! machine, the clipboard prompt-capture pipeline, and the state
//! reconciliation layer.
//!
//! ## Design Principles
//!
//! - **Synchronous**: No async runtime dependency. Hosts drive ticks and wrap with their own scheduler.
//! - **Not thread-safe**: Hosts provide their own synchronization (`Mutex`).
//! - **Total on bad input**: Malformed persisted data reconciles to defaults, never an error.
//! - **Collaborators behind traits**: window, screen, clipboard, persistence and
//!   the suggestion model are supplied by the host.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use partner_core::{JsonFileStore, StateStore, StorageConfig};
//!
//! let storage = StorageConfig::default();
//! let mut store = StateStore::open(JsonFileStore::new(storage.state_file()), chrono::Utc::now());
//! let state = store.update(&serde_json::json!({ "preferences": { "dock": "left" } }), chrono::Utc::now())?;
//! ```

pub mod capture;
pub mod classifier;
pub mod config;
pub mod dedupe;
pub mod dock;
pub mod error;
pub mod patterns;
pub mod reconcile;
pub mod screen;
pub mod storage;
pub mod store;
pub mod suggestions;
pub mod types;

pub use capture::{CapturePipeline, CaptureSink, ClipboardError, ClipboardSource, PollOutcome};
pub use classifier::{classify, content_hash, is_likely_prompt, normalize_for_hash, Verdict};
pub use config::{load_runtime_config, CaptureConfig, PanelConfig, RuntimeConfig, SuggestionsConfig};
pub use dedupe::RecentHashes;
pub use dock::{
    compute_dock_bounds, DockController, PanelVisibility, TopMostLevel, WindowControl,
    WindowRefused, WorkspaceVisibility,
};
pub use error::{PartnerError, Result};
pub use reconcile::{merge_and_reconcile, reconcile};
pub use screen::{nearest_display, Point, Rect, ScreenProvider};
pub use storage::StorageConfig;
pub use store::{JsonFileStore, MemoryStore, Persistence, StateStore};
pub use suggestions::{
    evolve_prompts, heuristic_suggestions, ModelError, ModelRequest, Provenance,
    SuggestionModel, SuggestionOutcome,
};
pub use types::*;
