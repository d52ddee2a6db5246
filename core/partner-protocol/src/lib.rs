//! IPC protocol types and validation for partner-host.
//!
//! Shared by the host and the rendering shell so the two can't drift. One
//! newline-terminated JSON request per connection, answered by one
//! newline-terminated JSON response. The host remains the authority on
//! validation.

use partner_core::{DockSide, Point, Rect, TimelineEntry, TopMostLevel, WorkspaceVisibility};
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const PROTOCOL_VERSION: u32 = 1;
pub const MAX_REQUEST_BYTES: usize = 1024 * 1024; // 1MB

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", deny_unknown_fields)]
pub enum Method {
    GetHealth,
    GetState,
    UpdateState,
    EvolvePrompts,
    PanelHover,
    SetPinned,
    SetDock,
    Hotkey,
    ReportScreen,
    GetPanel,
    WindowClosed,
    WindowBlurred,
    TakeEvents,
    Shutdown,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Request {
    pub protocol_version: u32,
    pub method: Method,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub params: Option<Value>,
}

impl Request {
    pub fn new(method: Method, params: Option<Value>) -> Self {
        Self {
            protocol_version: PROTOCOL_VERSION,
            method,
            id: None,
            params,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Response {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorInfo>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct ErrorInfo {
    pub code: String,
    pub message: String,
}

impl ErrorInfo {
    pub fn new(code: &str, message: impl Into<String>) -> Self {
        Self {
            code: code.to_string(),
            message: message.into(),
        }
    }
}

impl Response {
    pub fn ok(id: Option<String>, data: Value) -> Self {
        Self {
            ok: true,
            id,
            data: Some(data),
            error: None,
        }
    }

    pub fn error(id: Option<String>, code: &str, message: impl Into<String>) -> Self {
        Self {
            ok: false,
            id,
            data: None,
            error: Some(ErrorInfo::new(code, message)),
        }
    }

    pub fn error_with_info(id: Option<String>, error: ErrorInfo) -> Self {
        Self {
            ok: false,
            id,
            data: None,
            error: Some(error),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// UI Notifications
// ═══════════════════════════════════════════════════════════════════════════════

/// Notifications queued for the rendering shell, drained via `take_events`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum UiEvent {
    AutoPromptCaptured { entry: TimelineEntry },
    PanelExpanded { expanded: bool },
}

/// What `get_panel` reports about the window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PanelSnapshot {
    pub bounds: Rect,
    pub expanded: bool,
    pub pinned: bool,
    pub dock: DockSide,
    pub destroyed: bool,
    /// Set when the host asked for focus; cleared by `window_blurred`.
    pub focused: bool,
    pub level: Option<TopMostLevel>,
    pub workspace: Option<WorkspaceVisibility>,
}

// ═══════════════════════════════════════════════════════════════════════════════
// Params
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct EvolveParams {
    #[serde(default)]
    pub state: Option<Value>,
    #[serde(default)]
    pub limit: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScreenReport {
    #[serde(default)]
    pub cursor: Option<Point>,
    #[serde(default)]
    pub displays: Vec<Rect>,
    /// The platform refused the fullscreen-overlay workspace flag.
    #[serde(default)]
    pub full_screen_refused: bool,
}

fn require_object(params: Option<Value>) -> Result<serde_json::Map<String, Value>, ErrorInfo> {
    match params {
        Some(Value::Object(map)) => Ok(map),
        Some(_) => Err(ErrorInfo::new("invalid_params", "params must be an object")),
        None => Err(ErrorInfo::new("invalid_params", "params are required")),
    }
}

fn require_bool(params: Option<Value>, field: &str) -> Result<bool, ErrorInfo> {
    let map = require_object(params)?;
    map.get(field).and_then(Value::as_bool).ok_or_else(|| {
        ErrorInfo::new("missing_field", format!("{} is required", field))
    })
}

/// `{"partial": {...}}`; the partial itself must be an object.
pub fn parse_update_state(params: Option<Value>) -> Result<Value, ErrorInfo> {
    let mut map = require_object(params)?;
    match map.remove("partial") {
        Some(partial @ Value::Object(_)) => Ok(partial),
        Some(_) => Err(ErrorInfo::new("invalid_params", "partial must be an object")),
        None => Err(ErrorInfo::new("missing_field", "partial is required")),
    }
}

pub fn parse_evolve_prompts(params: Option<Value>) -> Result<EvolveParams, ErrorInfo> {
    match params {
        None | Some(Value::Null) => Ok(EvolveParams {
            state: None,
            limit: None,
        }),
        Some(params) => serde_json::from_value(params).map_err(|err| {
            ErrorInfo::new(
                "invalid_params",
                format!("evolve_prompts params are invalid: {}", err),
            )
        }),
    }
}

pub fn parse_panel_hover(params: Option<Value>) -> Result<bool, ErrorInfo> {
    require_bool(params, "hovering")
}

pub fn parse_set_pinned(params: Option<Value>) -> Result<bool, ErrorInfo> {
    require_bool(params, "pinned")
}

pub fn parse_set_dock(params: Option<Value>) -> Result<DockSide, ErrorInfo> {
    let map = require_object(params)?;
    let raw = map
        .get("dock")
        .and_then(Value::as_str)
        .ok_or_else(|| ErrorInfo::new("missing_field", "dock is required"))?;
    DockSide::parse(raw).ok_or_else(|| {
        ErrorInfo::new(
            "invalid_params",
            format!("dock must be \"left\" or \"right\", got {:?}", raw),
        )
    })
}

pub fn parse_report_screen(params: Option<Value>) -> Result<ScreenReport, ErrorInfo> {
    let map = require_object(params)?;
    let report: ScreenReport = serde_json::from_value(Value::Object(map)).map_err(|err| {
        ErrorInfo::new(
            "invalid_params",
            format!("screen report is invalid: {}", err),
        )
    })?;
    if report
        .displays
        .iter()
        .any(|area| area.width < 0 || area.height < 0)
    {
        return Err(ErrorInfo::new(
            "invalid_params",
            "display dimensions must be non-negative",
        ));
    }
    Ok(report)
}
