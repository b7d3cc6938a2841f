//! Host ↔ toolbox event protocol
//!
//! Wire format (JSON, tagged by "event"):
//!
//! Host → Toolbox:
//!   { "event": "newPage", "page": { "page_id": "p1", "regions": [...] } }
//!   { "event": "activateTool", "id": "overlay" }
//!   { "event": "restoreSettings", "blobs": { "overlay": "{...}" } }
//!   { "event": "contentChanged" }
//!   { "event": "showToolbox", "visible": false }
//!   { "event": "pageUnloading" }
//!
//! Toolbox → Host (persistence):
//!   { "event": "currentTool", "id": "overlay" }
//!   { "event": "toolState", "id": "overlay", "blob": "{...}" }

use crate::page::Page;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Event pushed from the host shell into the toolbox.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "camelCase")]
pub enum HostEvent {
    /// A new page was loaded into the edit surface.
    NewPage { page: Page },
    /// The current page is being torn down.
    PageUnloading,
    /// The user selected a tool panel.
    ActivateTool { id: String },
    /// Previously persisted per-tool settings, keyed by tool id.
    RestoreSettings { blobs: HashMap<String, String> },
    /// The document content changed; derived markup should be recomputed.
    ContentChanged,
    /// The toolbox panel was shown or hidden without changing the selection.
    ShowToolbox { visible: bool },
}

/// Persistence event pushed from the toolbox back to the host, which owns
/// all settings storage. The toolbox never interprets the blobs it forwards.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event", rename_all = "camelCase")]
pub enum SettingsEvent {
    /// The current tool changed (None when no tool is selected).
    CurrentTool { id: Option<String> },
    /// A tool produced a new settings blob to persist.
    ToolState { id: String, blob: String },
}
