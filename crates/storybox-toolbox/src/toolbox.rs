//! Tool contract and ToolBox dispatcher
//!
//! Each editing feature is a self-contained module implementing the Tool
//! trait. Tools are registered with a ToolBox, which tracks the single
//! current tool and routes host page-lifecycle events to the right tools.
//! All dispatch runs on one cooperative timeline; logically-async work
//! (settings restore, deferred markup) is spawned and raced against the
//! page liveness token so a completion belonging to a superseded page is
//! dropped instead of applied.

use dashmap::DashMap;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use storybox_core::{Error, HostEvent, Page, Result, SettingsEvent};
use tokio::sync::{mpsc, RwLock};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Shared handle to the page currently loaded in the edit surface.
///
/// The host owns the page; the toolbox keeps a clone only for the current
/// page, and tools receive the handle per call without ever storing it.
pub type PageHandle = Arc<RwLock<Page>>;

/// The Tool trait — implement this to plug a new editing feature into the
/// toolbox.
///
/// Each tool is a standalone unit registered with a ToolBox. To add a new
/// tool: create a file in tools/, implement this trait, register it in
/// create_default_toolbox().
#[async_trait::async_trait]
pub trait Tool: Send + Sync {
    /// Stable unique id (e.g. "overlay", "leveledReader").
    fn id(&self) -> &str;

    /// Experimental tools are offered only when the host enables them.
    fn is_experimental(&self) -> bool {
        false
    }

    /// Always-enabled tools keep receiving newPageReady and updateMarkup
    /// even while another tool is the user-visible current one.
    fn is_always_enabled(&self) -> bool {
        false
    }

    /// One-time preparation of a freshly loaded page. Idempotent: calling
    /// twice must not duplicate any state.
    async fn configure_elements(&self, page: &PageHandle);

    /// The tool became current. Must leave the page reflecting the tool's
    /// current settings.
    async fn show_tool(&self, page: &PageHandle);

    /// The tool stopped being current. Must remove the visual markup it
    /// added, restoring the page's pre-activation appearance.
    async fn hide_tool(&self, page: &PageHandle);

    /// The host swapped in a new page while this tool was active or
    /// always-enabled. Nothing from the previous page survives.
    async fn new_page_ready(&self, page: &PageHandle);

    /// Whether update_markup only completes after deferred computation.
    /// The toolbox spawns async markup instead of awaiting it inline.
    fn is_update_markup_async(&self) -> bool {
        false
    }

    /// Recompute derived annotations from the page content. Must be
    /// idempotent: same content and settings produce the same page.
    async fn update_markup(&self, page: &PageHandle);

    /// Parse and apply a previously saved settings blob. An empty blob
    /// means defaults. A malformed blob must degrade to defaults rather
    /// than fail; an Err here is logged by the toolbox and still counts
    /// as a completed restore.
    async fn restore_settings(&self, blob: &str) -> Result<()>;

    /// Inverse of page instrumentation, called when the page itself is
    /// being torn down (not merely hidden).
    async fn detach_from_page(&self, page: &PageHandle);
}

/// Lifecycle state of a registered tool, as the toolbox sees it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ToolState {
    Registered,
    Configured,
    Active,
    Inactive,
    Detached,
}

/// Host-controlled toolbox options.
#[derive(Clone, Debug)]
pub struct ToolboxConfig {
    /// Offer tools flagged experimental.
    pub show_experimental: bool,
}

impl Default for ToolboxConfig {
    fn default() -> Self {
        Self {
            show_experimental: false,
        }
    }
}

struct ToolEntry {
    tool: Arc<dyn Tool>,
    state: ToolState,
}

/// Registry and dispatcher for the tools of one editing session.
///
/// Holds the insertion-ordered set of registered tools, the single current
/// tool, and the saved settings blobs the host has delivered. One ToolBox
/// per editing session; nothing here is process-global.
pub struct ToolBox {
    config: ToolboxConfig,
    entries: Vec<ToolEntry>,
    current: Option<String>,
    visible: bool,
    page: Option<PageHandle>,
    /// Cancelled and replaced on every page change; spawned completions
    /// race against it so stale work never touches the new page.
    page_token: CancellationToken,
    /// Last blob the host delivered (or a tool saved), keyed by tool id.
    saved_blobs: HashMap<String, String>,
    /// Tool ids whose current blob has already had a restore started.
    spawned: HashSet<String>,
    /// Per-tool restore completion flags, shared with spawned tasks.
    restored: Arc<DashMap<String, bool>>,
    /// In-flight spawned restores, keyed by tool id so an inline restore
    /// can abort its background duplicate.
    restore_tasks: HashMap<String, JoinHandle<()>>,
    background: Vec<JoinHandle<()>>,
    settings_tx: Option<mpsc::UnboundedSender<SettingsEvent>>,
}

impl Default for ToolBox {
    fn default() -> Self {
        Self::new(ToolboxConfig::default())
    }
}

impl ToolBox {
    pub fn new(config: ToolboxConfig) -> Self {
        Self {
            config,
            entries: Vec::new(),
            current: None,
            visible: true,
            page: None,
            page_token: CancellationToken::new(),
            saved_blobs: HashMap::new(),
            spawned: HashSet::new(),
            restored: Arc::new(DashMap::new()),
            restore_tasks: HashMap::new(),
            background: Vec::new(),
            settings_tx: None,
        }
    }

    /// Register a tool. Rejects a second tool with the same id and leaves
    /// the registry unchanged.
    pub fn register_tool(&mut self, tool: impl Tool + 'static) -> Result<()> {
        if self.position(tool.id()).is_some() {
            return Err(Error::DuplicateTool(tool.id().to_string()));
        }
        debug!(tool = tool.id(), "registered tool");
        self.entries.push(ToolEntry {
            tool: Arc::new(tool),
            state: ToolState::Registered,
        });
        Ok(())
    }

    /// All registered tool ids, in registration order.
    pub fn list(&self) -> Vec<&str> {
        self.entries.iter().map(|e| e.tool.id()).collect()
    }

    /// Tool ids the host should offer, in registration order. Experimental
    /// tools are filtered out unless the config enables them.
    pub fn available_tools(&self) -> Vec<&str> {
        self.entries
            .iter()
            .filter(|e| self.config.show_experimental || !e.tool.is_experimental())
            .map(|e| e.tool.id())
            .collect()
    }

    pub fn current_tool_id(&self) -> Option<&str> {
        self.current.as_deref()
    }

    pub fn tool_state(&self, id: &str) -> Option<ToolState> {
        self.position(id).map(|i| self.entries[i].state)
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    /// Handle to the page currently loaded, if any.
    pub fn page(&self) -> Option<PageHandle> {
        self.page.clone()
    }

    /// Whether the restore for `id`'s settings blob has completed.
    pub fn settings_restored(&self, id: &str) -> bool {
        self.restored.get(id).map(|v| *v).unwrap_or(false)
    }

    /// True once every registered tool with a delivered blob has signalled
    /// restore completion. The host decides how long to keep polling; the
    /// toolbox has no timeout of its own.
    pub fn is_initialized(&self) -> bool {
        self.saved_blobs
            .keys()
            .filter(|id| self.position(id).is_some())
            .all(|id| self.settings_restored(id))
    }

    /// Create the channel on which persistence events are published. Without
    /// a subscriber, events are dropped silently.
    pub fn subscribe_settings_events(&mut self) -> mpsc::UnboundedReceiver<SettingsEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.settings_tx = Some(tx);
        rx
    }

    /// Dispatch one host event. Convenience wrapper used by hosts speaking
    /// the wire protocol; the typed methods below are the real interface.
    pub async fn handle_event(&mut self, event: HostEvent) -> Result<()> {
        match event {
            HostEvent::NewPage { page } => {
                self.on_new_page(Arc::new(RwLock::new(page))).await;
                Ok(())
            }
            HostEvent::PageUnloading => {
                self.on_page_unloading().await;
                Ok(())
            }
            HostEvent::ActivateTool { id } => self.activate_tool(&id).await,
            HostEvent::RestoreSettings { blobs } => {
                self.on_settings_blob_available(blobs);
                Ok(())
            }
            HostEvent::ContentChanged => {
                self.on_content_changed().await;
                Ok(())
            }
            HostEvent::ShowToolbox { visible } => {
                self.set_visible(visible).await;
                Ok(())
            }
        }
    }

    /// Make `id` the current tool: hide the outgoing tool, restore saved
    /// settings on first activation, then show the incoming tool.
    ///
    /// Unknown ids and gated experimental tools are rejected without
    /// touching the current tool.
    pub async fn activate_tool(&mut self, id: &str) -> Result<()> {
        let entry_idx = self
            .position(id)
            .ok_or_else(|| Error::ToolNotFound(id.to_string()))?;
        if self.entries[entry_idx].tool.is_experimental() && !self.config.show_experimental {
            return Err(Error::ExperimentalDisabled(id.to_string()));
        }
        if self.current.as_deref() == Some(id) {
            return Ok(());
        }

        let page = self.page.clone();

        // Exactly one hide on the outgoing tool, then one show on the
        // incoming one, in that order.
        if let (Some(current_id), Some(page)) = (self.current.clone(), page.as_ref()) {
            if self.visible {
                if let Some(idx) = self.position(&current_id) {
                    let outgoing = self.entries[idx].tool.clone();
                    outgoing.hide_tool(page).await;
                    self.entries[idx].state = ToolState::Inactive;
                }
            }
        }

        // First activation restores any saved settings before the tool
        // shows, so show_tool sees the restored state.
        if !self.settings_restored(id) {
            if let Some(blob) = self.saved_blobs.get(id).cloned() {
                // A spawned restore for the same blob may still be in
                // flight; the inline restore supersedes it.
                if let Some(task) = self.restore_tasks.remove(id) {
                    task.abort();
                }
                let tool = self.entries[entry_idx].tool.clone();
                if let Err(e) = tool.restore_settings(&blob).await {
                    warn!(tool = id, error = %e, "settings restore failed, keeping defaults");
                }
                self.spawned.insert(id.to_string());
                self.restored.insert(id.to_string(), true);
            }
        }

        if let Some(page) = page.as_ref() {
            let (tool, state) = {
                let entry = &self.entries[entry_idx];
                (entry.tool.clone(), entry.state)
            };
            // configure_elements always precedes show_tool on a page.
            if matches!(state, ToolState::Registered | ToolState::Detached) {
                tool.configure_elements(page).await;
                self.entries[entry_idx].state = ToolState::Configured;
            }
            if self.visible {
                tool.show_tool(page).await;
                self.entries[entry_idx].state = ToolState::Active;
            }
        }

        self.current = Some(id.to_string());
        self.emit(SettingsEvent::CurrentTool {
            id: Some(id.to_string()),
        });
        Ok(())
    }

    /// A new page was loaded. Configure it for the always-enabled tools and
    /// the current tool, broadcast new_page_ready, and start any settings
    /// restores that were waiting for a page.
    pub async fn on_new_page(&mut self, page: PageHandle) {
        // Completions still in flight belong to the old page.
        self.page_token.cancel();
        self.page_token = CancellationToken::new();
        self.page = Some(page.clone());

        let current = self.current.clone();
        for i in 0..self.entries.len() {
            let tool = self.entries[i].tool.clone();
            let is_current = current.as_deref() == Some(tool.id());
            if tool.is_always_enabled() || is_current {
                tool.configure_elements(&page).await;
                self.entries[i].state = if is_current && self.visible {
                    ToolState::Active
                } else {
                    ToolState::Configured
                };
            } else {
                // Configuration is per page; whatever state the tool reached
                // on the old page is stale, so a later activation on this
                // page must run configure_elements again.
                self.entries[i].state = ToolState::Registered;
            }
        }
        for i in 0..self.entries.len() {
            let tool = self.entries[i].tool.clone();
            let is_current = current.as_deref() == Some(tool.id());
            if tool.is_always_enabled() || (is_current && self.visible) {
                tool.new_page_ready(&page).await;
            }
        }

        self.spawn_pending_restores();
    }

    /// The current page is being torn down (not just hidden): the current
    /// tool removes its instrumentation, and in-flight completions for the
    /// page are dropped.
    pub async fn on_page_unloading(&mut self) {
        self.page_token.cancel();
        self.page_token = CancellationToken::new();
        let Some(page) = self.page.take() else {
            return;
        };
        if let Some(current_id) = self.current.clone() {
            if let Some(idx) = self.position(&current_id) {
                let tool = self.entries[idx].tool.clone();
                tool.detach_from_page(&page).await;
                self.entries[idx].state = ToolState::Detached;
            }
        }
    }

    /// Persisted settings arrived from the host, keyed by tool id. Blobs for
    /// unregistered ids are kept but ignored until such a tool appears.
    /// Restores start immediately when a page is loaded, otherwise on the
    /// first on_new_page.
    pub fn on_settings_blob_available(&mut self, blobs: HashMap<String, String>) {
        for (id, blob) in blobs {
            // Re-delivery replaces the stored blob and re-arms its restore.
            self.spawned.remove(&id);
            self.saved_blobs.insert(id, blob);
        }
        self.spawn_pending_restores();
    }

    /// Document content changed: recompute derived markup for the current
    /// tool and every always-enabled tool. Tools declaring async markup are
    /// spawned and raced against the page token.
    pub async fn on_content_changed(&mut self) {
        let Some(page) = self.page.clone() else {
            debug!("content changed with no page loaded, ignoring");
            return;
        };
        let current = self.current.clone();
        for i in 0..self.entries.len() {
            let tool = self.entries[i].tool.clone();
            let is_current = current.as_deref() == Some(tool.id());
            if !(tool.is_always_enabled() || (is_current && self.visible)) {
                continue;
            }
            if tool.is_update_markup_async() {
                let token = self.page_token.clone();
                let page = page.clone();
                self.background.push(tokio::spawn(async move {
                    tokio::select! {
                        _ = token.cancelled() => {
                            debug!(tool = tool.id(), "stale markup update dropped");
                        }
                        _ = tool.update_markup(&page) => {}
                    }
                }));
            } else {
                tool.update_markup(&page).await;
            }
        }
    }

    /// Show or hide the toolbox panel without changing the selection.
    /// Hiding fires hide_tool on the current tool; showing fires show_tool
    /// again.
    pub async fn set_visible(&mut self, visible: bool) {
        if self.visible == visible {
            return;
        }
        self.visible = visible;
        let (Some(current_id), Some(page)) = (self.current.clone(), self.page.clone()) else {
            return;
        };
        if let Some(idx) = self.position(&current_id) {
            let tool = self.entries[idx].tool.clone();
            if visible {
                tool.show_tool(&page).await;
                self.entries[idx].state = ToolState::Active;
            } else {
                tool.hide_tool(&page).await;
                self.entries[idx].state = ToolState::Inactive;
            }
        }
    }

    /// A tool produced a new settings blob. Stored as the tool's saved state
    /// and forwarded to the host for persistence.
    pub fn save_tool_state(&mut self, id: &str, blob: impl Into<String>) -> Result<()> {
        if self.position(id).is_none() {
            return Err(Error::ToolNotFound(id.to_string()));
        }
        let blob = blob.into();
        self.saved_blobs.insert(id.to_string(), blob.clone());
        // The blob is the tool's own current state; no restore needed.
        self.spawned.insert(id.to_string());
        self.restored.insert(id.to_string(), true);
        self.emit(SettingsEvent::ToolState {
            id: id.to_string(),
            blob,
        });
        Ok(())
    }

    /// Await every spawned restore/markup task. Hosts and tests use this to
    /// drain background work; cancelled tasks finish immediately.
    pub async fn wait_for_background_work(&mut self) {
        for (_, handle) in self.restore_tasks.drain() {
            let _ = handle.await;
        }
        for handle in self.background.drain(..) {
            let _ = handle.await;
        }
    }

    fn position(&self, id: &str) -> Option<usize> {
        self.entries.iter().position(|e| e.tool.id() == id)
    }

    fn emit(&self, event: SettingsEvent) {
        if let Some(tx) = &self.settings_tx {
            let _ = tx.send(event);
        }
    }

    fn spawn_pending_restores(&mut self) {
        let Some(page) = self.page.clone() else {
            return;
        };
        let ids: Vec<String> = self
            .saved_blobs
            .keys()
            .filter(|id| !self.spawned.contains(*id) && self.position(id).is_some())
            .cloned()
            .collect();
        for id in ids {
            let blob = self.saved_blobs.get(&id).cloned().unwrap_or_default();
            self.spawn_restore(id, blob, page.clone());
        }
    }

    fn spawn_restore(&mut self, id: String, blob: String, page: PageHandle) {
        self.spawned.insert(id.clone());
        self.restored.insert(id.clone(), false);
        let Some(idx) = self.position(&id) else {
            return;
        };
        let tool = self.entries[idx].tool.clone();
        let token = self.page_token.clone();
        let restored = self.restored.clone();
        let apply_markup = tool.is_always_enabled()
            || (self.visible && self.current.as_deref() == Some(id.as_str()));
        let task_id = id.clone();
        let handle = tokio::spawn(async move {
            let id = task_id;
            tokio::select! {
                _ = token.cancelled() => {
                    debug!(tool = %id, "settings restore superseded by page change, dropped");
                    return;
                }
                res = tool.restore_settings(&blob) => {
                    if token.is_cancelled() {
                        debug!(tool = %id, "stale settings restore ignored");
                        return;
                    }
                    if let Err(e) = res {
                        warn!(tool = %id, error = %e, "settings restore failed, keeping defaults");
                    }
                    restored.insert(id.clone(), true);
                }
            }
            if apply_markup {
                // Restored settings may change derived markup; recompute,
                // but never against a page the restore wasn't started for.
                tokio::select! {
                    _ = token.cancelled() => {}
                    _ = tool.update_markup(&page) => {}
                }
            }
        });
        if let Some(old) = self.restore_tasks.insert(id, handle) {
            old.abort();
        }
    }
}
