//! Impairment visualizer — simulates how a reader with low vision or
//! color-blindness perceives the images on the page.
//!
//! While the tool is showing, every image region is tagged with a
//! `ui-impairment-<kind>` class the stylesheet maps to a filter. Hiding or
//! detaching strips the whole namespace, leaving the page untouched.

use crate::toolbox::{PageHandle, Tool};
use serde::{Deserialize, Serialize};
use storybox_core::{RegionKind, Result};
use tokio::sync::RwLock;
use tracing::warn;

const CLASS_PREFIX: &str = "ui-impairment-";

/// Which impairment to simulate.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ImpairmentKind {
    #[default]
    None,
    Cataracts,
    Protanopia,
    Deuteranopia,
}

impl ImpairmentKind {
    fn class_suffix(self) -> Option<&'static str> {
        match self {
            Self::None => None,
            Self::Cataracts => Some("cataracts"),
            Self::Protanopia => Some("protanopia"),
            Self::Deuteranopia => Some("deuteranopia"),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ImpairmentSettings {
    kind: ImpairmentKind,
}

pub struct ImpairmentTool {
    settings: RwLock<ImpairmentSettings>,
}

impl Default for ImpairmentTool {
    fn default() -> Self {
        Self::new()
    }
}

impl ImpairmentTool {
    pub fn new() -> Self {
        Self {
            settings: RwLock::new(ImpairmentSettings::default()),
        }
    }

    pub async fn kind(&self) -> ImpairmentKind {
        self.settings.read().await.kind
    }

    pub async fn set_kind(&self, kind: ImpairmentKind) {
        self.settings.write().await.kind = kind;
    }

    /// Current settings as a blob the host can persist.
    pub async fn settings_blob(&self) -> String {
        serde_json::to_string(&*self.settings.read().await).unwrap_or_default()
    }

    // Strip-then-add keeps this idempotent and handles kind changes.
    async fn apply(&self, page: &PageHandle) {
        let kind = self.settings.read().await.kind;
        let mut page = page.write().await;
        page.strip_ui_classes(CLASS_PREFIX);
        if let Some(suffix) = kind.class_suffix() {
            let class = format!("{CLASS_PREFIX}{suffix}");
            for region in page.regions_of_kind_mut(RegionKind::Image) {
                region.add_class(&class);
            }
        }
    }
}

#[async_trait::async_trait]
impl Tool for ImpairmentTool {
    fn id(&self) -> &str {
        "impairment"
    }

    fn is_experimental(&self) -> bool {
        true
    }

    async fn configure_elements(&self, _page: &PageHandle) {
        // Image regions need no preparation; the filter classes attach lazily.
    }

    async fn show_tool(&self, page: &PageHandle) {
        self.apply(page).await;
    }

    async fn hide_tool(&self, page: &PageHandle) {
        page.write().await.strip_ui_classes(CLASS_PREFIX);
    }

    async fn new_page_ready(&self, page: &PageHandle) {
        self.apply(page).await;
    }

    async fn update_markup(&self, page: &PageHandle) {
        self.apply(page).await;
    }

    async fn restore_settings(&self, blob: &str) -> Result<()> {
        let settings = if blob.trim().is_empty() {
            ImpairmentSettings::default()
        } else {
            match serde_json::from_str(blob) {
                Ok(settings) => settings,
                Err(e) => {
                    warn!(error = %e, "malformed impairment settings, using defaults");
                    ImpairmentSettings::default()
                }
            }
        };
        *self.settings.write().await = settings;
        Ok(())
    }

    async fn detach_from_page(&self, page: &PageHandle) {
        page.write().await.strip_ui_classes(CLASS_PREFIX);
    }
}
