//! Overlay — speech-bubble styling for the canvas regions of a page.
//!
//! Bubble style is content, not presentation: it lives in a
//! `data-bubble-style` attribute that survives hide/detach. The tool's own
//! additions are the `ui-overlay-` classes marking which regions are
//! editable while the panel is open.

use crate::toolbox::{PageHandle, Tool};
use serde::{Deserialize, Serialize};
use storybox_core::{RegionKind, Result};
use tokio::sync::RwLock;
use tracing::warn;

const CLASS_PREFIX: &str = "ui-overlay-";
const ACTIVE_CLASS: &str = "ui-overlay-active";
const STYLE_ATTR: &str = "data-bubble-style";

/// Bubble shape applied to canvas regions that don't have one yet.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum BubbleStyle {
    #[default]
    Speech,
    Caption,
    Thought,
    None,
}

impl BubbleStyle {
    fn attr_value(self) -> Option<&'static str> {
        match self {
            Self::Speech => Some("speech"),
            Self::Caption => Some("caption"),
            Self::Thought => Some("thought"),
            Self::None => None,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OverlaySettings {
    default_style: BubbleStyle,
}

pub struct OverlayTool {
    settings: RwLock<OverlaySettings>,
}

impl Default for OverlayTool {
    fn default() -> Self {
        Self::new()
    }
}

impl OverlayTool {
    pub fn new() -> Self {
        Self {
            settings: RwLock::new(OverlaySettings::default()),
        }
    }

    pub async fn default_style(&self) -> BubbleStyle {
        self.settings.read().await.default_style
    }

    async fn apply(&self, page: &PageHandle) {
        let style = self.settings.read().await.default_style;
        let mut page = page.write().await;
        for region in page.regions_of_kind_mut(RegionKind::Canvas) {
            region.add_class(ACTIVE_CLASS);
            if region.attr(STYLE_ATTR).is_none() {
                if let Some(value) = style.attr_value() {
                    region.set_attr(STYLE_ATTR, value);
                }
            }
        }
    }
}

#[async_trait::async_trait]
impl Tool for OverlayTool {
    fn id(&self) -> &str {
        "overlay"
    }

    async fn configure_elements(&self, _page: &PageHandle) {
        // Canvas regions carry their bubble state in attributes already.
    }

    async fn show_tool(&self, page: &PageHandle) {
        self.apply(page).await;
    }

    async fn hide_tool(&self, page: &PageHandle) {
        // Keep data-bubble-style: the bubbles themselves are document content.
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
            OverlaySettings::default()
        } else {
            match serde_json::from_str(blob) {
                Ok(settings) => settings,
                Err(e) => {
                    warn!(error = %e, "malformed overlay settings, using defaults");
                    OverlaySettings::default()
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
