//! Leveled reader — keeps text within the word limits of the book's
//! reading level.
//!
//! Always enabled: its markup runs on every page whether or not its panel
//! is the current one. update_markup writes a `data-word-count` attribute
//! on each text region and flags regions that break the limits with
//! `ui-leveledReader-sentence-too-long` / `ui-leveledReader-page-too-full`.
//! The analysis is declared async; the toolbox spawns it and drops the
//! result if the page changes underneath it.

use crate::toolbox::{PageHandle, Tool};
use serde::{Deserialize, Serialize};
use storybox_core::{RegionKind, Result};
use tokio::sync::RwLock;
use tracing::warn;

const CLASS_PREFIX: &str = "ui-leveledReader-";
const SENTENCE_CLASS: &str = "ui-leveledReader-sentence-too-long";
const PAGE_CLASS: &str = "ui-leveledReader-page-too-full";
const WORD_COUNT_ATTR: &str = "data-word-count";

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct LeveledReaderSettings {
    pub max_words_per_sentence: usize,
    pub max_words_per_page: usize,
}

impl Default for LeveledReaderSettings {
    fn default() -> Self {
        Self {
            max_words_per_sentence: 10,
            max_words_per_page: 30,
        }
    }
}

pub struct LeveledReaderTool {
    settings: RwLock<LeveledReaderSettings>,
}

impl Default for LeveledReaderTool {
    fn default() -> Self {
        Self::new()
    }
}

impl LeveledReaderTool {
    pub fn new() -> Self {
        Self {
            settings: RwLock::new(LeveledReaderSettings::default()),
        }
    }

    pub fn with_settings(settings: LeveledReaderSettings) -> Self {
        Self {
            settings: RwLock::new(settings),
        }
    }

    pub async fn settings(&self) -> LeveledReaderSettings {
        *self.settings.read().await
    }

    fn word_count(text: &str) -> usize {
        text.split_whitespace().count()
    }

    /// Longest sentence on the region, in words. Sentences split on the
    /// usual terminators; a trailing fragment counts as a sentence.
    fn longest_sentence(text: &str) -> usize {
        text.split(['.', '!', '?'])
            .map(Self::word_count)
            .max()
            .unwrap_or(0)
    }
}

#[async_trait::async_trait]
impl Tool for LeveledReaderTool {
    fn id(&self) -> &str {
        "leveledReader"
    }

    fn is_always_enabled(&self) -> bool {
        true
    }

    fn is_update_markup_async(&self) -> bool {
        true
    }

    async fn configure_elements(&self, page: &PageHandle) {
        // Give every text region a word-count slot so the panel has
        // something to bind to before the first analysis lands.
        let mut page = page.write().await;
        for region in page.regions_of_kind_mut(RegionKind::Text) {
            if region.attr(WORD_COUNT_ATTR).is_none() {
                region.set_attr(WORD_COUNT_ATTR, "0");
            }
        }
    }

    async fn show_tool(&self, page: &PageHandle) {
        self.update_markup(page).await;
    }

    async fn hide_tool(&self, page: &PageHandle) {
        page.write().await.strip_ui_classes(CLASS_PREFIX);
    }

    async fn new_page_ready(&self, page: &PageHandle) {
        self.update_markup(page).await;
    }

    async fn update_markup(&self, page: &PageHandle) {
        // The real analysis runs off the UI timeline; yield so the dispatch
        // point that spawned us gets control back first.
        tokio::task::yield_now().await;

        let settings = *self.settings.read().await;
        let mut page = page.write().await;

        let mut page_total = 0usize;
        for region in page.regions_of_kind_mut(RegionKind::Text) {
            let words = Self::word_count(&region.text);
            page_total += words;
            region.set_attr(WORD_COUNT_ATTR, words.to_string());
            region.remove_class(SENTENCE_CLASS);
            if Self::longest_sentence(&region.text) > settings.max_words_per_sentence {
                region.add_class(SENTENCE_CLASS);
            }
        }

        let too_full = page_total > settings.max_words_per_page;
        for region in page.regions_of_kind_mut(RegionKind::Text) {
            region.remove_class(PAGE_CLASS);
            if too_full {
                region.add_class(PAGE_CLASS);
            }
        }
    }

    async fn restore_settings(&self, blob: &str) -> Result<()> {
        let settings = if blob.trim().is_empty() {
            LeveledReaderSettings::default()
        } else {
            match serde_json::from_str(blob) {
                Ok(settings) => settings,
                Err(e) => {
                    warn!(error = %e, "malformed leveled reader settings, using defaults");
                    LeveledReaderSettings::default()
                }
            }
        };
        *self.settings.write().await = settings;
        Ok(())
    }

    async fn detach_from_page(&self, page: &PageHandle) {
        let mut page = page.write().await;
        page.strip_ui_classes(CLASS_PREFIX);
        for region in page.regions_of_kind_mut(RegionKind::Text) {
            region.remove_attr(WORD_COUNT_ATTR);
        }
    }
}
