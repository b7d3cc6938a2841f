//! Page model — the editable fragment the host currently has loaded.
//!
//! The host bridge owns the page; tools only mutate the marked regions it
//! contains. Presentation classes added by tools are prefixed `ui-` and
//! namespaced by tool id (`ui-<toolid>-...`), so a tool can strip exactly
//! its own markup when it is hidden or the page is torn down.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Kind of marked region a tool may touch.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RegionKind {
    Text,
    Image,
    Canvas,
}

/// One marked element within the page.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Region {
    pub id: String,
    pub kind: RegionKind,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub classes: Vec<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attrs: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub text: String,
}

impl Region {
    pub fn new(id: impl Into<String>, kind: RegionKind) -> Self {
        Self {
            id: id.into(),
            kind,
            classes: Vec::new(),
            attrs: BTreeMap::new(),
            text: String::new(),
        }
    }

    pub fn with_text(id: impl Into<String>, text: impl Into<String>) -> Self {
        let mut region = Self::new(id, RegionKind::Text);
        region.text = text.into();
        region
    }

    pub fn has_class(&self, class: &str) -> bool {
        self.classes.iter().any(|c| c == class)
    }

    /// Add a class if not already present (class lists never hold duplicates).
    pub fn add_class(&mut self, class: &str) {
        if !self.has_class(class) {
            self.classes.push(class.to_string());
        }
    }

    pub fn remove_class(&mut self, class: &str) {
        self.classes.retain(|c| c != class);
    }

    /// Remove every class starting with `prefix`.
    pub fn strip_class_prefix(&mut self, prefix: &str) {
        self.classes.retain(|c| !c.starts_with(prefix));
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs.get(name).map(|v| v.as_str())
    }

    pub fn set_attr(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.attrs.insert(name.into(), value.into());
    }

    pub fn remove_attr(&mut self, name: &str) {
        self.attrs.remove(name);
    }
}

/// The currently loaded page: an ordered list of marked regions.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Page {
    pub page_id: String,
    #[serde(default)]
    pub regions: Vec<Region>,
}

impl Page {
    pub fn new(page_id: impl Into<String>) -> Self {
        Self {
            page_id: page_id.into(),
            regions: Vec::new(),
        }
    }

    /// Builder-style region append, used by the host and by tests.
    pub fn with_region(mut self, region: Region) -> Self {
        self.regions.push(region);
        self
    }

    pub fn push_region(&mut self, region: Region) {
        self.regions.push(region);
    }

    pub fn region(&self, id: &str) -> Option<&Region> {
        self.regions.iter().find(|r| r.id == id)
    }

    /// Lookup tolerates unknown ids; callers treat None as "target gone".
    pub fn region_mut(&mut self, id: &str) -> Option<&mut Region> {
        self.regions.iter_mut().find(|r| r.id == id)
    }

    pub fn regions_of_kind(&self, kind: RegionKind) -> impl Iterator<Item = &Region> {
        self.regions.iter().filter(move |r| r.kind == kind)
    }

    pub fn regions_of_kind_mut(&mut self, kind: RegionKind) -> impl Iterator<Item = &mut Region> {
        self.regions.iter_mut().filter(move |r| r.kind == kind)
    }

    pub fn regions_with_class(&self, class: &str) -> Vec<&Region> {
        self.regions.iter().filter(|r| r.has_class(class)).collect()
    }

    /// Strip every class starting with `prefix` from all regions. Tools call
    /// this with their own `ui-<toolid>-` namespace when hiding or detaching.
    pub fn strip_ui_classes(&mut self, prefix: &str) {
        for region in &mut self.regions {
            region.strip_class_prefix(prefix);
        }
    }
}
