//! Tests for the builtin tools: leveled reader, overlay, and impairment
//! visualizer, against real pages

use std::collections::HashMap;
use std::sync::Arc;
use storybox_core::{Page, Region, RegionKind};
use storybox_toolbox::tools::impairment::ImpairmentTool;
use storybox_toolbox::tools::leveled_reader::{LeveledReaderSettings, LeveledReaderTool};
use storybox_toolbox::tools::overlay::{BubbleStyle, OverlayTool};
use storybox_toolbox::{create_default_toolbox, PageHandle, Tool, ToolboxConfig};
use tokio::sync::RwLock;

fn handle(page: Page) -> PageHandle {
    Arc::new(RwLock::new(page))
}

fn story_page() -> Page {
    Page::new("p1")
        .with_region(Region::with_text("t1", "The cat sat."))
        .with_region(Region::with_text(
            "t2",
            "Once upon a time there was a very small dog who barked at everything in sight.",
        ))
        .with_region(Region::new("img1", RegionKind::Image))
        .with_region(Region::new("bubble1", RegionKind::Canvas))
}

// ===========================================================================
// LeveledReaderTool
// ===========================================================================

#[tokio::test]
async fn leveled_reader_counts_words_and_flags_long_sentences() {
    let tool = LeveledReaderTool::new();
    let page = handle(story_page());

    tool.update_markup(&page).await;

    let page = page.read().await;
    assert_eq!(page.region("t1").unwrap().attr("data-word-count"), Some("3"));
    assert_eq!(page.region("t2").unwrap().attr("data-word-count"), Some("16"));
    assert!(!page
        .region("t1")
        .unwrap()
        .has_class("ui-leveledReader-sentence-too-long"));
    assert!(page
        .region("t2")
        .unwrap()
        .has_class("ui-leveledReader-sentence-too-long"));
    // 19 words total, default page limit is 30
    assert!(!page
        .region("t1")
        .unwrap()
        .has_class("ui-leveledReader-page-too-full"));
}

#[tokio::test]
async fn leveled_reader_flags_overfull_page() {
    let tool = LeveledReaderTool::with_settings(LeveledReaderSettings {
        max_words_per_sentence: 100,
        max_words_per_page: 10,
    });
    let page = handle(story_page());

    tool.update_markup(&page).await;

    let page = page.read().await;
    for id in ["t1", "t2"] {
        assert!(page
            .region(id)
            .unwrap()
            .has_class("ui-leveledReader-page-too-full"));
    }
    // image and canvas regions are untouched
    assert!(page.region("img1").unwrap().classes.is_empty());
}

#[tokio::test]
async fn leveled_reader_markup_is_idempotent() {
    let tool = LeveledReaderTool::new();
    let page = handle(story_page());

    tool.update_markup(&page).await;
    let first = page.read().await.clone();
    tool.update_markup(&page).await;
    let second = page.read().await.clone();

    assert_eq!(first, second);
}

#[tokio::test]
async fn leveled_reader_markup_follows_content_changes() {
    let tool = LeveledReaderTool::with_settings(LeveledReaderSettings {
        max_words_per_sentence: 5,
        max_words_per_page: 100,
    });
    let page = handle(Page::new("p1").with_region(Region::with_text("t1", "one two three")));

    tool.update_markup(&page).await;
    assert!(!page
        .read()
        .await
        .region("t1")
        .unwrap()
        .has_class("ui-leveledReader-sentence-too-long"));

    page.write().await.region_mut("t1").unwrap().text =
        "one two three four five six seven".to_string();
    tool.update_markup(&page).await;
    let page = page.read().await;
    assert!(page
        .region("t1")
        .unwrap()
        .has_class("ui-leveledReader-sentence-too-long"));
    assert_eq!(page.region("t1").unwrap().attr("data-word-count"), Some("7"));
}

#[tokio::test]
async fn leveled_reader_restore_applies_limits() {
    let tool = LeveledReaderTool::new();
    tool.restore_settings(r#"{"maxWordsPerSentence":2,"maxWordsPerPage":4}"#)
        .await
        .unwrap();
    let settings = tool.settings().await;
    assert_eq!(settings.max_words_per_sentence, 2);
    assert_eq!(settings.max_words_per_page, 4);

    let page = handle(Page::new("p1").with_region(Region::with_text("t1", "one two three")));
    tool.update_markup(&page).await;
    assert!(page
        .read()
        .await
        .region("t1")
        .unwrap()
        .has_class("ui-leveledReader-sentence-too-long"));
}

#[tokio::test]
async fn leveled_reader_malformed_blob_falls_back_to_defaults() {
    let tool = LeveledReaderTool::new();
    tool.restore_settings("{not json").await.unwrap();
    assert_eq!(tool.settings().await, LeveledReaderSettings::default());

    tool.restore_settings("").await.unwrap();
    assert_eq!(tool.settings().await, LeveledReaderSettings::default());
}

#[tokio::test]
async fn leveled_reader_detach_removes_instrumentation() {
    let tool = LeveledReaderTool::with_settings(LeveledReaderSettings {
        max_words_per_sentence: 1,
        max_words_per_page: 1,
    });
    let page = handle(story_page());
    tool.configure_elements(&page).await;
    tool.update_markup(&page).await;

    tool.detach_from_page(&page).await;
    let page = page.read().await;
    for id in ["t1", "t2"] {
        let region = page.region(id).unwrap();
        assert!(region.classes.is_empty());
        assert_eq!(region.attr("data-word-count"), None);
    }
}

#[tokio::test]
async fn leveled_reader_configure_is_idempotent() {
    let tool = LeveledReaderTool::new();
    let page = handle(story_page());
    tool.configure_elements(&page).await;
    let first = page.read().await.clone();
    tool.configure_elements(&page).await;
    assert_eq!(first, *page.read().await);
    assert_eq!(
        page.read().await.region("t1").unwrap().attr("data-word-count"),
        Some("0")
    );
}

// ===========================================================================
// OverlayTool
// ===========================================================================

#[tokio::test]
async fn overlay_applies_default_style_to_unstyled_bubbles() {
    let tool = OverlayTool::new();
    let page = handle(story_page());

    tool.show_tool(&page).await;

    let page = page.read().await;
    let bubble = page.region("bubble1").unwrap();
    assert!(bubble.has_class("ui-overlay-active"));
    assert_eq!(bubble.attr("data-bubble-style"), Some("speech"));
    assert_eq!(tool.default_style().await, BubbleStyle::Speech);
}

#[tokio::test]
async fn overlay_keeps_existing_bubble_style() {
    let tool = OverlayTool::new();
    let mut page = story_page();
    page.region_mut("bubble1")
        .unwrap()
        .set_attr("data-bubble-style", "thought");
    let page = handle(page);

    tool.show_tool(&page).await;
    assert_eq!(
        page.read().await.region("bubble1").unwrap().attr("data-bubble-style"),
        Some("thought")
    );
}

#[tokio::test]
async fn overlay_hide_strips_classes_but_keeps_bubble_content() {
    let tool = OverlayTool::new();
    let page = handle(story_page());
    tool.show_tool(&page).await;

    tool.hide_tool(&page).await;

    let page = page.read().await;
    let bubble = page.region("bubble1").unwrap();
    assert!(!bubble.has_class("ui-overlay-active"));
    // the bubble style is document content and survives hiding
    assert_eq!(bubble.attr("data-bubble-style"), Some("speech"));
}

#[tokio::test]
async fn overlay_restore_changes_default_style() {
    let tool = OverlayTool::new();
    tool.restore_settings(r#"{"defaultStyle":"caption"}"#)
        .await
        .unwrap();
    assert_eq!(tool.default_style().await, BubbleStyle::Caption);

    let page = handle(story_page());
    tool.show_tool(&page).await;
    assert_eq!(
        page.read().await.region("bubble1").unwrap().attr("data-bubble-style"),
        Some("caption")
    );
}

#[tokio::test]
async fn overlay_none_style_adds_no_attribute() {
    let tool = OverlayTool::new();
    tool.restore_settings(r#"{"defaultStyle":"none"}"#)
        .await
        .unwrap();
    let page = handle(story_page());
    tool.show_tool(&page).await;

    let page = page.read().await;
    let bubble = page.region("bubble1").unwrap();
    assert!(bubble.has_class("ui-overlay-active"));
    assert_eq!(bubble.attr("data-bubble-style"), None);
}

// ===========================================================================
// ImpairmentTool
// ===========================================================================

#[tokio::test]
async fn impairment_default_kind_adds_nothing() {
    let tool = ImpairmentTool::new();
    let page = handle(story_page());
    tool.show_tool(&page).await;
    assert!(page.read().await.region("img1").unwrap().classes.is_empty());
}

#[tokio::test]
async fn impairment_tags_images_and_hide_removes() {
    let tool = ImpairmentTool::new();
    tool.restore_settings(r#"{"kind":"cataracts"}"#).await.unwrap();
    let page = handle(story_page());

    tool.show_tool(&page).await;
    assert!(page
        .read()
        .await
        .region("img1")
        .unwrap()
        .has_class("ui-impairment-cataracts"));
    // text regions are never tagged
    assert!(page.read().await.region("t1").unwrap().classes.is_empty());

    tool.hide_tool(&page).await;
    assert!(page.read().await.region("img1").unwrap().classes.is_empty());
}

#[tokio::test]
async fn impairment_kind_change_replaces_class() {
    let tool = ImpairmentTool::new();
    tool.restore_settings(r#"{"kind":"cataracts"}"#).await.unwrap();
    let page = handle(story_page());
    tool.show_tool(&page).await;

    tool.restore_settings(r#"{"kind":"protanopia"}"#).await.unwrap();
    tool.update_markup(&page).await;

    let page = page.read().await;
    let image = page.region("img1").unwrap();
    assert!(image.has_class("ui-impairment-protanopia"));
    assert!(!image.has_class("ui-impairment-cataracts"));
}

#[tokio::test]
async fn impairment_malformed_blob_falls_back_to_defaults() {
    let tool = ImpairmentTool::new();
    tool.restore_settings(r#"{"kind":"cataracts"}"#).await.unwrap();
    tool.restore_settings("][").await.unwrap();
    let page = handle(story_page());
    tool.show_tool(&page).await;
    assert!(page.read().await.region("img1").unwrap().classes.is_empty());
}

// ===========================================================================
// Default toolbox
// ===========================================================================

#[tokio::test]
async fn default_toolbox_registers_builtin_tools_in_order() {
    let toolbox = create_default_toolbox(ToolboxConfig::default()).unwrap();
    assert_eq!(toolbox.list(), vec!["leveledReader", "overlay", "impairment"]);
    // impairment is experimental and hidden by default
    assert_eq!(toolbox.available_tools(), vec!["leveledReader", "overlay"]);

    let toolbox = create_default_toolbox(ToolboxConfig {
        show_experimental: true,
    })
    .unwrap();
    assert_eq!(
        toolbox.available_tools(),
        vec!["leveledReader", "overlay", "impairment"]
    );
}

#[tokio::test]
async fn full_session_with_builtin_tools() {
    let mut toolbox = create_default_toolbox(ToolboxConfig::default()).unwrap();
    toolbox.on_settings_blob_available(HashMap::from([
        (
            "leveledReader".to_string(),
            r#"{"maxWordsPerSentence":5,"maxWordsPerPage":100}"#.to_string(),
        ),
        ("overlay".to_string(), r#"{"defaultStyle":"caption"}"#.to_string()),
    ]));

    let page = handle(story_page());
    toolbox.on_new_page(page.clone()).await;
    toolbox.wait_for_background_work().await;
    assert!(toolbox.is_initialized());

    toolbox.activate_tool("overlay").await.unwrap();
    toolbox.on_content_changed().await;
    toolbox.wait_for_background_work().await;

    let page = page.read().await;
    // leveled reader ran even though overlay is current
    assert!(page
        .region("t2")
        .unwrap()
        .has_class("ui-leveledReader-sentence-too-long"));
    assert_eq!(
        page.region("bubble1").unwrap().attr("data-bubble-style"),
        Some("caption")
    );
}
