//! Storybox Toolbox — tool registry/dispatcher and builtin editing tools
//!
//! Each tool is a self-contained file in src/tools/.
//! To add a tool: create the file, implement the Tool trait, register below.
//! To remove a tool: delete the file, remove from mod.rs and the registry
//! function below.

pub mod toolbox;
pub mod tools;

pub use toolbox::{PageHandle, Tool, ToolBox, ToolState, ToolboxConfig};

use storybox_core::Result;

/// Create the default toolbox with all builtin tools registered, in the
/// order the panels appear in the editor.
///
/// Edit this function to add or remove tools from the editing session.
pub fn create_default_toolbox(config: ToolboxConfig) -> Result<ToolBox> {
    let mut toolbox = ToolBox::new(config);

    // --- Markup tools (run on every page, active or not) ---
    toolbox.register_tool(tools::leveled_reader::LeveledReaderTool::new())?;

    // --- Panel tools ---
    toolbox.register_tool(tools::overlay::OverlayTool::new())?;
    toolbox.register_tool(tools::impairment::ImpairmentTool::new())?;

    Ok(toolbox)
}
