use std::sync::Arc;

use crate::core::Editor;
use crate::plugin::{CommandError, PluginRegistry};

/// One entry of an editor toolbar. Items carry the command they are bound
/// to; their enabled state is read from the command, live, not captured at
/// build time.
#[derive(Clone)]
pub enum ToolbarItem {
    Button(ButtonSpec),
    Dropdown(DropdownSpec),
    Separator,
}

#[derive(Debug, Clone)]
pub struct ButtonSpec {
    pub label: String,
    pub command: String,
    pub args: Option<serde_json::Value>,
}

impl ButtonSpec {
    pub fn is_enabled(&self, editor: &Editor) -> bool {
        editor.command_enabled(&self.command)
    }

    pub fn activate(&self, editor: &mut Editor) -> Result<(), CommandError> {
        editor.run_command(&self.command, self.args.clone())
    }
}

#[derive(Debug, Clone)]
pub struct DropdownItem {
    pub label: String,
    pub args: Option<serde_json::Value>,
}

#[derive(Debug, Clone)]
pub struct DropdownSpec {
    pub label: String,
    pub command: String,
    pub items: Vec<DropdownItem>,
}

impl DropdownSpec {
    /// Mirrors the bound command's current state.
    pub fn is_enabled(&self, editor: &Editor) -> bool {
        editor.command_enabled(&self.command)
    }

    /// Executes the bound command with the chosen item's arguments.
    /// Returning focus to the editing surface is the embedder's concern.
    pub fn activate(&self, editor: &mut Editor, item_ix: usize) -> Result<(), CommandError> {
        let Some(item) = self.items.get(item_ix) else {
            return Err(CommandError::new(format!(
                "Dropdown item out of range: {item_ix} >= {}",
                self.items.len()
            )));
        };
        editor.run_command(&self.command, item.args.clone())
    }
}

/// A named toolbar component contributed by a plugin, built on demand when
/// the toolbar is assembled.
#[derive(Clone)]
pub struct ToolbarComponentSpec {
    pub id: String,
    pub build: Arc<dyn Fn() -> ToolbarItem + Send + Sync>,
}

impl ToolbarComponentSpec {
    pub fn new(id: impl Into<String>, build: impl Fn() -> ToolbarItem + Send + Sync + 'static) -> Self {
        Self {
            id: id.into(),
            build: Arc::new(build),
        }
    }
}

#[derive(Default, Clone)]
pub struct Toolbar {
    pub items: Vec<ToolbarItem>,
}

impl Toolbar {
    /// Assembles a toolbar from component ids in the given order. `"|"`
    /// becomes a separator; ids with no registered component are skipped.
    pub fn from_ids<S: AsRef<str>>(registry: &PluginRegistry, ids: &[S]) -> Self {
        let mut items = Vec::new();
        for id in ids {
            let id = id.as_ref();
            if id == "|" {
                items.push(ToolbarItem::Separator);
                continue;
            }
            match registry.toolbar_component(id) {
                Some(component) => items.push((component.build)()),
                None => {
                    log::warn!("No toolbar component registered for id {id:?}; skipping");
                }
            }
        }
        Self { items }
    }
}
