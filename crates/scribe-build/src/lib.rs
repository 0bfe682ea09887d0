//! Editor assembly: the stock plugin set, the default toolbar and a single
//! entry point that turns a [`BuildConfig`] into a ready editor.

use scribe_core::{Editor, EditorPlugin, PluginRegistry, Toolbar, core_plugins};
use scribe_placeholder::{PlaceholderConfig, PlaceholderOption, PlaceholderPlugin};

/// Toolbar shipped when the embedding application does not configure one.
/// The placeholder dropdown is deliberately absent: the feature only
/// surfaces where an application opts in with the `"placeholder"` id.
pub const DEFAULT_TOOLBAR: &[&str] = &["bold", "italic", "|", "link"];

/// Build-level configuration. `toolbar` lists component ids in presentation
/// order, with `"|"` as a separator.
#[derive(Debug, Clone)]
pub struct BuildConfig {
    pub toolbar: Vec<String>,
    pub placeholder: PlaceholderConfig,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            toolbar: DEFAULT_TOOLBAR.iter().map(|id| id.to_string()).collect(),
            placeholder: default_placeholder_config(),
        }
    }
}

/// Placeholder options shipped with the stock build.
pub fn default_placeholder_config() -> PlaceholderConfig {
    PlaceholderConfig {
        label: "Placeholder".to_string(),
        options: vec![
            PlaceholderOption::new("[First Name]", "firstname"),
            PlaceholderOption::new("[Last Name]", "lastname"),
            PlaceholderOption::new("[User Link to Overview]", "personallink")
                .with_kind("calltoaction"),
        ],
    }
}

/// Every plugin included in the stock build, in registration order.
pub fn builtin_plugins(placeholder: PlaceholderConfig) -> Vec<Box<dyn EditorPlugin>> {
    let mut plugins = core_plugins();
    plugins.push(Box::new(PlaceholderPlugin::new(placeholder)));
    plugins
}

pub fn builtin_registry(placeholder: PlaceholderConfig) -> PluginRegistry {
    match PluginRegistry::new(builtin_plugins(placeholder)) {
        Ok(registry) => registry,
        // The builtin set is a fixed, internally consistent plugin list.
        Err(err) => unreachable!("builtin plugin set failed to register: {err}"),
    }
}

/// Assembles an editor and its toolbar from the given configuration.
pub fn build_editor(config: BuildConfig) -> (Editor, Toolbar) {
    let registry = builtin_registry(config.placeholder);
    let toolbar = Toolbar::from_ids(&registry, &config.toolbar);
    (Editor::from_registry(registry), toolbar)
}
