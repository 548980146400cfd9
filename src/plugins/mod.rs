//! Framework-default plugins.
//!
//! Core plugins ship with the engine and are listed in [`CORE_PLUGINS`];
//! the binary registers their factories and hands the list to the plugin
//! loader alongside any project-declared plugins.

pub mod code_deploy;

use crate::engine::Engine;

/// Framework-default plugin descriptors, loaded before project plugins.
pub const CORE_PLUGINS: &[&str] = &["skiff.core.CodeDeploy"];

/// Register factories for all core plugins.
pub fn register_core_factories(engine: &Engine) {
    engine.add_plugin_factory(code_deploy::PLUGIN_NAME, code_deploy::factory());
}
