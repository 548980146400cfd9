//! Plugin contract and loader.
//!
//! Rust has no runtime module loading, so plugin descriptors resolve
//! through a registry of named factories populated during initialization
//! (`Engine::add_plugin_factory`). Descriptors come in two classes with
//! textually distinct handling:
//!
//! - path-qualified (contains a path separator): the plugin is required;
//!   an unresolved descriptor is fatal.
//! - bare module-style (`namespace.ClassName`): the plugin is optional;
//!   an unresolved descriptor is skipped, so environment-specific plugins
//!   can stay listed without failing the whole load.
//!
//! A failure *inside* a plugin's registration calls is never swallowed:
//! it propagates and aborts the remaining loads.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;

use crate::engine::Engine;
use crate::error::{Error, Result};

/// The contract every plugin instance fulfills. The loader calls
/// `register_actions` then `register_hooks`, awaiting both, once per
/// instance.
#[async_trait]
pub trait Plugin: Send + Sync {
    /// Plugin name, by convention `namespace.ClassName`.
    fn name(&self) -> &str;

    async fn register_actions(&self, engine: &Engine) -> Result<()>;

    async fn register_hooks(&self, _engine: &Engine) -> Result<()> {
        Ok(())
    }
}

/// Instantiates a plugin against an engine handle.
pub type PluginFactory = Arc<dyn Fn(Arc<Engine>) -> Box<dyn Plugin> + Send + Sync>;

fn is_path_descriptor(descriptor: &str) -> bool {
    descriptor.contains('/') || descriptor.contains(std::path::MAIN_SEPARATOR)
}

/// Load a sequence of plugin descriptors against the engine, returning the
/// names of the plugins that loaded.
pub async fn load_plugins(
    engine: &Arc<Engine>,
    base_dir: &Path,
    descriptors: &[String],
) -> Result<Vec<String>> {
    let mut loaded = Vec::new();

    for descriptor in descriptors {
        let factory = if is_path_descriptor(descriptor) {
            // Required: an explicitly path-qualified plugin must resolve.
            let full_path = base_dir.join(descriptor);
            log_debug!("plugin", "resolving required plugin {}", full_path.display());
            engine
                .plugin_factory(descriptor)
                .ok_or_else(|| Error::PluginResolution(full_path.display().to_string()))?
        } else {
            // Optional: unresolved module-style descriptors are skipped.
            match engine.plugin_factory(descriptor) {
                Some(factory) => factory,
                None => {
                    log_debug!("plugin", "skipping unresolved plugin '{}'", descriptor);
                    continue;
                }
            }
        };

        let plugin = factory(engine.clone());
        plugin.register_actions(engine).await?;
        plugin.register_hooks(engine).await?;
        log_debug!("plugin", "{} plugin loaded", plugin.name());
        loaded.push(plugin.name().to_string());
    }

    Ok(loaded)
}
