//! Core plugin: the `code_deploy` action.
//!
//! Uploads one function's packaged code and provisions it on the provider.
//! Registered without a CLI binding: orchestrating actions (or embedders)
//! invoke it programmatically, typically once per function/stage/region
//! unit, and those units may run concurrently — never attach shared state
//! to anything but the unit's own Event.

use std::sync::{Arc, Weak};

use async_trait::async_trait;

use crate::action::{handler, ActionConfig};
use crate::deploy::Deployer;
use crate::engine::Engine;
use crate::error::{Error, Result};
use crate::plugin::{Plugin, PluginFactory};

pub const PLUGIN_NAME: &str = "skiff.core.CodeDeploy";
pub const ACTION_NAME: &str = "code_deploy";

pub fn factory() -> PluginFactory {
    Arc::new(|engine| Box::new(CodeDeployPlugin { engine }))
}

struct CodeDeployPlugin {
    engine: Arc<Engine>,
}

#[async_trait]
impl Plugin for CodeDeployPlugin {
    fn name(&self) -> &str {
        PLUGIN_NAME
    }

    async fn register_actions(&self, engine: &Engine) -> Result<()> {
        // The handler resolves the provider per invocation, so wiring it up
        // after plugins load still works. Weak, since the handler lives
        // inside the engine's own registry.
        let handle = Arc::downgrade(&self.engine);

        engine.add_action(
            ActionConfig::new(ACTION_NAME, "Uploads function code and provisions it"),
            handler(move |evt| {
                let handle: Weak<Engine> = handle.clone();
                async move {
                    let provider = handle
                        .upgrade()
                        .and_then(|engine| engine.provider())
                        .ok_or_else(|| {
                            Error::Validation("No provider configured for code_deploy".into())
                        })?;
                    Deployer::new(provider).deploy(evt).await
                }
            }),
        )
    }
}
