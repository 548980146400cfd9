// Public modules
pub mod action;
pub mod command;
pub mod deploy;
pub mod engine;
pub mod error;
pub mod event;
pub mod hooks;
pub mod plugin;
pub mod project;
pub mod provider;

// Re-export common types for convenience
pub use action::{ActionConfig, ActionHandler, OptionConfig, ParameterConfig, Position};
pub use engine::{Engine, Invocation, RunState};
pub use error::{Error, Result};
pub use event::Event;
pub use hooks::HookPhase;
pub use plugin::{Plugin, PluginFactory};
pub use provider::{Provider, ProviderFailure};
