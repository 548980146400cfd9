//! Action configuration and handler types.
//!
//! An action is a unit of work with a unique handler name, an optional CLI
//! binding (`context` + `context_action`), and declared options/positional
//! parameters used by the command resolver.

use std::future::Future;
use std::sync::Arc;

use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::event::Event;

/// A queue entry: an async function from Event to Event.
pub type ActionHandler = Arc<dyn Fn(Event) -> BoxFuture<'static, Result<Event>> + Send + Sync>;

/// Box an async closure into an [`ActionHandler`].
pub fn handler<F, Fut>(f: F) -> ActionHandler
where
    F: Fn(Event) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Event>> + Send + 'static,
{
    Arc::new(move |evt| Box::pin(f(evt)))
}

/// Immutable configuration for one registered action.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionConfig {
    /// Unique handler name; also keys the `<handler>Pre`/`<handler>Post`
    /// hook slots.
    pub handler: String,
    pub description: String,
    /// CLI context this action binds to (e.g. `function`), if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
    /// CLI sub-action under the context (e.g. `deploy`), if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context_action: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<OptionConfig>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub parameters: Vec<ParameterConfig>,
    /// Whether dispatch requires a loaded project context. The project
    /// bootstrap action registers with `false`.
    #[serde(default = "default_true")]
    pub requires_project: bool,
}

fn default_true() -> bool {
    true
}

impl ActionConfig {
    pub fn new(handler: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            handler: handler.into(),
            description: description.into(),
            context: None,
            context_action: None,
            options: Vec::new(),
            parameters: Vec::new(),
            requires_project: true,
        }
    }

    pub fn cli(mut self, context: impl Into<String>, context_action: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self.context_action = Some(context_action.into());
        self
    }

    pub fn option(
        mut self,
        option: impl Into<String>,
        shortcut: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        self.options.push(OptionConfig {
            option: option.into(),
            shortcut: shortcut.into(),
            description: description.into(),
        });
        self
    }

    pub fn parameter(mut self, name: impl Into<String>, position: Position) -> Self {
        self.parameters.push(ParameterConfig {
            name: name.into(),
            position,
        });
        self
    }

    pub fn no_project(mut self) -> Self {
        self.requires_project = false;
        self
    }
}

/// A named CLI option with a single-character shortcut.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptionConfig {
    pub option: String,
    pub shortcut: String,
    pub description: String,
}

/// A declared positional parameter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParameterConfig {
    pub name: String,
    pub position: Position,
}

/// Where a parameter binds among the positional tokens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Position {
    /// A single token at a fixed index of the remaining tokens.
    Index(usize),
    /// A contiguous slice of the remaining tokens (`start->end`); `end`
    /// defaults to the rest of the tokens.
    Span { start: usize, end: Option<usize> },
}
