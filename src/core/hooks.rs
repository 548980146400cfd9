//! Hook phases and entries.
//!
//! Hooks are plugin-contributed handlers that run immediately before (Pre)
//! or after (Post) a specific action. Slots are keyed `<handler>Pre` /
//! `<handler>Post` and exist from the moment the action is registered, so
//! plugins can only hook actions that actually exist.

use serde::{Deserialize, Serialize};

use crate::action::ActionHandler;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HookPhase {
    Pre,
    Post,
}

impl HookPhase {
    pub fn suffix(self) -> &'static str {
        match self {
            HookPhase::Pre => "Pre",
            HookPhase::Post => "Post",
        }
    }

    /// Slot key for an action/phase pair, e.g. `code_deployPre`.
    pub fn slot(self, action: &str) -> String {
        format!("{action}{}", self.suffix())
    }
}

/// One registered hook. The `id` stands in for reference identity:
/// registering the same id into the same slot twice is a no-op, so a
/// plugin loaded twice contributes each hook once.
#[derive(Clone)]
pub struct HookEntry {
    pub id: String,
    pub handler: ActionHandler,
}
