//! The execution engine.
//!
//! Holds the action registry, hook registry, command table and
//! plugin-factory registry, and runs one invocation as an ordered fold of
//! pre-hooks, the action, then post-hooks, threading a single [`Event`]
//! through every step.
//!
//! Registries are write-once-per-registration and populated during plugin
//! loading, before any command executes. The only runtime-mutable shared
//! state is the single-flight run-state guard.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};

use serde_json::{Map, Value};

use crate::action::{ActionConfig, ActionHandler};
use crate::error::{Error, Result};
use crate::event::Event;
use crate::hooks::{HookEntry, HookPhase};
use crate::plugin::PluginFactory;
use crate::project::ProjectContext;
use crate::provider::Provider;

const VERSION: &str = env!("CARGO_PKG_VERSION");

/// How a pipeline run was entered.
pub enum Invocation {
    /// CLI dispatch: the Event is replaced entirely with the union of the
    /// bound option flags and positional parameters.
    Cli {
        options: Map<String, Value>,
        params: Map<String, Value>,
    },
    /// Programmatic entry with an untyped value; see [`Event::from_value`]
    /// for the wrapping rule.
    Programmatic(Value),
    /// An already-normalized Event, used for nested action calls.
    Event(Event),
}

impl From<Event> for Invocation {
    fn from(evt: Event) -> Self {
        Invocation::Event(evt)
    }
}

/// Lifecycle of the single-flight guard: Idle -> Running -> Idle. The
/// guard is taken by the first top-level run and released unconditionally
/// when that run settles: success, failure, or a panicking handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Idle,
    Running,
}

struct RegisteredAction {
    config: ActionConfig,
    handler: ActionHandler,
}

/// Ownership of the single-flight guard. Resets the run state to Idle on
/// drop, so the guard is released even when a handler panics and unwinds
/// the pipeline instead of returning.
struct RunGuard<'a> {
    run_state: &'a Mutex<RunState>,
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        let mut state = match self.run_state.lock() {
            Ok(state) => state,
            Err(poisoned) => poisoned.into_inner(),
        };
        *state = RunState::Idle;
    }
}

#[derive(Default)]
struct Registry {
    actions: HashMap<String, RegisteredAction>,
    hooks: HashMap<String, Vec<HookEntry>>,
    commands: BTreeMap<String, BTreeMap<String, ActionConfig>>,
    factories: HashMap<String, PluginFactory>,
}

pub struct Engine {
    registry: Mutex<Registry>,
    run_state: Mutex<RunState>,
    project: Mutex<Option<ProjectContext>>,
    provider: Mutex<Option<Arc<dyn Provider>>>,
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

impl Engine {
    pub fn new() -> Self {
        Self {
            registry: Mutex::new(Registry::default()),
            run_state: Mutex::new(RunState::Idle),
            project: Mutex::new(None),
            provider: Mutex::new(None),
        }
    }

    pub fn version(&self) -> &'static str {
        VERSION
    }

    fn registry(&self) -> MutexGuard<'_, Registry> {
        self.registry.lock().expect("engine registry lock poisoned")
    }

    /// Register an action: store the handler under its unique name,
    /// pre-create its empty Pre/Post hook slots, and bind it into the
    /// command table when it declares a CLI context.
    ///
    /// Duplicate names fail with [`Error::DuplicateRegistration`].
    pub fn add_action(&self, config: ActionConfig, handler: ActionHandler) -> Result<()> {
        let mut reg = self.registry();
        let name = config.handler.clone();

        if reg.actions.contains_key(&name) {
            return Err(Error::DuplicateRegistration(name));
        }

        // Hook slots exist before any plugin may append to them.
        reg.hooks.entry(HookPhase::Pre.slot(&name)).or_default();
        reg.hooks.entry(HookPhase::Post.slot(&name)).or_default();

        if let (Some(context), Some(context_action)) = (&config.context, &config.context_action) {
            reg.commands
                .entry(context.clone())
                .or_default()
                .insert(context_action.clone(), config.clone());
        }

        reg.actions.insert(name, RegisteredAction { config, handler });
        Ok(())
    }

    /// Append a hook to `<action><phase>`. Hooks execute in registration
    /// order; re-registering an `id` already present in that slot is a
    /// no-op, so a plugin loaded twice contributes each hook once.
    pub fn add_hook(
        &self,
        action: &str,
        phase: HookPhase,
        id: impl Into<String>,
        handler: ActionHandler,
    ) -> Result<()> {
        let mut reg = self.registry();
        let slot = phase.slot(action);
        let entries = reg
            .hooks
            .get_mut(&slot)
            .ok_or_else(|| Error::UnknownAction(action.to_string()))?;

        let id = id.into();
        if entries.iter().any(|e| e.id == id) {
            return Ok(());
        }
        entries.push(HookEntry { id, handler });
        Ok(())
    }

    pub fn add_plugin_factory(&self, name: impl Into<String>, factory: PluginFactory) {
        self.registry().factories.insert(name.into(), factory);
    }

    pub fn plugin_factory(&self, name: &str) -> Option<PluginFactory> {
        self.registry().factories.get(name).cloned()
    }

    pub fn action_config(&self, name: &str) -> Option<ActionConfig> {
        self.registry().actions.get(name).map(|a| a.config.clone())
    }

    /// Snapshot of the command table, used by the command resolver and for
    /// help rendering.
    pub fn command_table(&self) -> BTreeMap<String, BTreeMap<String, ActionConfig>> {
        self.registry().commands.clone()
    }

    pub fn set_project(&self, project: ProjectContext) {
        *self.project.lock().expect("project lock poisoned") = Some(project);
    }

    pub fn project(&self) -> Option<ProjectContext> {
        self.project.lock().expect("project lock poisoned").clone()
    }

    pub fn has_project(&self) -> bool {
        self.project.lock().expect("project lock poisoned").is_some()
    }

    pub fn set_provider(&self, provider: Arc<dyn Provider>) {
        *self.provider.lock().expect("provider lock poisoned") = Some(provider);
    }

    pub fn provider(&self) -> Option<Arc<dyn Provider>> {
        self.provider.lock().expect("provider lock poisoned").clone()
    }

    /// Whether a top-level pipeline currently owns the single-flight guard.
    pub fn is_running(&self) -> bool {
        *self.run_state.lock().expect("run state lock poisoned") == RunState::Running
    }

    /// Resolve an action by name and run its full queue:
    /// pre-hooks -> action -> post-hooks.
    pub async fn run_action(&self, name: &str, invocation: Invocation) -> Result<Event> {
        let queue = {
            let reg = self.registry();
            let action = reg
                .actions
                .get(name)
                .ok_or_else(|| Error::UnknownAction(name.to_string()))?;

            let mut queue: Vec<ActionHandler> = Vec::new();
            if let Some(entries) = reg.hooks.get(&HookPhase::Pre.slot(name)) {
                queue.extend(entries.iter().map(|e| e.handler.clone()));
            }
            queue.push(action.handler.clone());
            if let Some(entries) = reg.hooks.get(&HookPhase::Post.slot(name)) {
                queue.extend(entries.iter().map(|e| e.handler.clone()));
            }
            queue
        };

        self.execute(queue, invocation).await
    }

    /// Run a handler queue, threading one Event through it sequentially.
    ///
    /// Two modes, preserved from the original design:
    /// - If the engine is Idle, this call becomes the active pipeline: it
    ///   takes the guard and releases it when the fold settles, on every
    ///   exit path.
    /// - If a pipeline is already Running, the queue folds against the
    ///   supplied Event without touching the guard. This is the re-entrant
    ///   mode that lets a hook invoke another action mid-pipeline.
    pub async fn execute(&self, queue: Vec<ActionHandler>, invocation: Invocation) -> Result<Event> {
        let evt = match invocation {
            Invocation::Cli { options, params } => Event::from_cli(options, params),
            Invocation::Programmatic(value) => Event::from_value(value)?,
            Invocation::Event(evt) => evt,
        };

        let guard = {
            let mut state = self.run_state.lock().expect("run state lock poisoned");
            match *state {
                RunState::Idle => {
                    *state = RunState::Running;
                    Some(RunGuard {
                        run_state: &self.run_state,
                    })
                }
                RunState::Running => None,
            }
        };

        let result = Self::fold(queue, evt).await;

        drop(guard);
        result
    }

    /// Strictly sequential fold: step n+1 never begins until step n's Event
    /// is available. A failure short-circuits the remaining queue and
    /// propagates verbatim.
    async fn fold(queue: Vec<ActionHandler>, mut evt: Event) -> Result<Event> {
        for handler in queue {
            evt = handler(evt).await?;
        }
        Ok(evt)
    }
}
