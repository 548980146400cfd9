//! The command resolver: maps parsed CLI input onto the command table and
//! dispatches the resolved action through the engine.
//!
//! Lexing argv into [`RawArgs`] happens upstream (see `utils::args`); this
//! module owns everything after that: version/help short-circuits,
//! context/sub-action lookup, project gating, option and positional
//! binding.

use std::collections::BTreeMap;

use serde_json::{Map, Value};

use crate::action::{ActionConfig, Position};
use crate::engine::{Engine, Invocation};
use crate::error::{Error, Result};
use crate::event::Event;

/// Pre-parsed CLI input: positional tokens plus named flags. Flag values
/// are strings for `--flag value` / `--flag=value` and `true` for bare
/// flags.
#[derive(Debug, Clone, Default)]
pub struct RawArgs {
    pub positional: Vec<String>,
    pub flags: Map<String, Value>,
}

impl RawArgs {
    fn flag_set(&self, key: &str) -> bool {
        match self.flags.get(key) {
            None | Some(Value::Null) | Some(Value::Bool(false)) => false,
            Some(_) => true,
        }
    }

    fn token_is(&self, index: usize, candidates: &[&str]) -> bool {
        self.positional
            .get(index)
            .map(|t| candidates.contains(&t.as_str()))
            .unwrap_or(false)
    }
}

/// What a CLI invocation resolved to.
#[derive(Debug)]
pub enum CliOutcome {
    /// `version`/`v`: print the tool version, nothing dispatched.
    Version(String),
    /// A help view; which one depends on how far the context/sub-action
    /// pair matched the command table.
    Help(HelpTopic),
    /// An action ran to completion with this final Event.
    Completed(Event),
}

#[derive(Debug)]
pub enum HelpTopic {
    Global(BTreeMap<String, BTreeMap<String, ActionConfig>>),
    Context {
        context: String,
        actions: BTreeMap<String, ActionConfig>,
    },
    Action(ActionConfig),
}

impl Engine {
    /// Resolve and dispatch one CLI invocation.
    pub async fn command(&self, raw: RawArgs) -> Result<CliOutcome> {
        if raw.flag_set("d") || raw.flag_set("debug") {
            std::env::set_var("SKIFF_DEBUG", "1");
        }

        log_debug!("cli", "raw input: {:?}", raw);

        if raw.token_is(0, &["version", "v"]) || raw.flag_set("version") || raw.flag_set("v") {
            return Ok(CliOutcome::Version(self.version().to_string()));
        }

        let context = raw.positional.first().cloned();
        let sub_action = raw.positional.get(1).cloned();

        if raw.positional.is_empty()
            || raw.token_is(0, &["help", "h"])
            || raw.flag_set("help")
            || raw.flag_set("h")
        {
            return Ok(CliOutcome::Help(self.help_topic(context, sub_action)));
        }

        let context = context.expect("positional tokens checked non-empty");
        let table = self.command_table();
        let actions = table
            .get(&context)
            .ok_or_else(|| Error::UnknownContext(context.clone()))?;
        let sub_action =
            sub_action.ok_or_else(|| Error::UnknownAction(format!("{context} (none)")))?;
        let config = actions
            .get(&sub_action)
            .ok_or_else(|| Error::UnknownAction(format!("{context} {sub_action}")))?;

        if config.requires_project && !self.has_project() {
            return Err(Error::NoProjectContext);
        }

        let options = bind_options(config, &raw);
        let params = bind_parameters(config, &raw);

        log_debug!("cli", "dispatching '{}'", config.handler);

        let evt = self
            .run_action(&config.handler, Invocation::Cli { options, params })
            .await?;
        Ok(CliOutcome::Completed(evt))
    }

    fn help_topic(&self, context: Option<String>, sub_action: Option<String>) -> HelpTopic {
        let table = self.command_table();
        let Some(context) = context.filter(|c| table.contains_key(c)) else {
            return HelpTopic::Global(table);
        };
        let actions = table[&context].clone();
        match sub_action.and_then(|a| actions.get(&a).cloned()) {
            Some(config) => HelpTopic::Action(config),
            None => HelpTopic::Context { context, actions },
        }
    }
}

/// Each declared option pulls its value from the matching long flag,
/// falling back to the shortcut flag, defaulting to null.
fn bind_options(config: &ActionConfig, raw: &RawArgs) -> Map<String, Value> {
    let mut options = Map::new();
    for opt in &config.options {
        let value = raw
            .flags
            .get(&opt.option)
            .or_else(|| raw.flags.get(&opt.shortcut))
            .cloned()
            .unwrap_or(Value::Null);
        options.insert(opt.option.clone(), value);
    }
    options
}

/// Bind declared positional parameters against the tokens remaining after
/// the context/sub-action pair. Each binding consumes what it takes, so
/// later parameters see only the remaining tokens; a span with no upper
/// bound takes the rest.
fn bind_parameters(config: &ActionConfig, raw: &RawArgs) -> Map<String, Value> {
    let mut work: Vec<String> = raw.positional.iter().skip(2).cloned().collect();
    let mut params = Map::new();

    for parameter in &config.parameters {
        let value = match &parameter.position {
            Position::Index(index) => {
                if *index < work.len() {
                    Value::String(work.remove(*index))
                } else {
                    Value::Null
                }
            }
            Position::Span { start, end } => {
                let start = (*start).min(work.len());
                let end = end.unwrap_or(work.len()).min(work.len()).max(start);
                Value::Array(work.drain(start..end).map(Value::String).collect())
            }
        };
        params.insert(parameter.name.clone(), value);
    }

    params
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::handler;
    use crate::project::ProjectContext;
    use serde_json::json;

    fn raw(positional: &[&str], flags: &[(&str, Value)]) -> RawArgs {
        RawArgs {
            positional: positional.iter().map(|s| s.to_string()).collect(),
            flags: flags
                .iter()
                .map(|(k, v)| (k.to_string(), v.clone()))
                .collect(),
        }
    }

    fn engine_with_env_unset() -> Engine {
        let engine = Engine::new();
        engine
            .add_action(
                ActionConfig::new("env_unset", "unset an env var")
                    .cli("env", "unset")
                    .option("stage", "s", "stage to unset from")
                    .option("region", "r", "region to unset from")
                    .parameter("key", Position::Index(0)),
                handler(|mut evt: Event| async move {
                    evt.set_data("done", true);
                    Ok(evt)
                }),
            )
            .unwrap();
        engine.set_project(ProjectContext::named("demo"));
        engine
    }

    #[tokio::test]
    async fn version_token_short_circuits() {
        let engine = engine_with_env_unset();
        match engine.command(raw(&["version"], &[])).await.unwrap() {
            CliOutcome::Version(v) => assert_eq!(v, env!("CARGO_PKG_VERSION")),
            other => panic!("expected version, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn version_flag_short_circuits_before_resolution() {
        let engine = engine_with_env_unset();
        let outcome = engine
            .command(raw(&["bogus"], &[("v", json!(true))]))
            .await
            .unwrap();
        assert!(matches!(outcome, CliOutcome::Version(_)));
    }

    #[tokio::test]
    async fn empty_input_yields_global_help() {
        let engine = engine_with_env_unset();
        match engine.command(RawArgs::default()).await.unwrap() {
            CliOutcome::Help(HelpTopic::Global(table)) => assert!(table.contains_key("env")),
            other => panic!("expected global help, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn help_flag_selects_by_match_depth() {
        let engine = engine_with_env_unset();

        match engine
            .command(raw(&["env"], &[("help", json!(true))]))
            .await
            .unwrap()
        {
            CliOutcome::Help(HelpTopic::Context { context, actions }) => {
                assert_eq!(context, "env");
                assert!(actions.contains_key("unset"));
            }
            other => panic!("expected context help, got {other:?}"),
        }

        match engine
            .command(raw(&["env", "unset"], &[("h", json!(true))]))
            .await
            .unwrap()
        {
            CliOutcome::Help(HelpTopic::Action(config)) => assert_eq!(config.handler, "env_unset"),
            other => panic!("expected action help, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn unknown_context_fails() {
        let engine = engine_with_env_unset();
        let err = engine.command(raw(&["nope", "unset"], &[])).await.unwrap_err();
        assert_eq!(err.code(), "UNKNOWN_CONTEXT");
    }

    #[tokio::test]
    async fn unknown_sub_action_fails() {
        let engine = engine_with_env_unset();
        let err = engine.command(raw(&["env", "nope"], &[])).await.unwrap_err();
        assert_eq!(err.code(), "UNKNOWN_ACTION");
    }

    #[tokio::test]
    async fn project_gating_blocks_without_project() {
        let engine = Engine::new();
        engine
            .add_action(
                ActionConfig::new("env_unset", "").cli("env", "unset"),
                handler(|evt| async move { Ok(evt) }),
            )
            .unwrap();
        let err = engine.command(raw(&["env", "unset"], &[])).await.unwrap_err();
        assert_eq!(err.code(), "NO_PROJECT_CONTEXT");
    }

    #[tokio::test]
    async fn bootstrap_action_runs_without_project() {
        let engine = Engine::new();
        engine
            .add_action(
                ActionConfig::new("project_create", "")
                    .cli("project", "create")
                    .no_project(),
                handler(|evt| async move { Ok(evt) }),
            )
            .unwrap();
        let outcome = engine.command(raw(&["project", "create"], &[])).await;
        assert!(outcome.is_ok());
    }

    #[tokio::test]
    async fn options_bind_long_then_shortcut_then_null() {
        let engine = engine_with_env_unset();
        let outcome = engine
            .command(raw(
                &["env", "unset", "MY_KEY"],
                &[("stage", json!("dev")), ("r", json!("us-east-1"))],
            ))
            .await
            .unwrap();

        let CliOutcome::Completed(evt) = outcome else {
            panic!("expected completion");
        };
        assert_eq!(evt.options["stage"], "dev");
        assert_eq!(evt.options["region"], "us-east-1");
        assert_eq!(evt.options["key"], "MY_KEY");
        assert_eq!(evt.data["done"], true);
    }

    #[tokio::test]
    async fn missing_option_binds_null() {
        let engine = engine_with_env_unset();
        let CliOutcome::Completed(evt) = engine
            .command(raw(&["env", "unset", "MY_KEY"], &[]))
            .await
            .unwrap()
        else {
            panic!("expected completion");
        };
        assert_eq!(evt.options["stage"], Value::Null);
        assert_eq!(evt.options["region"], Value::Null);
    }

    #[test]
    fn span_parameter_takes_rest_of_tokens() {
        let config = ActionConfig::new("run", "")
            .parameter("first", Position::Index(0))
            .parameter("rest", Position::Span { start: 0, end: None });
        let raw = raw(&["ctx", "act", "alpha", "beta", "gamma"], &[]);

        let params = bind_parameters(&config, &raw);
        assert_eq!(params["first"], "alpha");
        assert_eq!(params["rest"], json!(["beta", "gamma"]));
    }

    #[test]
    fn span_parameter_with_bound_takes_slice() {
        let config =
            ActionConfig::new("run", "").parameter("pair", Position::Span { start: 0, end: Some(2) });
        let raw = raw(&["ctx", "act", "a", "b", "c"], &[]);

        let params = bind_parameters(&config, &raw);
        assert_eq!(params["pair"], json!(["a", "b"]));
    }

    #[test]
    fn out_of_range_index_binds_null() {
        let config = ActionConfig::new("run", "").parameter("missing", Position::Index(3));
        let raw = raw(&["ctx", "act"], &[]);

        let params = bind_parameters(&config, &raw);
        assert_eq!(params["missing"], Value::Null);
    }
}
