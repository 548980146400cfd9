//! End-to-end pipeline tests: plugin loading through CLI dispatch, the
//! single-flight guard, and repeated deploy reconciliation against a
//! stateful fake provider.

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{json, Value};
use tempfile::TempDir;

use skiff::action::{handler, ActionConfig, Position};
use skiff::command::CliOutcome;
use skiff::engine::{Engine, Invocation};
use skiff::event::Event;
use skiff::hooks::HookPhase;
use skiff::plugin::{load_plugins, Plugin, PluginFactory};
use skiff::plugins::code_deploy;
use skiff::project::ProjectContext;
use skiff::provider::{Provider, ProviderFailure};
use skiff::Result;

/// An in-memory Lambda-shaped provider: functions hold a last published
/// version, aliases point at versions.
struct FakeLambda {
    calls: Mutex<Vec<String>>,
    functions: Mutex<HashMap<String, u32>>,
    aliases: Mutex<HashMap<String, String>>,
}

impl FakeLambda {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            calls: Mutex::new(Vec::new()),
            functions: Mutex::new(HashMap::new()),
            aliases: Mutex::new(HashMap::new()),
        })
    }

    fn with_function(name: &str, version: u32, alias: Option<(&str, &str)>) -> Arc<Self> {
        let fake = Self::new();
        fake.functions.lock().unwrap().insert(name.into(), version);
        if let Some((alias, target)) = alias {
            fake.aliases
                .lock()
                .unwrap()
                .insert(format!("{name}/{alias}"), target.into());
        }
        fake
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn count(&self, operation: &str) -> usize {
        self.calls().iter().filter(|op| *op == operation).count()
    }
}

fn param_str(params: &Value, key: &str) -> String {
    params[key].as_str().expect("string param").to_string()
}

#[async_trait]
impl Provider for FakeLambda {
    async fn request(
        &self,
        _service: &str,
        operation: &str,
        params: Value,
        _stage: &str,
        region: &str,
    ) -> std::result::Result<Value, ProviderFailure> {
        self.calls.lock().unwrap().push(operation.to_string());
        // Every request is a suspension point, as the real transport is.
        tokio::task::yield_now().await;

        let not_found = |message: String| ProviderFailure::NotFound {
            service: "Lambda".into(),
            operation: operation.into(),
            message,
        };

        match operation {
            "getFunction" => {
                let name = param_str(&params, "FunctionName");
                if self.functions.lock().unwrap().contains_key(&name) {
                    Ok(json!({ "Configuration": { "FunctionName": name } }))
                } else {
                    Err(not_found(format!("function {name} does not exist")))
                }
            }
            "createFunction" => {
                let name = param_str(&params, "FunctionName");
                self.functions.lock().unwrap().insert(name.clone(), 1);
                Ok(json!({ "FunctionName": name, "Version": "1" }))
            }
            "updateFunctionConfiguration" => Ok(json!({})),
            "updateFunctionCode" => {
                let name = param_str(&params, "FunctionName");
                let mut functions = self.functions.lock().unwrap();
                let version = functions.entry(name).or_insert(0);
                *version += 1;
                Ok(json!({ "Version": version.to_string() }))
            }
            "getAlias" => {
                let key = format!(
                    "{}/{}",
                    param_str(&params, "FunctionName"),
                    param_str(&params, "Name")
                );
                match self.aliases.lock().unwrap().get(&key) {
                    Some(version) => Ok(json!({ "FunctionVersion": version })),
                    None => Err(not_found(format!("alias {key} does not exist"))),
                }
            }
            "createAlias" | "updateAlias" => {
                let name = param_str(&params, "FunctionName");
                let alias = param_str(&params, "Name");
                let version = param_str(&params, "FunctionVersion");
                self.aliases
                    .lock()
                    .unwrap()
                    .insert(format!("{name}/{alias}"), version);
                Ok(json!({
                    "AliasArn": format!("arn:aws:lambda:{region}:000:function:{name}:{alias}")
                }))
            }
            other => panic!("unexpected operation {other}"),
        }
    }
}

fn deploy_options(dist: &Path) -> Value {
    json!({
        "name": "demo-hello",
        "stage": "dev",
        "region": "us-east-1",
        "dist": dist.to_str().unwrap(),
        "package": { "handler.js": "exports.handler = () => 'ok';" },
        "function": {
            "handler": "handler.handler",
            "runtime": "nodejs4.3",
            "role": "arn:aws:iam::000:role/demo",
            "memory_size": 128,
            "timeout": 6
        }
    })
}

async fn engine_with_core(provider: Arc<dyn Provider>) -> Arc<Engine> {
    let engine = Arc::new(Engine::new());
    engine.set_provider(provider);
    skiff::plugins::register_core_factories(&engine);
    load_plugins(
        &engine,
        Path::new("/tmp"),
        &[code_deploy::PLUGIN_NAME.to_string()],
    )
    .await
    .unwrap();
    engine
}

// A plugin contributing a CLI-bound action plus hooks on the deploy action.
struct GreetPlugin;

#[async_trait]
impl Plugin for GreetPlugin {
    fn name(&self) -> &str {
        "acme.Greet"
    }

    async fn register_actions(&self, engine: &Engine) -> Result<()> {
        engine.add_action(
            ActionConfig::new("greet", "Greets the given names")
                .cli("greet", "run")
                .option("stage", "s", "stage to greet from")
                .parameter("first", Position::Index(0))
                .parameter("rest", Position::Span { start: 0, end: None }),
            handler(|mut evt: Event| async move {
                let first = evt.require_str("first")?.to_string();
                evt.set_data("greeted", first);
                Ok(evt)
            }),
        )
    }

    async fn register_hooks(&self, engine: &Engine) -> Result<()> {
        engine.add_hook(
            "greet",
            HookPhase::Pre,
            "acme.Greet.before",
            handler(|mut evt: Event| async move {
                evt.set_data("before", true);
                Ok(evt)
            }),
        )?;
        engine.add_hook(
            "greet",
            HookPhase::Post,
            "acme.Greet.after",
            handler(|mut evt: Event| async move {
                // Post hooks observe what the action accumulated.
                let greeted = evt.data["greeted"].as_str().unwrap_or("").to_string();
                evt.set_data("after", format!("done:{greeted}"));
                Ok(evt)
            }),
        )
    }
}

fn greet_factory() -> PluginFactory {
    Arc::new(|_| Box::new(GreetPlugin))
}

#[tokio::test]
async fn cli_dispatch_runs_hooks_and_binds_input() {
    let engine = Arc::new(Engine::new());
    engine.add_plugin_factory("acme.Greet", greet_factory());
    load_plugins(&engine, Path::new("/tmp"), &["acme.Greet".to_string()])
        .await
        .unwrap();
    engine.set_project(ProjectContext::named("demo"));

    let raw = skiff::utils::args::parse(
        ["greet", "run", "alice", "bob", "carol", "--stage", "dev"]
            .into_iter()
            .map(String::from),
    );

    let CliOutcome::Completed(evt) = engine.command(raw).await.unwrap() else {
        panic!("expected completion");
    };
    assert_eq!(evt.options["stage"], "dev");
    assert_eq!(evt.options["first"], "alice");
    assert_eq!(evt.options["rest"], json!(["bob", "carol"]));
    assert_eq!(evt.data["before"], true);
    assert_eq!(evt.data["greeted"], "alice");
    assert_eq!(evt.data["after"], "done:alice");
    assert!(!engine.is_running());
}

#[tokio::test]
async fn single_flight_guard_held_until_first_run_settles() {
    let engine = Arc::new(Engine::new());
    let gate = Arc::new(tokio::sync::Notify::new());

    let wait_gate = gate.clone();
    engine
        .add_action(
            ActionConfig::new("slow", ""),
            handler(move |mut evt: Event| {
                let gate = wait_gate.clone();
                async move {
                    gate.notified().await;
                    evt.set_data("slow", true);
                    Ok(evt)
                }
            }),
        )
        .unwrap();
    engine
        .add_action(
            ActionConfig::new("fast", ""),
            handler(|mut evt: Event| async move {
                evt.set_data("fast", true);
                Ok(evt)
            }),
        )
        .unwrap();

    let first = {
        let engine = engine.clone();
        tokio::spawn(async move {
            engine
                .run_action("slow", Invocation::Programmatic(json!({})))
                .await
        })
    };

    // Let the first pipeline start and suspend on its remote-call stand-in.
    for _ in 0..100 {
        if engine.is_running() {
            break;
        }
        tokio::task::yield_now().await;
    }
    assert!(engine.is_running());

    // A second top-level call while the guard is held: it folds against its
    // own Event and completes without owning or clearing the guard.
    let second = engine
        .run_action("fast", Invocation::Programmatic(json!({})))
        .await
        .unwrap();
    assert_eq!(second.data["fast"], true);
    assert!(engine.is_running());

    gate.notify_one();
    let first = first.await.unwrap().unwrap();
    assert_eq!(first.data["slow"], true);
    assert!(!engine.is_running());
}

#[tokio::test]
async fn cold_start_then_idempotent_redeploy() {
    let dist = TempDir::new().unwrap();
    let fake = FakeLambda::new();
    let engine = engine_with_core(fake.clone()).await;

    let first = engine
        .run_action(
            code_deploy::ACTION_NAME,
            Invocation::Programmatic(deploy_options(dist.path())),
        )
        .await
        .unwrap();
    assert_eq!(first.data["version"], "1");
    assert_eq!(first.data["alias"], "dev");

    let second = engine
        .run_action(
            code_deploy::ACTION_NAME,
            Invocation::Programmatic(deploy_options(dist.path())),
        )
        .await
        .unwrap();

    // One resource, no duplicate creation; alias tracks the latest version.
    assert_eq!(fake.count("createFunction"), 1);
    assert_eq!(fake.functions.lock().unwrap().len(), 1);
    assert_eq!(second.data["version"], "2");
    assert_eq!(
        fake.aliases.lock().unwrap().get("demo-hello/dev"),
        Some(&"2".to_string())
    );

    // Each run owned its own Event.
    assert_eq!(first.data["version"], "1");
}

#[tokio::test]
async fn warm_update_repoints_existing_alias() {
    let dist = TempDir::new().unwrap();
    let fake = FakeLambda::with_function("demo-hello", 3, Some(("dev", "3")));
    let engine = engine_with_core(fake.clone()).await;

    let evt = engine
        .run_action(
            code_deploy::ACTION_NAME,
            Invocation::Programmatic(deploy_options(dist.path())),
        )
        .await
        .unwrap();

    assert_eq!(
        fake.calls(),
        vec![
            "getFunction",
            "updateFunctionConfiguration",
            "updateFunctionCode",
            "getAlias",
            "updateAlias"
        ]
    );
    assert_eq!(evt.data["version"], "4");
    assert_eq!(
        fake.aliases.lock().unwrap().get("demo-hello/dev"),
        Some(&"4".to_string())
    );
}

#[tokio::test]
async fn concurrent_deploy_units_do_not_share_event_state() {
    let dist_a = TempDir::new().unwrap();
    let dist_b = TempDir::new().unwrap();
    let fake = FakeLambda::new();
    let engine = engine_with_core(fake.clone()).await;

    let mut options_b = deploy_options(dist_b.path());
    options_b["name"] = json!("demo-goodbye");

    let (a, b) = tokio::join!(
        engine.run_action(
            code_deploy::ACTION_NAME,
            Invocation::Programmatic(deploy_options(dist_a.path())),
        ),
        engine.run_action(code_deploy::ACTION_NAME, Invocation::Programmatic(options_b)),
    );

    let a = a.unwrap();
    let b = b.unwrap();
    assert_eq!(a.data["function_name"], "demo-hello");
    assert_eq!(b.data["function_name"], "demo-goodbye");
    assert_eq!(fake.functions.lock().unwrap().len(), 2);
    assert!(!engine.is_running());
}
