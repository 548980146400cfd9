use std::path::PathBuf;
use std::sync::Arc;

use skiff::command::{CliOutcome, HelpTopic};
use skiff::output;
use skiff::plugin::load_plugins;
use skiff::plugins::{register_core_factories, CORE_PLUGINS};
use skiff::project::ProjectContext;
use skiff::{ActionConfig, Engine};

#[tokio::main(flavor = "current_thread")]
async fn main() -> std::process::ExitCode {
    let raw = skiff::utils::args::parse(std::env::args().skip(1));
    let exit_code = run(raw).await;
    std::process::ExitCode::from(exit_code_to_u8(exit_code))
}

async fn run(raw: skiff::command::RawArgs) -> i32 {
    let engine = Arc::new(Engine::new());
    register_core_factories(&engine);

    let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    let project_plugins = match ProjectContext::load(&cwd) {
        Ok(Some(project)) => {
            let plugins = project.plugins.clone();
            engine.set_project(project);
            plugins
        }
        Ok(None) => Vec::new(),
        Err(err) => return output::print_result::<()>(Err(err)),
    };

    // Framework defaults first, then project plugins, mirroring the order
    // registries are populated before any command executes.
    let mut descriptors: Vec<String> = CORE_PLUGINS.iter().map(|s| s.to_string()).collect();
    descriptors.extend(project_plugins);
    if let Err(err) = load_plugins(&engine, &cwd, &descriptors).await {
        return output::print_result::<()>(Err(err));
    }

    match engine.command(raw).await {
        Ok(CliOutcome::Version(version)) => {
            println!("{version}");
            0
        }
        Ok(CliOutcome::Help(topic)) => {
            print!("{}", render_help(&topic));
            0
        }
        Ok(CliOutcome::Completed(evt)) => output::print_result(Ok(evt.data)),
        Err(err) => output::print_result::<()>(Err(err)),
    }
}

fn render_help(topic: &HelpTopic) -> String {
    let mut out = String::new();
    match topic {
        HelpTopic::Global(table) => {
            out.push_str("Usage: skiff <context> <action> [params] [flags]\n\n");
            for (context, actions) in table {
                out.push_str(&format!("{context}\n"));
                for (name, config) in actions {
                    out.push_str(&format!("  {name:<14} {}\n", first_line(&config.description)));
                }
            }
        }
        HelpTopic::Context { context, actions } => {
            out.push_str(&format!("Actions for '{context}':\n"));
            for (name, config) in actions {
                out.push_str(&format!("  {name:<14} {}\n", first_line(&config.description)));
            }
        }
        HelpTopic::Action(config) => out.push_str(&render_action_help(config)),
    }
    out
}

fn render_action_help(config: &ActionConfig) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "{} {}\n{}\n",
        config.context.as_deref().unwrap_or(""),
        config.context_action.as_deref().unwrap_or(""),
        config.description
    ));
    if !config.options.is_empty() {
        out.push_str("\nOptions:\n");
        for opt in &config.options {
            out.push_str(&format!(
                "  --{} / -{:<4} {}\n",
                opt.option, opt.shortcut, opt.description
            ));
        }
    }
    out
}

fn first_line(text: &str) -> &str {
    text.lines().next().unwrap_or("")
}

fn exit_code_to_u8(code: i32) -> u8 {
    if code <= 0 {
        0
    } else if code >= 255 {
        255
    } else {
        code as u8
    }
}
