use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use flowdag::compiler::core::Compiler;
use flowdag::compiler::loader::load_workflow_from_yaml;
use flowdag::runtime::config::ExecutorConfig;
use flowdag::runtime::event::EventType;
use flowdag::runtime::executor::Executor;
use flowdag::runtime::registry::Registry;
use flowdag::runtime::scope::BindingPolicy;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a workflow file with the built-in tools
    Run {
        /// Path to the workflow YAML file
        #[arg(long, short)]
        file: PathBuf,

        /// Caller inputs (key=value), addressable as {{inputs.key}}
        #[arg(long, short = 'D', value_parser = parse_key_val)]
        vars: Vec<(String, serde_json::Value)>,

        /// Executor config YAML
        #[arg(long, short)]
        config: Option<PathBuf>,

        /// Resolve unknown bindings to null instead of failing
        #[arg(long)]
        lenient: bool,

        /// Print node lifecycle events as well as outputs
        #[arg(long, short)]
        verbose: bool,
    },

    /// Compile a workflow file and report definition errors
    Check {
        /// Path to the workflow YAML file
        #[arg(long, short)]
        file: PathBuf,
    },
}

fn parse_key_val(s: &str) -> Result<(String, serde_json::Value), String> {
    let pos = s.find('=').ok_or_else(|| format!("invalid KEY=value: no `=` found in `{}`", s))?;
    let key = s[..pos].to_string();
    let val_str = &s[pos + 1..];
    // JSON when it parses, plain string otherwise
    let val = serde_json::from_str(val_str).unwrap_or_else(|_| serde_json::Value::String(val_str.to_string()));
    Ok((key, val))
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Check { file } => {
            let workflow = load_workflow_from_yaml(&file)?;
            let blueprint = Compiler::new().compile(&workflow)?;
            println!(
                "{}: {} nodes, {} edges, ok",
                blueprint.id,
                blueprint.len(),
                blueprint.graph.edge_count()
            );
        }

        Commands::Run {
            file,
            vars,
            config,
            lenient,
            verbose,
        } => {
            let workflow = load_workflow_from_yaml(&file)?;
            info!(workflow_id = %workflow.id, "workflow loaded");

            let mut config = match config {
                Some(path) => ExecutorConfig::load(path)?,
                None => ExecutorConfig::default(),
            };
            if lenient {
                config = config.with_binding_policy(BindingPolicy::Lenient);
            }

            let registry = Arc::new(Registry::with_builtin_tools());
            let executor = Executor::new(&workflow, registry)?.with_config(config);

            let inputs: HashMap<_, _> = vars.into_iter().collect();
            let mut run = executor.spawn(inputs);

            while let Some(event) = run.events().recv().await {
                match event.kind {
                    EventType::Chunk => {
                        if let Some(text) = event.data.as_str() {
                            print!("{}", text);
                        }
                    }
                    EventType::Output => println!("{} = {}", event.name, event.data),
                    EventType::End => {}
                    _ if verbose => println!("[{}] {} {}", serde_json::to_string(&event.kind)?, event.name, event.data),
                    _ => {}
                }
            }

            let result = run.wait().await?;
            println!("{}", serde_json::to_string_pretty(&result.outputs)?);
            info!(run_id = %result.run_id, "workflow finished");
        }
    }

    Ok(())
}
