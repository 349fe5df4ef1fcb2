//! lsdom CLI - render templates against JSON data

use std::cell::RefCell;
use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use anyhow::{bail, Context};
use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use serde::Deserialize;
use serde_json::Value;
use tracing_subscriber::EnvFilter;

use lsdom::error::{FixSuggestion, LsdomError};
use lsdom::{Engine, EngineConfig, MemoryTree, Model, NodeId, View};

#[derive(Parser)]
#[command(name = "lsdom")]
#[command(about = "lsdom - reactive template binding")]
#[command(version)]
struct Cli {
    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Mount a template and print the rendered markup
    Render {
        #[command(flatten)]
        mount: MountArgs,
    },

    /// Mount a template, then replay a JSON script of mutations and events
    Run {
        #[command(flatten)]
        mount: MountArgs,

        /// JSON array of steps ({"op": "set", "path": "a", "value": 1}, ...)
        #[arg(short, long)]
        script: PathBuf,
    },

    /// Compile every directive and print its dependency keys
    Check {
        /// Template markup file
        template: PathBuf,

        /// Engine configuration (TOML)
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

#[derive(Args)]
struct MountArgs {
    /// Template markup file
    template: PathBuf,

    /// Initial data (JSON); defaults to an empty object
    #[arg(short, long)]
    data: Option<PathBuf>,

    /// Engine configuration (TOML)
    #[arg(short, long)]
    config: Option<PathBuf>,
}

/// One scripted step
#[derive(Debug, Deserialize)]
#[serde(tag = "op", rename_all = "lowercase")]
enum Step {
    Set {
        path: String,
        value: Value,
    },
    Push {
        path: String,
        value: Value,
    },
    Insert {
        path: String,
        index: usize,
        items: Vec<Value>,
    },
    Remove {
        path: String,
        index: usize,
        #[serde(default = "one")]
        count: usize,
    },
    /// Type `value` into the element with this id
    Input {
        id: String,
        value: String,
    },
    /// Fire `click` on the element with this id
    Click {
        id: String,
        #[serde(default)]
        payload: Value,
    },
}

fn one() -> usize {
    1
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let result = match cli.command {
        Commands::Render { mount } => render(&mount),
        Commands::Run { mount, script } => run(&mount, &script),
        Commands::Check { template, config } => check(&template, config.as_deref()),
    };

    if let Err(e) = result {
        eprintln!("{} {:#}", "Error:".red().bold(), e);
        if let Some(suggestion) = e.downcast_ref::<LsdomError>().and_then(|e| e.fix_suggestion()) {
            eprintln!("  {} {}", "Fix:".yellow(), suggestion);
        }
        std::process::exit(1);
    }
}

fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(path: Option<&Path>) -> anyhow::Result<EngineConfig> {
    let config = match path {
        Some(path) => EngineConfig::load(path)?,
        None => EngineConfig::default(),
    };
    Ok(config.with_env())
}

fn read_template(path: &Path) -> anyhow::Result<String> {
    fs::read_to_string(path).with_context(|| format!("reading template '{}'", path.display()))
}

fn mount(args: &MountArgs) -> anyhow::Result<(Engine<MemoryTree>, View<NodeId>)> {
    let config = load_config(args.config.as_deref())?;
    let data = match &args.data {
        Some(path) => {
            let raw = fs::read_to_string(path).with_context(|| format!("reading data '{}'", path.display()))?;
            serde_json::from_str::<Value>(&raw).map_err(LsdomError::from)?
        }
        None => Value::Object(Default::default()),
    };
    let template = read_template(&args.template)?;

    let engine = Engine::new(Rc::new(RefCell::new(MemoryTree::new())), Model::new(data), config);
    let view = engine.mount_markup(&template)?;
    Ok((engine, view))
}

fn render(args: &MountArgs) -> anyhow::Result<()> {
    let (engine, view) = mount(args)?;
    println!("{}", engine.render(&view));
    Ok(())
}

fn run(args: &MountArgs, script: &Path) -> anyhow::Result<()> {
    let raw = fs::read_to_string(script).with_context(|| format!("reading script '{}'", script.display()))?;
    let steps: Vec<Step> = serde_json::from_str(&raw)
        .map_err(LsdomError::from)
        .with_context(|| format!("parsing script '{}'", script.display()))?;

    let (engine, view) = mount(args)?;
    println!("{}", engine.render(&view));

    for (i, step) in steps.iter().enumerate() {
        tracing::debug!(step = i + 1, ?step, "apply step");
        apply(&engine, &view, step).with_context(|| format!("step {}", i + 1))?;
        println!("{} {}", format!("[{}]", i + 1).dimmed(), describe(step).cyan());
        println!("{}", engine.render(&view));
    }
    Ok(())
}

fn apply(engine: &Engine<MemoryTree>, view: &View<NodeId>, step: &Step) -> anyhow::Result<()> {
    let model = engine.model();
    match step {
        Step::Set { path, value } => model.set(path, value.clone())?,
        Step::Push { path, value } => model.push(path, value.clone())?,
        Step::Insert { path, index, items } => model.insert(path, *index, items.clone())?,
        Step::Remove { path, index, count } => {
            model.remove(path, *index, *count)?;
        }
        Step::Input { id, value } => {
            let node = find(engine, view, id)?;
            MemoryTree::input(engine.tree(), node, value);
        }
        Step::Click { id, payload } => {
            let node = find(engine, view, id)?;
            if MemoryTree::dispatch_event(engine.tree(), node, "click", payload) == 0 {
                tracing::warn!(%id, "click had no handler");
            }
        }
    }
    Ok(())
}

fn find(engine: &Engine<MemoryTree>, view: &View<NodeId>, id: &str) -> anyhow::Result<NodeId> {
    match engine.tree().borrow().element_by_id(*view.root(), id) {
        Some(node) => Ok(node),
        None => bail!("no element with id '{id}'"),
    }
}

fn describe(step: &Step) -> String {
    match step {
        Step::Set { path, value } => format!("set {path} = {value}"),
        Step::Push { path, value } => format!("push {path} <- {value}"),
        Step::Insert { path, index, items } => format!("insert {path}[{index}] <- {} item(s)", items.len()),
        Step::Remove { path, index, count } => format!("remove {path}[{index}..{}]", index + count),
        Step::Input { id, value } => format!("input #{id} = {value:?}"),
        Step::Click { id, .. } => format!("click #{id}"),
    }
}

fn check(template: &Path, config: Option<&Path>) -> anyhow::Result<()> {
    let config = load_config(config)?;
    let source = read_template(template)?;
    let engine = Engine::new(Rc::new(RefCell::new(MemoryTree::new())), Model::default(), config);
    let directives = engine.check_markup(&source)?;

    println!("{} Template '{}' is valid", "✓".green(), template.display());
    println!("  Directives: {}", directives.len());
    for d in &directives {
        let keys = if d.keys.is_empty() {
            "(static)".dimmed().to_string()
        } else {
            d.keys.join(", ")
        };
        println!("  <{}> {}=\"{}\" -> {}", d.location, d.name, d.source, keys);
    }
    Ok(())
}
