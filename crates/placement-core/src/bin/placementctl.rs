use anyhow::{bail, Context};
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use placement_artifact::{current_parts, parse};
use placement_core::{Engine, EngineConfig, InMemoryStore, PropagationReport, TaskStore};
use placement_graph::{TaskGraph, TaskId};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

fn cli() -> Command {
    let task_arg = || {
        Arg::new("task")
            .required(true)
            .value_parser(value_parser!(String))
            .help("Task ID")
    };

    Command::new("placementctl")
        .version(placement_core::VERSION)
        .about("Inspect and drive the placement task engine")
        .subcommand_required(true)
        .arg(
            Arg::new("snapshot")
                .long("snapshot")
                .short('s')
                .global(true)
                .value_parser(value_parser!(PathBuf))
                .help("JSON snapshot of tasks, artifacts and submissions"),
        )
        .arg(
            Arg::new("config")
                .long("config")
                .short('c')
                .global(true)
                .value_parser(value_parser!(PathBuf))
                .help("Engine configuration (.toml, .yaml)"),
        )
        .arg(
            Arg::new("write")
                .long("write")
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Save changes back to the snapshot"),
        )
        .arg(
            Arg::new("log-json")
                .long("log-json")
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Emit logs as JSON"),
        )
        .subcommand(Command::new("inspect").about("List tasks and graph problems"))
        .subcommand(
            Command::new("resolve")
                .about("Show the status a task should have")
                .arg(task_arg()),
        )
        .subcommand(
            Command::new("complete")
                .about("Complete a task and propagate")
                .arg(task_arg()),
        )
        .subcommand(
            Command::new("propagate")
                .about("Re-evaluate the dependents of a completed task")
                .arg(task_arg()),
        )
        .subcommand(
            Command::new("reset")
                .about("Reopen a task and re-gate its dependents")
                .arg(task_arg()),
        )
        .subcommand(
            Command::new("synthesize")
                .about("Re-derive the submissions of a task")
                .arg(task_arg()),
        )
        .subcommand(
            Command::new("parse")
                .about("Parse artifact text into blocks")
                .arg(
                    Arg::new("file")
                        .long("file")
                        .value_parser(value_parser!(PathBuf))
                        .conflicts_with("task")
                        .help("Parse a text file"),
                )
                .arg(
                    Arg::new("task")
                        .long("task")
                        .value_parser(value_parser!(String))
                        .help("Parse the current artifacts of a task"),
                ),
        )
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let matches = cli().get_matches();
    init_tracing(matches.get_flag("log-json"));

    if let Some(("parse", args)) = matches.subcommand() {
        if let Some(path) = args.get_one::<PathBuf>("file") {
            let text = tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("reading {}", path.display()))?;
            println!("{}", serde_json::to_string_pretty(&parse(&text))?);
            return Ok(());
        }
    }

    let Some(snapshot) = matches.get_one::<PathBuf>("snapshot") else {
        bail!("--snapshot is required for this command");
    };
    let store = Arc::new(InMemoryStore::load_json(snapshot).await?);
    let config = match matches.get_one::<PathBuf>("config") {
        Some(path) => EngineConfig::load(path)?,
        None => EngineConfig::default(),
    };
    let engine = Engine::new(Arc::clone(&store), config);

    let changed = match matches.subcommand() {
        Some(("inspect", _)) => {
            inspect(&engine);
            false
        }
        Some(("resolve", args)) => {
            let id = task_id(args)?;
            let stored = store.get_task(&id).await?.map(|t| t.status);
            let resolved = engine.resolve_status(&id).await?;
            match stored {
                Some(stored) if stored != resolved => {
                    println!("{id}: {resolved} (stored: {stored})");
                }
                _ => println!("{id}: {resolved}"),
            }
            false
        }
        Some(("complete", args)) => {
            print_report(&engine.complete_task(&task_id(args)?).await?);
            true
        }
        Some(("propagate", args)) => {
            print_report(&engine.propagate(&task_id(args)?).await?);
            true
        }
        Some(("reset", args)) => {
            print_report(&engine.reset_task(&task_id(args)?).await?);
            true
        }
        Some(("synthesize", args)) => {
            let report = engine.synthesize_submissions(&task_id(args)?).await?;
            for warning in &report.warnings {
                eprintln!("warning: {warning}");
            }
            println!("{}", serde_json::to_string_pretty(&report.submissions)?);
            true
        }
        Some(("parse", args)) => {
            let Some(id) = args.get_one::<String>("task") else {
                bail!("parse needs --file or --task");
            };
            let current = current_parts(store.list_artifacts(&TaskId::from(id.as_str())).await?);
            for issue in &current.issues {
                eprintln!("warning: {issue}");
            }
            let parsed: Vec<_> = current
                .parts
                .iter()
                .map(|part| (part.id.as_str(), parse(&part.content)))
                .collect();
            println!("{}", serde_json::to_string_pretty(&parsed)?);
            false
        }
        _ => unreachable!("subcommand_required"),
    };

    if changed && matches.get_flag("write") {
        store.save_json(snapshot).await?;
        tracing::info!(path = %snapshot.display(), "snapshot written");
    }
    Ok(())
}

fn task_id(args: &ArgMatches) -> anyhow::Result<TaskId> {
    args.get_one::<String>("task")
        .map(|id| TaskId::from(id.as_str()))
        .context("task ID is required")
}

fn inspect(engine: &Engine<InMemoryStore>) {
    let snapshot = engine.store().snapshot();
    let graph = TaskGraph::build(&snapshot.tasks);

    let mut tasks = snapshot.tasks.clone();
    tasks.sort_by(|a, b| {
        (&a.company_id, a.sort_order, &a.id).cmp(&(&b.company_id, b.sort_order, &b.id))
    });
    for task in &tasks {
        let deps: Vec<&str> = task.dependencies.iter().map(TaskId::as_str).collect();
        println!(
            "{:<10} {:<24} {:<16} {:<9} [{}]",
            task.company_id.as_str(),
            task.id.as_str(),
            task.status.as_str(),
            engine.derive_interface_type(task).as_str(),
            deps.join(", ")
        );
    }

    for task in &tasks {
        for missing in graph.missing_dependencies(&task.id) {
            println!("problem: {} depends on unknown task {missing}", task.id);
        }
        if let Some(cycle) = graph.cycle_of(&task.id) {
            if cycle.first() == Some(&task.id) {
                println!("problem: dependency cycle {cycle:?}");
            }
        }
    }
}

fn print_report(report: &PropagationReport) {
    for change in &report.updated {
        println!("{}: {} -> {}", change.task_id, change.from, change.to);
    }
    for id in &report.synthesized {
        println!("{id}: submissions derived");
    }
    for failure in &report.warnings {
        eprintln!("warning: {failure}");
    }
    for failure in &report.errors {
        eprintln!("error: {failure}");
    }
    if report.updated.is_empty() {
        println!("no status changes");
    }
}
