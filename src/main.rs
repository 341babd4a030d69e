#![forbid(unsafe_code)]

mod cli;
mod collection;
mod constants;
mod counter;
mod identity;
mod migrate;
mod settings;
mod storage;
mod store;

use std::io::{self, BufRead, Write};

use anyhow::Result;
use clap::Parser;
use tracing::{debug, Level as TraceLevel};
use tracing_subscriber::FmtSubscriber;

use cli::{Cli, Command, CollectionCommand};
use counter::{Counter, CounterOp};
use identity::{SystemClock, UuidSource};
use storage::{FileStore, PersistenceGateway};
use store::TrackerStore;

fn main() -> Result<()> {
    // Parse log level from environment variable
    let log_level = match std::env::var("LOG_LEVEL")
        .unwrap_or_else(|_| "warn".to_string())
        .to_lowercase()
        .as_str()
    {
        "trace" => TraceLevel::TRACE,
        "debug" => TraceLevel::DEBUG,
        "info" => TraceLevel::INFO,
        "error" => TraceLevel::ERROR,
        _ => TraceLevel::WARN,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    let cli = Cli::parse();

    let file_store = match cli.data_dir {
        Some(dir) => FileStore::with_root(dir),
        None => FileStore::open_default(),
    };
    let gateway = PersistenceGateway::new(Box::new(file_store));
    let mut store = TrackerStore::open(gateway, Box::new(UuidSource), Box::new(SystemClock));
    store.set_switch_listener(Box::new(|| {
        debug!("active collection changed, dropping transient input state");
    }));

    run_command(&mut store, cli.command);

    // Persistence problems are a warning, never a failed command: the
    // mutation has already been applied in memory.
    if let Some(warning) = store.take_save_warning() {
        eprintln!("warning: {warning}");
    }

    Ok(())
}

fn run_command(store: &mut TrackerStore, command: Command) {
    match command {
        Command::List => print_state(store),
        Command::Add {
            label,
            max,
            default_value,
        } => {
            if label.trim().is_empty() {
                eprintln!("counter label must not be empty");
                return;
            }
            store.add_counter(&label, max.as_deref(), default_value.as_deref());
        }
        Command::Remove { label } => {
            if let Some(id) = resolve_counter(store, &label) {
                store.remove_counter(&id);
            }
        }
        Command::Inc { label } => update_counter(store, &label, CounterOp::Increment),
        Command::Dec { label } => update_counter(store, &label, CounterOp::Decrement),
        Command::Reset { label } => update_counter(store, &label, CounterOp::Reset),
        Command::ResetAll => store.reset_all(),
        Command::Collection(command) => run_collection_command(store, command),
    }
}

fn run_collection_command(store: &mut TrackerStore, command: CollectionCommand) {
    match command {
        CollectionCommand::New { name, from } => {
            if name.trim().is_empty() {
                eprintln!("collection name must not be empty");
                return;
            }
            let source = match from {
                Some(from_name) => match resolve_collection(store, &from_name) {
                    Some(id) => Some(id),
                    None => return,
                },
                None => None,
            };
            store.create_collection(&name, source.as_deref());
        }
        CollectionCommand::Delete { name, yes } => {
            let Some(id) = resolve_collection(store, &name) else {
                return;
            };
            if store.collections().len() == 1 {
                eprintln!("cannot delete the last remaining collection");
                return;
            }
            // Deletion is destructive: the store expects its caller to have
            // confirmed before invoking it
            if !yes && !confirm(&format!("delete collection '{name}'?")) {
                println!("aborted");
                return;
            }
            store.delete_collection(&id);
        }
        CollectionCommand::Rename { name, new_name } => {
            if new_name.trim().is_empty() {
                eprintln!("collection name must not be empty");
                return;
            }
            if let Some(id) = resolve_collection(store, &name) {
                store.rename_collection(&id, &new_name);
            }
        }
        CollectionCommand::Switch { name } => {
            if let Some(id) = resolve_collection(store, &name) {
                store.switch_active_collection(&id);
            }
        }
    }
}

fn update_counter(store: &mut TrackerStore, label: &str, op: CounterOp) {
    let Some(id) = resolve_counter(store, label) else {
        return;
    };
    store.update_counter_value(&id, op);
    if let Some(counter) = store.active_counters().iter().find(|c| c.id == id) {
        println!("{}", render_counter(counter));
    }
}

/// Counters are addressed by label on the command line; the store API is
/// id-based. Ambiguous labels are refused rather than guessed.
fn resolve_counter(store: &TrackerStore, label: &str) -> Option<String> {
    let matches: Vec<&Counter> = store
        .active_counters()
        .iter()
        .filter(|c| c.label == label)
        .collect();
    match matches.as_slice() {
        [] => {
            eprintln!("no counter labeled '{label}' in the active collection");
            None
        }
        [only] => Some(only.id.clone()),
        many => {
            eprintln!(
                "label '{label}' is ambiguous, {} counters share it",
                many.len()
            );
            None
        }
    }
}

fn resolve_collection(store: &TrackerStore, name: &str) -> Option<String> {
    let matches: Vec<String> = store
        .collections()
        .iter()
        .filter(|c| c.name == name)
        .map(|c| c.id.clone())
        .collect();
    match matches.as_slice() {
        [] => {
            eprintln!("no collection named '{name}'");
            None
        }
        [only] => Some(only.clone()),
        many => {
            eprintln!("name '{name}' is ambiguous, {} collections share it", many.len());
            None
        }
    }
}

fn print_state(store: &TrackerStore) {
    for collection in store.collections() {
        let marker = if collection.id == store.active_collection_id() {
            "*"
        } else {
            " "
        };
        println!(
            "{marker} {} ({} counters)",
            collection.name,
            collection.counters.len()
        );
    }

    let active = store.active_collection();
    if active.counters.is_empty() {
        println!("\n{}: no counters yet", active.name);
    } else {
        println!("\n{}:", active.name);
        for counter in &active.counters {
            println!("  {}", render_counter(counter));
        }
    }
}

fn render_counter(counter: &Counter) -> String {
    match counter.max_value {
        Some(max) => format!("{}: {}/{}", counter.label, counter.value, max),
        None => format!("{}: {}", counter.label, counter.value),
    }
}

fn confirm(prompt: &str) -> bool {
    print!("{prompt} [y/N] ");
    let _ = io::stdout().flush();
    let mut answer = String::new();
    if io::stdin().lock().read_line(&mut answer).is_err() {
        return false;
    }
    matches!(answer.trim().to_lowercase().as_str(), "y" | "yes")
}
