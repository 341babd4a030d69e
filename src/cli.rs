//! Command-line interface definitions

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(
    name = "tallydeck",
    version,
    about = "Bounded counters organized into collections"
)]
pub struct Cli {
    /// Override the data directory (default: the platform data dir)
    #[arg(long, global = true, value_name = "DIR")]
    pub data_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Show all collections and the active collection's counters
    List,
    /// Add a counter to the active collection
    Add {
        label: String,
        /// Optional upper bound (positive integer)
        #[arg(long)]
        max: Option<String>,
        /// Starting value, also restored by reset
        #[arg(long = "default", value_name = "VALUE")]
        default_value: Option<String>,
    },
    /// Remove a counter from the active collection
    Remove { label: String },
    /// Increment a counter
    Inc { label: String },
    /// Decrement a counter
    Dec { label: String },
    /// Reset a counter to its starting value
    Reset { label: String },
    /// Reset every counter in the active collection
    ResetAll,
    /// Manage collections
    #[command(subcommand)]
    Collection(CollectionCommand),
}

#[derive(Debug, Subcommand)]
pub enum CollectionCommand {
    /// Create a collection, optionally duplicating an existing one
    New {
        name: String,
        /// Copy the counters of this collection (by name)
        #[arg(long)]
        from: Option<String>,
    },
    /// Delete a collection (the last one cannot be deleted)
    Delete {
        name: String,
        /// Skip the confirmation prompt
        #[arg(long)]
        yes: bool,
    },
    /// Rename a collection
    Rename { name: String, new_name: String },
    /// Make a collection the active one
    Switch { name: String },
}
