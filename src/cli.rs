// src/cli.rs
// =============================================================================
// This file defines our command-line interface using the `clap` crate.
//
// bookmark-guardian [global flags] <command>
//
//   status    what's in the bookmarks file, is there a backup
//   backup    take a snapshot (optionally also export it to a file)
//   check     probe every bookmark, remove the dead ones
//   restore   put the bookmarks back the way a snapshot has them
//
// Global flags point at the files we work on; anything not given on the
// command line comes from the config file, then from built-in defaults.
// =============================================================================

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(
    name = "bookmark-guardian",
    version,
    about = "Find and remove dead bookmarks, with a backup you can restore",
    long_about = "bookmark-guardian probes every bookmark in a bookmarks file, removes the ones \
                  that no longer answer, and keeps a snapshot of the whole tree so any check \
                  can be undone with `restore`."
)]
pub struct Cli {
    /// JSON config file (batch size, delays, timeouts, ...)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Bookmarks file to check (overrides the config file)
    #[arg(long, global = true)]
    pub bookmarks: Option<PathBuf>,

    /// Where the latest backup is kept (overrides the config file)
    #[arg(long, global = true)]
    pub state: Option<PathBuf>,

    /// Write log lines as JSON
    #[arg(long, global = true)]
    pub log_json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Show bookmark count and backup state
    Status {
        /// Print the status as JSON
        #[arg(long)]
        json: bool,
    },

    /// Take a backup of the bookmark tree
    ///
    /// Example: bookmark-guardian backup --output my-bookmarks.json
    Backup {
        /// Also write the backup to this file
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// Check every bookmark and remove the dead ones
    ///
    /// Press Ctrl-C to stop after the current batch.
    Check {
        /// Bookmarks probed at the same time
        #[arg(long)]
        batch_size: Option<usize>,

        /// Pause between batches, in milliseconds
        #[arg(long)]
        delay_ms: Option<u64>,

        /// Report dead bookmarks but keep them
        #[arg(long)]
        report_only: bool,

        /// Print one JSON event per line instead of progress text
        #[arg(long)]
        json: bool,
    },

    /// Restore the bookmark tree from a backup
    ///
    /// This replaces everything in the bookmarks file.
    Restore {
        /// Restore from this exported backup instead of the stored one
        #[arg(long)]
        from: Option<PathBuf>,

        /// Really do it
        #[arg(long)]
        yes: bool,
    },
}
