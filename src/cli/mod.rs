pub mod card_manager;
pub mod cards;
pub mod init;
pub mod payees;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "cardbook", about = "Manage credit cards attached to bookkeeping accounts.")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Set up Cardbook: choose a data directory and initialize the database.
    Init {
        /// Path for Cardbook data (default: ~/Documents/cardbook)
        #[arg(long = "data-dir")]
        data_dir: Option<String>,
    },
    /// Work with credit cards from the command line.
    Cards {
        #[command(subcommand)]
        command: CardsCommands,
    },
    /// Maintain payees shown in schedule actions.
    Payees {
        #[command(subcommand)]
        command: PayeesCommands,
    },
    /// Open the interactive credit card manager (default).
    Manage,
}

#[derive(Subcommand)]
pub enum CardsCommands {
    /// List credit cards.
    List {
        /// Only show cards whose id contains this text (case-insensitive)
        #[arg(long)]
        filter: Option<String>,
    },
    /// Add a credit card, or update the one already attached to --account.
    Add {
        /// Account id to attach the card to
        #[arg(long)]
        account: Option<String>,
        /// Card processor name, e.g. 'Visa'
        #[arg(long)]
        processor: Option<String>,
        /// Statement closing day of month
        #[arg(long = "closing-day", value_parser = clap::value_parser!(u8).range(1..=31))]
        closing_day: Option<u8>,
        /// Payment due day of month
        #[arg(long = "due-day", value_parser = clap::value_parser!(u8).range(1..=31))]
        due_day: Option<u8>,
        /// Credit limit in dollars
        #[arg(long)]
        limit: Option<f64>,
        /// Workflow stage label
        #[arg(long)]
        stage: Option<String>,
        /// Display action FIELD=VALUE (VALUE is JSON or plain text); repeatable
        #[arg(long = "set")]
        set: Vec<String>,
        /// Link a schedule: PAYEE_ID@YYYY-MM-DD
        #[arg(long = "link-schedule")]
        link_schedule: Option<String>,
    },
    /// Delete credit cards by id.
    Delete {
        /// Card ids (shown in `cardbook cards list`)
        #[arg(required = true)]
        ids: Vec<String>,
    },
}

#[derive(Subcommand)]
pub enum PayeesCommands {
    /// Add a payee.
    Add {
        name: String,
    },
    /// List payees.
    List,
}
