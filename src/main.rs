use clap::Parser;

use cardbook::cli::{self, cards::NewCard, CardsCommands, Cli, Commands, PayeesCommands};
use cardbook::logging;
use cardbook::settings::load_settings;

fn main() {
    let cli = Cli::parse();
    let command = cli.command.unwrap_or(Commands::Manage);

    if !matches!(command, Commands::Manage) {
        logging::init_stderr(&load_settings());
    }

    let result = match command {
        Commands::Init { data_dir } => cli::init::run(data_dir),
        Commands::Cards { command } => match command {
            CardsCommands::List { filter } => cli::cards::list(filter.as_deref()),
            CardsCommands::Add {
                account,
                processor,
                closing_day,
                due_day,
                limit,
                stage,
                set,
                link_schedule,
            } => cli::cards::add(&NewCard {
                account: account.as_deref(),
                processor: processor.as_deref(),
                closing_day,
                due_day,
                limit,
                stage: stage.as_deref(),
                set: &set,
                link_schedule: link_schedule.as_deref(),
            }),
            CardsCommands::Delete { ids } => cli::cards::delete(&ids),
        },
        Commands::Payees { command } => match command {
            PayeesCommands::Add { name } => cli::payees::add(&name),
            PayeesCommands::List => cli::payees::list(),
        },
        Commands::Manage => cli::card_manager::run(),
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
