pub mod commands;

use clap::{Parser, Subcommand};
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(
    name = "refbot",
    about = "refbot operator CLI",
    long_about = "Dry-run message classification, inspect effective configuration, and check readiness without touching Slack, GitHub or Jira.",
    after_help = "Examples:\n  refbot classify \"see PR 2048\"\n  refbot config\n  refbot doctor --json"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Classify a chat line and print the recognised command as JSON")]
    Classify {
        #[arg(help = "Message text, exactly as it would appear in the channel")]
        text: String,
        #[arg(long, default_value = "DS", help = "Issue tracker project key")]
        project_key: String,
        #[arg(long, help = "Bot user id, enables direct-mention recognition")]
        bot_user_id: Option<String>,
        #[arg(long, default_value = "C0000000000", help = "Channel id echoed in the payload")]
        channel: String,
    },
    #[command(
        about = "Inspect effective configuration values with source attribution and redaction"
    )]
    Config,
    #[command(about = "Validate config, Slack token format, GitHub credentials and tracker URL")]
    Doctor {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Classify { text, project_key, bot_user_id, channel } => {
            commands::classify::run(&text, &project_key, bot_user_id, &channel)
        }
        Command::Config => {
            commands::CommandResult { exit_code: 0, output: commands::config::run() }
        }
        Command::Doctor { json } => commands::doctor::run(json),
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
