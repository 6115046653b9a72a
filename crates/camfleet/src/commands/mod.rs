//! Command dispatch: bridges CLI args -> engine calls -> output formatting.

pub mod batch;
pub mod config_cmd;
pub mod devices;

use crate::cli::{Command, GlobalOpts};
use crate::error::CliError;

/// Dispatch an inventory-bound command to its handler.
pub async fn dispatch(cmd: Command, global: &GlobalOpts) -> Result<(), CliError> {
    match cmd {
        Command::Devices(args) => devices::handle(args, global).await,
        Command::Apply(args) => batch::apply(args, global).await,
        Command::Validate(args) => batch::validate(args, global).await,
        Command::Config(args) => config_cmd::handle(args, global),
        Command::Completions(args) => {
            use clap::CommandFactory;

            let mut cmd = crate::cli::Cli::command();
            clap_complete::generate(args.shell, &mut cmd, "camfleet", &mut std::io::stdout());
            Ok(())
        }
    }
}
