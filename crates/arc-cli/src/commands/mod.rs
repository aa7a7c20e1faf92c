//! Command dispatch: bridges CLI args -> engine calls -> output formatting.

pub mod config_cmd;
pub mod login;
pub mod port;
pub mod reconcile;
pub mod show;
pub mod util;

use crate::cli::{Command, GlobalOpts};
use crate::error::CliError;

/// Dispatch a switch-bound command to the appropriate handler.
pub async fn dispatch(cmd: Command, global: &GlobalOpts) -> Result<(), CliError> {
    match cmd {
        Command::Login(args) => login::handle(args, global).await,
        Command::Plan(args) => reconcile::plan(args, global).await,
        Command::Apply(args) => reconcile::apply(args, global).await,
        Command::Show(args) => show::handle(args, global).await,
        Command::Port(args) => port::handle(args, global).await,
        Command::Config(args) => config_cmd::handle(args, global),
        Command::Completions(_) => Err(CliError::Validation {
            field: "command".into(),
            reason: "completions are generated before dispatch".into(),
        }),
    }
}
