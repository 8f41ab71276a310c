//! Subcommand dispatch and execution.
//!
//! The [`dispatch`] function routes the parsed CLI to the appropriate
//! subcommand handler: [`run`], [`validate`], or [`health`]. Each handler
//! lives in its own submodule.

pub mod health;
pub mod run;
pub mod validate;

use crate::cli::{Cli, Commands};
use crate::error::BridgeError;

pub async fn dispatch(cli: Cli) -> Result<(), BridgeError> {
    match cli.command {
        Some(Commands::Run(args)) => run::execute(*args).await,
        Some(Commands::Validate(ref args)) => validate::execute(args),
        Some(Commands::Health(args)) => health::execute(args).await,
        None => {
            print_welcome();
            Ok(())
        }
    }
}

fn print_welcome() {
    let version = env!("CARGO_PKG_VERSION");
    println!(
        "\n  matchbridge v{version} - allow-list filtering bridge for Kafka\n\n  \
         No command provided. To get started:\n\n    \
         matchbridge validate bridge.yaml   Check a config file\n    \
         matchbridge run                    Start the bridge (auto-detects ./matchbridge.yaml)\n    \
         matchbridge run -c bridge.yaml     Start with a specific config file\n    \
         matchbridge --help                 See all commands and options\n"
    );
}
