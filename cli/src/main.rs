mod capacity;
mod position;
mod run;

use clap::{Parser, Subcommand};
use enum_dispatch::enum_dispatch;

use crate::capacity::CapacityCmd;
use crate::position::PositionCmd;
use crate::run::RunCmd;

#[derive(Parser)]
#[command(author, version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[enum_dispatch]
trait Run {
    async fn run(self) -> anyhow::Result<()>;
}

#[derive(Subcommand)]
#[enum_dispatch(Run)]
enum Commands {
    /// Run the full lending cycle against a market
    Cycle(RunCmd),
    /// Query an account's position in a market
    Position(PositionCmd),
    /// Derive borrow capacity from the oracle without transacting
    Capacity(CapacityCmd),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = simple_logger::init_with_level(log::Level::Info);
    let args = Cli::parse();
    args.command.run().await
}
