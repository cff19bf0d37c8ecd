//! Position query command.

use std::io::{Write, stdout};

use clap::Args;
use lendcycle::{Address, evm, morpho};

/// Queries an account's position in a Morpho Blue market.
///
/// # Example
///
/// ```bash
/// lendcycle position \
///   --contract 0xC263190b99ceb7e2b7409059D24CB573e3bB9021 \
///   --user 0x1234567890abcdef1234567890abcdef12345678 \
///   --market 0xabcd...1234
/// ```
#[derive(Args)]
pub struct PositionCmd {
    /// Morpho's contract address.
    #[arg(short, long)]
    contract: Address,
    /// RPC endpoint URL.
    #[arg(short, long, default_value = evm::DEFAULT_RPC_URL)]
    rpc_url: String,
    /// Morpho market id to query.
    #[arg(short, long)]
    market: morpho::MarketId,
    /// Target user address.
    #[arg(short, long)]
    user: Address,
}

impl crate::Run for PositionCmd {
    async fn run(self) -> anyhow::Result<()> {
        let provider = evm::connect(&self.rpc_url).await?;
        let client = morpho::Client::new(provider);
        let position = client.position(self.contract, self.market, self.user).await?;

        let mut writer = tabwriter::TabWriter::new(stdout());

        writeln!(&mut writer, "borrow shares\tcollateral\tsupply shares")?;
        writeln!(
            &mut writer,
            "{}\t{}\t{}",
            position.borrowShares, position.collateral, position.supplyShares
        )?;

        writer.flush()?;

        Ok(())
    }
}
