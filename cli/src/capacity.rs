//! Read-only capacity derivation.

use std::io::{Write, stdout};

use clap::Args;
use lendcycle::{
    Address, Decimal,
    evm::{self, from_wei, to_wei},
    morpho, risk,
};

/// Derives the borrowing ceiling a collateral quantity supports, straight
/// from the oracle, without sending a single transaction.
#[derive(Args)]
pub struct CapacityCmd {
    /// RPC endpoint URL.
    #[arg(short, long, default_value = evm::DEFAULT_RPC_URL)]
    rpc_url: String,
    /// Price oracle address.
    #[arg(short, long)]
    oracle: Address,
    /// Collateral quantity (whole tokens).
    #[arg(short, long)]
    collateral: Decimal,
    /// Liquidation loan-to-value, as a fraction.
    #[arg(short, long, default_value = "0.86")]
    lltv: Decimal,
    /// Safety margin, as a fraction.
    #[arg(short, long, default_value = "0.05")]
    margin: Decimal,
    /// Borrow amount to validate against the ceiling.
    #[arg(short, long)]
    borrow: Option<Decimal>,
}

impl crate::Run for CapacityCmd {
    async fn run(self) -> anyhow::Result<()> {
        let provider = evm::connect(&self.rpc_url).await?;
        let client = morpho::Client::new(provider);

        let description = client
            .oracle(self.oracle)
            .description()
            .call()
            .await
            .unwrap_or_else(|_| String::from("(no description)"));
        let price = client.oracle_price(self.oracle).await?;

        let capacity = risk::compute_capacity(
            to_wei(self.collateral, 18),
            price,
            to_wei(self.lltv, 18),
        )?;

        let mut writer = tabwriter::TabWriter::new(stdout());
        writeln!(&mut writer, "oracle\t{} ({})", self.oracle, description)?;
        writeln!(&mut writer, "unit price\t{}", price.unit_price())?;
        writeln!(
            &mut writer,
            "collateral value\t{}",
            from_wei(capacity.collateral_value, 18)
        )?;
        writeln!(
            &mut writer,
            "max borrow ({} lltv)\t{}",
            self.lltv,
            from_wei(capacity.max_borrow_value, 18)
        )?;

        if let Some(borrow) = self.borrow {
            let verdict = match risk::validate_borrow(
                to_wei(borrow, 18),
                capacity.max_borrow_value,
                to_wei(self.margin, 18),
            ) {
                Ok(()) => "within the margin-adjusted ceiling".to_string(),
                Err(err) => format!("rejected: {err}"),
            };
            writeln!(&mut writer, "borrow {}\t{}", borrow, verdict)?;
        }

        writer.flush()?;

        Ok(())
    }
}
