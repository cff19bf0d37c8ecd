//! The full lending-cycle command.

use std::io::{Write, stdout};
use std::str::FromStr;

use alloy::signers::local::PrivateKeySigner;
use clap::Args;
use lendcycle::{
    Address, Decimal,
    cycle::{CreationPolicy, CycleConfig, CycleReport, Orchestrator},
    evm::{self, from_wei, to_wei},
    morpho::contracts::MarketParams,
};
use rust_decimal::dec;

/// Runs ensure-market → supply → supply-collateral → borrow → report.
///
/// All amounts are whole-token decimals and are converted to 18-decimal
/// smallest units before anything touches the chain.
#[derive(Args)]
pub struct RunCmd {
    /// RPC endpoint URL.
    #[arg(short, long, default_value = evm::DEFAULT_RPC_URL)]
    rpc_url: String,
    /// Signing key; falls back to PRIVATE_KEY in the environment or .env.
    #[arg(long)]
    private_key: Option<String>,
    /// Morpho Blue contract address.
    #[arg(long)]
    morpho: Address,
    /// Loan token address.
    #[arg(long)]
    loan_token: Address,
    /// Collateral token address.
    #[arg(long)]
    collateral_token: Address,
    /// Price oracle address.
    #[arg(long)]
    oracle: Address,
    /// Interest rate model address.
    #[arg(long)]
    irm: Address,
    /// Liquidation loan-to-value, as a fraction.
    #[arg(long, default_value = "0.86")]
    lltv: Decimal,
    /// Loan-token liquidity to supply (best-effort).
    #[arg(long, default_value = "500000")]
    supply: Decimal,
    /// Collateral to deposit.
    #[arg(long, default_value = "100")]
    collateral: Decimal,
    /// Amount to borrow.
    #[arg(long)]
    borrow: Decimal,
    /// Safety margin kept under the LLTV ceiling, as a fraction.
    #[arg(long, default_value = "0.05")]
    margin: Decimal,
    /// Abort when market creation fails for an unrecognized reason.
    #[arg(long)]
    require_market_creation: bool,
}

impl crate::Run for RunCmd {
    async fn run(self) -> anyhow::Result<()> {
        let key = match self.private_key.clone() {
            Some(key) => key,
            None => {
                let _ = dotenvy::dotenv();
                std::env::var("PRIVATE_KEY").map_err(|_| {
                    anyhow::anyhow!("no --private-key given and PRIVATE_KEY is not set")
                })?
            }
        };
        let signer = PrivateKeySigner::from_str(&key)?;
        let account = signer.address();
        let provider = evm::connect_with_signer(&self.rpc_url, signer).await?;

        let config = CycleConfig {
            morpho: self.morpho,
            market: MarketParams {
                loanToken: self.loan_token,
                collateralToken: self.collateral_token,
                oracle: self.oracle,
                irm: self.irm,
                lltv: to_wei(self.lltv, 18),
            },
            supply_amount: to_wei(self.supply, 18),
            collateral_amount: to_wei(self.collateral, 18),
            borrow_amount: to_wei(self.borrow, 18),
            safety_margin: to_wei(self.margin, 18),
            market_creation: if self.require_market_creation {
                CreationPolicy::Required
            } else {
                CreationPolicy::BestEffort
            },
        };

        let report = Orchestrator::new(provider, account, config).run().await?;
        print_report(&report)
    }
}

fn print_report(report: &CycleReport) -> anyhow::Result<()> {
    let mut writer = tabwriter::TabWriter::new(stdout());

    writeln!(&mut writer, "market\t{}", report.market_id)?;
    writeln!(
        &mut writer,
        "collateral\t{} (value {})",
        from_wei(report.collateral_amount, 18),
        from_wei(report.capacity.collateral_value, 18),
    )?;
    writeln!(
        &mut writer,
        "borrowed\t{} (ceiling {})",
        from_wei(report.borrow_amount, 18),
        from_wei(report.capacity.max_borrow_value, 18),
    )?;
    writeln!(
        &mut writer,
        "ltv\t{:.2}% (liquidation at {:.2}%, buffer {:.2}%)",
        report.current_ltv() * dec!(100),
        from_wei(report.lltv, 18) * dec!(100),
        report.safety_buffer() * dec!(100),
    )?;
    writeln!(
        &mut writer,
        "position\tsupply shares {} / borrow shares {} / collateral {}",
        report.position.supplyShares, report.position.borrowShares, report.position.collateral,
    )?;

    writer.flush()?;

    Ok(())
}
