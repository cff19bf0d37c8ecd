//! Idempotent lending-cycle orchestration for Morpho Blue.
//!
//! This crate drives a complete lending cycle against a Morpho Blue market
//! over an EVM JSON-RPC node: ensure the market exists, supply loan-token
//! liquidity (best-effort), deposit collateral, derive a borrowing ceiling
//! from the market's oracle, and borrow safely inside it.
//!
//! Every run is idempotent: each step first decides whether its goal state
//! already holds (an existing market, a sufficient allowance) and skips the
//! write when it does. Failures are classified once, at the step boundary,
//! as already-satisfied, recoverable (logged, pipeline continues), or fatal
//! (pipeline halts, prior on-chain effects remain).
//!
//! # Example
//!
//! ```no_run
//! use std::str::FromStr;
//!
//! use alloy::signers::local::PrivateKeySigner;
//! use lendcycle::{
//!     cycle::{CreationPolicy, CycleConfig, Orchestrator},
//!     evm,
//!     morpho::contracts::MarketParams,
//! };
//! use rust_decimal::dec;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let signer = PrivateKeySigner::from_str("0x...")?;
//! let account = signer.address();
//! let provider = evm::connect_with_signer("http://localhost:8545", signer).await?;
//!
//! let config = CycleConfig {
//!     morpho: "0x...".parse()?,
//!     market: MarketParams {
//!         loanToken: "0x...".parse()?,
//!         collateralToken: "0x...".parse()?,
//!         oracle: "0x...".parse()?,
//!         irm: "0x...".parse()?,
//!         lltv: evm::to_wei(dec!(0.86), 18),
//!     },
//!     supply_amount: evm::to_wei(dec!(500000), 18),
//!     collateral_amount: evm::to_wei(dec!(100), 18),
//!     borrow_amount: evm::to_wei(dec!(80), 18),
//!     safety_margin: evm::to_wei(dec!(0.05), 18),
//!     market_creation: CreationPolicy::BestEffort,
//! };
//!
//! let report = Orchestrator::new(provider, account, config).run().await?;
//! println!("current LTV: {:.2}%", report.current_ltv() * dec!(100));
//! # Ok(())
//! # }
//! ```

pub mod allowance;
pub mod cycle;
pub mod error;
pub mod evm;
pub mod morpho;
pub mod risk;
pub mod step;

pub use alloy::primitives::{Address, U256};
pub use error::Error;
pub use rust_decimal::Decimal;
