//! Morpho Blue lending protocol integration.
//!
//! This module provides a thin client over the Morpho Blue contract surface:
//! typed instances for the market contract and its price oracle, market id
//! derivation, and the grouped reads the lending cycle needs.
//!
//! # Overview
//!
//! Morpho Blue is an isolated-market lending protocol. A market is identified
//! by its parameter tuple (loan token, collateral token, oracle, IRM, LLTV);
//! the id is a pure function of that tuple, so equal tuples always denote the
//! same market.
//!
//! # Examples
//!
//! ## Query a position
//!
//! ```no_run
//! use lendcycle::morpho;
//! use lendcycle::Address;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let client = morpho::Client::new(lendcycle::evm::DynProvider::new(
//!     lendcycle::evm::connect("http://localhost:8545").await?,
//! ));
//!
//! let morpho_addr: Address = "0x...".parse()?;
//! let user: Address = "0x...".parse()?;
//! let market_id = [0u8; 32].into();
//!
//! let position = client.position(morpho_addr, market_id, user).await?;
//! println!("collateral: {}", position.collateral);
//! # Ok(())
//! # }
//! ```

use alloy::{
    primitives::{Address, FixedBytes, keccak256},
    sol_types::SolValue,
};

use crate::{
    evm::Provider,
    morpho::contracts::{
        IMorpho::{self, IMorphoInstance},
        IOracle::{self, IOracleInstance},
        MarketParams,
    },
    risk::OraclePrice,
};

pub mod contracts;

/// Morpho market identifier.
///
/// A 32-byte unique identifier for a Morpho Blue market.
pub type MarketId = FixedBytes<32>;

/// An account's standing in one market, as reported by the protocol.
///
/// Shares are protocol-internal units of proportional claim; converting them
/// to asset amounts is the protocol's business, not ours.
pub type Position = IMorpho::positionReturn;

/// Derives the market id for a parameter tuple.
///
/// Morpho Blue identifies a market as `keccak256(abi.encode(marketParams))`.
/// Equal tuples map to equal ids, so the id can be derived locally without a
/// protocol read.
#[must_use]
pub fn market_id(params: &MarketParams) -> MarketId {
    keccak256(params.abi_encode())
}

/// Client for Morpho Blue lending markets.
///
/// Wraps a provider and hands out typed contract instances plus the read
/// helpers the orchestrator uses. State-mutating calls are issued on the
/// instances directly so that the step runner can classify their outcomes.
pub struct Client<P>
where
    P: Provider,
{
    provider: P,
}

impl<P> Client<P>
where
    P: Provider + Clone,
{
    /// Creates a new Morpho client with a custom provider.
    pub fn new(provider: P) -> Self {
        Self { provider }
    }

    /// Returns a reference to the underlying provider.
    pub fn provider(&self) -> &P {
        &self.provider
    }

    /// Creates a Morpho contract instance at the given address.
    ///
    /// Use this to call Morpho contract methods directly.
    pub fn instance(&self, address: Address) -> IMorphoInstance<P> {
        IMorpho::new(address, self.provider.clone())
    }

    /// Creates a price-oracle instance at the given address.
    pub fn oracle(&self, address: Address) -> IOracleInstance<P> {
        IOracle::new(address, self.provider.clone())
    }

    /// Reads the oracle's answer and scale in one aggregated call.
    ///
    /// The two reads are independent, so they ride a single multicall. The
    /// result is a point-in-time quote; no staleness check is performed.
    pub async fn oracle_price(&self, oracle: Address) -> anyhow::Result<OraclePrice> {
        let oracle = IOracle::new(oracle, self.provider.clone());
        let (answer, decimals) = self
            .provider
            .multicall()
            .add(oracle.latestAnswer())
            .add(oracle.decimals())
            .aggregate()
            .await?;
        Ok(OraclePrice { answer, decimals })
    }

    /// Reads a user's position in the market identified by `id`.
    pub async fn position(
        &self,
        morpho: Address,
        id: MarketId,
        user: Address,
    ) -> anyhow::Result<Position> {
        let morpho = IMorpho::new(morpho, self.provider.clone());
        let position = morpho.position(id, user).call().await?;
        Ok(position)
    }
}

#[cfg(test)]
mod tests {
    use alloy::primitives::{U256, address};

    use super::*;

    fn params(lltv: u64) -> MarketParams {
        MarketParams {
            loanToken: address!("0xa9012a055bd4e0eDfF8Ce09f960291C09D5322dC"),
            collateralToken: address!("0x5FbDB2315678afecb367f032d93F642f64180aa3"),
            oracle: address!("0xe7f1725E7734CE288F8367e1Bb143E90bb3F0512"),
            irm: address!("0x9eB6d0D85FCc07Bf34D69913031ade9E16BD5dB0"),
            lltv: U256::from(lltv),
        }
    }

    #[test]
    fn test_market_id_deterministic() {
        assert_eq!(market_id(&params(860)), market_id(&params(860)));
    }

    #[test]
    fn test_market_id_distinguishes_tuples() {
        assert_ne!(market_id(&params(860)), market_id(&params(770)));

        let mut swapped = params(860);
        std::mem::swap(&mut swapped.loanToken, &mut swapped.collateralToken);
        assert_ne!(market_id(&params(860)), market_id(&swapped));
    }
}
