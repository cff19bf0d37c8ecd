//! EVM node interaction.
//!
//! Provider construction, the ERC-20 surface, and wei conversions.

// reimport
pub use alloy::providers::ProviderBuilder;
use alloy::{
    network::{Ethereum, IntoWallet},
    transports::TransportError,
};
/// reimport primitives
pub use alloy::{
    primitives::{Address, U256, address},
    providers::Provider as ProviderTrait,
    sol,
};
use rust_decimal::Decimal;

/// Default RPC endpoint (local Anvil node).
pub const DEFAULT_RPC_URL: &str = "http://localhost:8545";

/// Custom provider trait rename
pub trait Provider: alloy::providers::Provider<Ethereum> + Send + Clone + 'static {}
/// Type alias for the dynamic provider.
pub type DynProvider = alloy::providers::DynProvider<Ethereum>;

impl<T> Provider for T where T: alloy::providers::Provider<Ethereum> + Send + Clone + 'static {}

sol! {
    #[sol(rpc)]
    interface IERC20 {
        // --- Metadata Functions ---
        function name() external view returns (string memory);
        function symbol() external view returns (string memory);
        function decimals() external view returns (uint8);

        // --- Core Functions (from IERC20) ---
        function totalSupply() external view returns (uint256);
        function balanceOf(address account) external view returns (uint256);
        function allowance(address owner, address spender) external view returns (uint256);
        function transfer(address to, uint256 amount) external returns (bool);
        function approve(address spender, uint256 amount) external returns (bool);
        function transferFrom(address from, address to, uint256 amount) external returns (bool);

        // --- Events (from IERC20) ---
        event Transfer(address indexed from, address indexed to, uint256 value);
        event Approval(address indexed owner, address indexed spender, uint256 value);
    }
}

/// Creates a read-only provider for a custom url.
#[inline(always)]
pub async fn connect(url: &str) -> Result<impl Provider, TransportError> {
    let p = ProviderBuilder::new().connect(url).await?;
    Ok(p)
}

/// Creates a signing provider with a custom url.
///
/// All state-mutating pipeline steps go through a provider built here; the
/// wallet owns nonce ordering, which is why writes are never issued
/// concurrently.
#[inline(always)]
pub async fn connect_with_signer<S>(url: &str, signer: S) -> Result<impl Provider, TransportError>
where
    S: IntoWallet<Ethereum>,
    <S as IntoWallet<Ethereum>>::NetworkWallet: Clone + 'static,
{
    let provider = ProviderBuilder::new().wallet(signer).connect(url).await?;
    Ok(provider)
}

/// Converts a number from Decimal to wei.
pub fn to_wei(mut size: Decimal, decimals: u32) -> U256 {
    size.rescale(decimals);
    U256::from(size.mantissa())
}

/// Converts a number from wei to Decimal.
///
/// Values beyond `Decimal`'s range saturate at [`Decimal::MAX`]; a
/// chain-read amount must never panic a display path.
pub fn from_wei(wei: U256, decimals: u32) -> Decimal {
    Decimal::try_from_i128_with_scale(wei.saturating_to::<i128>(), decimals)
        .unwrap_or(Decimal::MAX)
}

#[cfg(test)]
mod tests {
    use rust_decimal::dec;

    use super::*;

    #[test]
    fn test_from_wei() {
        let test_values = [
            (
                U256::from(86_000_000_000_000_000_000i128),
                18,
                dec!(86.000000000000000000),
            ),
            (U256::from(500_000_123456u64), 6, dec!(500000.123456)),
        ];
        for (index, (got, decimals, expect)) in test_values.into_iter().enumerate() {
            assert_eq!(from_wei(got, decimals), expect, "failed at {index}");
        }
    }

    #[test]
    fn test_from_wei_saturates_out_of_range() {
        // An arbitrary token can report any balanceOf; the display
        // conversion must saturate, not panic.
        assert_eq!(from_wei(U256::MAX, 18), Decimal::MAX);
        assert_eq!(from_wei(U256::from(u128::MAX), 18), Decimal::MAX);
    }

    #[test]
    fn test_to_wei() {
        let test_values = [
            (
                dec!(0.860000000000000000),
                18,
                U256::from(860_000_000_000_000_000i128),
            ),
            (dec!(500000), 18, U256::from(500_000u128 * 10u128.pow(18))),
            (dec!(98.996405), 6, U256::from(98_996_405u64)),
        ];
        for (index, (got, decimals, expect)) in test_values.into_iter().enumerate() {
            assert_eq!(to_wei(got, decimals), expect, "failed at {index}");
        }
    }
}
