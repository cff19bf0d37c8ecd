//! Borrow-capacity math.
//!
//! Pure functions that turn a collateral quantity and an oracle quote into a
//! borrowing ceiling, and gate a proposed borrow against that ceiling with a
//! configurable safety margin.
//!
//! All gating values are integer smallest-unit amounts (`U256`, 18-decimal
//! WAD scale). [`rust_decimal`] is only ever used for display; a floating or
//! decimal value never reaches a transaction argument.

use std::fmt;

use alloy::primitives::{I256, U256};
use rust_decimal::Decimal;

use crate::evm::from_wei;

/// 18-decimal fixed-point one (1e18).
pub const WAD: U256 = U256::from_limbs([1_000_000_000_000_000_000, 0, 0, 0]);

/// A point-in-time oracle quote.
///
/// Unit price is `answer / 10^decimals`. The answer is signed because the
/// aggregator interface is; a non-positive answer is rejected before any
/// capacity is derived from it.
#[derive(Debug, Clone, Copy)]
pub struct OraclePrice {
    /// Raw oracle answer.
    pub answer: I256,
    /// Scale of the answer.
    pub decimals: u8,
}

impl OraclePrice {
    /// Unit price for display. Answers or scales outside `Decimal`'s range
    /// collapse to zero here; gating math never goes through this path.
    #[must_use]
    pub fn unit_price(&self) -> Decimal {
        let raw = i128::try_from(self.answer).unwrap_or_default();
        Decimal::try_from_i128_with_scale(raw, self.decimals as u32).unwrap_or_default()
    }
}

/// Derived borrowing capacity for a collateral position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capacity {
    /// Collateral value in 18-decimal loan-currency units.
    pub collateral_value: U256,
    /// Protocol ceiling: `collateral_value × lltv`.
    pub max_borrow_value: U256,
}

impl Capacity {
    /// Loan-to-value ratio a borrow of `borrow_value` would produce, as a
    /// fraction for display.
    #[must_use]
    pub fn ltv_after(&self, borrow_value: U256) -> Decimal {
        if self.collateral_value.is_zero() {
            return Decimal::ZERO;
        }
        from_wei(borrow_value, 18) / from_wei(self.collateral_value, 18)
    }
}

/// Capacity policy violation.
///
/// Raised before any borrow transaction is attempted; a violation never
/// reaches the chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CapacityError {
    /// Oracle answered zero or negative; no value can be derived.
    NonPositivePrice(I256),
    /// Safety margin outside `[0, 1]` (WAD scale).
    MarginOutOfRange(U256),
    /// Intermediate product exceeded 256 bits.
    Overflow,
    /// Proposed borrow exceeds the margin-adjusted ceiling.
    ExceedsCeiling {
        /// Proposed borrow value (18-decimal).
        proposed: U256,
        /// Margin-adjusted ceiling (18-decimal).
        ceiling: U256,
    },
}

impl fmt::Display for CapacityError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CapacityError::NonPositivePrice(answer) => {
                write!(f, "oracle answer {answer} is not positive")
            }
            CapacityError::MarginOutOfRange(margin) => {
                write!(f, "safety margin {margin} is not a fraction in [0, 1e18]")
            }
            CapacityError::Overflow => write!(f, "capacity computation overflowed"),
            CapacityError::ExceedsCeiling { proposed, ceiling } => write!(
                f,
                "proposed borrow {} exceeds the margin-adjusted ceiling {}",
                from_wei(*proposed, 18),
                from_wei(*ceiling, 18),
            ),
        }
    }
}

impl std::error::Error for CapacityError {}

/// Computes the value of a collateral quantity and the protocol borrowing
/// ceiling it supports.
///
/// `collateral_value = collateral × answer / 10^decimals` and
/// `max_borrow_value = collateral_value × lltv / 1e18`, both carried out in
/// full-width integer arithmetic. Monotonic non-decreasing in `collateral`
/// and in the oracle answer.
pub fn compute_capacity(
    collateral: U256,
    price: OraclePrice,
    lltv: U256,
) -> Result<Capacity, CapacityError> {
    if price.answer <= I256::ZERO {
        return Err(CapacityError::NonPositivePrice(price.answer));
    }
    let scale = U256::from(10u64)
        .checked_pow(U256::from(price.decimals))
        .ok_or(CapacityError::Overflow)?;

    let collateral_value = collateral
        .checked_mul(price.answer.unsigned_abs())
        .ok_or(CapacityError::Overflow)?
        / scale;
    let max_borrow_value = collateral_value
        .checked_mul(lltv)
        .ok_or(CapacityError::Overflow)?
        / WAD;

    Ok(Capacity {
        collateral_value,
        max_borrow_value,
    })
}

/// Validates a proposed borrow value against the capacity ceiling.
///
/// Accepts any `proposed ≤ max_borrow_value × (1 − margin)` and rejects
/// everything above it, boundary-exact at equality. `margin` is a WAD
/// fraction; with margin zero the ceiling is `max_borrow_value` itself.
pub fn validate_borrow(
    proposed: U256,
    max_borrow_value: U256,
    margin: U256,
) -> Result<(), CapacityError> {
    if margin > WAD {
        return Err(CapacityError::MarginOutOfRange(margin));
    }
    let ceiling = max_borrow_value
        .checked_mul(WAD - margin)
        .ok_or(CapacityError::Overflow)?
        / WAD;
    if proposed > ceiling {
        return Err(CapacityError::ExceedsCeiling { proposed, ceiling });
    }
    Ok(())
}
