//! Spender allowance management.
//!
//! Before any value-moving step, the protocol contract must hold a
//! sufficient transfer delegation from the signing account. [`AllowanceGuard`]
//! issues an approval only when the current delegation falls short, so a run
//! against an account that already approved the spender performs zero writes.

use alloy::primitives::{Address, U256};

use crate::{
    evm::{IERC20, Provider},
    step::{StepOutcome, StepRunner},
};

/// How much to approve when the current allowance is insufficient.
///
/// Approves ten times the required amount rather than the exact requirement.
/// The generous ceiling amortizes approvals across future cycles; an exact
/// approval would force one extra transaction per run.
pub(crate) fn approval_ceiling(required: U256) -> U256 {
    required.checked_mul(U256::from(10u8)).unwrap_or(U256::MAX)
}

/// True when an approval transaction must be issued.
pub(crate) fn needs_approval(current: U256, required: U256) -> bool {
    current < required
}

/// Ensures a spender holds a sufficient allowance before a transfer.
pub struct AllowanceGuard {
    runner: StepRunner,
}

impl AllowanceGuard {
    /// Creates a guard sharing the pipeline's step runner.
    #[must_use]
    pub fn new(runner: StepRunner) -> Self {
        Self { runner }
    }

    /// Ensures `spender` may move at least `required` of `token` from `owner`.
    ///
    /// Reads the current allowance first; if it already covers the
    /// requirement, returns [`StepOutcome::AlreadySatisfied`] without a
    /// single write. Otherwise submits one approval for the ceiling amount
    /// and waits for its receipt. The allowance read must complete before
    /// the decision is made; nothing here is speculative.
    pub async fn ensure<P>(
        &self,
        provider: &P,
        token: Address,
        owner: Address,
        spender: Address,
        required: U256,
    ) -> StepOutcome
    where
        P: Provider + Clone,
    {
        let erc20 = IERC20::new(token, provider.clone());
        let current = match erc20.allowance(owner, spender).call().await {
            Ok(current) => current,
            Err(err) => return StepOutcome::Failed(format!("allowance read failed: {err}")),
        };

        if !needs_approval(current, required) {
            log::debug!("allowance for {spender} already covers {required}");
            return StepOutcome::AlreadySatisfied;
        }

        let ceiling = approval_ceiling(required);
        self.runner
            .run("approve", || async {
                erc20.approve(spender, ceiling).send().await
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_needs_approval_iff_short() {
        let required = U256::from(100u64);
        assert!(needs_approval(U256::ZERO, required));
        assert!(needs_approval(U256::from(99u64), required));
        assert!(!needs_approval(required, required));
        assert!(!needs_approval(U256::from(101u64), required));
    }

    #[test]
    fn test_ceiling_is_generous_and_saturating() {
        assert_eq!(approval_ceiling(U256::from(100u64)), U256::from(1000u64));
        assert_eq!(approval_ceiling(U256::MAX), U256::MAX);
    }

    #[test]
    fn test_zero_requirement_never_approves() {
        assert!(!needs_approval(U256::ZERO, U256::ZERO));
    }
}
