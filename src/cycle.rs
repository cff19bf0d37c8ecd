//! The lending-cycle pipeline.
//!
//! A fixed, strictly sequential sequence of on-chain steps:
//! ensure-market → supply-liquidity → supply-collateral → compute-capacity →
//! borrow → report. Every step's post-condition is the next step's
//! pre-condition, and a later step never begins before its dependency
//! reached success or already-satisfied. Each run re-derives what is needed
//! from on-chain reads; nothing is persisted between runs.
//!
//! Failure handling is per step: market creation follows a configurable
//! policy, liquidity supply is explicitly best-effort (the market may
//! already be funded), and collateral supply, capacity validation, and
//! borrow are pipeline-fatal. Confirmed effects of earlier steps are never
//! rolled back.

use alloy::primitives::{Address, Bytes, U256};
use derive_more::Display;
use rust_decimal::Decimal;

use crate::{
    allowance::AllowanceGuard,
    error::Error,
    evm::{IERC20, Provider, from_wei},
    morpho::{Client, MarketId, Position, contracts::MarketParams, market_id},
    risk::{self, Capacity},
    step::{StepOutcome, StepRunner},
};

/// Likely causes surfaced with a failed borrow.
const BORROW_HINT: &str =
    "insufficient market liquidity, oracle misconfiguration, or market parameter mismatch";

/// How a failed market-creation step is treated.
///
/// The protocol reverts a `createMarket` against an existing market, which
/// the step runner already excuses; this policy only governs the remaining,
/// unrecognized failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum CreationPolicy {
    /// Log a warning and proceed. Downstream steps will fail on their own
    /// if the market genuinely does not exist.
    #[display("best-effort")]
    BestEffort,
    /// Abort the pipeline.
    #[display("required")]
    Required,
}

/// Complete configuration for one lending cycle.
///
/// All amounts are integer smallest-unit quantities of 18-decimal tokens;
/// `safety_margin` is a WAD fraction kept strictly inside the protocol's
/// LLTV ceiling.
#[derive(Debug, Clone)]
pub struct CycleConfig {
    /// Morpho Blue contract address.
    pub morpho: Address,
    /// Market parameter tuple; also determines the market id.
    pub market: MarketParams,
    /// Loan-token liquidity to supply, best-effort.
    pub supply_amount: U256,
    /// Collateral to deposit.
    pub collateral_amount: U256,
    /// Loan-token amount to borrow.
    pub borrow_amount: U256,
    /// Safety margin under the LLTV ceiling (WAD fraction).
    pub safety_margin: U256,
    /// Policy for unrecognized market-creation failures.
    pub market_creation: CreationPolicy,
}

/// Final summary of a completed cycle.
///
/// Built from the quantities the pipeline already knows, plus one live
/// position re-read for confirmation.
#[derive(Debug)]
pub struct CycleReport {
    /// Derived market id.
    pub market_id: MarketId,
    /// Collateral deposited this run.
    pub collateral_amount: U256,
    /// Amount borrowed this run.
    pub borrow_amount: U256,
    /// Capacity derived before the borrow.
    pub capacity: Capacity,
    /// The market's liquidation LTV (WAD fraction).
    pub lltv: U256,
    /// Live position after the cycle.
    pub position: Position,
}

impl CycleReport {
    /// Loan-to-value ratio of the position this run produced.
    #[must_use]
    pub fn current_ltv(&self) -> Decimal {
        self.capacity.ltv_after(self.borrow_amount)
    }

    /// Distance between the current LTV and the liquidation threshold.
    #[must_use]
    pub fn safety_buffer(&self) -> Decimal {
        from_wei(self.lltv, 18) - self.current_ltv()
    }
}

/// Drives the multi-step lending cycle against one market.
///
/// All configuration is explicit constructor input; there is no ambient
/// account or client state. Writes are strictly serialized because the
/// signing account's nonce ordering forbids concurrent submission.
pub struct Orchestrator<P>
where
    P: Provider,
{
    client: Client<P>,
    account: Address,
    config: CycleConfig,
    runner: StepRunner,
    guard: AllowanceGuard,
}

impl<P> Orchestrator<P>
where
    P: Provider + Clone,
{
    /// Creates an orchestrator for the signing account behind `provider`.
    ///
    /// The provider must carry a wallet; every state-mutating step is
    /// submitted through it.
    pub fn new(provider: P, account: Address, config: CycleConfig) -> Self {
        let runner = StepRunner::new();
        Self {
            client: Client::new(provider),
            account,
            config,
            guard: AllowanceGuard::new(runner.clone()),
            runner,
        }
    }

    /// Runs the full cycle to completion.
    ///
    /// Returns the final report, or the first fatal error. On a fatal error
    /// the pipeline halts immediately; effects already confirmed on-chain
    /// remain in place, since nothing here can be compensated.
    pub async fn run(&self) -> Result<CycleReport, Error> {
        let id = market_id(&self.config.market);
        log::info!("lending cycle for market {id}");
        self.log_balances("initial").await;

        self.ensure_market().await?;
        self.supply_liquidity().await?;
        self.supply_collateral().await?;
        let capacity = self.compute_capacity().await?;
        self.borrow().await?;

        self.log_balances("final").await;
        self.report(id, capacity).await
    }

    /// Ensures the market exists, creating it if necessary.
    ///
    /// A repeated creation reverts with "market already created", which the
    /// runner classifies as already-satisfied. Any other failure falls under
    /// the configured [`CreationPolicy`].
    async fn ensure_market(&self) -> Result<(), Error> {
        let morpho = self.client.instance(self.config.morpho);
        let params = self.config.market.clone();
        let outcome = self
            .runner
            .run("create-market", || async move {
                morpho.createMarket(params).send().await
            })
            .await;

        match outcome {
            StepOutcome::Failed(reason) => match self.config.market_creation {
                CreationPolicy::BestEffort => {
                    log::warn!("create-market failed ({reason}); continuing (policy: best-effort)");
                    Ok(())
                }
                CreationPolicy::Required => Err(Error::step("create-market", reason)),
            },
            _ => Ok(()),
        }
    }

    /// Supplies loan-token liquidity, best-effort.
    ///
    /// Skips without aborting when the balance is short, when the approval
    /// fails, or when the supply itself reverts; the market may already
    /// carry enough liquidity for the borrow. Only a failed balance read is
    /// fatal, since that signals node trouble rather than a funding gap.
    async fn supply_liquidity(&self) -> Result<(), Error> {
        let amount = self.config.supply_amount;
        if amount.is_zero() {
            log::info!("supply: skipped (zero supply amount configured)");
            return Ok(());
        }

        let loan = IERC20::new(self.config.market.loanToken, self.client.provider().clone());
        let balance = loan.balanceOf(self.account).call().await?;
        if balance < amount {
            log::warn!(
                "supply: loan-token balance {} is short of {}; skipping liquidity supply",
                from_wei(balance, 18),
                from_wei(amount, 18),
            );
            return Ok(());
        }

        let approval = self
            .guard
            .ensure(
                self.client.provider(),
                self.config.market.loanToken,
                self.account,
                self.config.morpho,
                amount,
            )
            .await;
        if let Some(reason) = approval.failure_reason() {
            log::warn!("supply: loan-token approval failed ({reason}); skipping liquidity supply");
            return Ok(());
        }

        let morpho = self.client.instance(self.config.morpho);
        let params = self.config.market.clone();
        let account = self.account;
        let outcome = self
            .runner
            .run("supply", || async move {
                morpho
                    .supply(params, amount, U256::ZERO, account, Bytes::new())
                    .send()
                    .await
            })
            .await;
        if let Some(reason) = outcome.failure_reason() {
            log::warn!("supply: failed ({reason}); continuing without fresh liquidity");
        }

        Ok(())
    }

    /// Deposits collateral. A hard prerequisite for borrowing, so any
    /// failure here aborts the run.
    async fn supply_collateral(&self) -> Result<(), Error> {
        let amount = self.config.collateral_amount;
        let approval = self
            .guard
            .ensure(
                self.client.provider(),
                self.config.market.collateralToken,
                self.account,
                self.config.morpho,
                amount,
            )
            .await;
        if let Some(reason) = approval.failure_reason() {
            return Err(Error::step("approve-collateral", reason.to_string()));
        }

        let morpho = self.client.instance(self.config.morpho);
        let params = self.config.market.clone();
        let account = self.account;
        let outcome = self
            .runner
            .run("supply-collateral", || async move {
                morpho
                    .supplyCollateral(params, amount, account, Bytes::new())
                    .send()
                    .await
            })
            .await;

        match outcome {
            StepOutcome::Failed(reason) => Err(Error::step("supply-collateral", reason)),
            _ => Ok(()),
        }
    }

    /// Reads the oracle and validates the intended borrow against the
    /// collateral's capacity. Raised violations never reach the chain.
    ///
    /// The loan token is assumed dollar-denominated at par, so the borrow
    /// amount doubles as its value; the capacity side converts collateral
    /// through the oracle's quote.
    async fn compute_capacity(&self) -> Result<Capacity, Error> {
        let price = self.client.oracle_price(self.config.market.oracle).await?;
        log::info!("oracle unit price: {}", price.unit_price());

        let capacity = risk::compute_capacity(
            self.config.collateral_amount,
            price,
            self.config.market.lltv,
        )?;
        log::info!(
            "collateral value {} supports at most {} (lltv {})",
            from_wei(capacity.collateral_value, 18),
            from_wei(capacity.max_borrow_value, 18),
            from_wei(self.config.market.lltv, 18),
        );

        risk::validate_borrow(
            self.config.borrow_amount,
            capacity.max_borrow_value,
            self.config.safety_margin,
        )?;
        Ok(capacity)
    }

    /// Borrows against the deposited collateral. Fatal on failure.
    async fn borrow(&self) -> Result<(), Error> {
        let morpho = self.client.instance(self.config.morpho);
        let params = self.config.market.clone();
        let amount = self.config.borrow_amount;
        let account = self.account;
        let outcome = self
            .runner
            .run("borrow", || async move {
                morpho
                    .borrow(params, amount, U256::ZERO, account, account)
                    .send()
                    .await
            })
            .await;

        match outcome {
            StepOutcome::Failed(reason) => Err(Error::step_with_hint("borrow", reason, BORROW_HINT)),
            _ => Ok(()),
        }
    }

    /// Builds the final report, confirming the position with one live read.
    async fn report(&self, id: MarketId, capacity: Capacity) -> Result<CycleReport, Error> {
        let position = self
            .client
            .position(self.config.morpho, id, self.account)
            .await?;
        Ok(CycleReport {
            market_id: id,
            collateral_amount: self.config.collateral_amount,
            borrow_amount: self.config.borrow_amount,
            capacity,
            lltv: self.config.market.lltv,
            position,
        })
    }

    /// Logs the account's loan and collateral token balances.
    ///
    /// Reporting only; a failed read here never gates a decision.
    async fn log_balances(&self, stage: &str) {
        let provider = self.client.provider();
        let loan = IERC20::new(self.config.market.loanToken, provider.clone());
        let collateral = IERC20::new(self.config.market.collateralToken, provider.clone());
        let balances = provider
            .multicall()
            .add(loan.balanceOf(self.account))
            .add(collateral.balanceOf(self.account))
            .aggregate()
            .await;
        match balances {
            Ok((loan_balance, collateral_balance)) => log::info!(
                "{stage} balances: loan {} / collateral {}",
                from_wei(loan_balance, 18),
                from_wei(collateral_balance, 18),
            ),
            Err(err) => log::debug!("{stage} balances unavailable: {err}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use alloy::{
        primitives::U256,
        providers::{ProviderBuilder, mock::Asserter},
        sol_types::SolValue,
    };
    use rust_decimal::dec;

    use super::*;
    use crate::evm::to_wei;

    fn test_config(supply_amount: U256) -> CycleConfig {
        CycleConfig {
            morpho: Address::repeat_byte(0x01),
            market: MarketParams {
                loanToken: Address::repeat_byte(0x02),
                collateralToken: Address::repeat_byte(0x03),
                oracle: Address::repeat_byte(0x04),
                irm: Address::repeat_byte(0x05),
                lltv: to_wei(dec!(0.86), 18),
            },
            supply_amount,
            collateral_amount: to_wei(dec!(100), 18),
            borrow_amount: to_wei(dec!(80), 18),
            safety_margin: to_wei(dec!(0.05), 18),
            market_creation: CreationPolicy::BestEffort,
        }
    }

    /// Orchestrator over a provider that answers each RPC request from the
    /// asserter's queue, in order. Fillers are disabled so every submitted
    /// transaction consumes exactly one queued response.
    fn mock_orchestrator(asserter: &Asserter, config: CycleConfig) -> Orchestrator<impl Provider> {
        let provider = ProviderBuilder::new()
            .disable_recommended_fillers()
            .connect_mocked_client(asserter.clone());
        Orchestrator::new(provider, Address::repeat_byte(0xaa), config)
    }

    fn encoded(value: U256) -> Bytes {
        Bytes::from(value.abi_encode())
    }

    #[tokio::test]
    async fn test_collateral_revert_halts_before_borrow() {
        let asserter = Asserter::new();
        // Initial balance report fails; reporting never gates the pipeline.
        asserter.push_failure_msg("balances unavailable");
        // Repeat market creation reverts as already satisfied.
        asserter.push_failure_msg("execution reverted: market already created");
        // Collateral allowance already covers the deposit.
        asserter.push_success(&encoded(U256::MAX));
        // The deposit itself reverts.
        asserter.push_failure_msg("execution reverted: transfer from failed");

        let orchestrator = mock_orchestrator(&asserter, test_config(U256::ZERO));
        let err = orchestrator.run().await.unwrap_err();

        // The response queue is exhausted at the deposit: had the pipeline
        // continued, the borrow submission would have failed against the
        // empty queue and the error would name a later step.
        assert_eq!(err.failing_step(), Some("supply-collateral"));
        assert!(err.to_string().contains("transfer from failed"));
    }

    #[tokio::test]
    async fn test_required_market_creation_aborts() {
        let asserter = Asserter::new();
        asserter.push_failure_msg("balances unavailable");
        asserter.push_failure_msg("insufficient funds for gas");

        let mut config = test_config(U256::ZERO);
        config.market_creation = CreationPolicy::Required;
        let orchestrator = mock_orchestrator(&asserter, config);
        let err = orchestrator.run().await.unwrap_err();
        assert_eq!(err.failing_step(), Some("create-market"));
    }

    #[tokio::test]
    async fn test_short_loan_balance_skips_liquidity_supply() {
        let asserter = Asserter::new();
        asserter.push_failure_msg("balances unavailable");
        asserter.push_failure_msg("execution reverted: market already created");
        // Loan-token balance is far short of the configured supply; the
        // step must skip without submitting an approval or a supply.
        asserter.push_success(&encoded(U256::from(1u64)));
        asserter.push_success(&encoded(U256::MAX));
        asserter.push_failure_msg("execution reverted: transfer from failed");

        let config = test_config(to_wei(dec!(500000), 18));
        let orchestrator = mock_orchestrator(&asserter, config);
        let err = orchestrator.run().await.unwrap_err();
        assert_eq!(err.failing_step(), Some("supply-collateral"));
    }

    #[tokio::test]
    async fn test_failed_liquidity_approval_is_swallowed() {
        let asserter = Asserter::new();
        asserter.push_failure_msg("balances unavailable");
        asserter.push_failure_msg("execution reverted: market already created");
        // Loan-token balance covers the supply, but its approval fails;
        // liquidity supply is best-effort, so the pipeline moves on.
        asserter.push_success(&encoded(U256::MAX));
        asserter.push_success(&encoded(U256::ZERO));
        asserter.push_failure_msg("approve rejected by node");
        asserter.push_success(&encoded(U256::MAX));
        asserter.push_failure_msg("execution reverted: transfer from failed");

        let config = test_config(to_wei(dec!(500000), 18));
        let orchestrator = mock_orchestrator(&asserter, config);
        let err = orchestrator.run().await.unwrap_err();
        assert_eq!(err.failing_step(), Some("supply-collateral"));
    }

    #[test]
    fn test_report_risk_summary() {
        let report = CycleReport {
            market_id: [0u8; 32].into(),
            collateral_amount: to_wei(dec!(100), 18),
            borrow_amount: to_wei(dec!(80), 18),
            capacity: Capacity {
                collateral_value: to_wei(dec!(100), 18),
                max_borrow_value: to_wei(dec!(86), 18),
            },
            lltv: to_wei(dec!(0.86), 18),
            position: Position {
                supplyShares: U256::ZERO,
                borrowShares: 80,
                collateral: 100,
            },
        };
        assert_eq!(report.current_ltv(), dec!(0.8));
        assert_eq!(report.safety_buffer(), dec!(0.06));
    }

    #[test]
    fn test_creation_policy_display() {
        assert_eq!(CreationPolicy::BestEffort.to_string(), "best-effort");
        assert_eq!(CreationPolicy::Required.to_string(), "required");
    }
}
