//! Idempotent step execution.
//!
//! On-chain state-establishing operations are naturally idempotent at the
//! protocol level but surface a repeated attempt as a revert, not a no-op.
//! [`StepRunner`] normalizes that: it submits a state-mutating call, waits
//! for its receipt, and classifies the outcome so the pipeline never has to
//! string-match per step.

use std::future::Future;

use alloy::{
    contract, network::Ethereum, providers::PendingTransactionBuilder,
    rpc::types::TransactionReceipt, sol_types::decode_revert_reason,
};
use derive_more::IsVariant;

/// Revert reasons that mean the step's goal state already holds.
///
/// "market already created" is Morpho Blue's revert string for a repeated
/// `createMarket`; the other marker covers older deployments and mocks.
const ALREADY_SATISFIED_MARKERS: &[&str] = &["already created", "already exists"];

/// Outcome of a single pipeline step.
///
/// `AlreadySatisfied` is not a failure: the precondition the step establishes
/// already held, and the pipeline advances as if the step had succeeded.
#[derive(Debug, Clone, IsVariant)]
pub enum StepOutcome {
    /// The transaction was included and did not revert.
    Success(TransactionReceipt),
    /// The goal state pre-existed; no transaction was confirmed by this step.
    AlreadySatisfied,
    /// The step failed for a reason the classification table does not excuse.
    Failed(String),
}

impl StepOutcome {
    /// Returns the failure reason, if this outcome is a failure.
    #[must_use]
    pub fn failure_reason(&self) -> Option<&str> {
        match self {
            StepOutcome::Failed(reason) => Some(reason),
            _ => None,
        }
    }

    /// True when the pipeline may advance past this step.
    #[must_use]
    pub fn advances(&self) -> bool {
        !self.is_failed()
    }
}

/// Extracts the most structured failure reason available.
///
/// Prefers the ABI-decoded revert reason carried in the error payload;
/// falls back to the transport error's display form.
pub(crate) fn revert_reason(err: &contract::Error) -> String {
    err.as_revert_data()
        .and_then(|data| decode_revert_reason(&data))
        .unwrap_or_else(|| err.to_string())
}

/// Executes named steps and classifies their outcomes.
///
/// The default classification table recognizes Morpho Blue's
/// "already created" revert; protocol-specific markers can be appended with
/// [`StepRunner::with_marker`].
#[derive(Debug, Clone)]
pub struct StepRunner {
    markers: Vec<&'static str>,
}

impl Default for StepRunner {
    fn default() -> Self {
        Self {
            markers: ALREADY_SATISFIED_MARKERS.to_vec(),
        }
    }
}

impl StepRunner {
    /// Creates a runner with the default classification table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a revert-reason marker treated as already-satisfied.
    #[must_use]
    pub fn with_marker(mut self, marker: &'static str) -> Self {
        self.markers.push(marker);
        self
    }

    fn is_already_satisfied(&self, reason: &str) -> bool {
        let reason = reason.to_ascii_lowercase();
        self.markers.iter().any(|marker| reason.contains(marker))
    }

    /// Runs one state-mutating step to completion.
    ///
    /// Submits the call, then blocks on its receipt; the next step must not
    /// start before this resolves, since the signing account's nonce ordering
    /// forbids concurrent writes. No retries are attempted.
    pub async fn run<F, Fut>(&self, name: &str, send: F) -> StepOutcome
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<PendingTransactionBuilder<Ethereum>, contract::Error>>,
    {
        log::info!("{name}: submitting");
        let pending = match send().await {
            Ok(pending) => pending,
            Err(err) => {
                let reason = revert_reason(&err);
                if self.is_already_satisfied(&reason) {
                    log::info!("{name}: already satisfied ({reason})");
                    return StepOutcome::AlreadySatisfied;
                }
                return StepOutcome::Failed(reason);
            }
        };
        match pending.get_receipt().await {
            Ok(receipt) if receipt.status() => {
                log::info!(
                    "{name}: confirmed in block {}",
                    receipt.block_number.unwrap_or_default()
                );
                StepOutcome::Success(receipt)
            }
            Ok(receipt) => StepOutcome::Failed(format!(
                "transaction {} reverted on-chain",
                receipt.transaction_hash
            )),
            Err(err) => StepOutcome::Failed(format!("confirmation wait failed: {err}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use alloy::transports::TransportErrorKind;

    use super::*;

    #[tokio::test]
    async fn test_repeat_creation_classified_as_satisfied() {
        // A second ensure-market run surfaces the protocol's revert; the
        // runner must turn it into AlreadySatisfied, not a failure.
        let runner = StepRunner::new();
        let outcome = runner
            .run("create-market", || async {
                let err: contract::Error =
                    TransportErrorKind::custom_str("execution reverted: market already created")
                        .into();
                Err::<PendingTransactionBuilder<Ethereum>, _>(err)
            })
            .await;
        assert!(outcome.is_already_satisfied());
    }

    #[tokio::test]
    async fn test_unrecognized_revert_fails_the_step() {
        let runner = StepRunner::new();
        let outcome = runner
            .run("borrow", || async {
                let err: contract::Error =
                    TransportErrorKind::custom_str("execution reverted: insufficient liquidity")
                        .into();
                Err::<PendingTransactionBuilder<Ethereum>, _>(err)
            })
            .await;
        assert!(outcome.is_failed());
        assert!(
            outcome
                .failure_reason()
                .is_some_and(|reason| reason.contains("insufficient liquidity"))
        );
    }

    #[test]
    fn test_default_markers_match_morpho_revert() {
        let runner = StepRunner::new();
        assert!(runner.is_already_satisfied("market already created"));
        assert!(runner.is_already_satisfied("Market Already Exists"));
        assert!(runner.is_already_satisfied("execution reverted: market already created"));
    }

    #[test]
    fn test_unrelated_reasons_are_failures() {
        let runner = StepRunner::new();
        assert!(!runner.is_already_satisfied("insufficient liquidity"));
        assert!(!runner.is_already_satisfied("unauthorized"));
        assert!(!runner.is_already_satisfied(""));
    }

    #[test]
    fn test_custom_marker_extends_table() {
        let runner = StepRunner::new().with_marker("enabled irm");
        assert!(runner.is_already_satisfied("execution reverted: enabled irm"));
        assert!(StepRunner::new().markers.len() < runner.markers.len());
    }

    #[test]
    fn test_outcome_helpers() {
        let failed = StepOutcome::Failed("nope".into());
        assert!(failed.is_failed());
        assert!(!failed.advances());
        assert_eq!(failed.failure_reason(), Some("nope"));

        let satisfied = StepOutcome::AlreadySatisfied;
        assert!(satisfied.advances());
        assert_eq!(satisfied.failure_reason(), None);
    }
}
