use thiserror::Error;

use tessera_primitives::codec::ScriptSizeError;
use tessera_primitives::TransactionInput;

/// Rejections raised while the transaction is still being described,
/// before any balancing work happens.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("input {0} was already added")]
    DuplicateInput(TransactionInput),
    #[error("a change address is required before the transaction can be balanced")]
    MissingChangeAddress,
    #[error("redeemers are present but no script evaluator was configured")]
    MissingEvaluator,
}

/// Failures of the balancing fixed point itself.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum BalancingError {
    #[error("inputs do not cover the outputs and fee")]
    InsufficientFunds,
    #[error("a value exceeds the maximum serialized value size and cannot be split further")]
    ValueSizeExceeded,
    #[error("balanced transaction is {size} bytes, limit is {max}")]
    TransactionTooLarge { size: usize, max: u32 },
    #[error("collateral is missing, insufficient, or not pure coin")]
    MissingCollateral,
    #[error("fee did not stabilize within {0} balancing passes")]
    FeeDidNotConverge(usize),
}

/// An evaluator's verdict when script execution fails (or the evaluator
/// itself cannot run).
#[derive(Debug, Error, PartialEq, Eq)]
#[error("script evaluation failed: {trace}")]
pub struct ScriptEvaluationError {
    /// Index of the offending redeemer, when the evaluator can attribute
    /// the failure.
    pub redeemer: Option<u64>,
    pub trace: String,
}

#[derive(Debug, Error)]
pub enum TxBuilderError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Balancing(#[from] BalancingError),
    #[error(transparent)]
    Evaluation(#[from] ScriptEvaluationError),
    #[error("unreadable reference script: {0}")]
    ReferenceScript(#[from] ScriptSizeError),
}
