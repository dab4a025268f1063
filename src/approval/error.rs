use thiserror::Error;

use crate::core_types::{Priority, WithdrawalStatus};
use crate::models::RequestId;

/// Errors returned synchronously to the operator. None of these leave a
/// partial state change behind.
#[derive(Debug, Error)]
pub enum ApprovalError {
    #[error("request not found: {0}")]
    NotFound(RequestId),

    #[error("request {id} is {actual}, expected {expected}")]
    Conflict {
        id: RequestId,
        expected: WithdrawalStatus,
        actual: WithdrawalStatus,
    },

    #[error("rejection reason is mandatory")]
    MissingReason,

    #[error("priority {0} out of range 0..=10")]
    PriorityOutOfRange(Priority),
}
