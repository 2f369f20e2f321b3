//! Status transition policy.

use serde::{Deserialize, Serialize};

use storefront_core::{DomainError, DomainResult};

use crate::order::OrderStatus;

/// Outcome of checking a requested status change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Target equals the current status; nothing to write.
    NoOp,
    /// A real change that should be persisted.
    Change { from: OrderStatus, to: OrderStatus },
}

/// Which status changes are allowed.
///
/// `Lenient` lets any status overwrite any other, terminal ones included.
/// `Strict` enforces `pending → processing → shipped → delivered` plus
/// `pending | processing | shipped → cancelled`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransitionPolicy {
    #[default]
    Lenient,
    Strict,
}

impl TransitionPolicy {
    pub fn check(self, from: OrderStatus, to: OrderStatus) -> DomainResult<Transition> {
        if from == to {
            return Ok(Transition::NoOp);
        }
        match self {
            TransitionPolicy::Lenient => Ok(Transition::Change { from, to }),
            TransitionPolicy::Strict if strict_allows(from, to) => Ok(Transition::Change { from, to }),
            TransitionPolicy::Strict => Err(DomainError::conflict(format!(
                "cannot transition order from '{from}' to '{to}'"
            ))),
        }
    }

    pub fn is_strict(self) -> bool {
        matches!(self, TransitionPolicy::Strict)
    }
}

fn strict_allows(from: OrderStatus, to: OrderStatus) -> bool {
    use OrderStatus::*;

    matches!(
        (from, to),
        (Pending, Processing)
            | (Processing, Shipped)
            | (Shipped, Delivered)
            | (Pending | Processing | Shipped, Cancelled)
    )
}
