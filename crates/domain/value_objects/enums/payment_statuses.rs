use std::fmt::Display;

use serde::{Deserialize, Serialize};

#[derive(Default, Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    #[default]
    Initiated,
    #[serde(alias = "COMPLETED")]
    Success,
    Failed,
    Refunded,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Initiated => "INITIATED",
            PaymentStatus::Success => "SUCCESS",
            PaymentStatus::Failed => "FAILED",
            PaymentStatus::Refunded => "REFUNDED",
        }
    }

    pub fn from_str(value: &str) -> Option<Self> {
        match value {
            "INITIATED" => Some(PaymentStatus::Initiated),
            "SUCCESS" | "COMPLETED" => Some(PaymentStatus::Success),
            "FAILED" => Some(PaymentStatus::Failed),
            "REFUNDED" => Some(PaymentStatus::Refunded),
            _ => None,
        }
    }

    /// INITIATED -> SUCCESS | FAILED | REFUNDED. A declined intent can still succeed on a
    /// later attempt, and a settled payment may still be refunded.
    pub fn can_transition_to(&self, next: PaymentStatus) -> bool {
        matches!(
            (self, next),
            (PaymentStatus::Initiated, PaymentStatus::Success)
                | (PaymentStatus::Initiated, PaymentStatus::Failed)
                | (PaymentStatus::Initiated, PaymentStatus::Refunded)
                | (PaymentStatus::Failed, PaymentStatus::Success)
                | (PaymentStatus::Success, PaymentStatus::Refunded)
        )
    }
}

impl Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn completed_reads_as_success() {
        assert_eq!(PaymentStatus::from_str("COMPLETED"), Some(PaymentStatus::Success));
        assert_eq!(PaymentStatus::Success.to_string(), "SUCCESS");
    }

    #[test]
    fn settled_payments_do_not_move_backwards() {
        assert!(PaymentStatus::Initiated.can_transition_to(PaymentStatus::Success));
        assert!(PaymentStatus::Initiated.can_transition_to(PaymentStatus::Failed));
        assert!(PaymentStatus::Success.can_transition_to(PaymentStatus::Refunded));

        assert!(!PaymentStatus::Success.can_transition_to(PaymentStatus::Initiated));
        assert!(!PaymentStatus::Success.can_transition_to(PaymentStatus::Failed));
        assert!(!PaymentStatus::Failed.can_transition_to(PaymentStatus::Initiated));
        assert!(!PaymentStatus::Failed.can_transition_to(PaymentStatus::Refunded));
        assert!(!PaymentStatus::Refunded.can_transition_to(PaymentStatus::Success));
        assert!(!PaymentStatus::Success.can_transition_to(PaymentStatus::Success));
    }

    #[test]
    fn declined_payment_can_succeed_on_retry() {
        assert!(PaymentStatus::Failed.can_transition_to(PaymentStatus::Success));
    }
}
