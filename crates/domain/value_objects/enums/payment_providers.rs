use std::fmt::Display;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentProvider {
    Stripe,
}

impl PaymentProvider {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentProvider::Stripe => "STRIPE",
        }
    }

    /// Resolves the `{provider}` segment of the webhook route, case-insensitively.
    pub fn from_path(value: &str) -> Option<Self> {
        if value.eq_ignore_ascii_case("stripe") {
            Some(PaymentProvider::Stripe)
        } else {
            None
        }
    }
}

impl Display for PaymentProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
