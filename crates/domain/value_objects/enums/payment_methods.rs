use std::fmt::Display;

use serde::{Deserialize, Serialize};

#[derive(Default, Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentMethod {
    #[default]
    CreditCard,
    Paypal,
    BankTransfer,
    Stripe,
    ApplePay,
    GooglePay,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::CreditCard => "CREDIT_CARD",
            PaymentMethod::Paypal => "PAYPAL",
            PaymentMethod::BankTransfer => "BANK_TRANSFER",
            PaymentMethod::Stripe => "STRIPE",
            PaymentMethod::ApplePay => "APPLE_PAY",
            PaymentMethod::GooglePay => "GOOGLE_PAY",
        }
    }

    pub fn from_str(value: &str) -> Option<Self> {
        match value {
            "CREDIT_CARD" => Some(PaymentMethod::CreditCard),
            "PAYPAL" => Some(PaymentMethod::Paypal),
            "BANK_TRANSFER" => Some(PaymentMethod::BankTransfer),
            "STRIPE" => Some(PaymentMethod::Stripe),
            "APPLE_PAY" => Some(PaymentMethod::ApplePay),
            "GOOGLE_PAY" => Some(PaymentMethod::GooglePay),
            _ => None,
        }
    }
}

impl Display for PaymentMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
