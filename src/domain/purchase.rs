use super::product::ProductId;
use crate::error::BillingError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Provider order id of a purchase.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TransactionId(String);

impl TransactionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TransactionId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for TransactionId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// How a product behaves once bought. Chosen by the caller at purchase time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PurchaseKind {
    /// Non-consumable entitlement; stays owned until refunded.
    Managed,
    /// Must be consumed before the product can be bought again.
    #[serde(alias = "unmanaged")]
    Consumable,
}

impl FromStr for PurchaseKind {
    type Err = BillingError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        match input {
            "managed" => Ok(PurchaseKind::Managed),
            "consumable" | "unmanaged" => Ok(PurchaseKind::Consumable),
            other => Err(BillingError::InvalidCommand(format!(
                "unknown purchase kind '{other}'"
            ))),
        }
    }
}

/// Purchase state as reported by the provider's history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum PurchaseState {
    #[default]
    Purchased,
    Cancelled,
    Refunded,
}

impl TryFrom<u8> for PurchaseState {
    type Error = BillingError;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        match code {
            0 => Ok(PurchaseState::Purchased),
            1 => Ok(PurchaseState::Cancelled),
            2 => Ok(PurchaseState::Refunded),
            other => Err(BillingError::ProviderFailure(format!(
                "unknown purchase state code {other}"
            ))),
        }
    }
}

impl From<PurchaseState> for u8 {
    fn from(state: PurchaseState) -> Self {
        match state {
            PurchaseState::Purchased => 0,
            PurchaseState::Cancelled => 1,
            PurchaseState::Refunded => 2,
        }
    }
}

/// Signed purchase data as handed back by the provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Receipt {
    #[serde(rename = "SignedData")]
    pub signed_data: String,
    #[serde(rename = "Signature")]
    pub signature: String,
}

impl Receipt {
    /// The JSON form forwarded to the callback bridge.
    pub fn to_json(&self) -> String {
        // Two string fields cannot fail to serialize.
        serde_json::to_string(self).unwrap_or_default()
    }
}

/// A purchase known to the provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchaseRecord {
    pub product_id: ProductId,
    pub transaction_id: TransactionId,
    pub kind: PurchaseKind,
    pub receipt: Receipt,
    #[serde(default)]
    pub state: PurchaseState,
}
