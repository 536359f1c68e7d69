use super::product::{ProductDescription, ProductId};
use super::purchase::{PurchaseKind, PurchaseRecord, PurchaseState, Receipt, TransactionId};
use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionStatus {
    Succeeded,
    Cancelled,
    Failed,
    Restored,
    Resumed,
    Refunded,
}

impl TransactionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionStatus::Succeeded => "succeeded",
            TransactionStatus::Cancelled => "cancelled",
            TransactionStatus::Failed => "failed",
            TransactionStatus::Restored => "restored",
            TransactionStatus::Resumed => "resumed",
            TransactionStatus::Refunded => "refunded",
        }
    }

    /// Status reported when a still-open purchase is re-introduced.
    ///
    /// `owned` is the status used for a purchase in good standing: `Resumed`
    /// for pending purchases, `Restored` when replaying entitlements.
    pub fn replayed(state: PurchaseState, owned: TransactionStatus) -> Self {
        match state {
            PurchaseState::Purchased => owned,
            PurchaseState::Cancelled => TransactionStatus::Cancelled,
            PurchaseState::Refunded => TransactionStatus::Refunded,
        }
    }

    /// Status for an "already owned" purchase found locally.
    pub fn already_owned(kind: PurchaseKind) -> Self {
        match kind {
            PurchaseKind::Managed => TransactionStatus::Restored,
            PurchaseKind::Consumable => TransactionStatus::Resumed,
        }
    }
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One status update for a transaction, as delivered to callers and the bridge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionOutcome {
    pub status: TransactionStatus,
    pub product_id: ProductId,
    pub transaction_id: Option<TransactionId>,
    pub receipt: Option<Receipt>,
}

impl TransactionOutcome {
    /// An outcome with no provider purchase attached.
    pub fn without_record(status: TransactionStatus, product_id: ProductId) -> Self {
        Self {
            status,
            product_id,
            transaction_id: None,
            receipt: None,
        }
    }

    pub fn for_record(status: TransactionStatus, record: &PurchaseRecord) -> Self {
        Self {
            status,
            product_id: record.product_id.clone(),
            transaction_id: Some(record.transaction_id.clone()),
            receipt: Some(record.receipt.clone()),
        }
    }
}

/// Where a catalog answer came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CatalogSource {
    Cache,
    Provider,
    /// The provider query failed; the product list is empty.
    ProviderFailed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogOutcome {
    pub products: Vec<ProductDescription>,
    pub source: CatalogSource,
}

/// How a close request was carried out. A "closed" event is emitted in every case.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseResult {
    /// The consumable was consumed by the provider.
    Consumed,
    /// The provider refused the consume; the transaction is closed locally anyway.
    ConsumeFailed,
    /// A managed purchase was released without a provider call.
    Released,
    /// No open transaction had this id.
    NotPending,
}
