use super::registry::TransactionRegistry;
use crate::domain::outcome::{TransactionOutcome, TransactionStatus};
use crate::domain::ports::{
    CLIENT_USER_CANCELLED, PurchaseResult, RESPONSE_ITEM_ALREADY_OWNED, RESPONSE_USER_CANCELED,
};
use crate::domain::product::ProductId;
use crate::domain::purchase::{PurchaseKind, PurchaseRecord};
use crate::error::BillingError;
use tracing::{debug, warn};

/// A classified purchase result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPurchase {
    pub outcome: TransactionOutcome,
    /// The purchase to register as open, if any.
    pub record: Option<PurchaseRecord>,
}

/// Turns raw provider purchase results into domain outcomes.
pub struct PurchaseFlowController<'a> {
    registry: &'a TransactionRegistry,
    history: Option<&'a [PurchaseRecord]>,
}

impl<'a> PurchaseFlowController<'a> {
    pub fn new(registry: &'a TransactionRegistry, history: Option<&'a [PurchaseRecord]>) -> Self {
        Self { registry, history }
    }

    /// Classifies `result`. A successful purchase is recorded with the
    /// caller's `kind`, whatever the provider reported.
    pub fn resolve(
        &self,
        product_id: &ProductId,
        kind: PurchaseKind,
        result: PurchaseResult,
    ) -> ResolvedPurchase {
        let failure = match result {
            PurchaseResult::Success(mut record) => {
                if record.kind != kind {
                    debug!(
                        product_id = %product_id,
                        reported = ?record.kind,
                        requested = ?kind,
                        "provider reported a different purchase kind"
                    );
                    record.kind = kind;
                }
                return ResolvedPurchase {
                    outcome: TransactionOutcome::for_record(TransactionStatus::Succeeded, &record),
                    record: Some(record),
                };
            }
            PurchaseResult::Cancelled => BillingError::UserCancelled,
            PurchaseResult::AlreadyOwned => BillingError::AlreadyOwned(product_id.to_string()),
            PurchaseResult::Failed(err) => match err.code {
                RESPONSE_USER_CANCELED | CLIENT_USER_CANCELLED => BillingError::UserCancelled,
                RESPONSE_ITEM_ALREADY_OWNED => BillingError::AlreadyOwned(product_id.to_string()),
                _ => BillingError::ProviderFailure(err.to_string()),
            },
        };

        warn!(product_id = %product_id, error = %failure, "billing purchase error");

        match failure {
            BillingError::UserCancelled => {
                self.without_record(TransactionStatus::Cancelled, product_id)
            }
            BillingError::AlreadyOwned(_) => match self.owned_record(product_id) {
                Some(record) => {
                    let status = TransactionStatus::already_owned(record.kind);
                    debug!(product_id = %product_id, %status, "already owned purchase found locally");
                    ResolvedPurchase {
                        outcome: TransactionOutcome::for_record(status, record),
                        record: Some(record.clone()),
                    }
                }
                None => self.without_record(TransactionStatus::Failed, product_id),
            },
            _ => self.without_record(TransactionStatus::Failed, product_id),
        }
    }

    fn owned_record(&self, product_id: &ProductId) -> Option<&'a PurchaseRecord> {
        self.registry.find_by_product(product_id).or_else(|| {
            self.history?
                .iter()
                .find(|record| &record.product_id == product_id)
        })
    }

    fn without_record(&self, status: TransactionStatus, product_id: &ProductId) -> ResolvedPurchase {
        ResolvedPurchase {
            outcome: TransactionOutcome::without_record(status, product_id.clone()),
            record: None,
        }
    }
}
