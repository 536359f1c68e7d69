use crate::domain::outcome::{TransactionOutcome, TransactionStatus};
use crate::domain::purchase::{PurchaseKind, PurchaseRecord, TransactionId};
use crate::error::{BillingError, Result};

/// A historical purchase re-introduced into the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Replay {
    pub outcome: TransactionOutcome,
    pub record: PurchaseRecord,
}

/// Replays the provider's purchase history as status events.
pub struct RestoreReconciler<'a> {
    history: Option<&'a [PurchaseRecord]>,
}

impl<'a> RestoreReconciler<'a> {
    pub fn new(history: Option<&'a [PurchaseRecord]>) -> Self {
        Self { history }
    }

    /// Replays the managed purchases left pending by a previous session.
    ///
    /// Ids are processed in order; ids without a matching managed purchase are
    /// skipped. Nothing is replayed until a history has been fetched.
    pub fn restore_managed(&self, pending_ids: &[TransactionId]) -> Vec<Replay> {
        let Some(history) = self.history else {
            return Vec::new();
        };

        pending_ids
            .iter()
            .filter_map(|id| {
                history
                    .iter()
                    .find(|r| r.kind == PurchaseKind::Managed && &r.transaction_id == id)
            })
            .map(|record| replay(record, TransactionStatus::Resumed))
            .collect()
    }

    /// Replays every consumable in the history; none of them has been consumed yet.
    pub fn restore_all_consumables(&self) -> Vec<Replay> {
        self.replay_kind(PurchaseKind::Consumable, TransactionStatus::Resumed)
            .unwrap_or_default()
    }

    /// Replays every managed entitlement as restored.
    pub fn restore_all_managed(&self) -> Result<Vec<Replay>> {
        self.replay_kind(PurchaseKind::Managed, TransactionStatus::Restored)
            .ok_or_else(|| {
                BillingError::PreconditionViolation(
                    "products must be requested before restoring managed purchases".to_string(),
                )
            })
    }

    fn replay_kind(&self, kind: PurchaseKind, owned: TransactionStatus) -> Option<Vec<Replay>> {
        let history = self.history?;
        Some(
            history
                .iter()
                .filter(|r| r.kind == kind)
                .map(|record| replay(record, owned))
                .collect(),
        )
    }
}

fn replay(record: &PurchaseRecord, owned: TransactionStatus) -> Replay {
    let status = TransactionStatus::replayed(record.state, owned);
    Replay {
        outcome: TransactionOutcome::for_record(status, record),
        record: record.clone(),
    }
}
