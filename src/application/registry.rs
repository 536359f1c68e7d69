use crate::domain::product::ProductId;
use crate::domain::purchase::{PurchaseKind, PurchaseRecord, TransactionId};
use std::collections::HashMap;

/// What closing a transaction requires from the provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CloseAction {
    /// A consumable that must be consumed by the provider.
    Consume(PurchaseRecord),
    /// A managed purchase; the entitlement stays with the provider.
    Release(PurchaseRecord),
    NotPending,
}

/// Transactions purchased but not yet closed in this session, keyed by
/// transaction id.
#[derive(Debug, Default)]
pub struct TransactionRegistry {
    pending: HashMap<TransactionId, PurchaseRecord>,
}

impl TransactionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts `record` unless its transaction id is already pending.
    pub fn add(&mut self, record: PurchaseRecord) -> bool {
        if self.pending.contains_key(&record.transaction_id) {
            return false;
        }
        self.pending.insert(record.transaction_id.clone(), record);
        true
    }

    pub fn get(&self, transaction_id: &TransactionId) -> Option<&PurchaseRecord> {
        self.pending.get(transaction_id)
    }

    pub fn find_by_product(&self, product_id: &ProductId) -> Option<&PurchaseRecord> {
        self.pending.values().find(|r| &r.product_id == product_id)
    }

    pub fn remove(&mut self, transaction_id: &TransactionId) -> Option<PurchaseRecord> {
        self.pending.remove(transaction_id)
    }

    /// Removes the transaction and reports how it must be closed.
    pub fn begin_close(&mut self, transaction_id: &TransactionId) -> CloseAction {
        match self.remove(transaction_id) {
            Some(record) if record.kind == PurchaseKind::Consumable => CloseAction::Consume(record),
            Some(record) => CloseAction::Release(record),
            None => CloseAction::NotPending,
        }
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Pending records ordered by transaction id.
    pub fn records(&self) -> Vec<PurchaseRecord> {
        let mut records: Vec<PurchaseRecord> = self.pending.values().cloned().collect();
        records.sort_by(|a, b| a.transaction_id.cmp(&b.transaction_id));
        records
    }
}
