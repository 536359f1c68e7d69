use crate::domain::ports::{
    BillingProvider, ProviderError, ProviderResult, PurchaseRequest, PurchaseResult,
};
use crate::domain::product::{CatalogSnapshot, ProductDescription, ProductId};
use crate::domain::purchase::{PurchaseRecord, PurchaseState, Receipt, TransactionId};
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::RwLock;

/// Provider response: the requested product is not for sale.
pub const RESPONSE_ITEM_UNAVAILABLE: i32 = 4;
/// Provider response: generic failure during the API action.
pub const RESPONSE_ERROR: i32 = 6;
/// Provider response: the purchase to consume is not owned.
pub const RESPONSE_ITEM_NOT_OWNED: i32 = 8;

/// A purchase response queued for a product, overriding the simulated store.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScriptedPurchase {
    /// Let the simulated store decide.
    Succeed,
    Cancelled,
    AlreadyOwned,
    Failed { code: i32, message: String },
}

#[derive(Default)]
struct StoreState {
    catalog: HashMap<ProductId, ProductDescription>,
    history: Vec<PurchaseRecord>,
    scripted: HashMap<ProductId, VecDeque<ScriptedPurchase>>,
    consume_failures: HashSet<TransactionId>,
    setup_failure: Option<ProviderError>,
    inventory_failure: Option<ProviderError>,
    next_order: u64,
}

#[derive(Default)]
struct CallCounters {
    setups: AtomicUsize,
    inventory_queries: AtomicUsize,
    purchases: AtomicUsize,
    consumes: AtomicUsize,
    history_fetches: AtomicUsize,
}

/// An in-process billing provider simulating a store.
///
/// Purchases of listed products succeed and are recorded in the purchase
/// history until consumed; buying a product with an unconsumed purchase
/// reports "already owned". Responses can be scripted per product and
/// failures injected, and every call is counted.
///
/// Uses `Arc<RwLock<..>>` so clones share the same store.
#[derive(Default, Clone)]
pub struct InMemoryBillingProvider {
    state: Arc<RwLock<StoreState>>,
    calls: Arc<CallCounters>,
    query_latency: Duration,
}

impl InMemoryBillingProvider {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn builder() -> InMemoryBillingProviderBuilder {
        InMemoryBillingProviderBuilder::default()
    }

    pub async fn set_inventory_failure(&self, failure: Option<ProviderError>) {
        self.state.write().await.inventory_failure = failure;
    }

    pub async fn purchase_history(&self) -> Vec<PurchaseRecord> {
        self.state.read().await.history.clone()
    }

    pub fn setup_count(&self) -> usize {
        self.calls.setups.load(Ordering::SeqCst)
    }

    pub fn inventory_query_count(&self) -> usize {
        self.calls.inventory_queries.load(Ordering::SeqCst)
    }

    pub fn purchase_count(&self) -> usize {
        self.calls.purchases.load(Ordering::SeqCst)
    }

    pub fn consume_count(&self) -> usize {
        self.calls.consumes.load(Ordering::SeqCst)
    }

    pub fn history_fetch_count(&self) -> usize {
        self.calls.history_fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BillingProvider for InMemoryBillingProvider {
    async fn setup(&self, public_key: &str) -> ProviderResult<()> {
        self.calls.setups.fetch_add(1, Ordering::SeqCst);
        if public_key.is_empty() {
            return Err(ProviderError::new(RESPONSE_ERROR, "missing public key"));
        }
        match &self.state.read().await.setup_failure {
            Some(failure) => Err(failure.clone()),
            None => Ok(()),
        }
    }

    async fn query_inventory(&self, ids: &[ProductId]) -> ProviderResult<CatalogSnapshot> {
        self.calls.inventory_queries.fetch_add(1, Ordering::SeqCst);
        if !self.query_latency.is_zero() {
            tokio::time::sleep(self.query_latency).await;
        }

        let state = self.state.read().await;
        if let Some(failure) = &state.inventory_failure {
            return Err(failure.clone());
        }
        Ok(CatalogSnapshot::new(
            ids.iter().filter_map(|id| state.catalog.get(id).cloned()),
        ))
    }

    async fn launch_purchase(&self, request: PurchaseRequest) -> PurchaseResult {
        self.calls.purchases.fetch_add(1, Ordering::SeqCst);
        let mut state = self.state.write().await;

        let scripted = state
            .scripted
            .get_mut(&request.product_id)
            .and_then(VecDeque::pop_front);
        match scripted {
            Some(ScriptedPurchase::Cancelled) => return PurchaseResult::Cancelled,
            Some(ScriptedPurchase::AlreadyOwned) => return PurchaseResult::AlreadyOwned,
            Some(ScriptedPurchase::Failed { code, message }) => {
                return PurchaseResult::Failed(ProviderError::new(code, message));
            }
            Some(ScriptedPurchase::Succeed) | None => {}
        }

        if !state.catalog.contains_key(&request.product_id) {
            return PurchaseResult::Failed(ProviderError::new(
                RESPONSE_ITEM_UNAVAILABLE,
                "item unavailable",
            ));
        }
        let owned = state
            .history
            .iter()
            .any(|r| r.product_id == request.product_id && r.state == PurchaseState::Purchased);
        if owned {
            return PurchaseResult::AlreadyOwned;
        }

        state.next_order += 1;
        let order_id = format!("GPA.{:04}", state.next_order);
        let signed_data = serde_json::json!({
            "orderId": order_id,
            "productId": request.product_id,
            "purchaseState": 0,
            "developerPayload": request.kind,
            "requestCode": request.request_token,
        })
        .to_string();
        let record = PurchaseRecord {
            product_id: request.product_id,
            transaction_id: TransactionId::new(order_id.clone()),
            kind: request.kind,
            receipt: Receipt {
                signed_data,
                signature: format!("sig:{order_id}"),
            },
            state: PurchaseState::Purchased,
        };
        state.history.push(record.clone());
        PurchaseResult::Success(record)
    }

    async fn consume(&self, record: &PurchaseRecord) -> ProviderResult<()> {
        self.calls.consumes.fetch_add(1, Ordering::SeqCst);
        let mut state = self.state.write().await;

        if state.consume_failures.contains(&record.transaction_id) {
            return Err(ProviderError::new(RESPONSE_ERROR, "error consuming purchase"));
        }
        let before = state.history.len();
        state
            .history
            .retain(|r| r.transaction_id != record.transaction_id);
        if state.history.len() == before {
            return Err(ProviderError::new(RESPONSE_ITEM_NOT_OWNED, "item not owned"));
        }
        Ok(())
    }

    async fn fetch_purchase_history(&self) -> ProviderResult<Vec<PurchaseRecord>> {
        self.calls.history_fetches.fetch_add(1, Ordering::SeqCst);
        Ok(self.state.read().await.history.clone())
    }
}

/// Builder for [`InMemoryBillingProvider`].
#[derive(Default)]
pub struct InMemoryBillingProviderBuilder {
    state: StoreState,
    query_latency: Duration,
}

impl InMemoryBillingProviderBuilder {
    /// Lists a product in the store.
    pub fn product(mut self, product: ProductDescription) -> Self {
        self.state.catalog.insert(product.id.clone(), product);
        self
    }

    /// Adds a purchase made in an earlier session.
    pub fn purchase(mut self, record: PurchaseRecord) -> Self {
        self.state.history.push(record);
        self
    }

    /// Queues a response for the next purchase of `product_id`.
    pub fn script(mut self, product_id: impl Into<ProductId>, response: ScriptedPurchase) -> Self {
        self.state
            .scripted
            .entry(product_id.into())
            .or_default()
            .push_back(response);
        self
    }

    pub fn consume_failure(mut self, transaction_id: impl Into<TransactionId>) -> Self {
        self.state.consume_failures.insert(transaction_id.into());
        self
    }

    pub fn setup_failure(mut self, failure: ProviderError) -> Self {
        self.state.setup_failure = Some(failure);
        self
    }

    pub fn inventory_failure(mut self, failure: ProviderError) -> Self {
        self.state.inventory_failure = Some(failure);
        self
    }

    /// Delay applied to every inventory query.
    pub fn query_latency(mut self, latency: Duration) -> Self {
        self.query_latency = latency;
        self
    }

    pub fn build(self) -> InMemoryBillingProvider {
        InMemoryBillingProvider {
            state: Arc::new(RwLock::new(self.state)),
            calls: Arc::new(CallCounters::default()),
            query_latency: self.query_latency,
        }
    }
}
