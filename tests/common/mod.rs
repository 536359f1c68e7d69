#![allow(dead_code)]

use async_trait::async_trait;
use purchase_coordinator::application::coordinator::BillingCoordinator;
use purchase_coordinator::config::CoordinatorConfig;
use purchase_coordinator::domain::ports::{
    BillingProvider, BillingProviderRef, ProviderResult, PurchaseRequest, PurchaseResult,
};
use purchase_coordinator::domain::product::{CatalogSnapshot, ProductDescription, ProductId};
use purchase_coordinator::domain::purchase::{
    PurchaseKind, PurchaseRecord, PurchaseState, Receipt,
};
use purchase_coordinator::infrastructure::channel_sink::{BridgeEvent, ChannelEventSink};
use purchase_coordinator::infrastructure::in_memory::{
    InMemoryBillingProvider, InMemoryBillingProviderBuilder,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedReceiver;

pub const PUBLIC_KEY: &str = "MIIBIjANBgkqhkiG9w0BAQEFAAOCAQ8AMIIBCgKCAQEA";

pub fn product(id: &str, price: &str) -> ProductDescription {
    ProductDescription {
        id: id.into(),
        display_name: id.to_uppercase(),
        description: format!("A fine {id}"),
        formatted_price: price.to_string(),
    }
}

pub fn record(product: &str, tx: &str, kind: PurchaseKind, state: PurchaseState) -> PurchaseRecord {
    PurchaseRecord {
        product_id: product.into(),
        transaction_id: tx.into(),
        kind,
        receipt: Receipt {
            signed_data: format!("{{\"orderId\":\"{tx}\"}}"),
            signature: format!("sig:{tx}"),
        },
        state,
    }
}

/// A store listing a sword and a shield.
pub fn store() -> InMemoryBillingProviderBuilder {
    InMemoryBillingProvider::builder()
        .product(product("sword", "$1.99"))
        .product(product("shield", "$2.99"))
}

pub struct Harness {
    pub coordinator: BillingCoordinator,
    pub provider: InMemoryBillingProvider,
    pub events: UnboundedReceiver<BridgeEvent>,
}

impl Harness {
    pub fn start(provider: InMemoryBillingProvider) -> Self {
        Self::with_config(provider, CoordinatorConfig::default())
    }

    pub fn with_config(provider: InMemoryBillingProvider, config: CoordinatorConfig) -> Self {
        Self::wrapping(Arc::new(provider.clone()), provider, config)
    }

    /// Runs the coordinator against `backend`; `provider` is the store it delegates to.
    pub fn wrapping(
        backend: BillingProviderRef,
        provider: InMemoryBillingProvider,
        config: CoordinatorConfig,
    ) -> Self {
        let (sink, events) = ChannelEventSink::channel();
        let coordinator = BillingCoordinator::spawn(backend, Arc::new(sink), config);
        Self {
            coordinator,
            provider,
            events,
        }
    }

    /// Starts the coordinator and runs a successful setup.
    pub async fn ready(provider: InMemoryBillingProvider) -> Self {
        let harness = Self::start(provider);
        harness.coordinator.setup(PUBLIC_KEY).await.unwrap();
        harness
    }

    /// Events emitted so far.
    pub fn drain(&mut self) -> Vec<BridgeEvent> {
        let mut events = Vec::new();
        while let Ok(event) = self.events.try_recv() {
            events.push(event);
        }
        events
    }
}

/// Delegates to a simulated store but misreports successful purchases.
pub struct MisreportingProvider {
    inner: InMemoryBillingProvider,
    /// Kind stamped on every successful purchase.
    pub reported_kind: Option<PurchaseKind>,
    /// Delay between the store recording a purchase and the result arriving.
    pub purchase_delay: Duration,
}

impl MisreportingProvider {
    pub fn new(inner: InMemoryBillingProvider) -> Self {
        Self {
            inner,
            reported_kind: None,
            purchase_delay: Duration::ZERO,
        }
    }
}

#[async_trait]
impl BillingProvider for MisreportingProvider {
    async fn setup(&self, public_key: &str) -> ProviderResult<()> {
        self.inner.setup(public_key).await
    }

    async fn query_inventory(&self, ids: &[ProductId]) -> ProviderResult<CatalogSnapshot> {
        self.inner.query_inventory(ids).await
    }

    async fn launch_purchase(&self, request: PurchaseRequest) -> PurchaseResult {
        let result = match self.inner.launch_purchase(request).await {
            PurchaseResult::Success(mut record) => {
                if let Some(kind) = self.reported_kind {
                    record.kind = kind;
                }
                PurchaseResult::Success(record)
            }
            other => other,
        };
        if !self.purchase_delay.is_zero() {
            tokio::time::sleep(self.purchase_delay).await;
        }
        result
    }

    async fn consume(&self, record: &PurchaseRecord) -> ProviderResult<()> {
        self.inner.consume(record).await
    }

    async fn fetch_purchase_history(&self) -> ProviderResult<Vec<PurchaseRecord>> {
        self.inner.fetch_purchase_history().await
    }
}
