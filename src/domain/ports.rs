use super::outcome::TransactionOutcome;
use super::product::{CatalogSnapshot, ProductDescription, ProductId};
use super::purchase::{PurchaseKind, PurchaseRecord, TransactionId};
use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;

/// Provider response: the user backed out of the purchase dialog.
pub const RESPONSE_USER_CANCELED: i32 = 1;
/// Provider response: the product is already owned.
pub const RESPONSE_ITEM_ALREADY_OWNED: i32 = 7;
/// Client-side helper code: the purchase flow was cancelled before reaching the store.
pub const CLIENT_USER_CANCELLED: i32 = -1005;

/// Failure reported by the billing provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderError {
    pub code: i32,
    pub message: String,
}

impl ProviderError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for ProviderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (response: {})", self.message, self.code)
    }
}

impl std::error::Error for ProviderError {}

pub type ProviderResult<T> = std::result::Result<T, ProviderError>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PurchaseRequest {
    pub product_id: ProductId,
    /// Stored by the provider with the purchase and reported back in history.
    pub kind: PurchaseKind,
    pub request_token: u32,
}

/// Raw result of a purchase flow, before classification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PurchaseResult {
    Success(PurchaseRecord),
    Cancelled,
    AlreadyOwned,
    Failed(ProviderError),
}

/// The external billing service.
///
/// Every call may complete on any thread, concurrently with other calls.
#[async_trait]
pub trait BillingProvider: Send + Sync {
    async fn setup(&self, public_key: &str) -> ProviderResult<()>;
    async fn query_inventory(&self, ids: &[ProductId]) -> ProviderResult<CatalogSnapshot>;
    async fn launch_purchase(&self, request: PurchaseRequest) -> PurchaseResult;
    async fn consume(&self, record: &PurchaseRecord) -> ProviderResult<()>;
    async fn fetch_purchase_history(&self) -> ProviderResult<Vec<PurchaseRecord>>;
}

/// Receiver of the coordinator's outbound events (the native callback bridge).
pub trait EventSink: Send + Sync {
    fn on_catalog_ready(&self, products: &[ProductDescription]);
    fn on_transaction_status_updated(&self, outcome: &TransactionOutcome);
    fn on_transaction_closed(&self, product_id: &ProductId, transaction_id: &TransactionId);
}

pub type BillingProviderRef = Arc<dyn BillingProvider>;
pub type EventSinkRef = Arc<dyn EventSink>;
