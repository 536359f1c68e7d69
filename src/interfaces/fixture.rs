use crate::config::CoordinatorConfig;
use crate::domain::ports::ProviderError;
use crate::domain::product::{ProductDescription, ProductId};
use crate::domain::purchase::{PurchaseKind, PurchaseRecord, PurchaseState, Receipt, TransactionId};
use crate::error::Result;
use crate::infrastructure::in_memory::{InMemoryBillingProvider, RESPONSE_ERROR, ScriptedPurchase};
use serde::Deserialize;
use std::collections::HashMap;
use std::io::Read;
use tracing::warn;

/// A purchase from an earlier session, with the provider's raw state code.
#[derive(Debug, Deserialize)]
pub struct HistoricalPurchase {
    pub product_id: ProductId,
    pub transaction_id: TransactionId,
    pub kind: PurchaseKind,
    #[serde(default)]
    pub state: u8,
    #[serde(default)]
    pub signed_data: String,
    #[serde(default)]
    pub signature: String,
}

/// JSON description of a simulated store and the coordinator settings to run it with.
#[derive(Debug, Deserialize)]
pub struct StoreFixture {
    #[serde(default)]
    pub config: CoordinatorConfig,
    #[serde(default)]
    pub products: Vec<ProductDescription>,
    #[serde(default)]
    pub history: Vec<HistoricalPurchase>,
    /// Purchase responses queued per product.
    #[serde(default)]
    pub responses: HashMap<ProductId, Vec<ScriptedPurchase>>,
    #[serde(default)]
    pub consume_failures: Vec<TransactionId>,
    #[serde(default)]
    pub setup_error: Option<String>,
    #[serde(default)]
    pub inventory_error: Option<String>,
    #[serde(default)]
    pub query_latency_ms: u64,
}

impl StoreFixture {
    pub fn from_reader<R: Read>(source: R) -> Result<Self> {
        Ok(serde_json::from_reader(source)?)
    }

    /// Builds the simulated provider. History entries with an unknown state
    /// code are skipped.
    pub fn into_parts(self) -> (CoordinatorConfig, InMemoryBillingProvider) {
        let mut builder = InMemoryBillingProvider::builder()
            .query_latency(std::time::Duration::from_millis(self.query_latency_ms));

        for product in self.products {
            builder = builder.product(product);
        }
        for purchase in self.history {
            let state = match PurchaseState::try_from(purchase.state) {
                Ok(state) => state,
                Err(err) => {
                    warn!(transaction_id = %purchase.transaction_id, error = %err, "skipping purchase");
                    continue;
                }
            };
            builder = builder.purchase(PurchaseRecord {
                product_id: purchase.product_id,
                transaction_id: purchase.transaction_id,
                kind: purchase.kind,
                receipt: Receipt {
                    signed_data: purchase.signed_data,
                    signature: purchase.signature,
                },
                state,
            });
        }
        for (product_id, responses) in self.responses {
            for response in responses {
                builder = builder.script(product_id.clone(), response);
            }
        }
        for transaction_id in self.consume_failures {
            builder = builder.consume_failure(transaction_id);
        }
        if let Some(message) = self.setup_error {
            builder = builder.setup_failure(ProviderError::new(RESPONSE_ERROR, message));
        }
        if let Some(message) = self.inventory_error {
            builder = builder.inventory_failure(ProviderError::new(RESPONSE_ERROR, message));
        }

        (self.config, builder.build())
    }
}
