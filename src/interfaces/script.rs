use crate::application::coordinator::BillingCoordinator;
use crate::domain::product::ProductId;
use crate::domain::purchase::{PurchaseKind, TransactionId};
use crate::error::Result;
use tracing::info;

/// One step of a command script.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptCommand {
    Setup,
    RequestCatalog(Vec<ProductId>),
    CancelCatalogRequest,
    InvalidateCatalog,
    Purchase {
        product_id: ProductId,
        kind: PurchaseKind,
    },
    CloseTransaction {
        product_id: ProductId,
        transaction_id: TransactionId,
    },
    RestoreManaged(Vec<TransactionId>),
    RestoreAllConsumables,
    RestoreAllManaged,
    RefreshPurchaseHistory,
}

impl ScriptCommand {
    /// Runs the command and waits for its answer.
    pub async fn execute(self, coordinator: &BillingCoordinator, public_key: &str) -> Result<()> {
        match self {
            ScriptCommand::Setup => coordinator.setup(public_key).await?,
            ScriptCommand::RequestCatalog(ids) => {
                let outcome = coordinator.request_catalog(ids).await?;
                info!(products = outcome.products.len(), source = ?outcome.source, "catalog received");
            }
            ScriptCommand::CancelCatalogRequest => coordinator.cancel_catalog_request(),
            ScriptCommand::InvalidateCatalog => coordinator.invalidate_catalog(),
            ScriptCommand::Purchase { product_id, kind } => {
                coordinator.purchase(product_id, kind).await?;
            }
            ScriptCommand::CloseTransaction {
                product_id,
                transaction_id,
            } => {
                coordinator
                    .close_transaction(product_id, transaction_id)
                    .await?;
            }
            ScriptCommand::RestoreManaged(ids) => {
                coordinator.restore_managed(ids).await?;
            }
            ScriptCommand::RestoreAllConsumables => {
                coordinator.restore_all_consumables().await?;
            }
            ScriptCommand::RestoreAllManaged => {
                coordinator.restore_all_managed().await?;
            }
            ScriptCommand::RefreshPurchaseHistory => {
                let count = coordinator.refresh_purchase_history().await?;
                info!(purchases = count, "purchase history refreshed");
            }
        }
        Ok(())
    }
}
