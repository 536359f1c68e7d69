use crate::domain::outcome::TransactionOutcome;
use crate::domain::ports::EventSink;
use crate::domain::product::{ProductDescription, ProductId};
use crate::domain::purchase::TransactionId;
use tokio::sync::mpsc;

/// An outbound event, as the callback bridge would receive it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BridgeEvent {
    CatalogReady(Vec<ProductDescription>),
    TransactionStatusUpdated(TransactionOutcome),
    TransactionClosed {
        product_id: ProductId,
        transaction_id: TransactionId,
    },
}

/// Forwards coordinator events over an unbounded channel.
///
/// Events are dropped once the receiver is gone.
#[derive(Clone)]
pub struct ChannelEventSink {
    tx: mpsc::UnboundedSender<BridgeEvent>,
}

impl ChannelEventSink {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<BridgeEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    fn forward(&self, event: BridgeEvent) {
        let _ = self.tx.send(event);
    }
}

impl EventSink for ChannelEventSink {
    fn on_catalog_ready(&self, products: &[ProductDescription]) {
        self.forward(BridgeEvent::CatalogReady(products.to_vec()));
    }

    fn on_transaction_status_updated(&self, outcome: &TransactionOutcome) {
        self.forward(BridgeEvent::TransactionStatusUpdated(outcome.clone()));
    }

    fn on_transaction_closed(&self, product_id: &ProductId, transaction_id: &TransactionId) {
        self.forward(BridgeEvent::TransactionClosed {
            product_id: product_id.clone(),
            transaction_id: transaction_id.clone(),
        });
    }
}
