use crate::error::Result;
use crate::infrastructure::channel_sink::BridgeEvent;
use serde::Serialize;
use std::io::Write;

#[derive(Debug, Serialize)]
struct EventRow<'a> {
    event: &'static str,
    status: &'static str,
    product: String,
    transaction: &'a str,
    receipt: String,
}

impl<'a> From<&'a BridgeEvent> for EventRow<'a> {
    fn from(event: &'a BridgeEvent) -> Self {
        match event {
            BridgeEvent::CatalogReady(products) => EventRow {
                event: "catalog",
                status: "ready",
                product: products
                    .iter()
                    .map(|p| p.id.as_str())
                    .collect::<Vec<_>>()
                    .join(";"),
                transaction: "",
                receipt: String::new(),
            },
            BridgeEvent::TransactionStatusUpdated(outcome) => EventRow {
                event: "status",
                status: outcome.status.as_str(),
                product: outcome.product_id.to_string(),
                transaction: outcome
                    .transaction_id
                    .as_ref()
                    .map(|id| id.as_str())
                    .unwrap_or_default(),
                receipt: outcome
                    .receipt
                    .as_ref()
                    .map(|r| r.to_json())
                    .unwrap_or_default(),
            },
            BridgeEvent::TransactionClosed {
                product_id,
                transaction_id,
            } => EventRow {
                event: "closed",
                status: "",
                product: product_id.to_string(),
                transaction: transaction_id.as_str(),
                receipt: String::new(),
            },
        }
    }
}

/// Writes bridge events as CSV (`event,status,product,transaction,receipt`).
pub struct EventWriter<W: Write> {
    writer: csv::Writer<W>,
}

impl<W: Write> EventWriter<W> {
    pub fn new(sink: W) -> Self {
        Self {
            writer: csv::Writer::from_writer(sink),
        }
    }

    pub fn write_events<'a>(&mut self, events: impl IntoIterator<Item = &'a BridgeEvent>) -> Result<()> {
        for event in events {
            self.writer.serialize(EventRow::from(event))?;
        }
        self.writer.flush()?;
        Ok(())
    }
}
