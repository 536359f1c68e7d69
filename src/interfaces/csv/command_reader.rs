use crate::domain::product::ProductId;
use crate::domain::purchase::{PurchaseKind, TransactionId};
use crate::error::{BillingError, Result};
use crate::interfaces::script::ScriptCommand;
use serde::Deserialize;
use std::io::Read;

/// Separator for list-valued fields (`sword;shield`).
const LIST_SEPARATOR: char = ';';

#[derive(Debug, Deserialize, PartialEq, Clone, Copy)]
#[serde(rename_all = "snake_case")]
enum Operation {
    Setup,
    Catalog,
    CancelCatalog,
    InvalidateCatalog,
    Purchase,
    Close,
    RestoreManaged,
    RestoreConsumables,
    RestoreAllManaged,
    RefreshHistory,
}

#[derive(Debug, Deserialize)]
struct CommandRow {
    op: Operation,
    product: Option<String>,
    kind: Option<String>,
    transaction: Option<String>,
}

impl TryFrom<CommandRow> for ScriptCommand {
    type Error = BillingError;

    fn try_from(row: CommandRow) -> Result<Self> {
        let command = match row.op {
            Operation::Setup => ScriptCommand::Setup,
            Operation::Catalog => ScriptCommand::RequestCatalog(
                split_list(row.product.as_deref()).map(ProductId::from).collect(),
            ),
            Operation::CancelCatalog => ScriptCommand::CancelCatalogRequest,
            Operation::InvalidateCatalog => ScriptCommand::InvalidateCatalog,
            Operation::Purchase => ScriptCommand::Purchase {
                product_id: required(row.product, "product")?.into(),
                kind: required(row.kind, "kind")?.parse()?,
            },
            Operation::Close => ScriptCommand::CloseTransaction {
                product_id: required(row.product, "product")?.into(),
                transaction_id: required(row.transaction, "transaction")?.into(),
            },
            Operation::RestoreManaged => ScriptCommand::RestoreManaged(
                split_list(row.transaction.as_deref())
                    .map(TransactionId::from)
                    .collect(),
            ),
            Operation::RestoreConsumables => ScriptCommand::RestoreAllConsumables,
            Operation::RestoreAllManaged => ScriptCommand::RestoreAllManaged,
            Operation::RefreshHistory => ScriptCommand::RefreshPurchaseHistory,
        };
        Ok(command)
    }
}

fn required(field: Option<String>, name: &str) -> Result<String> {
    field.ok_or_else(|| BillingError::InvalidCommand(format!("missing {name}")))
}

fn split_list(field: Option<&str>) -> impl Iterator<Item = &str> {
    field
        .unwrap_or_default()
        .split(LIST_SEPARATOR)
        .map(str::trim)
        .filter(|item| !item.is_empty())
}

/// Reads a command script from a CSV source.
///
/// Columns are `op, product, kind, transaction`; unused columns may be left
/// empty. Whitespace is trimmed and short records are accepted.
pub struct CommandReader<R: Read> {
    reader: csv::Reader<R>,
}

impl<R: Read> CommandReader<R> {
    pub fn new(source: R) -> Self {
        let reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(source);
        Self { reader }
    }

    /// Lazily reads and validates commands, one result per record.
    pub fn commands(self) -> impl Iterator<Item = Result<ScriptCommand>> {
        self.reader.into_deserialize().map(|result| {
            let row: CommandRow = result?;
            ScriptCommand::try_from(row)
        })
    }
}
