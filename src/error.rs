use thiserror::Error;

#[derive(Error, Debug)]
pub enum BillingError {
    #[error("Billing setup failed: {0}")]
    SetupFailed(String),
    #[error("Purchasing is disabled until billing setup succeeds")]
    PurchasingDisabled,
    #[error("Purchase cancelled by the user")]
    UserCancelled,
    #[error("Product {0} is already owned")]
    AlreadyOwned(String),
    #[error("Billing provider failure: {0}")]
    ProviderFailure(String),
    #[error("Precondition violated: {0}")]
    PreconditionViolation(String),
    #[error("Catalog request was cancelled")]
    RequestCancelled,
    #[error("Billing coordinator is no longer running")]
    CoordinatorClosed,
    #[error("Invalid command: {0}")]
    InvalidCommand(String),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, BillingError>;
