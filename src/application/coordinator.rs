use super::catalog::{CatalogCache, CatalogCompletion, CatalogQueryCoordinator, CatalogStep};
use super::purchase::PurchaseFlowController;
use super::registry::{CloseAction, TransactionRegistry};
use super::restore::{Replay, RestoreReconciler};
use crate::config::CoordinatorConfig;
use crate::domain::outcome::{CatalogOutcome, CloseResult, TransactionOutcome, TransactionStatus};
use crate::domain::ports::{
    BillingProviderRef, EventSinkRef, ProviderResult, PurchaseRequest, PurchaseResult,
};
use crate::domain::product::{CatalogSnapshot, ProductId};
use crate::domain::purchase::{PurchaseKind, PurchaseRecord, TransactionId};
use crate::error::{BillingError, Result};
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, warn};

type Responder<T> = oneshot::Sender<Result<T>>;

/// Pending answer to a coordinator call.
///
/// The command is queued as soon as the call is made; awaiting the reply only
/// waits for its answer. Resolves to [`BillingError::CoordinatorClosed`] if the
/// coordinator stops before answering.
#[must_use = "the reply carries the result of the call"]
pub struct Reply<T> {
    rx: oneshot::Receiver<Result<T>>,
}

impl<T> Future for Reply<T> {
    type Output = Result<T>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.rx)
            .poll(cx)
            .map(|received| received.unwrap_or(Err(BillingError::CoordinatorClosed)))
    }
}

enum Command {
    Setup {
        public_key: String,
        reply: Responder<()>,
    },
    RequestCatalog {
        ids: Vec<ProductId>,
        reply: Responder<CatalogOutcome>,
    },
    CancelCatalogRequest,
    InvalidateCatalog,
    Purchase {
        product_id: ProductId,
        kind: PurchaseKind,
        reply: Responder<TransactionOutcome>,
    },
    CloseTransaction {
        product_id: ProductId,
        transaction_id: TransactionId,
        reply: Responder<CloseResult>,
    },
    RestoreManaged {
        pending_ids: Vec<TransactionId>,
        reply: Responder<Vec<TransactionOutcome>>,
    },
    RestoreAllConsumables {
        reply: Responder<Vec<TransactionOutcome>>,
    },
    RestoreAllManaged {
        reply: Responder<Vec<TransactionOutcome>>,
    },
    RefreshPurchaseHistory {
        reply: Responder<usize>,
    },
    IsPurchasingEnabled {
        reply: Responder<bool>,
    },
    PendingTransactions {
        reply: Responder<Vec<PurchaseRecord>>,
    },
    Shutdown {
        reply: Responder<Vec<PurchaseRecord>>,
    },
}

/// Provider calls finishing on their own tasks.
enum Completion {
    SetupFinished {
        result: ProviderResult<()>,
        reply: Responder<()>,
    },
    InventoryQueried {
        catalog: ProviderResult<CatalogSnapshot>,
        history: Option<ProviderResult<Vec<PurchaseRecord>>>,
    },
    PurchaseFinished {
        product_id: ProductId,
        kind: PurchaseKind,
        result: PurchaseResult,
        reply: Responder<TransactionOutcome>,
    },
    ConsumeFinished {
        product_id: ProductId,
        record: PurchaseRecord,
        result: ProviderResult<()>,
        reply: Responder<CloseResult>,
    },
    HistoryFetched {
        result: ProviderResult<Vec<PurchaseRecord>>,
        reply: Responder<usize>,
    },
}

enum Message {
    Command(Command),
    Completion(Completion),
}

/// Handle to the purchase-transaction coordinator.
///
/// All state lives in a single task; every provider result is posted back to
/// that task, so catalog, registry and history are only ever touched serially.
/// Handles are cheap to clone. The task stops on [`shutdown`](Self::shutdown)
/// or once every handle and outstanding provider call is gone.
#[derive(Clone)]
pub struct BillingCoordinator {
    mailbox: mpsc::UnboundedSender<Message>,
}

impl BillingCoordinator {
    /// Starts the coordinator task on the current tokio runtime.
    pub fn spawn(
        provider: BillingProviderRef,
        sink: EventSinkRef,
        config: CoordinatorConfig,
    ) -> Self {
        let (mailbox, inbox) = mpsc::unbounded_channel();
        let actor = CoordinatorActor {
            provider,
            sink,
            catalog: CatalogQueryCoordinator::new(CatalogCache::new(config.catalog_ttl())),
            registry: TransactionRegistry::new(),
            history: None,
            purchasing_enabled: false,
            config,
            mailbox: mailbox.downgrade(),
        };
        tokio::spawn(actor.run(inbox));
        Self { mailbox }
    }

    fn call<T>(&self, command: impl FnOnce(Responder<T>) -> Command) -> Reply<T> {
        let (reply, rx) = oneshot::channel();
        if self
            .mailbox
            .send(Message::Command(command(reply)))
            .is_err()
        {
            debug!("billing coordinator is not running");
        }
        Reply { rx }
    }

    fn notify(&self, command: Command) {
        if self.mailbox.send(Message::Command(command)).is_err() {
            debug!("billing coordinator is not running");
        }
    }

    /// Initialises the provider. Purchasing stays disabled until this succeeds.
    pub fn setup(&self, public_key: impl Into<String>) -> Reply<()> {
        let public_key = public_key.into();
        self.call(|reply| Command::Setup { public_key, reply })
    }

    pub fn is_purchasing_enabled(&self) -> Reply<bool> {
        self.call(|reply| Command::IsPurchasingEnabled { reply })
    }

    /// Requests descriptions for `ids`.
    ///
    /// Served from the cache while it is fresh, otherwise joins the in-flight
    /// query or starts one. A failed provider query yields an empty list with
    /// [`CatalogSource::ProviderFailed`](crate::domain::outcome::CatalogSource::ProviderFailed).
    ///
    /// A cache hit only describes ids the cached query asked for; call
    /// [`invalidate_catalog`](Self::invalidate_catalog) before requesting others.
    pub fn request_catalog<I, P>(&self, ids: I) -> Reply<CatalogOutcome>
    where
        I: IntoIterator<Item = P>,
        P: Into<ProductId>,
    {
        let ids = ids.into_iter().map(Into::into).collect();
        self.call(|reply| Command::RequestCatalog { ids, reply })
    }

    /// Discards the in-flight catalog result unless another request arrives first.
    pub fn cancel_catalog_request(&self) {
        self.notify(Command::CancelCatalogRequest);
    }

    /// Forces the next catalog request to query the provider.
    pub fn invalidate_catalog(&self) {
        self.notify(Command::InvalidateCatalog);
    }

    pub fn purchase(&self, product_id: impl Into<ProductId>, kind: PurchaseKind) -> Reply<TransactionOutcome> {
        let product_id = product_id.into();
        self.call(|reply| Command::Purchase {
            product_id,
            kind,
            reply,
        })
    }

    /// Closes an open transaction, consuming it first if it is a consumable.
    ///
    /// A closed event is emitted even if the transaction is unknown or the
    /// provider fails to consume it.
    pub fn close_transaction(
        &self,
        product_id: impl Into<ProductId>,
        transaction_id: impl Into<TransactionId>,
    ) -> Reply<CloseResult> {
        let product_id = product_id.into();
        let transaction_id = transaction_id.into();
        self.call(|reply| Command::CloseTransaction {
            product_id,
            transaction_id,
            reply,
        })
    }

    pub fn restore_managed<I, T>(&self, pending_ids: I) -> Reply<Vec<TransactionOutcome>>
    where
        I: IntoIterator<Item = T>,
        T: Into<TransactionId>,
    {
        let pending_ids = pending_ids.into_iter().map(Into::into).collect();
        self.call(|reply| Command::RestoreManaged { pending_ids, reply })
    }

    pub fn restore_all_consumables(&self) -> Reply<Vec<TransactionOutcome>> {
        self.call(|reply| Command::RestoreAllConsumables { reply })
    }

    /// Fails with [`BillingError::PreconditionViolation`] until a purchase
    /// history has been fetched.
    pub fn restore_all_managed(&self) -> Reply<Vec<TransactionOutcome>> {
        self.call(|reply| Command::RestoreAllManaged { reply })
    }

    /// Fetches the purchase history; resolves to the number of purchases.
    pub fn refresh_purchase_history(&self) -> Reply<usize> {
        self.call(|reply| Command::RefreshPurchaseHistory { reply })
    }

    pub fn pending_transactions(&self) -> Reply<Vec<PurchaseRecord>> {
        self.call(|reply| Command::PendingTransactions { reply })
    }

    /// Stops the coordinator, returning the transactions still open.
    pub fn shutdown(&self) -> Reply<Vec<PurchaseRecord>> {
        self.call(|reply| Command::Shutdown { reply })
    }
}

struct CoordinatorActor {
    provider: BillingProviderRef,
    sink: EventSinkRef,
    config: CoordinatorConfig,
    catalog: CatalogQueryCoordinator<Responder<CatalogOutcome>>,
    registry: TransactionRegistry,
    /// Purchase history from the last successful fetch.
    history: Option<Vec<PurchaseRecord>>,
    purchasing_enabled: bool,
    mailbox: mpsc::WeakUnboundedSender<Message>,
}

impl CoordinatorActor {
    async fn run(mut self, mut inbox: mpsc::UnboundedReceiver<Message>) {
        debug!("billing coordinator started");
        while let Some(message) = inbox.recv().await {
            match message {
                Message::Command(Command::Shutdown { reply }) => {
                    let _ = reply.send(Ok(self.registry.records()));
                    break;
                }
                Message::Command(command) => self.handle_command(command),
                Message::Completion(completion) => self.handle_completion(completion),
            }
        }
        debug!(pending = self.registry.len(), "billing coordinator stopped");
    }

    fn handle_command(&mut self, command: Command) {
        match command {
            Command::Setup { public_key, reply } => self.setup(public_key, reply),
            Command::RequestCatalog { ids, reply } => self.request_catalog(ids, reply),
            Command::CancelCatalogRequest => {
                if !self.catalog.cancel() {
                    debug!("no catalog request in flight to cancel");
                }
            }
            Command::InvalidateCatalog => self.catalog.invalidate(),
            Command::Purchase {
                product_id,
                kind,
                reply,
            } => self.purchase(product_id, kind, reply),
            Command::CloseTransaction {
                product_id,
                transaction_id,
                reply,
            } => self.close_transaction(product_id, transaction_id, reply),
            Command::RestoreManaged { pending_ids, reply } => {
                let replays = RestoreReconciler::new(self.history.as_deref())
                    .restore_managed(&pending_ids);
                let _ = reply.send(Ok(self.replay(replays)));
            }
            Command::RestoreAllConsumables { reply } => {
                let replays =
                    RestoreReconciler::new(self.history.as_deref()).restore_all_consumables();
                let _ = reply.send(Ok(self.replay(replays)));
            }
            Command::RestoreAllManaged { reply } => {
                let restored =
                    RestoreReconciler::new(self.history.as_deref()).restore_all_managed();
                match restored {
                    Ok(replays) => {
                        let _ = reply.send(Ok(self.replay(replays)));
                    }
                    Err(err) => {
                        error!(error = %err, "cannot restore managed purchases");
                        let _ = reply.send(Err(err));
                    }
                }
            }
            Command::RefreshPurchaseHistory { reply } => {
                let provider = self.provider.clone();
                self.spawn_provider_call(async move {
                    let result = provider.fetch_purchase_history().await;
                    Completion::HistoryFetched { result, reply }
                });
            }
            Command::IsPurchasingEnabled { reply } => {
                let _ = reply.send(Ok(self.purchasing_enabled));
            }
            Command::PendingTransactions { reply } => {
                let _ = reply.send(Ok(self.registry.records()));
            }
            // Handled by the run loop.
            Command::Shutdown { .. } => {}
        }
    }

    fn handle_completion(&mut self, completion: Completion) {
        match completion {
            Completion::SetupFinished { result, reply } => match result {
                Ok(()) => {
                    info!("billing provider ready, purchasing enabled");
                    self.purchasing_enabled = true;
                    let _ = reply.send(Ok(()));
                }
                Err(err) => {
                    error!(error = %err, "cannot set up billing provider");
                    self.purchasing_enabled = false;
                    let _ = reply.send(Err(BillingError::SetupFailed(err.to_string())));
                }
            },
            Completion::InventoryQueried { catalog, history } => {
                self.inventory_queried(catalog, history)
            }
            Completion::PurchaseFinished {
                product_id,
                kind,
                result,
                reply,
            } => self.purchase_finished(product_id, kind, result, reply),
            Completion::ConsumeFinished {
                product_id,
                record,
                result,
                reply,
            } => {
                let close = match result {
                    Ok(()) => {
                        self.forget_purchase(&record.transaction_id);
                        CloseResult::Consumed
                    }
                    Err(err) => {
                        warn!(
                            product_id = %record.product_id,
                            transaction_id = %record.transaction_id,
                            error = %err,
                            "billing consume error"
                        );
                        CloseResult::ConsumeFailed
                    }
                };
                self.finish_close(&product_id, &record.transaction_id, close, reply);
            }
            Completion::HistoryFetched { result, reply } => match result {
                Ok(history) => {
                    let count = history.len();
                    self.history = Some(history);
                    let _ = reply.send(Ok(count));
                }
                Err(err) => {
                    warn!(error = %err, "cannot fetch purchase history");
                    let _ = reply.send(Err(BillingError::ProviderFailure(err.to_string())));
                }
            },
        }
    }

    fn setup(&mut self, public_key: String, reply: Responder<()>) {
        if self.purchasing_enabled {
            debug!("billing provider already set up");
            let _ = reply.send(Ok(()));
            return;
        }
        let provider = self.provider.clone();
        self.spawn_provider_call(async move {
            let result = provider.setup(&public_key).await;
            Completion::SetupFinished { result, reply }
        });
    }

    fn request_catalog(&mut self, ids: Vec<ProductId>, reply: Responder<CatalogOutcome>) {
        match self.catalog.request(ids, reply) {
            CatalogStep::Joined => {}
            CatalogStep::Cached(outcome, reply) => self.deliver_catalog(outcome, vec![reply]),
            CatalogStep::Query(ids) => {
                let provider = self.provider.clone();
                self.spawn_provider_call(async move {
                    let catalog = provider.query_inventory(&ids).await;
                    let history = match catalog {
                        Ok(_) => Some(provider.fetch_purchase_history().await),
                        Err(_) => None,
                    };
                    Completion::InventoryQueried { catalog, history }
                });
            }
        }
    }

    fn inventory_queried(
        &mut self,
        catalog: ProviderResult<CatalogSnapshot>,
        history: Option<ProviderResult<Vec<PurchaseRecord>>>,
    ) {
        match self.catalog.complete(catalog) {
            CatalogCompletion::Discarded(waiters) => {
                for waiter in waiters {
                    let _ = waiter.send(Err(BillingError::RequestCancelled));
                }
            }
            CatalogCompletion::Delivered(outcome, waiters) => {
                match history {
                    Some(Ok(history)) => self.history = Some(history),
                    Some(Err(err)) => warn!(error = %err, "cannot fetch purchase history"),
                    None => {}
                }
                self.deliver_catalog(outcome, waiters);
            }
        }
    }

    fn deliver_catalog(&self, outcome: CatalogOutcome, waiters: Vec<Responder<CatalogOutcome>>) {
        self.sink.on_catalog_ready(&outcome.products);
        for waiter in waiters {
            let _ = waiter.send(Ok(outcome.clone()));
        }
    }

    fn purchase(&mut self, product_id: ProductId, kind: PurchaseKind, reply: Responder<TransactionOutcome>) {
        if !self.purchasing_enabled {
            let _ = reply.send(Err(BillingError::PurchasingDisabled));
            return;
        }
        let request = PurchaseRequest {
            product_id: product_id.clone(),
            kind,
            request_token: self.config.request_token,
        };
        let provider = self.provider.clone();
        self.spawn_provider_call(async move {
            let result = provider.launch_purchase(request).await;
            Completion::PurchaseFinished {
                product_id,
                kind,
                result,
                reply,
            }
        });
    }

    fn purchase_finished(
        &mut self,
        product_id: ProductId,
        kind: PurchaseKind,
        result: PurchaseResult,
        reply: Responder<TransactionOutcome>,
    ) {
        let resolved = PurchaseFlowController::new(&self.registry, self.history.as_deref())
            .resolve(&product_id, kind, result);

        if let Some(record) = resolved.record {
            if resolved.outcome.status == TransactionStatus::Succeeded {
                self.remember_purchase(&record);
            }
            self.registry.add(record);
        }
        self.sink.on_transaction_status_updated(&resolved.outcome);
        let _ = reply.send(Ok(resolved.outcome));
    }

    fn close_transaction(
        &mut self,
        product_id: ProductId,
        transaction_id: TransactionId,
        reply: Responder<CloseResult>,
    ) {
        match self.registry.begin_close(&transaction_id) {
            CloseAction::Consume(record) => {
                let provider = self.provider.clone();
                self.spawn_provider_call(async move {
                    let result = provider.consume(&record).await;
                    Completion::ConsumeFinished {
                        product_id,
                        record,
                        result,
                        reply,
                    }
                });
            }
            CloseAction::Release(_) => {
                self.finish_close(&product_id, &transaction_id, CloseResult::Released, reply)
            }
            CloseAction::NotPending => {
                debug!(transaction_id = %transaction_id, "closing transaction that is not pending");
                self.finish_close(&product_id, &transaction_id, CloseResult::NotPending, reply)
            }
        }
    }

    fn finish_close(
        &self,
        product_id: &ProductId,
        transaction_id: &TransactionId,
        result: CloseResult,
        reply: Responder<CloseResult>,
    ) {
        self.sink.on_transaction_closed(product_id, transaction_id);
        let _ = reply.send(Ok(result));
    }

    /// Adds a new purchase to the fetched history unless a fetch already
    /// brought it in.
    fn remember_purchase(&mut self, record: &PurchaseRecord) {
        if let Some(history) = self.history.as_mut() {
            if !history
                .iter()
                .any(|r| r.transaction_id == record.transaction_id)
            {
                history.push(record.clone());
            }
        }
    }

    fn forget_purchase(&mut self, transaction_id: &TransactionId) {
        if let Some(history) = self.history.as_mut() {
            history.retain(|r| &r.transaction_id != transaction_id);
        }
    }

    fn replay(&mut self, replays: Vec<Replay>) -> Vec<TransactionOutcome> {
        replays
            .into_iter()
            .map(|Replay { outcome, record }| {
                self.registry.add(record);
                self.sink.on_transaction_status_updated(&outcome);
                outcome
            })
            .collect()
    }

    /// Runs a provider call on its own task and posts its completion back.
    fn spawn_provider_call<F>(&self, call: F)
    where
        F: Future<Output = Completion> + Send + 'static,
    {
        let Some(mailbox) = self.mailbox.upgrade() else {
            // Dropping `call` drops its responder, which resolves the caller's reply.
            debug!("no coordinator handles left, skipping provider call");
            return;
        };
        tokio::spawn(async move {
            let completion = call.await;
            if mailbox.send(Message::Completion(completion)).is_err() {
                debug!("billing coordinator stopped before provider call completed");
            }
        });
    }
}
