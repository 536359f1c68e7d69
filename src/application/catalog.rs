use crate::domain::outcome::{CatalogOutcome, CatalogSource};
use crate::domain::ports::ProviderResult;
use crate::domain::product::{CatalogSnapshot, ProductId};
use std::collections::HashSet;
use std::time::Duration;
use tracing::{debug, warn};

/// Holds the last successfully fetched catalog.
#[derive(Debug, Default)]
pub struct CatalogCache {
    snapshot: Option<CatalogSnapshot>,
    ttl: Option<Duration>,
}

impl CatalogCache {
    pub fn new(ttl: Option<Duration>) -> Self {
        Self {
            snapshot: None,
            ttl,
        }
    }

    /// The cached snapshot, if it may still be served.
    pub fn fresh(&self) -> Option<&CatalogSnapshot> {
        self.snapshot.as_ref().filter(|s| s.is_fresh(self.ttl))
    }

    pub fn replace(&mut self, snapshot: CatalogSnapshot) {
        self.snapshot = Some(snapshot);
    }

    pub fn invalidate(&mut self) {
        if let Some(snapshot) = self.snapshot.as_mut() {
            snapshot.mark_stale();
        }
    }
}

/// What the caller of [`CatalogQueryCoordinator::request`] must do next.
#[derive(Debug)]
pub enum CatalogStep<W> {
    /// The request joined the query already in flight.
    Joined,
    /// Answered from the cache; deliver `outcome` to the waiter now.
    Cached(CatalogOutcome, W),
    /// Start a provider query for these ids.
    Query(Vec<ProductId>),
}

/// Result of an in-flight query reaching completion.
#[derive(Debug)]
pub enum CatalogCompletion<W> {
    Delivered(CatalogOutcome, Vec<W>),
    /// The query was cancelled and nobody asked again; nothing is delivered.
    Discarded(Vec<W>),
}

#[derive(Debug)]
struct InFlightQuery<W> {
    ids: Vec<ProductId>,
    cancel_requested: bool,
    waiters: Vec<W>,
}

/// Coalesces catalog requests into at most one in-flight provider query.
///
/// `W` is whatever the caller uses to answer a request, typically a reply
/// channel. The coordinator never answers waiters itself; it hands them back
/// together with the outcome they should receive.
#[derive(Debug)]
pub struct CatalogQueryCoordinator<W> {
    cache: CatalogCache,
    in_flight: Option<InFlightQuery<W>>,
}

impl<W> CatalogQueryCoordinator<W> {
    pub fn new(cache: CatalogCache) -> Self {
        Self {
            cache,
            in_flight: None,
        }
    }

    pub fn is_query_in_flight(&self) -> bool {
        self.in_flight.is_some()
    }

    pub fn request(&mut self, ids: Vec<ProductId>, waiter: W) -> CatalogStep<W> {
        let ids = dedup(ids);

        if let Some(query) = self.in_flight.as_mut() {
            if query.cancel_requested {
                debug!("catalog request revokes pending cancellation");
                query.cancel_requested = false;
            } else {
                debug!(waiters = query.waiters.len() + 1, "catalog request joined in-flight query");
            }
            // The most recent caller's ids shape the shared result.
            query.ids = ids;
            query.waiters.push(waiter);
            return CatalogStep::Joined;
        }

        // Ids missing from a fresh snapshot are not fetched.
        if let Some(snapshot) = self.cache.fresh() {
            debug!("catalog request served from cache");
            let outcome = CatalogOutcome {
                products: snapshot.describe(&ids),
                source: CatalogSource::Cache,
            };
            return CatalogStep::Cached(outcome, waiter);
        }

        self.in_flight = Some(InFlightQuery {
            ids: ids.clone(),
            cancel_requested: false,
            waiters: vec![waiter],
        });
        CatalogStep::Query(ids)
    }

    /// Flags the in-flight query as cancelled. Returns `false` when there is none.
    pub fn cancel(&mut self) -> bool {
        match self.in_flight.as_mut() {
            Some(query) => {
                query.cancel_requested = true;
                true
            }
            None => false,
        }
    }

    pub fn complete(&mut self, result: ProviderResult<CatalogSnapshot>) -> CatalogCompletion<W> {
        let Some(query) = self.in_flight.take() else {
            warn!("inventory query completed with no request in flight");
            return CatalogCompletion::Discarded(Vec::new());
        };

        if query.cancel_requested {
            debug!(waiters = query.waiters.len(), "discarding cancelled catalog query");
            return CatalogCompletion::Discarded(query.waiters);
        }

        let outcome = match result {
            Ok(snapshot) => {
                let products = snapshot.describe(&query.ids);
                self.cache.replace(snapshot);
                CatalogOutcome {
                    products,
                    source: CatalogSource::Provider,
                }
            }
            Err(err) => {
                warn!(error = %err, "cannot query billing inventory");
                CatalogOutcome {
                    products: Vec::new(),
                    source: CatalogSource::ProviderFailed(err.to_string()),
                }
            }
        };
        CatalogCompletion::Delivered(outcome, query.waiters)
    }

    pub fn invalidate(&mut self) {
        self.cache.invalidate();
    }
}

fn dedup(ids: Vec<ProductId>) -> Vec<ProductId> {
    let mut seen = HashSet::new();
    ids.into_iter().filter(|id| seen.insert(id.clone())).collect()
}
