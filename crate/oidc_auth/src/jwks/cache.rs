//! JWKS cache of a single identity provider.
//!
//! The cache fetches the JWKS on first use, then keeps it fresh from a background
//! task that refreshes it at a fixed interval. Tokens signed with an unknown key ID
//! may request an immediate refresh, rate limited against the previous refreshes
//! requested the same way. A refreshed key set is
//! published by swapping a single `Arc`, so readers never see a partially updated set.

use std::{
    sync::{Arc, Mutex, PoisonError, RwLock, Weak},
    time::Duration,
};

use reqwest::Client;
use serde_json::Value;
use tokio::{
    sync::{Mutex as AsyncMutex, mpsc, oneshot},
    task::JoinHandle,
    time::{self, Instant, MissedTickBehavior},
};
use tracing::{debug, info, trace, warn};

use super::KeySet;
use crate::{
    config::{DEFAULT_JWKS_REFRESH_INTERVAL, JwksCacheParams},
    error::VerificationError,
    result::{VResult, VResultHelper},
};

/// Bookkeeping of the refreshes, guarded by the writer lock
#[derive(Debug, Default)]
struct RefreshState {
    // failed attempts count as well; the initial fetch and the scheduled refreshes do not
    last_unknown_kid_refresh: Option<Instant>,
}

impl RefreshState {
    /// The instant before which a new unknown-kid refresh is not allowed
    fn rate_limited_until(&self, rate_limit: Duration) -> Option<Instant> {
        self.last_unknown_kid_refresh
            .map(|last| last + rate_limit)
            .filter(|until| *until > Instant::now())
    }
}

struct BackgroundRefresh {
    shutdown: oneshot::Sender<()>,
    deferred: mpsc::Sender<Instant>,
    handle: JoinHandle<()>,
}

enum Background {
    NotStarted,
    Running(BackgroundRefresh),
    Stopped,
}

pub struct KeySetCache {
    jwks_uri: String,
    params: JwksCacheParams,
    client: Client,
    current: RwLock<Option<Arc<KeySet>>>,
    // serializes the writers of `current`
    refresh_state: AsyncMutex<RefreshState>,
    background: Mutex<Background>,
}

impl KeySetCache {
    /// Create an empty cache. Nothing is fetched until `ensure_fresh` is called.
    ///
    /// A zero refresh interval is replaced by the default one.
    #[must_use]
    pub fn new(
        jwks_uri: impl Into<String>,
        mut params: JwksCacheParams,
        client: Client,
    ) -> Arc<Self> {
        let jwks_uri = jwks_uri.into();
        if params.refresh_interval.is_zero() {
            warn!(
                "zero JWKS refresh interval for {jwks_uri}, using {DEFAULT_JWKS_REFRESH_INTERVAL}s"
            );
            params.refresh_interval = Duration::from_secs(DEFAULT_JWKS_REFRESH_INTERVAL);
        }
        Arc::new(Self {
            jwks_uri,
            params,
            client,
            current: RwLock::new(None),
            refresh_state: AsyncMutex::new(RefreshState::default()),
            background: Mutex::new(Background::NotStarted),
        })
    }

    #[must_use]
    pub fn jwks_uri(&self) -> &str {
        &self.jwks_uri
    }

    #[must_use]
    pub const fn params(&self) -> &JwksCacheParams {
        &self.params
    }

    /// The current key set, if one has been fetched
    #[must_use]
    pub fn snapshot(&self) -> Option<Arc<KeySet>> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn publish(&self, key_set: Arc<KeySet>) {
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = Some(key_set);
    }

    /// Return the current key set, fetching it first if the cache is empty.
    ///
    /// The first successful fetch starts the scheduled background refresh.
    /// A failed fetch leaves the cache empty: the next call tries again.
    pub async fn ensure_fresh(self: &Arc<Self>) -> VResult<Arc<KeySet>> {
        if let Some(key_set) = self.snapshot() {
            return Ok(key_set)
        }

        let mut state = self.refresh_state.lock().await;
        // another caller may have populated the cache while we were waiting for the lock
        if let Some(key_set) = self.snapshot() {
            return Ok(key_set)
        }
        let key_set = self.fetch_and_publish(&mut state).await?;
        drop(state);

        self.start_background_refresh();
        Ok(key_set)
    }

    /// Only called with the writer lock held
    async fn fetch_and_publish(&self, _writer: &mut RefreshState) -> VResult<Arc<KeySet>> {
        let key_set = Arc::new(
            fetch_key_set(&self.client, &self.jwks_uri, self.params.fetch_timeout).await?,
        );
        info!(
            "Refreshed JWKS from {}: key IDs {:?}",
            self.jwks_uri,
            key_set.kids()
        );
        self.publish(key_set.clone());
        Ok(key_set)
    }

    /// Fetch the JWKS again and publish it, whatever the time of the last refresh
    pub async fn refresh(&self) -> VResult<Arc<KeySet>> {
        let mut state = self.refresh_state.lock().await;
        self.fetch_and_publish(&mut state).await
    }

    /// Run the unknown-kid refresh deferred to the end of the rate limit window
    async fn refresh_deferred(&self) -> VResult<()> {
        let mut state = self.refresh_state.lock().await;
        if state
            .rate_limited_until(self.params.refresh_rate_limit)
            .is_some()
        {
            trace!("deferred JWKS refresh of {} skipped: refreshed recently", self.jwks_uri);
            return Ok(())
        }
        state.last_unknown_kid_refresh = Some(Instant::now());
        self.fetch_and_publish(&mut state).await.map(|_| ())
    }

    /// Refresh requested because a token names a key ID absent from `seen`.
    ///
    /// Returns the key set the lookup must be retried against:
    /// - the set published by a concurrent refresh, if any happened after `seen` was read;
    /// - a freshly fetched set, if refreshes on unknown key IDs are enabled and none happened
    ///   during the rate limit window;
    /// - the current set otherwise. When rate limited, a single deferred refresh is queued
    ///   on the background task for the end of the window.
    ///
    /// A failed refresh is passed to the refresh error handler and the current set is returned.
    pub async fn refresh_for_unknown_kid(&self, seen: &Arc<KeySet>) -> Arc<KeySet> {
        let mut state = self.refresh_state.lock().await;
        let current = self.snapshot().unwrap_or_else(|| seen.clone());

        if !Arc::ptr_eq(&current, seen) {
            debug!("JWKS of {} refreshed concurrently, retrying the lookup", self.jwks_uri);
            return current
        }
        if !self.params.refresh_unknown_kid {
            return current
        }
        if let Some(until) = state.rate_limited_until(self.params.refresh_rate_limit) {
            debug!(
                "JWKS refresh of {} rate limited, queuing a deferred refresh",
                self.jwks_uri
            );
            self.queue_deferred_refresh(until);
            return current
        }

        state.last_unknown_kid_refresh = Some(Instant::now());
        match self.fetch_and_publish(&mut state).await {
            Ok(key_set) => key_set,
            Err(e) => {
                (self.params.refresh_error_handler)(&e);
                current
            }
        }
    }

    fn queue_deferred_refresh(&self, at: Instant) {
        let background = self.background.lock().unwrap_or_else(PoisonError::into_inner);
        if let Background::Running(running) = &*background {
            // a full queue means a deferred refresh is already pending
            let _ = running.deferred.try_send(at);
        }
    }

    fn start_background_refresh(self: &Arc<Self>) {
        let mut background = self.background.lock().unwrap_or_else(PoisonError::into_inner);
        if !matches!(*background, Background::NotStarted) {
            return
        }
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let (deferred_tx, deferred_rx) = mpsc::channel(1);
        let handle = tokio::spawn(refresh_loop(
            Arc::downgrade(self),
            self.params.refresh_interval,
            shutdown_rx,
            deferred_rx,
        ));
        debug!(
            "started background JWKS refresh of {} every {:?}",
            self.jwks_uri, self.params.refresh_interval
        );
        *background = Background::Running(BackgroundRefresh {
            shutdown: shutdown_tx,
            deferred: deferred_tx,
            handle,
        });
    }

    /// Whether the scheduled refresh task is running
    #[must_use]
    pub fn is_refreshing_in_background(&self) -> bool {
        matches!(
            &*self.background.lock().unwrap_or_else(PoisonError::into_inner),
            Background::Running(running) if !running.handle.is_finished()
        )
    }

    /// Stop the background refresh task.
    ///
    /// Idempotent: tearing down an already stopped cache is a no-op.
    /// The current key set stays readable; no background refresh is ever started again.
    pub fn teardown(&self) {
        let previous = std::mem::replace(
            &mut *self.background.lock().unwrap_or_else(PoisonError::into_inner),
            Background::Stopped,
        );
        if let Background::Running(running) = previous {
            // the task may already be gone
            let _ = running.shutdown.send(());
            running.handle.abort();
            debug!("stopped background JWKS refresh of {}", self.jwks_uri);
        }
    }
}

impl Drop for KeySetCache {
    fn drop(&mut self) {
        self.teardown();
    }
}

async fn refresh_loop(
    cache: Weak<KeySetCache>,
    interval: Duration,
    mut shutdown: oneshot::Receiver<()>,
    mut deferred: mpsc::Receiver<Instant>,
) {
    let mut ticker = time::interval_at(Instant::now() + interval, interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut pending: Option<Instant> = None;

    loop {
        let scheduled = tokio::select! {
            biased;
            _ = &mut shutdown => break,
            _ = ticker.tick() => true,
            Some(at) = deferred.recv(), if pending.is_none() => {
                pending = Some(at);
                continue
            }
            () = time::sleep_until(pending.unwrap_or_else(Instant::now)), if pending.is_some() => {
                pending = None;
                while deferred.try_recv().is_ok() {}
                false
            }
        };

        let Some(cache) = cache.upgrade() else {
            break
        };
        let refreshed = if scheduled {
            cache.refresh().await.map(|_| ())
        } else {
            cache.refresh_deferred().await
        };
        if let Err(e) = refreshed {
            (cache.params.refresh_error_handler)(&e);
        }
    }
}

/// Fetch a JWKS from the provided URI and parse it.
async fn fetch_key_set(client: &Client, jwks_uri: &str, timeout: Duration) -> VResult<KeySet> {
    debug!("fetching {jwks_uri}");
    let response = client
        .get(jwks_uri)
        .timeout(timeout)
        .send()
        .await
        .with_context(VerificationError::FetchFailure, || {
            format!("Failed to fetch JWKS from {jwks_uri}")
        })?
        .error_for_status()
        .with_context(VerificationError::FetchFailure, || {
            format!("Failed to fetch JWKS from {jwks_uri}")
        })?;
    let json_value = response
        .json::<Value>()
        .await
        .with_context(VerificationError::FetchFailure, || {
            format!("Failed to parse JWKS response from {jwks_uri}")
        })?;
    KeySet::from_jwks(jwks_uri, &json_value)
}
