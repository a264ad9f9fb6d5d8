//! # Poll Loop
//!
//! One tick: expire idle wizards, fetch events after the cursor, load the
//! catalog snapshot, dispatch every event in order and advance the cursor
//! past each one. Ticks never overlap and a failing event never stops the
//! loop. Repeated fetch failures open the circuit breaker.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use chrono::Utc;
use tracing::{debug, error, info, warn};

use crate::bot::Storefront;
use crate::catalog::CatalogSnapshot;
use crate::circuit_breaker::CircuitBreaker;
use crate::config::BotConfig;
use crate::cursor::CursorTracker;
use crate::store::CatalogStore;
use crate::transport::Transport;

/// What a single tick did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// No new events
    Idle,
    Dispatched { events: usize, failed: usize },
    /// The transport could not be reached; the cursor is unchanged
    FetchFailed,
    /// The catalog could not be loaded; nothing was dispatched and the cursor is unchanged
    CatalogUnavailable,
    /// Too many recent fetch failures; the tick was skipped
    CircuitOpen,
}

pub struct Poller {
    transport: Arc<dyn Transport>,
    catalog: Arc<dyn CatalogStore>,
    storefront: Storefront,
    cursor: CursorTracker,
    breaker: CircuitBreaker,
    fetch_limit: u8,
    poll_interval: Duration,
}

impl Poller {
    pub fn new(
        transport: Arc<dyn Transport>,
        catalog: Arc<dyn CatalogStore>,
        storefront: Storefront,
        config: &BotConfig,
    ) -> Self {
        Self {
            transport,
            catalog,
            storefront,
            cursor: CursorTracker::new(),
            breaker: CircuitBreaker::new(config.recovery.clone()),
            fetch_limit: config.fetch_limit,
            poll_interval: config.poll_interval,
        }
    }

    pub fn storefront(&self) -> &Storefront {
        &self.storefront
    }

    pub fn cursor(&self) -> CursorTracker {
        self.cursor
    }

    /// Run one poll cycle
    pub async fn tick(&mut self) -> TickOutcome {
        self.storefront.expire_idle_sessions(Utc::now()).await;

        if self.breaker.is_open() {
            debug!("Circuit breaker open, skipping tick");
            return TickOutcome::CircuitOpen;
        }

        let events = match self
            .transport
            .fetch_events(self.cursor.next(), self.fetch_limit)
            .await
        {
            Ok(events) => {
                self.breaker.record_success();
                events
            }
            Err(e) => {
                self.breaker.record_failure();
                if e.is_transient() {
                    warn!(error = %e, failures = self.breaker.failure_count(), "Failed to fetch updates");
                } else {
                    error!(error = %e, failures = self.breaker.failure_count(), "Failed to fetch updates");
                }
                return TickOutcome::FetchFailed;
            }
        };

        // The transport may hand back events already dispatched
        let cursor = self.cursor.current();
        let events: Vec<_> = events.into_iter().filter(|e| e.id > cursor).collect();
        if events.is_empty() {
            return TickOutcome::Idle;
        }

        let snapshot = match CatalogSnapshot::load(self.catalog.as_ref()).await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                error!(error = %format!("{e:#}"), pending = events.len(), "Catalog unavailable, skipping dispatch");
                return TickOutcome::CatalogUnavailable;
            }
        };

        let mut failed = 0;
        for event in &events {
            if let Err(e) = self.storefront.dispatch(event, &snapshot).await {
                failed += 1;
                error!(update_id = event.id, error = %format!("{e:#}"), "Event handling failed");
            }
            self.cursor.advance(event.id);
        }

        debug!(events = events.len(), failed, cursor = self.cursor.current(), "Tick complete");
        TickOutcome::Dispatched {
            events: events.len(),
            failed,
        }
    }

    /// Tick until Ctrl-C
    pub async fn run(mut self) -> Result<()> {
        info!(interval = ?self.poll_interval, "Poll loop started");

        let shutdown = tokio::signal::ctrl_c();
        tokio::pin!(shutdown);
        let mut delay = Duration::ZERO;

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("Shutdown requested, stopping poll loop");
                    break;
                }
                _ = tokio::time::sleep(delay) => {}
            }

            delay = match self.tick().await {
                TickOutcome::FetchFailed => self.breaker.retry_delay(),
                _ => self.poll_interval,
            };
        }

        Ok(())
    }
}
