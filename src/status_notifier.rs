//! # Outbound Status Notifier
//!
//! Tells a customer when staff move their order to a new status. The order
//! ledger announces changes (Postgres `NOTIFY` on the order status channel);
//! the notifier loads the order, finds the verified contact with the same
//! phone line and messages them. No matching contact, or no transport
//! configured, is a silent no-op.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use sqlx::postgres::PgListener;
use teloxide::utils::html;
use tracing::{debug, error, info, warn};

use crate::localization::{t_args_lang, t_lang};
use crate::model::CustomerId;
use crate::store::{ContactRegistry, OrderLedger};
use crate::transport::Transport;

/// What happened to one status change notification
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotifyOutcome {
    Sent { customer_id: CustomerId },
    /// No bot credential configured
    NoTransport,
    OrderNotFound,
    /// Nobody verified the order's phone number
    NoVerifiedContact,
}

pub struct StatusNotifier {
    transport: Option<Arc<dyn Transport>>,
    ledger: Arc<dyn OrderLedger>,
    contacts: Arc<dyn ContactRegistry>,
    country_code: String,
    /// Reply language; the ledger does not record the customer's client language
    language: Option<String>,
}

impl StatusNotifier {
    pub fn new(
        transport: Option<Arc<dyn Transport>>,
        ledger: Arc<dyn OrderLedger>,
        contacts: Arc<dyn ContactRegistry>,
        country_code: impl Into<String>,
    ) -> Self {
        Self {
            transport,
            ledger,
            contacts,
            country_code: country_code.into(),
            language: None,
        }
    }

    /// Send notifications in `language` instead of the process default
    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = Some(language.into());
        self
    }

    /// Message the owner of `order_id` about its current status
    pub async fn notify_status_change(&self, order_id: &str) -> Result<NotifyOutcome> {
        let Some(transport) = &self.transport else {
            debug!(order_id, "No transport configured, skipping status notification");
            return Ok(NotifyOutcome::NoTransport);
        };

        let Some(order) = self
            .ledger
            .find_order(order_id)
            .await
            .with_context(|| format!("Failed to load order {order_id}"))?
        else {
            warn!(order_id, "Status changed for an unknown order");
            return Ok(NotifyOutcome::OrderNotFound);
        };

        let Some(contact) = self
            .contacts
            .find_contact_by_phone(&order.customer_phone, &self.country_code)
            .await
            .context("Failed to look up verified contact")?
        else {
            debug!(order_id, "No verified contact for order phone");
            return Ok(NotifyOutcome::NoVerifiedContact);
        };

        let language = self.language.as_deref();
        let status = t_lang(order.status.label_key(), language);
        let text = t_args_lang(
            "status-changed",
            &[("order_id", &html::escape(&order.id)), ("status", &status)],
            language,
        );
        transport
            .send_text(contact.customer_id, &text, None)
            .await
            .with_context(|| format!("Failed to notify customer {}", contact.customer_id))?;

        info!(order_id, customer_id = contact.customer_id, status = %order.status, "Customer notified of status change");
        Ok(NotifyOutcome::Sent {
            customer_id: contact.customer_id,
        })
    }

    /// Notify for every order id received on the listener until it is closed
    pub async fn run(self, mut listener: PgListener) {
        info!("Status notifier started");
        loop {
            match listener.recv().await {
                Ok(notification) => {
                    let order_id = notification.payload();
                    if let Err(e) = self.notify_status_change(order_id).await {
                        error!(order_id, error = %format!("{e:#}"), "Status notification failed");
                    }
                }
                Err(sqlx::Error::PoolClosed) => {
                    info!("Status listener closed");
                    break;
                }
                Err(e) => {
                    warn!(error = %e, "Status listener error, retrying");
                    tokio::time::sleep(Duration::from_secs(1)).await;
                }
            }
        }
    }
}
