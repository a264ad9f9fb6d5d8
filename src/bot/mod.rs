//! Bot module: the conversational core of the storefront
//!
//! This module is split into several submodules:
//! - `message_handler`: text messages, shared contacts and unsupported messages
//! - `callback_handler`: button taps, decoded into [`crate::command::CallbackCommand`]
//! - `inline_handler`: inline search queries
//! - `dialogue_manager`: the order wizard and order finalization
//! - `ui_builder`: catalog navigation screens, keyboards and message formatting

pub mod callback_handler;
pub mod dialogue_manager;
pub mod inline_handler;
pub mod message_handler;
pub mod ui_builder;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use teloxide::types::ReplyMarkup;
use tracing::{debug, info, warn};

use crate::cart::CartStore;
use crate::catalog::CatalogSnapshot;
use crate::config::ShopSettings;
use crate::event::{EventKind, InboundEvent};
use crate::localization::t_lang;
use crate::model::ProductImage;
use crate::session::{ChatKey, SessionStore};
use crate::store::{ContactRegistry, OrderLedger};
use crate::transport::Transport;

pub use ui_builder::{ProductScreen, Screen};

use ui_builder::remove_keyboard;

/// Owns every piece of per-customer conversational state and routes each
/// inbound event to exactly one handler.
///
/// Carts and wizard sessions are plain fields: the poll loop is the only
/// caller and handles one event at a time through `&mut self`.
pub struct Storefront {
    transport: Arc<dyn Transport>,
    ledger: Arc<dyn OrderLedger>,
    contacts: Arc<dyn ContactRegistry>,
    settings: ShopSettings,
    carts: CartStore,
    sessions: SessionStore,
}

impl Storefront {
    pub fn new(
        transport: Arc<dyn Transport>,
        ledger: Arc<dyn OrderLedger>,
        contacts: Arc<dyn ContactRegistry>,
        settings: ShopSettings,
        session_ttl: Option<Duration>,
    ) -> Self {
        Self {
            transport,
            ledger,
            contacts,
            settings,
            carts: CartStore::new(),
            sessions: SessionStore::with_ttl(session_ttl),
        }
    }

    pub fn carts(&self) -> &CartStore {
        &self.carts
    }

    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    pub fn settings(&self) -> &ShopSettings {
        &self.settings
    }

    /// Handle one inbound event against this cycle's catalog snapshot
    pub async fn dispatch(&mut self, event: &InboundEvent, snapshot: &CatalogSnapshot) -> Result<()> {
        debug!(update_id = event.id, kind = event.kind_name(), "Dispatching event");

        match &event.kind {
            EventKind::InlineQuery {
                query_id,
                from,
                query,
            } => self.handle_inline_query(query_id, from, query, snapshot).await,
            EventKind::Callback {
                callback_id,
                from,
                chat_id,
                data,
            } => {
                // Buttons on inline results have no message; reply in the private chat
                let chat_id = chat_id.unwrap_or(from.id);
                self.handle_callback(callback_id, from, chat_id, data.as_deref(), snapshot)
                    .await
            }
            EventKind::Text {
                chat_id,
                from,
                text,
            } => {
                self.handle_text(*chat_id, from.as_ref(), text, snapshot)
                    .await
            }
            EventKind::Contact {
                chat_id,
                from,
                contact,
            } => {
                self.handle_contact(*chat_id, from.as_ref(), contact)
                    .await
            }
            EventKind::Unsupported { chat_id, from } => match chat_id {
                Some(chat_id) => self.handle_unsupported(*chat_id, from.as_ref()).await,
                None => {
                    debug!(update_id = event.id, "Skipping update without a chat");
                    Ok(())
                }
            },
        }
        .with_context(|| format!("Failed to handle {} update {}", event.kind_name(), event.id))
    }

    /// Drop wizards that have been idle too long and tell their customers
    pub async fn expire_idle_sessions(&mut self, now: DateTime<Utc>) -> Vec<ChatKey> {
        let expired = self.sessions.expire_idle(now);
        let mut chats = Vec::with_capacity(expired.len());
        for (chat_id, session) in expired {
            info!(chat_id, customer_id = session.customer_id, step = ?session.step, "Order wizard expired after inactivity");
            let text = t_lang("order-expired", session.language_code.as_deref());
            if let Err(e) = self.send_text(chat_id, &text, Some(remove_keyboard())).await {
                warn!(chat_id, error = %format!("{e:#}"), "Failed to announce expired order");
            }
            chats.push(chat_id);
        }
        chats
    }

    async fn send_text(&self, chat_id: i64, text: &str, markup: Option<ReplyMarkup>) -> Result<()> {
        self.transport
            .send_text(chat_id, text, markup)
            .await
            .with_context(|| format!("Failed to send message to chat {chat_id}"))
    }

    async fn send_screen(&self, chat_id: i64, screen: Screen) -> Result<()> {
        self.send_text(chat_id, &screen.text, Some(ReplyMarkup::InlineKeyboard(screen.keyboard)))
            .await
    }

    /// Send a product detail as a photo when it has a usable image, falling back to text
    async fn send_product(&self, chat_id: i64, screen: ProductScreen) -> Result<()> {
        let markup = ReplyMarkup::InlineKeyboard(screen.keyboard);
        if let Some(image) = &screen.image {
            match self.send_photo(chat_id, image, &screen.caption, markup.clone()).await {
                Ok(()) => return Ok(()),
                Err(e) => {
                    warn!(chat_id, error = %e, "Photo upload failed, sending text instead");
                }
            }
        }
        self.send_text(chat_id, &screen.caption, Some(markup)).await
    }

    async fn send_photo(
        &self,
        chat_id: i64,
        image: &ProductImage,
        caption: &str,
        markup: ReplyMarkup,
    ) -> Result<()> {
        self.transport
            .send_photo(chat_id, image, caption, Some(markup))
            .await
            .with_context(|| format!("Failed to send photo to chat {chat_id}"))
    }
}
