//! Shared fixtures for the storefront integration tests

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use teloxide::types::{InlineKeyboardButtonKind, InlineKeyboardMarkup, ReplyMarkup};

use teleshop::bot::Storefront;
use teleshop::config::ShopSettings;
use teleshop::errors::{ShopError, ShopResult};
use teleshop::event::{EventKind, InboundEvent, Sender, SharedContact};
use teleshop::model::{Category, Product, ProductImage};
use teleshop::store::MemoryStore;
use teleshop::transport::{InlineResult, Transport};

/// Something the storefront pushed through the transport
#[derive(Debug, Clone)]
pub enum Sent {
    Text {
        chat_id: i64,
        text: String,
        markup: Option<ReplyMarkup>,
    },
    Photo {
        chat_id: i64,
        caption: String,
        markup: Option<ReplyMarkup>,
    },
    Ack {
        callback_id: String,
        toast: Option<String>,
    },
    Inline {
        query_id: String,
        results: Vec<InlineResult>,
    },
}

/// Transport double: serves queued events and records every outbound call
#[derive(Default)]
pub struct RecordingTransport {
    inbox: Mutex<Vec<InboundEvent>>,
    sent: Mutex<Vec<Sent>>,
    fetch_failing: AtomicBool,
}

impl RecordingTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn push_event(&self, event: InboundEvent) {
        self.inbox.lock().unwrap().push(event);
    }

    pub fn set_fetch_failing(&self, failing: bool) {
        self.fetch_failing.store(failing, Ordering::SeqCst);
    }

    pub fn sent(&self) -> Vec<Sent> {
        self.sent.lock().unwrap().clone()
    }

    pub fn clear_sent(&self) {
        self.sent.lock().unwrap().clear();
    }

    /// Text and photo captions sent to a chat, in order
    pub fn texts_to(&self, chat: i64) -> Vec<String> {
        self.sent()
            .into_iter()
            .filter_map(|s| match s {
                Sent::Text { chat_id, text, .. } if chat_id == chat => Some(text),
                Sent::Photo {
                    chat_id, caption, ..
                } if chat_id == chat => Some(caption),
                _ => None,
            })
            .collect()
    }

    pub fn last_text_to(&self, chat: i64) -> Option<String> {
        self.texts_to(chat).pop()
    }

    pub fn acks(&self) -> Vec<(String, Option<String>)> {
        self.sent()
            .into_iter()
            .filter_map(|s| match s {
                Sent::Ack { callback_id, toast } => Some((callback_id, toast)),
                _ => None,
            })
            .collect()
    }

    pub fn inline_answers(&self) -> Vec<(String, Vec<InlineResult>)> {
        self.sent()
            .into_iter()
            .filter_map(|s| match s {
                Sent::Inline { query_id, results } => Some((query_id, results)),
                _ => None,
            })
            .collect()
    }

    /// Inline keyboard of the last message to a chat that carried one
    pub fn last_keyboard_to(&self, chat: i64) -> Option<InlineKeyboardMarkup> {
        self.sent().into_iter().rev().find_map(|s| match s {
            Sent::Text {
                chat_id,
                markup: Some(ReplyMarkup::InlineKeyboard(keyboard)),
                ..
            }
            | Sent::Photo {
                chat_id,
                markup: Some(ReplyMarkup::InlineKeyboard(keyboard)),
                ..
            } if chat_id == chat => Some(keyboard),
            _ => None,
        })
    }

    pub fn photo_count(&self) -> usize {
        self.sent()
            .iter()
            .filter(|s| matches!(s, Sent::Photo { .. }))
            .count()
    }

    fn record(&self, sent: Sent) {
        self.sent.lock().unwrap().push(sent);
    }
}

#[async_trait]
impl Transport for RecordingTransport {
    async fn fetch_events(&self, offset: i64, limit: u8) -> ShopResult<Vec<InboundEvent>> {
        if self.fetch_failing.load(Ordering::SeqCst) {
            return Err(ShopError::Unavailable("transport is down".to_string()));
        }
        Ok(self
            .inbox
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.id >= offset)
            .take(usize::from(limit))
            .cloned()
            .collect())
    }

    async fn send_text(
        &self,
        chat_id: i64,
        text: &str,
        markup: Option<ReplyMarkup>,
    ) -> ShopResult<()> {
        self.record(Sent::Text {
            chat_id,
            text: text.to_string(),
            markup,
        });
        Ok(())
    }

    async fn send_photo(
        &self,
        chat_id: i64,
        _image: &ProductImage,
        caption: &str,
        markup: Option<ReplyMarkup>,
    ) -> ShopResult<()> {
        self.record(Sent::Photo {
            chat_id,
            caption: caption.to_string(),
            markup,
        });
        Ok(())
    }

    async fn acknowledge(&self, callback_id: &str, toast: Option<&str>) -> ShopResult<()> {
        self.record(Sent::Ack {
            callback_id: callback_id.to_string(),
            toast: toast.map(str::to_string),
        });
        Ok(())
    }

    async fn answer_inline_query(
        &self,
        query_id: &str,
        results: Vec<InlineResult>,
    ) -> ShopResult<()> {
        self.record(Sent::Inline {
            query_id: query_id.to_string(),
            results,
        });
        Ok(())
    }
}

/// Callback payloads of every button in a keyboard
pub fn callback_data(keyboard: &InlineKeyboardMarkup) -> Vec<String> {
    keyboard
        .inline_keyboard
        .iter()
        .flatten()
        .filter_map(|b| match &b.kind {
            InlineKeyboardButtonKind::CallbackData(data) => Some(data.clone()),
            _ => None,
        })
        .collect()
}

/// URLs of every link button in a keyboard
pub fn button_urls(keyboard: &InlineKeyboardMarkup) -> Vec<String> {
    keyboard
        .inline_keyboard
        .iter()
        .flatten()
        .filter_map(|b| match &b.kind {
            InlineKeyboardButtonKind::Url(url) => Some(url.to_string()),
            _ => None,
        })
        .collect()
}

pub fn product(id: &str, name: &str, price: i64, category_id: &str) -> Product {
    Product {
        id: id.to_string(),
        code: format!("C-{id}"),
        name: name.to_string(),
        price,
        pack_size: 1,
        category_id: category_id.to_string(),
        description: String::new(),
        image_ref: String::new(),
        created_at: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
    }
}

pub fn category(id: &str, name: &str) -> Category {
    Category {
        id: id.to_string(),
        name: name.to_string(),
    }
}

pub fn sender(id: i64) -> Sender {
    Sender {
        id,
        first_name: "Ali".to_string(),
        last_name: Some("Mohammadi".to_string()),
        username: Some("ali".to_string()),
        language_code: Some("en".to_string()),
    }
}

pub fn text(id: i64, chat_id: i64, body: &str) -> InboundEvent {
    InboundEvent::new(
        id,
        EventKind::Text {
            chat_id,
            from: Some(sender(chat_id)),
            text: body.to_string(),
        },
    )
}

pub fn callback(id: i64, chat_id: i64, data: &str) -> InboundEvent {
    InboundEvent::new(
        id,
        EventKind::Callback {
            callback_id: format!("cb-{id}"),
            from: sender(chat_id),
            chat_id: Some(chat_id),
            data: Some(data.to_string()),
        },
    )
}

pub fn inline_query(id: i64, user_id: i64, query: &str) -> InboundEvent {
    InboundEvent::new(
        id,
        EventKind::InlineQuery {
            query_id: format!("iq-{id}"),
            from: sender(user_id),
            query: query.to_string(),
        },
    )
}

/// A contact card; `owner` is the identity the card belongs to
pub fn contact(id: i64, chat_id: i64, phone: &str, owner: Option<i64>) -> InboundEvent {
    InboundEvent::new(
        id,
        EventKind::Contact {
            chat_id,
            from: Some(sender(chat_id)),
            contact: SharedContact {
                phone_number: phone.to_string(),
                first_name: "Ali".to_string(),
                last_name: None,
                user_id: owner,
            },
        },
    )
}

pub fn storefront(
    transport: &Arc<RecordingTransport>,
    store: &Arc<MemoryStore>,
    settings: ShopSettings,
) -> Storefront {
    Storefront::new(
        transport.clone(),
        store.clone(),
        store.clone(),
        settings,
        None,
    )
}
