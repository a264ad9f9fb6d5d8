//! # Messaging Transport
//!
//! The primitive operations the storefront needs from the chat provider, and
//! their Telegram Bot API implementation. All outbound text is HTML formatted.

use async_trait::async_trait;
use teloxide::prelude::*;
use teloxide::types::{
    CallbackQueryId, InlineKeyboardMarkup, InlineQueryId, InlineQueryResult,
    InlineQueryResultArticle, InputFile, InputMessageContent, InputMessageContentText, ParseMode,
    ReplyMarkup, Update, UpdateKind, User,
};
use tracing::debug;

use crate::errors::ShopResult;
use crate::event::{EventKind, InboundEvent, Sender, SharedContact};
use crate::model::ProductImage;

/// One entry in an inline query answer
#[derive(Debug, Clone, PartialEq)]
pub struct InlineResult {
    pub id: String,
    pub title: String,
    pub description: String,
    /// HTML body posted when the customer picks the result
    pub message_text: String,
    pub keyboard: InlineKeyboardMarkup,
}

#[async_trait]
pub trait Transport: Send + Sync {
    /// Events with an id of at least `offset`, oldest first
    async fn fetch_events(&self, offset: i64, limit: u8) -> ShopResult<Vec<InboundEvent>>;

    async fn send_text(
        &self,
        chat_id: i64,
        text: &str,
        markup: Option<ReplyMarkup>,
    ) -> ShopResult<()>;

    async fn send_photo(
        &self,
        chat_id: i64,
        image: &ProductImage,
        caption: &str,
        markup: Option<ReplyMarkup>,
    ) -> ShopResult<()>;

    /// Stop the loading indicator on a tapped button, optionally with a toast
    async fn acknowledge(&self, callback_id: &str, toast: Option<&str>) -> ShopResult<()>;

    async fn answer_inline_query(&self, query_id: &str, results: Vec<InlineResult>)
        -> ShopResult<()>;
}

/// Telegram Bot API transport using long-poll-free `getUpdates`
#[derive(Clone)]
pub struct TelegramTransport {
    bot: Bot,
}

impl TelegramTransport {
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }
}

#[async_trait]
impl Transport for TelegramTransport {
    async fn fetch_events(&self, offset: i64, limit: u8) -> ShopResult<Vec<InboundEvent>> {
        let offset = i32::try_from(offset).unwrap_or(i32::MAX);
        let updates = self
            .bot
            .get_updates()
            .offset(offset)
            .limit(limit)
            .timeout(0)
            .await?;

        debug!(count = updates.len(), offset, "Fetched updates");
        Ok(updates.into_iter().map(event_from_update).collect())
    }

    async fn send_text(
        &self,
        chat_id: i64,
        text: &str,
        markup: Option<ReplyMarkup>,
    ) -> ShopResult<()> {
        let mut request = self
            .bot
            .send_message(ChatId(chat_id), text)
            .parse_mode(ParseMode::Html);
        if let Some(markup) = markup {
            request = request.reply_markup(markup);
        }
        request.await?;
        Ok(())
    }

    async fn send_photo(
        &self,
        chat_id: i64,
        image: &ProductImage,
        caption: &str,
        markup: Option<ReplyMarkup>,
    ) -> ShopResult<()> {
        let file = match image {
            ProductImage::Bytes(bytes) => InputFile::memory(bytes.clone()).file_name("product.jpg"),
            ProductImage::Url(url) => InputFile::url(url.clone()),
        };
        let mut request = self
            .bot
            .send_photo(ChatId(chat_id), file)
            .caption(caption)
            .parse_mode(ParseMode::Html);
        if let Some(markup) = markup {
            request = request.reply_markup(markup);
        }
        request.await?;
        Ok(())
    }

    async fn acknowledge(&self, callback_id: &str, toast: Option<&str>) -> ShopResult<()> {
        let mut request = self
            .bot
            .answer_callback_query(CallbackQueryId(callback_id.to_string()));
        if let Some(toast) = toast {
            request = request.text(toast);
        }
        request.await?;
        Ok(())
    }

    async fn answer_inline_query(
        &self,
        query_id: &str,
        results: Vec<InlineResult>,
    ) -> ShopResult<()> {
        let results: Vec<InlineQueryResult> = results
            .into_iter()
            .map(|result| {
                let content = InputMessageContent::Text(
                    InputMessageContentText::new(result.message_text).parse_mode(ParseMode::Html),
                );
                InlineQueryResult::Article(
                    InlineQueryResultArticle::new(result.id, result.title, content)
                        .description(result.description)
                        .reply_markup(result.keyboard),
                )
            })
            .collect();

        self.bot
            .answer_inline_query(InlineQueryId(query_id.to_string()), results)
            .cache_time(0)
            .await?;
        Ok(())
    }
}

fn sender_from_user(user: &User) -> Sender {
    Sender {
        id: user.id.0 as i64,
        first_name: user.first_name.clone(),
        last_name: user.last_name.clone(),
        username: user.username.clone(),
        language_code: user.language_code.clone(),
    }
}

/// Classify a raw Telegram update
pub fn event_from_update(update: Update) -> InboundEvent {
    let id = i64::from(update.id.0);
    let kind = match update.kind {
        UpdateKind::InlineQuery(query) => EventKind::InlineQuery {
            query_id: query.id.0.clone(),
            from: sender_from_user(&query.from),
            query: query.query,
        },
        UpdateKind::CallbackQuery(q) => EventKind::Callback {
            callback_id: q.id.0.clone(),
            from: sender_from_user(&q.from),
            chat_id: q.message.as_ref().map(|m| m.chat().id.0),
            data: q.data,
        },
        UpdateKind::Message(msg) => {
            let chat_id = msg.chat.id.0;
            let from = msg.from.as_ref().map(sender_from_user);
            if let Some(contact) = msg.contact() {
                EventKind::Contact {
                    chat_id,
                    from,
                    contact: SharedContact {
                        phone_number: contact.phone_number.clone(),
                        first_name: contact.first_name.clone(),
                        last_name: contact.last_name.clone(),
                        user_id: contact.user_id.map(|id| id.0 as i64),
                    },
                }
            } else if let Some(text) = msg.text() {
                EventKind::Text {
                    chat_id,
                    from,
                    text: text.to_string(),
                }
            } else {
                EventKind::Unsupported {
                    chat_id: Some(chat_id),
                    from,
                }
            }
        }
        _ => EventKind::Unsupported {
            chat_id: None,
            from: None,
        },
    };
    InboundEvent::new(id, kind)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn update(json: serde_json::Value) -> Update {
        serde_json::from_str(&json.to_string()).unwrap()
    }

    fn user_json() -> serde_json::Value {
        serde_json::json!({
            "id": 5,
            "is_bot": false,
            "first_name": "Ali",
            "language_code": "fa"
        })
    }

    #[test]
    fn test_text_message_update() {
        let event = event_from_update(update(serde_json::json!({
            "update_id": 10,
            "message": {
                "message_id": 1,
                "date": 1700000000,
                "chat": {"id": 5, "type": "private", "first_name": "Ali"},
                "from": user_json(),
                "text": "sony"
            }
        })));

        assert_eq!(event.id, 10);
        match event.kind {
            EventKind::Text { chat_id, from, text } => {
                assert_eq!(chat_id, 5);
                assert_eq!(text, "sony");
                assert_eq!(from.unwrap().language_code.as_deref(), Some("fa"));
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[test]
    fn test_callback_from_inline_result_has_no_chat() {
        let event = event_from_update(update(serde_json::json!({
            "update_id": 11,
            "callback_query": {
                "id": "cb1",
                "from": user_json(),
                "chat_instance": "42",
                "data": "order_p1"
            }
        })));

        match event.kind {
            EventKind::Callback {
                callback_id,
                chat_id,
                data,
                ..
            } => {
                assert_eq!(callback_id, "cb1");
                assert_eq!(chat_id, None);
                assert_eq!(data.as_deref(), Some("order_p1"));
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[test]
    fn test_inline_query_update() {
        let event = event_from_update(update(serde_json::json!({
            "update_id": 12,
            "inline_query": {
                "id": "iq1",
                "from": user_json(),
                "query": "sony",
                "offset": ""
            }
        })));

        assert_eq!(event.kind_name(), "inline_query");
        match event.kind {
            EventKind::InlineQuery { query_id, query, .. } => {
                assert_eq!(query_id, "iq1");
                assert_eq!(query, "sony");
            }
            other => panic!("unexpected event {other:?}"),
        }
    }
}
