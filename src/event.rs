//! Inbound events as seen by the router, independent of the wire format.

use crate::model::CustomerId;

/// Who produced an event
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sender {
    pub id: CustomerId,
    pub first_name: String,
    pub last_name: Option<String>,
    pub username: Option<String>,
    /// Client language (e.g. `fa-IR`), used to pick the reply locale
    pub language_code: Option<String>,
}

/// A contact card shared from the customer's device
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SharedContact {
    pub phone_number: String,
    pub first_name: String,
    pub last_name: Option<String>,
    /// Chat identity the card belongs to, when it belongs to one
    pub user_id: Option<CustomerId>,
}

/// What happened, classified once at the transport boundary
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventKind {
    InlineQuery {
        query_id: String,
        from: Sender,
        query: String,
    },
    Callback {
        callback_id: String,
        from: Sender,
        /// Chat of the message carrying the button; absent for buttons on inline results
        chat_id: Option<i64>,
        data: Option<String>,
    },
    Text {
        chat_id: i64,
        from: Option<Sender>,
        text: String,
    },
    Contact {
        chat_id: i64,
        from: Option<Sender>,
        contact: SharedContact,
    },
    /// Anything else (stickers, photos, edits, chat member updates)
    Unsupported {
        chat_id: Option<i64>,
        from: Option<Sender>,
    },
}

/// One inbound event with its transport-assigned, monotonically increasing id
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundEvent {
    pub id: i64,
    pub kind: EventKind,
}

impl InboundEvent {
    pub fn new(id: i64, kind: EventKind) -> Self {
        Self { id, kind }
    }

    /// Short name for logs
    pub fn kind_name(&self) -> &'static str {
        match self.kind {
            EventKind::InlineQuery { .. } => "inline_query",
            EventKind::Callback { .. } => "callback",
            EventKind::Text { .. } => "text",
            EventKind::Contact { .. } => "contact",
            EventKind::Unsupported { .. } => "unsupported",
        }
    }
}
