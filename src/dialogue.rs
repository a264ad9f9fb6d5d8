//! Order wizard dialogue state for one chat.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::{CustomerId, OrderItem};

/// What the wizard is waiting for next
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum WizardStep {
    AwaitingName,
    AwaitingAddress,
    AwaitingPhone,
}

/// Where the draft's items came from
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum DraftOrigin {
    /// A single product bought straight from its detail view
    BuyNow,
    /// The customer's cart at the moment checkout started
    Cart,
}

/// The not-yet-persisted order being assembled by the wizard
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DraftOrder {
    pub origin: DraftOrigin,
    /// Fixed when the wizard starts, prices included
    pub items: Vec<OrderItem>,
    pub customer_name: Option<String>,
    pub customer_address: Option<String>,
}

impl DraftOrder {
    pub fn new(origin: DraftOrigin, items: Vec<OrderItem>) -> Self {
        Self {
            origin,
            items,
            customer_name: None,
            customer_address: None,
        }
    }

    pub fn items_total(&self) -> i64 {
        self.items.iter().map(OrderItem::line_total).sum()
    }
}

/// An open wizard for one chat
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WizardSession {
    pub customer_id: CustomerId,
    pub step: WizardStep,
    pub draft: DraftOrder,
    /// Language captured when the wizard started
    pub language_code: Option<String>,
    pub last_activity: DateTime<Utc>,
}

impl WizardSession {
    pub fn new(customer_id: CustomerId, draft: DraftOrder, language_code: Option<String>) -> Self {
        Self {
            customer_id,
            step: WizardStep::AwaitingName,
            draft,
            language_code,
            last_activity: Utc::now(),
        }
    }
}

/// Conversation state of a chat: either idle or inside exactly one wizard
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub enum ConversationState {
    #[default]
    Idle,
    InWizard(WizardSession),
}

/// Validates a customer name input
pub fn validate_customer_name(name: &str) -> Result<String, &'static str> {
    non_empty(name)
}

/// Validates a delivery address input; free text is accepted as-is
pub fn validate_address(address: &str) -> Result<String, &'static str> {
    non_empty(address)
}

/// Validates a typed phone number
pub fn validate_phone(phone: &str) -> Result<String, &'static str> {
    non_empty(phone)
}

fn non_empty(input: &str) -> Result<String, &'static str> {
    let trimmed = input.trim();

    if trimmed.is_empty() {
        return Err("empty");
    }

    Ok(trimmed.to_string())
}
