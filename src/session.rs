//! # Conversation Session Store
//!
//! One optional wizard per chat. The store is owned by the poll loop and is
//! only ever touched from there, one event at a time. Sessions live in memory;
//! an open wizard does not survive a restart.

use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::dialogue::{ConversationState, WizardSession, WizardStep};

/// Chat identity used as the session key
pub type ChatKey = i64;

/// Field collected by a wizard step
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldUpdate {
    Name(String),
    Address(String),
}

/// Why a session could not be started
#[derive(Debug, Clone, PartialEq)]
pub enum StartRejected {
    /// A wizard is already open for the chat; the existing session is untouched
    AlreadyOpen(Box<WizardSession>),
}

#[derive(Debug, Default)]
pub struct SessionStore {
    sessions: HashMap<ChatKey, WizardSession>,
    ttl: Option<Duration>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sessions idle for longer than `ttl` are dropped by [`SessionStore::expire_idle`]
    pub fn with_ttl(ttl: Option<Duration>) -> Self {
        Self {
            sessions: HashMap::new(),
            ttl,
        }
    }

    /// Open a wizard for the chat. Never replaces an open one.
    pub fn start(&mut self, chat: ChatKey, session: WizardSession) -> Result<(), StartRejected> {
        if let Some(existing) = self.sessions.get(&chat) {
            return Err(StartRejected::AlreadyOpen(Box::new(existing.clone())));
        }
        self.sessions.insert(chat, session);
        Ok(())
    }

    pub fn get(&self, chat: ChatKey) -> Option<&WizardSession> {
        self.sessions.get(&chat)
    }

    pub fn state(&self, chat: ChatKey) -> ConversationState {
        match self.sessions.get(&chat) {
            Some(session) => ConversationState::InWizard(session.clone()),
            None => ConversationState::Idle,
        }
    }

    /// Move an open wizard to `step`, recording the collected field.
    /// Returns `false` when no wizard is open for the chat.
    pub fn advance(&mut self, chat: ChatKey, step: WizardStep, update: FieldUpdate) -> bool {
        let Some(session) = self.sessions.get_mut(&chat) else {
            return false;
        };
        match update {
            FieldUpdate::Name(name) => session.draft.customer_name = Some(name),
            FieldUpdate::Address(address) => session.draft.customer_address = Some(address),
        }
        session.step = step;
        session.last_activity = Utc::now();
        true
    }

    /// Close the chat's wizard, returning it if one was open
    pub fn end(&mut self, chat: ChatKey) -> Option<WizardSession> {
        self.sessions.remove(&chat)
    }

    /// Drop wizards idle since before `now - ttl`; returns the dropped sessions
    pub fn expire_idle(&mut self, now: DateTime<Utc>) -> Vec<(ChatKey, WizardSession)> {
        let Some(ttl) = self.ttl.and_then(|ttl| chrono::Duration::from_std(ttl).ok()) else {
            return Vec::new();
        };
        let cutoff = now - ttl;

        let expired: Vec<ChatKey> = self
            .sessions
            .iter()
            .filter(|(_, session)| session.last_activity < cutoff)
            .map(|(chat, _)| *chat)
            .collect();
        expired
            .into_iter()
            .filter_map(|chat| self.sessions.remove(&chat).map(|session| (chat, session)))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialogue::{DraftOrder, DraftOrigin};
    use crate::model::OrderItem;

    fn session_for(product_id: &str) -> WizardSession {
        WizardSession::new(
            5,
            DraftOrder::new(
                DraftOrigin::BuyNow,
                vec![OrderItem {
                    product_id: product_id.to_string(),
                    product_name: product_id.to_uppercase(),
                    quantity: 1,
                    price_at_time: 100,
                }],
            ),
            None,
        )
    }

    #[test]
    fn test_start_never_overwrites() {
        let mut store = SessionStore::new();
        store.start(5, session_for("first")).unwrap();

        let rejected = store.start(5, session_for("second")).unwrap_err();
        let StartRejected::AlreadyOpen(existing) = rejected;
        assert_eq!(existing.draft.items[0].product_id, "first");
        assert_eq!(store.get(5).unwrap().draft.items[0].product_id, "first");
    }

    #[test]
    fn test_advance_and_end() {
        let mut store = SessionStore::new();
        assert!(!store.advance(5, WizardStep::AwaitingAddress, FieldUpdate::Name("x".into())));

        store.start(5, session_for("p")).unwrap();
        assert!(store.advance(
            5,
            WizardStep::AwaitingAddress,
            FieldUpdate::Name("Ali".to_string())
        ));

        match store.state(5) {
            ConversationState::InWizard(session) => {
                assert_eq!(session.step, WizardStep::AwaitingAddress);
                assert_eq!(session.draft.customer_name.as_deref(), Some("Ali"));
            }
            ConversationState::Idle => panic!("session should be open"),
        }

        assert!(store.end(5).is_some());
        assert_eq!(store.state(5), ConversationState::Idle);
        assert!(store.end(5).is_none());
    }

    #[test]
    fn test_expire_idle_sessions() {
        let mut store = SessionStore::with_ttl(Some(Duration::from_secs(60)));
        store.start(1, session_for("a")).unwrap();
        store.start(2, session_for("b")).unwrap();

        assert!(store.expire_idle(Utc::now()).is_empty());

        let later = Utc::now() + chrono::Duration::seconds(120);
        let mut expired: Vec<ChatKey> = store
            .expire_idle(later)
            .into_iter()
            .map(|(chat, _)| chat)
            .collect();
        expired.sort();
        assert_eq!(expired, vec![1, 2]);
        assert!(store.is_empty());
    }

    #[test]
    fn test_no_ttl_never_expires() {
        let mut store = SessionStore::with_ttl(None);
        store.start(1, session_for("a")).unwrap();
        let much_later = Utc::now() + chrono::Duration::days(30);
        assert!(store.expire_idle(much_later).is_empty());
        assert_eq!(store.len(), 1);
    }
}
