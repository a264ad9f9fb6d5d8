//! Message Handler module for text messages, shared contacts and everything else

use anyhow::Result;
use chrono::Utc;
use teloxide::utils::html;
use tracing::{debug, info, warn};

use crate::catalog::CatalogSnapshot;
use crate::command::{is_cancel_keyword, TextCommand};
use crate::config::SEARCH_RESULT_LIMIT;
use crate::event::{Sender, SharedContact};
use crate::localization::{t_args_lang, t_lang};
use crate::model::{CustomerId, VerifiedContact};

use super::dialogue_manager::WizardInput;
use super::ui_builder::{
    cart_screen, catalog_root, contact_request_keyboard, main_menu_keyboard, remove_keyboard,
    search_results_screen, Screen,
};
use super::Storefront;

impl Storefront {
    /// Feed text to the open wizard, or treat it as a command or search
    pub(crate) async fn handle_text(
        &mut self,
        chat_id: i64,
        from: Option<&Sender>,
        text: &str,
        snapshot: &CatalogSnapshot,
    ) -> Result<()> {
        let customer_id = from.map_or(chat_id, |f| f.id);
        let language_code = from.and_then(|f| f.language_code.as_deref());

        if let Some(session) = self.sessions.get(chat_id) {
            let session_lang = session.language_code.clone();
            let cancel_label = t_lang("button-cancel-order", session_lang.as_deref());
            if is_cancel_keyword(text, &cancel_label) {
                return self.cancel_order(chat_id, language_code).await;
            }
            return self
                .handle_wizard_input(chat_id, WizardInput::Text(text))
                .await;
        }

        let command = TextCommand::parse(text);
        debug!(chat_id, command = ?command, "Text outside a wizard");

        match command {
            TextCommand::Start => self.send_welcome(chat_id, customer_id, from).await,
            TextCommand::Cancel => {
                self.send_text(
                    chat_id,
                    &t_lang("order-nothing-to-cancel", language_code),
                    Some(remove_keyboard()),
                )
                .await
            }
            _ if is_cancel_keyword(text, &t_lang("button-cancel-order", language_code)) => {
                self.send_text(
                    chat_id,
                    &t_lang("order-nothing-to-cancel", language_code),
                    Some(remove_keyboard()),
                )
                .await
            }
            TextCommand::Help => self.show_help(chat_id, language_code).await,
            TextCommand::Products => self.show_catalog(chat_id, snapshot, language_code).await,
            TextCommand::Contact => self.show_contact(chat_id, language_code).await,
            TextCommand::Search => self.show_search_hint(chat_id, language_code).await,
            TextCommand::Cart => {
                self.show_cart(chat_id, customer_id, snapshot, language_code)
                    .await
            }
            TextCommand::UnknownCommand(name) => {
                debug!(chat_id, command = %name, "Unknown command");
                self.send_text(chat_id, &t_lang("unknown-command", language_code), None)
                    .await
            }
            TextCommand::FreeText(query) if query.is_empty() => {
                self.show_help(chat_id, language_code).await
            }
            TextCommand::FreeText(query) => {
                self.show_search_results(chat_id, &query, snapshot, language_code)
                    .await
            }
        }
    }

    /// Register the sender's own contact card; during the phone step it also answers the wizard
    pub(crate) async fn handle_contact(
        &mut self,
        chat_id: i64,
        from: Option<&Sender>,
        contact: &SharedContact,
    ) -> Result<()> {
        let owner = from.filter(|f| contact.user_id == Some(f.id));
        let language_code = from.and_then(|f| f.language_code.as_deref());

        if let Some(sender) = owner {
            let verified = VerifiedContact {
                customer_id: sender.id,
                phone_number: contact.phone_number.clone(),
                first_name: contact.first_name.clone(),
                last_name: contact.last_name.clone(),
                username: sender.username.clone(),
                verified_at: Utc::now(),
            };
            match self.contacts.upsert_contact(&verified).await {
                Ok(()) => info!(chat_id, customer_id = sender.id, "Contact verified"),
                Err(e) => warn!(chat_id, customer_id = sender.id, error = %e, "Failed to store verified contact"),
            }
        } else {
            debug!(chat_id, "Shared contact does not belong to the sender");
        }

        if self.sessions.get(chat_id).is_some() {
            return self
                .handle_wizard_input(chat_id, WizardInput::Contact(&contact.phone_number))
                .await;
        }

        if owner.is_some() {
            self.send_text(
                chat_id,
                &t_lang("contact-verified", language_code),
                Some(remove_keyboard()),
            )
            .await?;
            self.show_main_menu(chat_id, language_code).await
        } else {
            self.send_text(chat_id, &t_lang("contact-not-own", language_code), None)
                .await
        }
    }

    /// Photos, stickers and the like: re-prompt an open wizard, otherwise explain
    pub(crate) async fn handle_unsupported(
        &mut self,
        chat_id: i64,
        from: Option<&Sender>,
    ) -> Result<()> {
        if self.sessions.get(chat_id).is_some() {
            return self.prompt_current_step(chat_id).await;
        }
        let language_code = from.and_then(|f| f.language_code.as_deref());
        self.send_text(chat_id, &t_lang("unsupported-message", language_code), None)
            .await
    }

    /// Verified customers get the main menu; everyone else is asked to share their phone
    async fn send_welcome(
        &self,
        chat_id: i64,
        customer_id: CustomerId,
        from: Option<&Sender>,
    ) -> Result<()> {
        let language_code = from.and_then(|f| f.language_code.as_deref());
        let name = html::escape(from.map_or("", |f| f.first_name.as_str()));

        let verified = match self.contacts.find_contact(customer_id).await {
            Ok(contact) => contact.is_some(),
            Err(e) => {
                warn!(chat_id, customer_id, error = %e, "Contact lookup failed, showing the menu");
                true
            }
        };

        if verified {
            let text = t_args_lang("welcome-verified", &[("name", &name)], language_code);
            self.send_screen(
                chat_id,
                Screen {
                    text,
                    keyboard: main_menu_keyboard(language_code),
                },
            )
            .await
        } else {
            let text = t_args_lang("welcome-unverified", &[("name", &name)], language_code);
            self.send_text(chat_id, &text, Some(contact_request_keyboard(language_code)))
                .await
        }
    }

    pub(crate) async fn show_main_menu(&self, chat_id: i64, language_code: Option<&str>) -> Result<()> {
        self.send_screen(
            chat_id,
            Screen {
                text: t_lang("main-menu-title", language_code),
                keyboard: main_menu_keyboard(language_code),
            },
        )
        .await
    }

    pub(crate) async fn show_help(&self, chat_id: i64, language_code: Option<&str>) -> Result<()> {
        self.send_screen(
            chat_id,
            Screen {
                text: t_lang("help-text", language_code),
                keyboard: main_menu_keyboard(language_code),
            },
        )
        .await
    }

    pub(crate) async fn show_contact(&self, chat_id: i64, language_code: Option<&str>) -> Result<()> {
        let text = match &self.settings.contact_message {
            Some(message) => html::escape(message),
            None => t_lang("contact-default", language_code),
        };
        self.send_text(chat_id, &text, None).await
    }

    pub(crate) async fn show_search_hint(&self, chat_id: i64, language_code: Option<&str>) -> Result<()> {
        self.send_text(chat_id, &t_lang("search-hint", language_code), None)
            .await
    }

    pub(crate) async fn show_catalog(
        &self,
        chat_id: i64,
        snapshot: &CatalogSnapshot,
        language_code: Option<&str>,
    ) -> Result<()> {
        self.send_screen(chat_id, catalog_root(snapshot, language_code))
            .await
    }

    pub(crate) async fn show_cart(
        &self,
        chat_id: i64,
        customer_id: CustomerId,
        snapshot: &CatalogSnapshot,
        language_code: Option<&str>,
    ) -> Result<()> {
        let view = self.carts.view(customer_id, snapshot);
        let link = self
            .settings
            .checkout_base_url
            .as_deref()
            .and_then(|base| self.carts.checkout_link(customer_id, base));
        self.send_screen(chat_id, cart_screen(&view, link, language_code))
            .await
    }

    async fn show_search_results(
        &self,
        chat_id: i64,
        query: &str,
        snapshot: &CatalogSnapshot,
        language_code: Option<&str>,
    ) -> Result<()> {
        let results = snapshot.search(query, SEARCH_RESULT_LIMIT);
        debug!(chat_id, query, hits = results.len(), "Catalog search");
        self.send_screen(chat_id, search_results_screen(&results, query, language_code))
            .await
    }
}
