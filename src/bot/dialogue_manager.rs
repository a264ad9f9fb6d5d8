//! Dialogue Manager module: the order wizard and order finalization
//!
//! ```text
//! Idle --buy now / checkout--> AwaitingName --name--> AwaitingAddress
//! AwaitingAddress --address, verified contact--> finalize --> Idle
//! AwaitingAddress --address, no contact--> AwaitingPhone --phone or contact--> finalize --> Idle
//! any step --cancel--> Idle
//! ```

use anyhow::Result;
use chrono::Utc;
use teloxide::types::ReplyMarkup;
use teloxide::utils::html;
use tracing::{debug, error, info, warn};

use crate::catalog::CatalogSnapshot;
use crate::dialogue::{
    validate_address, validate_customer_name, validate_phone, DraftOrder, DraftOrigin,
    WizardSession, WizardStep,
};
use crate::event::Sender;
use crate::localization::{t_args_lang, t_lang};
use crate::model::{generate_order_id, Order, OrderItem, OrderStatus};
use crate::session::{FieldUpdate, StartRejected};

use super::ui_builder::{
    cancel_order_keyboard, cart_screen, order_confirmation, payment_link, price_label,
    remove_keyboard, wizard_keyboard, Screen,
};
use super::Storefront;

/// An answer to the current wizard step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WizardInput<'a> {
    Text(&'a str),
    /// Phone number from a shared contact card; preferred over typed text
    Contact(&'a str),
}

/// Customer details collected by a completed wizard
struct CollectedDetails {
    name: String,
    address: String,
    phone: String,
}

fn item_lines(items: &[OrderItem], language_code: Option<&str>) -> String {
    items
        .iter()
        .map(|item| {
            t_args_lang(
                "order-item-line",
                &[
                    ("name", &html::escape(&item.product_name)),
                    ("quantity", &item.quantity.to_string()),
                    ("total", &price_label(item.line_total(), language_code)),
                ],
                language_code,
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

impl Storefront {
    /// Start a single-item wizard for a product from the current snapshot
    pub(crate) async fn start_buy_now(
        &mut self,
        chat_id: i64,
        from: &Sender,
        product_id: &str,
        snapshot: &CatalogSnapshot,
    ) -> Result<()> {
        let language_code = from.language_code.as_deref();
        let Some(product) = snapshot.product(product_id) else {
            debug!(chat_id, product_id, "Buy now for a product no longer in the catalog");
            return self
                .send_text(chat_id, &t_lang("product-not-found", language_code), None)
                .await;
        };

        let draft = DraftOrder::new(
            DraftOrigin::BuyNow,
            vec![OrderItem {
                product_id: product.id.clone(),
                product_name: product.name.clone(),
                quantity: 1,
                price_at_time: product.price,
            }],
        );
        self.start_wizard(chat_id, from, draft).await
    }

    /// Start a wizard for everything currently in the customer's cart
    pub(crate) async fn start_cart_checkout(
        &mut self,
        chat_id: i64,
        from: &Sender,
        snapshot: &CatalogSnapshot,
    ) -> Result<()> {
        let view = self.carts.view(from.id, snapshot);
        if view.is_empty() {
            let screen = cart_screen(&view, None, from.language_code.as_deref());
            return self.send_screen(chat_id, screen).await;
        }

        let draft = DraftOrder::new(DraftOrigin::Cart, view.to_order_items());
        self.start_wizard(chat_id, from, draft).await
    }

    /// Open a wizard unless one is already open for the chat
    async fn start_wizard(&mut self, chat_id: i64, from: &Sender, draft: DraftOrder) -> Result<()> {
        let language_code = from.language_code.as_deref();
        let session = WizardSession::new(from.id, draft, from.language_code.clone());
        let summary = item_lines(&session.draft.items, language_code);
        let total = price_label(session.draft.items_total(), language_code);

        match self.sessions.start(chat_id, session) {
            Ok(()) => {
                info!(chat_id, customer_id = from.id, "Order wizard started");
                let text = format!(
                    "{}\n\n{}\n\n{}\n\n{}",
                    t_lang("order-start", language_code),
                    summary,
                    t_args_lang("order-total", &[("amount", &total)], language_code),
                    t_lang("order-ask-name", language_code)
                );
                self.send_text(chat_id, &text, Some(wizard_keyboard(language_code, false)))
                    .await
            }
            Err(StartRejected::AlreadyOpen(_)) => {
                debug!(chat_id, "Order wizard already open");
                self.send_screen(
                    chat_id,
                    Screen {
                        text: t_lang("order-already-open", language_code),
                        keyboard: cancel_order_keyboard(language_code),
                    },
                )
                .await
            }
        }
    }

    /// Tear down the chat's wizard, if any
    pub(crate) async fn cancel_order(
        &mut self,
        chat_id: i64,
        language_code: Option<&str>,
    ) -> Result<()> {
        match self.sessions.end(chat_id) {
            Some(session) => {
                info!(chat_id, step = ?session.step, "Order wizard cancelled");
                let language_code = session.language_code.as_deref().or(language_code);
                self.send_text(
                    chat_id,
                    &t_lang("order-cancelled", language_code),
                    Some(remove_keyboard()),
                )
                .await?;
                self.show_main_menu(chat_id, language_code).await
            }
            None => {
                self.send_text(chat_id, &t_lang("order-nothing-to-cancel", language_code), None)
                    .await
            }
        }
    }

    /// Repeat the question for the chat's current wizard step
    pub(crate) async fn prompt_current_step(&self, chat_id: i64) -> Result<()> {
        let Some(session) = self.sessions.get(chat_id) else {
            return Ok(());
        };
        let language_code = session.language_code.as_deref();
        let (key, ask_phone) = match session.step {
            WizardStep::AwaitingName => ("order-ask-name", false),
            WizardStep::AwaitingAddress => ("order-ask-address", false),
            WizardStep::AwaitingPhone => ("order-ask-phone", true),
        };
        self.send_text(
            chat_id,
            &t_lang(key, language_code),
            Some(wizard_keyboard(language_code, ask_phone)),
        )
        .await
    }

    /// Advance the chat's wizard with one answer
    pub(crate) async fn handle_wizard_input(
        &mut self,
        chat_id: i64,
        input: WizardInput<'_>,
    ) -> Result<()> {
        let Some(session) = self.sessions.get(chat_id).cloned() else {
            return Ok(());
        };
        let language_code = session.language_code.as_deref();

        match (session.step, input) {
            (WizardStep::AwaitingName, WizardInput::Text(text)) => {
                match validate_customer_name(text) {
                    Ok(name) => {
                        self.sessions.advance(
                            chat_id,
                            WizardStep::AwaitingAddress,
                            FieldUpdate::Name(name),
                        );
                        self.send_text(
                            chat_id,
                            &t_lang("order-ask-address", language_code),
                            Some(wizard_keyboard(language_code, false)),
                        )
                        .await
                    }
                    Err(_) => {
                        self.send_text(chat_id, &t_lang("order-ask-name-again", language_code), None)
                            .await
                    }
                }
            }
            (WizardStep::AwaitingAddress, WizardInput::Text(text)) => {
                let address = match validate_address(text) {
                    Ok(address) => address,
                    Err(_) => {
                        return self
                            .send_text(chat_id, &t_lang("order-ask-address-again", language_code), None)
                            .await;
                    }
                };

                let contact = match self.contacts.find_contact(session.customer_id).await {
                    Ok(contact) => contact,
                    Err(e) => {
                        warn!(chat_id, error = %e, "Contact lookup failed, asking for the phone");
                        None
                    }
                };

                match contact {
                    Some(contact) => {
                        let Some(name) = session.draft.customer_name.clone() else {
                            return self.prompt_current_step(chat_id).await;
                        };
                        let details = CollectedDetails {
                            name,
                            address,
                            phone: contact.phone_number,
                        };
                        self.finalize(chat_id, &session, details).await
                    }
                    None => {
                        self.sessions.advance(
                            chat_id,
                            WizardStep::AwaitingPhone,
                            FieldUpdate::Address(address),
                        );
                        self.send_text(
                            chat_id,
                            &t_lang("order-ask-phone", language_code),
                            Some(wizard_keyboard(language_code, true)),
                        )
                        .await
                    }
                }
            }
            (WizardStep::AwaitingPhone, WizardInput::Text(text) | WizardInput::Contact(text)) => {
                let phone = match validate_phone(text) {
                    Ok(phone) => phone,
                    Err(_) => {
                        return self
                            .send_text(chat_id, &t_lang("order-ask-phone-again", language_code), None)
                            .await;
                    }
                };
                let (Some(name), Some(address)) = (
                    session.draft.customer_name.clone(),
                    session.draft.customer_address.clone(),
                ) else {
                    return self.prompt_current_step(chat_id).await;
                };
                let details = CollectedDetails {
                    name,
                    address,
                    phone,
                };
                self.finalize(chat_id, &session, details).await
            }
            (_, WizardInput::Contact(_)) => self.prompt_current_step(chat_id).await,
        }
    }

    /// Persist the order, then clear the session and a cart-originated cart.
    /// A ledger failure leaves every piece of state untouched.
    async fn finalize(
        &mut self,
        chat_id: i64,
        session: &WizardSession,
        details: CollectedDetails,
    ) -> Result<()> {
        let language_code = session.language_code.as_deref();
        let now = Utc::now();

        let (shipping_method, shipping_cost) = match &self.settings.shipping {
            Some(shipping) => (Some(shipping.method.clone()), shipping.cost),
            None => (None, 0),
        };
        let order = Order {
            id: generate_order_id(now),
            customer_id: session.customer_id,
            customer_name: details.name,
            customer_phone: details.phone,
            customer_address: details.address,
            items: session.draft.items.clone(),
            shipping_method,
            shipping_cost,
            total_amount: session.draft.items_total() + shipping_cost,
            status: OrderStatus::Pending,
            created_at: now,
        };

        if let Err(e) = self.ledger.create_order(&order).await {
            error!(chat_id, order_id = %order.id, error = %e, "Failed to persist order");
            return self
                .send_text(chat_id, &t_lang("order-failed", language_code), None)
                .await;
        }

        self.sessions.end(chat_id);
        if session.draft.origin == DraftOrigin::Cart {
            self.carts.clear(session.customer_id);
        }
        info!(
            chat_id,
            order_id = %order.id,
            total = order.total_amount,
            items = order.items.len(),
            "Order finalized"
        );

        let link = self
            .settings
            .payment_api_key
            .as_ref()
            .and_then(|_| payment_link(&self.settings.payment_base_url, &order));

        self.send_text(
            chat_id,
            &t_lang("order-received", language_code),
            Some(remove_keyboard()),
        )
        .await?;
        let screen = order_confirmation(&order, link, language_code);
        self.send_text(
            chat_id,
            &screen.text,
            Some(ReplyMarkup::InlineKeyboard(screen.keyboard)),
        )
        .await
    }
}
