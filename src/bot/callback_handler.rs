//! Callback Handler module for processing inline keyboard button taps

use anyhow::Result;
use tracing::{debug, warn};

use crate::catalog::CatalogSnapshot;
use crate::command::CallbackCommand;
use crate::event::Sender;
use crate::localization::{t_args_lang, t_lang};

use super::ui_builder::{category_screen, product_screen};
use super::Storefront;

impl Storefront {
    /// Handle a button tap. The tap is acknowledged before anything else is
    /// sent, whatever the outcome; unknown payloads stop there.
    pub(crate) async fn handle_callback(
        &mut self,
        callback_id: &str,
        from: &Sender,
        chat_id: i64,
        data: Option<&str>,
        snapshot: &CatalogSnapshot,
    ) -> Result<()> {
        let language_code = from.language_code.as_deref();
        let command = CallbackCommand::parse(data.unwrap_or(""));
        debug!(user_id = from.id, chat_id, command = ?command, "Received callback query");

        // Cart mutations only need a toast
        let toast = match &command {
            CallbackCommand::AddToCart(product_id) => Some(match snapshot.product(product_id) {
                Some(product) => {
                    let quantity = self.carts.add(from.id, product_id);
                    t_args_lang(
                        "cart-added",
                        &[
                            ("name", product.name.as_str()),
                            ("quantity", &quantity.to_string()),
                        ],
                        language_code,
                    )
                }
                None => t_lang("product-not-found", language_code),
            }),
            CallbackCommand::RemoveOne(product_id) => {
                self.carts
                    .remove_one(from.id, product_id)
                    .map(|_| t_lang("cart-removed", language_code))
            }
            CallbackCommand::ClearCart => {
                self.carts.clear(from.id);
                Some(t_lang("cart-cleared", language_code))
            }
            _ => None,
        };

        if let Err(e) = self.transport.acknowledge(callback_id, toast.as_deref()).await {
            warn!(user_id = from.id, error = %e, "Failed to acknowledge callback");
        }

        match command {
            CallbackCommand::RootMenu => self.show_main_menu(chat_id, language_code).await,
            CallbackCommand::Products => self.show_catalog(chat_id, snapshot, language_code).await,
            CallbackCommand::Search => self.show_search_hint(chat_id, language_code).await,
            CallbackCommand::Contact => self.show_contact(chat_id, language_code).await,
            CallbackCommand::Help => self.show_help(chat_id, language_code).await,
            CallbackCommand::ViewCart
            | CallbackCommand::RemoveOne(_)
            | CallbackCommand::ClearCart => {
                self.show_cart(chat_id, from.id, snapshot, language_code)
                    .await
            }
            CallbackCommand::Checkout => {
                self.start_cart_checkout(chat_id, from, snapshot).await
            }
            CallbackCommand::CancelOrder => self.cancel_order(chat_id, language_code).await,
            CallbackCommand::OpenCategory(category_id) => {
                let screen = category_screen(snapshot, &category_id, language_code);
                self.send_screen(chat_id, screen).await
            }
            CallbackCommand::OpenProduct {
                product_id,
                from_category,
            } => match snapshot.product(&product_id) {
                Some(product) => {
                    let screen = product_screen(snapshot, product, from_category, language_code);
                    self.send_product(chat_id, screen).await
                }
                None => {
                    debug!(chat_id, product_id = %product_id, "Stale product button");
                    self.send_text(chat_id, &t_lang("product-not-found", language_code), None)
                        .await
                }
            },
            CallbackCommand::AddToCart(_) => Ok(()),
            CallbackCommand::BuyNow(product_id) => {
                self.start_buy_now(chat_id, from, &product_id, snapshot)
                    .await
            }
            CallbackCommand::Unknown(raw) => {
                debug!(user_id = from.id, data = %raw, "Ignoring unknown callback");
                Ok(())
            }
        }
    }
}
