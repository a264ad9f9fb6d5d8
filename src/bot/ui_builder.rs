//! UI Builder module: catalog navigation screens, keyboards and message formatting
//!
//! Everything here is a pure function of the catalog snapshot and the button
//! payload that led to it. Navigation context (whether a product was opened
//! from its category) travels inside the callback data, never in server state.

use teloxide::types::{
    ButtonRequest, InlineKeyboardButton, InlineKeyboardMarkup, KeyboardButton, KeyboardMarkup,
    KeyboardRemove, ReplyMarkup,
};
use teloxide::utils::html;
use tracing::warn;

use crate::cart::CartView;
use crate::catalog::CatalogSnapshot;
use crate::command::CallbackCommand;
use crate::config::CATEGORY_PRODUCT_LIMIT;
use crate::localization::{t_args_lang, t_lang};
use crate::model::{format_price, Order, Product, ProductImage};
use crate::transport::InlineResult;

/// A rendered text message with its inline keyboard
#[derive(Debug, Clone, PartialEq)]
pub struct Screen {
    pub text: String,
    pub keyboard: InlineKeyboardMarkup,
}

/// A rendered product detail, sent as a photo when an image is available
#[derive(Debug, Clone, PartialEq)]
pub struct ProductScreen {
    pub caption: String,
    pub image: Option<ProductImage>,
    pub keyboard: InlineKeyboardMarkup,
}

fn button(text: String, command: CallbackCommand) -> InlineKeyboardButton {
    InlineKeyboardButton::callback(text, command.to_string())
}

/// Localized price with thousands separators
pub fn price_label(amount: i64, language_code: Option<&str>) -> String {
    t_args_lang("price-amount", &[("amount", &format_price(amount))], language_code)
}

/// Main menu shown to verified customers
pub fn main_menu_keyboard(language_code: Option<&str>) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![
        vec![
            button(t_lang("menu-products", language_code), CallbackCommand::Products),
            button(t_lang("menu-search", language_code), CallbackCommand::Search),
        ],
        vec![
            button(t_lang("menu-cart", language_code), CallbackCommand::ViewCart),
            button(t_lang("menu-contact", language_code), CallbackCommand::Contact),
        ],
        vec![button(t_lang("menu-help", language_code), CallbackCommand::Help)],
    ])
}

/// Reply keyboard asking the device to share the customer's own phone number
pub fn contact_request_keyboard(language_code: Option<&str>) -> ReplyMarkup {
    let share = KeyboardButton::new(t_lang("verify-phone-button", language_code))
        .request(ButtonRequest::Contact);
    ReplyMarkup::Keyboard(
        KeyboardMarkup::new(vec![vec![share]])
            .resize_keyboard()
            .one_time_keyboard(),
    )
}

/// Reply keyboard shown during the wizard; the cancel label doubles as a cancel keyword
pub fn wizard_keyboard(language_code: Option<&str>, ask_phone: bool) -> ReplyMarkup {
    let mut rows = Vec::new();
    if ask_phone {
        rows.push(vec![KeyboardButton::new(t_lang("verify-phone-button", language_code))
            .request(ButtonRequest::Contact)]);
    }
    rows.push(vec![KeyboardButton::new(t_lang(
        "button-cancel-order",
        language_code,
    ))]);
    ReplyMarkup::Keyboard(KeyboardMarkup::new(rows).resize_keyboard())
}

/// Removes the wizard reply keyboard
pub fn remove_keyboard() -> ReplyMarkup {
    ReplyMarkup::KeyboardRemove(KeyboardRemove::new())
}

/// Inline keyboard with a single cancel button
pub fn cancel_order_keyboard(language_code: Option<&str>) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![vec![button(
        t_lang("button-cancel-order", language_code),
        CallbackCommand::CancelOrder,
    )]])
}

fn back_to_root(language_code: Option<&str>) -> Vec<InlineKeyboardButton> {
    vec![button(t_lang("button-back", language_code), CallbackCommand::RootMenu)]
}

fn product_button(
    product: &Product,
    from_category: bool,
    language_code: Option<&str>,
) -> InlineKeyboardButton {
    button(
        format!(
            "{} - {}",
            product.name,
            price_label(product.price, language_code)
        ),
        CallbackCommand::OpenProduct {
            product_id: product.id.clone(),
            from_category,
        },
    )
}

/// Catalog root: one button per category, or a flat newest-first product
/// list when the store has no categories
pub fn catalog_root(snapshot: &CatalogSnapshot, language_code: Option<&str>) -> Screen {
    if snapshot.products.is_empty() && snapshot.categories.is_empty() {
        return Screen {
            text: t_lang("catalog-empty", language_code),
            keyboard: InlineKeyboardMarkup::new(vec![back_to_root(language_code)]),
        };
    }

    let mut rows: Vec<Vec<InlineKeyboardButton>> = if snapshot.categories.is_empty() {
        snapshot
            .newest_products(CATEGORY_PRODUCT_LIMIT)
            .into_iter()
            .map(|p| vec![product_button(p, false, language_code)])
            .collect()
    } else {
        snapshot
            .categories
            .iter()
            .map(|c| {
                vec![button(
                    c.name.clone(),
                    CallbackCommand::OpenCategory(c.id.clone()),
                )]
            })
            .collect()
    };
    rows.push(back_to_root(language_code));

    let title = if snapshot.categories.is_empty() {
        "catalog-products-title"
    } else {
        "catalog-categories-title"
    };
    Screen {
        text: t_lang(title, language_code),
        keyboard: InlineKeyboardMarkup::new(rows),
    }
}

/// Products of one category; the back button returns to the catalog root
pub fn category_screen(
    snapshot: &CatalogSnapshot,
    category_id: &str,
    language_code: Option<&str>,
) -> Screen {
    let back = vec![button(t_lang("button-back", language_code), CallbackCommand::Products)];
    let products: Vec<&Product> = snapshot
        .products_in_category(category_id)
        .take(CATEGORY_PRODUCT_LIMIT)
        .collect();

    let Some(category) = snapshot.category(category_id).filter(|_| !products.is_empty()) else {
        return Screen {
            text: t_lang("category-empty", language_code),
            keyboard: InlineKeyboardMarkup::new(vec![back]),
        };
    };

    let mut rows: Vec<Vec<InlineKeyboardButton>> = products
        .into_iter()
        .map(|p| vec![product_button(p, true, language_code)])
        .collect();
    rows.push(back);

    Screen {
        text: t_args_lang(
            "catalog-category-title",
            &[("name", &html::escape(&category.name))],
            language_code,
        ),
        keyboard: InlineKeyboardMarkup::new(rows),
    }
}

/// HTML description of a product: name, code, pack size, category, price, description
pub fn product_caption(
    snapshot: &CatalogSnapshot,
    product: &Product,
    language_code: Option<&str>,
) -> String {
    let category = snapshot
        .category_name(&product.category_id)
        .map(str::to_string)
        .unwrap_or_else(|| t_lang("category-general", language_code));

    let mut caption = t_args_lang(
        "product-caption",
        &[
            ("name", &html::escape(&product.name)),
            ("code", &html::escape(&product.code)),
            ("pack_size", &product.pack_size.to_string()),
            ("category", &html::escape(&category)),
            ("price", &price_label(product.price, language_code)),
        ],
        language_code,
    );
    let description = product.description.trim();
    if !description.is_empty() {
        caption.push_str("\n\n");
        caption.push_str(&html::escape(description));
    }
    caption
}

/// Product detail with buy, add-to-cart and a back button to the parent context.
/// A product whose category is gone goes back to the catalog root.
pub fn product_screen(
    snapshot: &CatalogSnapshot,
    product: &Product,
    from_category: bool,
    language_code: Option<&str>,
) -> ProductScreen {
    let back_target = match snapshot.category(&product.category_id) {
        Some(category) if from_category => CallbackCommand::OpenCategory(category.id.clone()),
        _ => CallbackCommand::Products,
    };

    let keyboard = InlineKeyboardMarkup::new(vec![
        vec![
            button(
                t_lang("button-buy", language_code),
                CallbackCommand::BuyNow(product.id.clone()),
            ),
            button(
                t_lang("button-add-to-cart", language_code),
                CallbackCommand::AddToCart(product.id.clone()),
            ),
        ],
        vec![button(t_lang("button-back", language_code), back_target)],
    ]);

    // An undecodable image degrades to a text-only detail
    let image = product.image().unwrap_or_else(|e| {
        warn!(product_id = %product.id, error = %e, "Ignoring product image");
        None
    });

    ProductScreen {
        caption: product_caption(snapshot, product, language_code),
        image,
        keyboard,
    }
}

/// Free-text search hits, one open-product button each
pub fn search_results_screen(
    results: &[&Product],
    query: &str,
    language_code: Option<&str>,
) -> Screen {
    let query = html::escape(query);
    if results.is_empty() {
        return Screen {
            text: t_args_lang("search-no-results", &[("query", &query)], language_code),
            keyboard: InlineKeyboardMarkup::new(vec![vec![button(
                t_lang("menu-products", language_code),
                CallbackCommand::Products,
            )]]),
        };
    }

    let mut rows: Vec<Vec<InlineKeyboardButton>> = results
        .iter()
        .map(|p| vec![product_button(p, false, language_code)])
        .collect();
    rows.push(back_to_root(language_code));

    Screen {
        text: t_args_lang(
            "search-results",
            &[("query", &query), ("count", &results.len().to_string())],
            language_code,
        ),
        keyboard: InlineKeyboardMarkup::new(rows),
    }
}

/// Cart contents with per-line decrement, clear, checkout and the optional web checkout link
pub fn cart_screen(
    view: &CartView,
    checkout_link: Option<url::Url>,
    language_code: Option<&str>,
) -> Screen {
    if view.is_empty() {
        return Screen {
            text: t_lang("cart-empty", language_code),
            keyboard: InlineKeyboardMarkup::new(vec![vec![button(
                t_lang("button-continue-shopping", language_code),
                CallbackCommand::Products,
            )]]),
        };
    }

    let mut text = t_lang("cart-title", language_code);
    text.push('\n');
    let mut rows = Vec::new();
    for line in &view.lines {
        text.push('\n');
        text.push_str(&t_args_lang(
            "cart-line",
            &[
                ("name", &html::escape(&line.product.name)),
                ("quantity", &line.quantity.to_string()),
                ("total", &price_label(line.line_total(), language_code)),
            ],
            language_code,
        ));
        rows.push(vec![button(
            t_args_lang(
                "button-remove-one",
                &[("name", &line.product.name)],
                language_code,
            ),
            CallbackCommand::RemoveOne(line.product.id.clone()),
        )]);
    }
    if !view.unavailable.is_empty() {
        text.push_str("\n\n");
        text.push_str(&t_args_lang(
            "cart-unavailable",
            &[("count", &view.unavailable.len().to_string())],
            language_code,
        ));
    }
    text.push_str("\n\n");
    text.push_str(&t_args_lang(
        "cart-subtotal",
        &[("amount", &price_label(view.subtotal(), language_code))],
        language_code,
    ));

    rows.push(vec![
        button(t_lang("button-checkout", language_code), CallbackCommand::Checkout),
        button(t_lang("button-clear-cart", language_code), CallbackCommand::ClearCart),
    ]);
    if let Some(link) = checkout_link {
        rows.push(vec![InlineKeyboardButton::url(
            t_lang("button-web-checkout", language_code),
            link,
        )]);
    }
    rows.push(vec![button(
        t_lang("button-continue-shopping", language_code),
        CallbackCommand::Products,
    )]);

    Screen {
        text,
        keyboard: InlineKeyboardMarkup::new(rows),
    }
}

/// Order confirmation with item summary and address; a payment link button
/// when payment is configured, otherwise a staff follow-up note
pub fn order_confirmation(
    order: &Order,
    payment_link: Option<url::Url>,
    language_code: Option<&str>,
) -> Screen {
    let mut text = t_args_lang(
        "order-confirmed",
        &[("order_id", &html::escape(&order.id))],
        language_code,
    );
    text.push('\n');
    for item in &order.items {
        text.push('\n');
        text.push_str(&t_args_lang(
            "order-item-line",
            &[
                ("name", &html::escape(&item.product_name)),
                ("quantity", &item.quantity.to_string()),
                ("total", &price_label(item.line_total(), language_code)),
            ],
            language_code,
        ));
    }
    if let Some(method) = &order.shipping_method {
        text.push('\n');
        text.push_str(&t_args_lang(
            "order-shipping-line",
            &[
                ("method", &html::escape(method)),
                ("amount", &price_label(order.shipping_cost, language_code)),
            ],
            language_code,
        ));
    }
    text.push_str("\n\n");
    text.push_str(&t_args_lang(
        "order-total",
        &[("amount", &price_label(order.total_amount, language_code))],
        language_code,
    ));
    text.push('\n');
    text.push_str(&t_args_lang(
        "order-address",
        &[("address", &html::escape(&order.customer_address))],
        language_code,
    ));
    text.push_str("\n\n");

    let mut rows = Vec::new();
    match payment_link {
        Some(link) => {
            text.push_str(&t_lang("order-pay-prompt", language_code));
            rows.push(vec![InlineKeyboardButton::url(
                t_lang("button-pay", language_code),
                link,
            )]);
        }
        None => text.push_str(&t_lang("order-staff-followup", language_code)),
    }
    rows.push(vec![button(
        t_lang("button-continue-shopping", language_code),
        CallbackCommand::Products,
    )]);

    Screen {
        text,
        keyboard: InlineKeyboardMarkup::new(rows),
    }
}

/// Payment page address for an order, `None` if the base URL is unusable
pub fn payment_link(base_url: &str, order: &Order) -> Option<url::Url> {
    let mut url = url::Url::parse(base_url).ok()?;
    url.query_pairs_mut()
        .append_pair("order", &order.id)
        .append_pair("amount", &order.total_amount.to_string());
    Some(url)
}

/// Inline query answers, each with a buy button
pub fn inline_results(
    snapshot: &CatalogSnapshot,
    products: &[&Product],
    language_code: Option<&str>,
) -> Vec<InlineResult> {
    products
        .iter()
        .map(|product| InlineResult {
            id: product.id.clone(),
            title: product.name.clone(),
            description: t_args_lang(
                "inline-description",
                &[
                    ("code", &product.code),
                    ("pack_size", &product.pack_size.to_string()),
                    ("price", &price_label(product.price, language_code)),
                ],
                language_code,
            ),
            message_text: product_caption(snapshot, product, language_code),
            keyboard: InlineKeyboardMarkup::new(vec![vec![button(
                t_lang("button-buy", language_code),
                CallbackCommand::BuyNow(product.id.clone()),
            )]]),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Category;
    use chrono::Utc;
    use teloxide::types::InlineKeyboardButtonKind;

    fn product(id: &str, category_id: &str) -> Product {
        Product {
            id: id.to_string(),
            code: format!("C-{id}"),
            name: format!("Product <{id}>"),
            price: 3_500_000,
            pack_size: 2,
            category_id: category_id.to_string(),
            description: "Nice & small".to_string(),
            image_ref: String::new(),
            created_at: Utc::now(),
        }
    }

    fn callbacks(keyboard: &InlineKeyboardMarkup) -> Vec<String> {
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

    fn snapshot() -> CatalogSnapshot {
        CatalogSnapshot::new(
            vec![product("p1", "c1"), product("p2", "c1"), product("p3", "")],
            vec![Category {
                id: "c1".to_string(),
                name: "Audio".to_string(),
            }],
        )
    }

    #[test]
    fn test_root_lists_categories() {
        let screen = catalog_root(&snapshot(), Some("en"));
        assert_eq!(callbacks(&screen.keyboard), vec!["cat_c1", "cmd_start"]);
    }

    #[test]
    fn test_root_falls_back_to_flat_products() {
        let snapshot = CatalogSnapshot::new(vec![product("p1", "")], vec![]);
        let screen = catalog_root(&snapshot, Some("en"));
        assert_eq!(callbacks(&screen.keyboard), vec!["prod_p1", "cmd_start"]);
    }

    #[test]
    fn test_category_products_carry_parent_context() {
        let screen = category_screen(&snapshot(), "c1", Some("en"));
        assert_eq!(
            callbacks(&screen.keyboard),
            vec!["cprod_p1", "cprod_p2", "cmd_products"]
        );

        let stale = category_screen(&snapshot(), "gone", Some("en"));
        assert_eq!(callbacks(&stale.keyboard), vec!["cmd_products"]);
    }

    #[test]
    fn test_product_back_button_returns_to_origin() {
        let snapshot = snapshot();
        let p1 = snapshot.product("p1").unwrap();

        let from_category = product_screen(&snapshot, p1, true, Some("en"));
        assert_eq!(
            callbacks(&from_category.keyboard),
            vec!["order_p1", "add_p1", "cat_c1"]
        );

        let from_root = product_screen(&snapshot, p1, false, Some("en"));
        assert_eq!(callbacks(&from_root.keyboard).last().unwrap(), "cmd_products");
        assert!(from_root.image.is_none());
    }

    #[test]
    fn test_underscored_category_navigation() {
        let snapshot = CatalogSnapshot::new(
            vec![product("p_1", "home_audio")],
            vec![Category {
                id: "home_audio".to_string(),
                name: "Home audio".to_string(),
            }],
        );

        let root = catalog_root(&snapshot, Some("en"));
        assert_eq!(callbacks(&root.keyboard)[0], "cat_home_audio");

        let category = category_screen(&snapshot, "home_audio", Some("en"));
        let payload = callbacks(&category.keyboard)[0].clone();
        let CallbackCommand::OpenProduct {
            product_id,
            from_category,
        } = CallbackCommand::parse(&payload)
        else {
            panic!("unexpected payload {payload}");
        };
        assert_eq!(product_id, "p_1");

        let detail = product_screen(
            &snapshot,
            snapshot.product(&product_id).unwrap(),
            from_category,
            Some("en"),
        );
        assert_eq!(callbacks(&detail.keyboard).last().unwrap(), "cat_home_audio");
    }

    #[test]
    fn test_payloads_fit_telegram_limit_with_longest_ids() {
        use crate::cart::CartStore;
        use crate::command::{CALLBACK_DATA_MAX_BYTES, MAX_ID_BYTES};

        let category_id = "c".repeat(MAX_ID_BYTES);
        let product_id = "p".repeat(MAX_ID_BYTES);
        let snapshot = CatalogSnapshot::new(
            vec![product(&product_id, &category_id)],
            vec![Category {
                id: category_id.clone(),
                name: "Long".to_string(),
            }],
        );
        let item = snapshot.product(&product_id).unwrap();
        let mut carts = CartStore::new();
        carts.add(1, &product_id);

        let keyboards = vec![
            catalog_root(&snapshot, Some("en")).keyboard,
            category_screen(&snapshot, &category_id, Some("en")).keyboard,
            product_screen(&snapshot, item, true, Some("en")).keyboard,
            search_results_screen(&[item], "p", Some("en")).keyboard,
            cart_screen(&carts.view(1, &snapshot), None, Some("en")).keyboard,
            inline_results(&snapshot, &[item], Some("en"))[0].keyboard.clone(),
        ];
        for keyboard in &keyboards {
            for payload in callbacks(keyboard) {
                assert!(
                    payload.len() <= CALLBACK_DATA_MAX_BYTES,
                    "{payload} is {} bytes",
                    payload.len()
                );
            }
        }
    }

    #[test]
    fn test_caption_is_html_escaped() {
        let snapshot = snapshot();
        let caption = product_caption(&snapshot, snapshot.product("p1").unwrap(), Some("en"));
        assert!(caption.contains("Product &lt;p1&gt;"));
        assert!(caption.contains("Nice &amp; small"));
        assert!(caption.contains("3,500,000"));
        assert!(caption.contains("Audio"));
    }

    #[test]
    fn test_inline_results_have_buy_buttons() {
        let snapshot = snapshot();
        let hits = snapshot.search("p3", 20);
        let results = inline_results(&snapshot, &hits, Some("en"));
        assert_eq!(results.len(), 1);
        assert_eq!(callbacks(&results[0].keyboard), vec!["order_p3"]);
    }

    #[test]
    fn test_payment_link() {
        let order = Order {
            id: "ORD-123456".to_string(),
            customer_id: 1,
            customer_name: "Ali".to_string(),
            customer_phone: "0912".to_string(),
            customer_address: "Tehran".to_string(),
            items: vec![],
            shipping_method: None,
            shipping_cost: 0,
            total_amount: 3_500_000,
            status: crate::model::OrderStatus::Pending,
            created_at: Utc::now(),
        };
        let link = payment_link("https://pay.example.com/checkout", &order).unwrap();
        assert_eq!(link.query(), Some("order=ORD-123456&amount=3500000"));
        assert!(payment_link("nope", &order).is_none());

        let screen = order_confirmation(&order, Some(link), Some("en"));
        assert_eq!(callbacks(&screen.keyboard), vec!["cmd_products"]);
        assert_eq!(screen.keyboard.inline_keyboard.len(), 2);
    }
}
