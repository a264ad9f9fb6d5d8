//! # Cart Store
//!
//! Per-customer product quantities. Owned by the poll loop; nothing else
//! mutates carts. Quantities are always at least one: decrementing the last
//! unit removes the entry.

use std::collections::HashMap;

use tracing::warn;

use crate::catalog::CatalogSnapshot;
use crate::model::{CustomerId, OrderItem, Product};

#[derive(Debug, Clone, PartialEq, Eq)]
struct CartEntry {
    product_id: String,
    quantity: u32,
}

/// A cart entry joined against the current catalog
#[derive(Debug, Clone, PartialEq)]
pub struct CartLine {
    pub product: Product,
    pub quantity: u32,
}

impl CartLine {
    pub fn line_total(&self) -> i64 {
        self.product.price * i64::from(self.quantity)
    }
}

/// Hydrated cart contents
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CartView {
    pub lines: Vec<CartLine>,
    /// Product ids still in the cart but no longer in the catalog
    pub unavailable: Vec<String>,
}

impl CartView {
    pub fn subtotal(&self) -> i64 {
        self.lines.iter().map(CartLine::line_total).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Order items priced from this view
    pub fn to_order_items(&self) -> Vec<OrderItem> {
        self.lines
            .iter()
            .map(|line| OrderItem {
                product_id: line.product.id.clone(),
                product_name: line.product.name.clone(),
                quantity: line.quantity,
                price_at_time: line.product.price,
            })
            .collect()
    }
}

/// In-memory carts keyed by customer identity
#[derive(Debug, Default)]
pub struct CartStore {
    carts: HashMap<CustomerId, Vec<CartEntry>>,
}

impl CartStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Increment the quantity of a product, creating the entry if absent.
    /// Returns the new quantity.
    pub fn add(&mut self, customer: CustomerId, product_id: &str) -> u32 {
        let entries = self.carts.entry(customer).or_default();
        match entries.iter_mut().find(|e| e.product_id == product_id) {
            Some(entry) => {
                entry.quantity += 1;
                entry.quantity
            }
            None => {
                entries.push(CartEntry {
                    product_id: product_id.to_string(),
                    quantity: 1,
                });
                1
            }
        }
    }

    /// Decrement a product's quantity; the entry disappears when it reaches zero.
    /// Returns the remaining quantity, or `None` if the product was not in the cart.
    pub fn remove_one(&mut self, customer: CustomerId, product_id: &str) -> Option<u32> {
        let entries = self.carts.get_mut(&customer)?;
        let index = entries.iter().position(|e| e.product_id == product_id)?;

        let remaining = entries[index].quantity.saturating_sub(1);
        if remaining == 0 {
            entries.remove(index);
        } else {
            entries[index].quantity = remaining;
        }
        if entries.is_empty() {
            self.carts.remove(&customer);
        }
        Some(remaining)
    }

    /// Remove every entry for the customer. Returns whether anything was removed.
    pub fn clear(&mut self, customer: CustomerId) -> bool {
        self.carts.remove(&customer).is_some()
    }

    pub fn quantity(&self, customer: CustomerId, product_id: &str) -> u32 {
        self.carts
            .get(&customer)
            .and_then(|entries| entries.iter().find(|e| e.product_id == product_id))
            .map_or(0, |e| e.quantity)
    }

    pub fn is_empty(&self, customer: CustomerId) -> bool {
        !self.carts.contains_key(&customer)
    }

    /// Join the customer's entries against the snapshot, in the order they were added
    pub fn view(&self, customer: CustomerId, snapshot: &CatalogSnapshot) -> CartView {
        let mut view = CartView::default();
        for entry in self.carts.get(&customer).into_iter().flatten() {
            match snapshot.product(&entry.product_id) {
                Some(product) => view.lines.push(CartLine {
                    product: product.clone(),
                    quantity: entry.quantity,
                }),
                None => view.unavailable.push(entry.product_id.clone()),
            }
        }
        view
    }

    /// Address of the web checkout for this cart, if the cart has anything in it
    pub fn checkout_link(&self, customer: CustomerId, base_url: &str) -> Option<url::Url> {
        let entries = self.carts.get(&customer)?;

        let mut url = match url::Url::parse(base_url) {
            Ok(url) => url,
            Err(e) => {
                warn!(base_url = %base_url, error = %e, "Invalid checkout base URL");
                return None;
            }
        };

        let items = entries
            .iter()
            .map(|e| format!("{}:{}", e.product_id, e.quantity))
            .collect::<Vec<_>>()
            .join(",");
        url.query_pairs_mut()
            .append_pair("customer", &customer.to_string())
            .append_pair("items", &items);

        Some(url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn product(id: &str, price: i64) -> Product {
        Product {
            id: id.to_string(),
            code: format!("C-{id}"),
            name: format!("Product {id}"),
            price,
            pack_size: 1,
            category_id: String::new(),
            description: String::new(),
            image_ref: String::new(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_add_counts_every_call() {
        let mut carts = CartStore::new();
        let calls = ["a", "b", "a", "a", "b", "c"];
        for id in calls {
            carts.add(7, id);
        }
        for id in ["a", "b", "c"] {
            let expected = calls.iter().filter(|c| **c == id).count() as u32;
            assert_eq!(carts.quantity(7, id), expected);
        }
        assert_eq!(carts.quantity(8, "a"), 0);
    }

    #[test]
    fn test_remove_one_drops_entry_at_zero() {
        let mut carts = CartStore::new();
        carts.add(1, "a");
        carts.add(1, "a");

        assert_eq!(carts.remove_one(1, "a"), Some(1));
        assert_eq!(carts.remove_one(1, "a"), Some(0));
        assert_eq!(carts.quantity(1, "a"), 0);
        assert!(carts.is_empty(1));
        assert_eq!(carts.remove_one(1, "a"), None);
    }

    #[test]
    fn test_view_hydrates_and_totals() {
        let mut carts = CartStore::new();
        carts.add(1, "a");
        carts.add(1, "b");
        carts.add(1, "a");
        carts.add(1, "gone");

        let snapshot = CatalogSnapshot::new(vec![product("a", 1500), product("b", 200)], vec![]);
        let view = carts.view(1, &snapshot);

        assert_eq!(view.lines.len(), 2);
        assert_eq!(view.lines[0].product.id, "a");
        assert_eq!(view.lines[0].quantity, 2);
        assert_eq!(view.subtotal(), 3200);
        assert_eq!(view.unavailable, vec!["gone".to_string()]);

        let items = view.to_order_items();
        assert_eq!(items[0].price_at_time, 1500);
        assert_eq!(items[0].quantity, 2);
    }

    #[test]
    fn test_view_of_unknown_customer_is_empty() {
        let carts = CartStore::new();
        let view = carts.view(99, &CatalogSnapshot::default());
        assert!(view.is_empty());
        assert_eq!(view.subtotal(), 0);
    }

    #[test]
    fn test_clear_removes_everything() {
        let mut carts = CartStore::new();
        carts.add(1, "a");
        carts.add(2, "a");
        assert!(carts.clear(1));
        assert!(!carts.clear(1));
        assert!(carts.is_empty(1));
        assert_eq!(carts.quantity(2, "a"), 1);
    }

    #[test]
    fn test_checkout_link() {
        let mut carts = CartStore::new();
        assert!(carts.checkout_link(1, "https://shop.example.com/checkout").is_none());

        carts.add(1, "a");
        carts.add(1, "a");
        carts.add(1, "b");
        let link = carts
            .checkout_link(1, "https://shop.example.com/checkout")
            .unwrap();
        assert_eq!(link.host_str(), Some("shop.example.com"));
        let query = link.query().unwrap();
        assert!(query.contains("customer=1"));
        assert!(query.contains("items=a%3A2%2Cb%3A1"));

        assert!(carts.checkout_link(1, "not a url").is_none());
    }
}
