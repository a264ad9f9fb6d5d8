//! # Collaborator Stores
//!
//! The storefront reads the catalog, writes orders and remembers verified
//! contacts through these traits. [`crate::db::PgStore`] is the production
//! implementation; [`MemoryStore`] keeps everything in process for tests and
//! local runs.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;

use crate::errors::{ShopError, ShopResult};
use crate::model::{phones_match, Category, CustomerId, Order, OrderStatus, Product, VerifiedContact};

/// Read-only product and category source
#[async_trait]
pub trait CatalogStore: Send + Sync {
    async fn list_products(&self) -> ShopResult<Vec<Product>>;
    async fn list_categories(&self) -> ShopResult<Vec<Category>>;
}

/// System of record for finalized orders
#[async_trait]
pub trait OrderLedger: Send + Sync {
    /// Persist a new order; an existing id is a [`ShopError::DuplicateOrderId`]
    async fn create_order(&self, order: &Order) -> ShopResult<()>;
    async fn find_order(&self, order_id: &str) -> ShopResult<Option<Order>>;
    /// Returns `false` when no such order exists
    async fn update_status(&self, order_id: &str, status: OrderStatus) -> ShopResult<bool>;
}

/// Chat identities tied to verified phone numbers
#[async_trait]
pub trait ContactRegistry: Send + Sync {
    async fn find_contact(&self, customer_id: CustomerId) -> ShopResult<Option<VerifiedContact>>;
    async fn upsert_contact(&self, contact: &VerifiedContact) -> ShopResult<()>;
    /// Contact whose phone denotes the same line as `phone`
    async fn find_contact_by_phone(
        &self,
        phone: &str,
        country_code: &str,
    ) -> ShopResult<Option<VerifiedContact>>;
}

#[derive(Debug, Default)]
struct MemoryState {
    products: Vec<Product>,
    categories: Vec<Category>,
    orders: Vec<Order>,
    contacts: HashMap<CustomerId, VerifiedContact>,
}

/// In-process implementation of every store trait
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
    catalog_unavailable: AtomicBool,
    ledger_unavailable: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_catalog(products: Vec<Product>, categories: Vec<Category>) -> Self {
        let store = Self::new();
        {
            let mut state = store.lock();
            state.products = products;
            state.categories = categories;
        }
        store
    }

    pub fn set_products(&self, products: Vec<Product>) {
        self.lock().products = products;
    }

    /// Make catalog reads fail until reset
    pub fn set_catalog_unavailable(&self, unavailable: bool) {
        self.catalog_unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Make order writes fail until reset
    pub fn set_ledger_unavailable(&self, unavailable: bool) {
        self.ledger_unavailable.store(unavailable, Ordering::SeqCst);
    }

    pub fn orders(&self) -> Vec<Order> {
        self.lock().orders.clone()
    }

    pub fn contacts(&self) -> Vec<VerifiedContact> {
        self.lock().contacts.values().cloned().collect()
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn check(flag: &AtomicBool, what: &str) -> ShopResult<()> {
        if flag.load(Ordering::SeqCst) {
            return Err(ShopError::Unavailable(format!("{what} is unavailable")));
        }
        Ok(())
    }
}

#[async_trait]
impl CatalogStore for MemoryStore {
    async fn list_products(&self) -> ShopResult<Vec<Product>> {
        Self::check(&self.catalog_unavailable, "catalog")?;
        Ok(self.lock().products.clone())
    }

    async fn list_categories(&self) -> ShopResult<Vec<Category>> {
        Self::check(&self.catalog_unavailable, "catalog")?;
        Ok(self.lock().categories.clone())
    }
}

#[async_trait]
impl OrderLedger for MemoryStore {
    async fn create_order(&self, order: &Order) -> ShopResult<()> {
        Self::check(&self.ledger_unavailable, "order ledger")?;
        let mut state = self.lock();
        if state.orders.iter().any(|o| o.id == order.id) {
            return Err(ShopError::DuplicateOrderId(order.id.clone()));
        }
        state.orders.push(order.clone());
        Ok(())
    }

    async fn find_order(&self, order_id: &str) -> ShopResult<Option<Order>> {
        Self::check(&self.ledger_unavailable, "order ledger")?;
        Ok(self.lock().orders.iter().find(|o| o.id == order_id).cloned())
    }

    async fn update_status(&self, order_id: &str, status: OrderStatus) -> ShopResult<bool> {
        Self::check(&self.ledger_unavailable, "order ledger")?;
        let mut state = self.lock();
        match state.orders.iter_mut().find(|o| o.id == order_id) {
            Some(order) => {
                order.status = status;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

#[async_trait]
impl ContactRegistry for MemoryStore {
    async fn find_contact(&self, customer_id: CustomerId) -> ShopResult<Option<VerifiedContact>> {
        Ok(self.lock().contacts.get(&customer_id).cloned())
    }

    async fn upsert_contact(&self, contact: &VerifiedContact) -> ShopResult<()> {
        self.lock()
            .contacts
            .insert(contact.customer_id, contact.clone());
        Ok(())
    }

    async fn find_contact_by_phone(
        &self,
        phone: &str,
        country_code: &str,
    ) -> ShopResult<Option<VerifiedContact>> {
        Ok(self
            .lock()
            .contacts
            .values()
            .find(|c| phones_match(&c.phone_number, phone, country_code))
            .cloned())
    }
}
