//! # Postgres Storage
//!
//! Catalog, order ledger and contact registry backed by Postgres through
//! `sqlx`. Order items are stored as JSONB with their prices frozen. Status
//! updates made by staff fire `pg_notify` on [`ORDER_STATUS_CHANNEL`] so the
//! status notifier can message the customer.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgListener, PgPool, PgRow};
use sqlx::Row;
use tracing::{debug, info};

use crate::command::{is_valid_id, MAX_ID_BYTES};
use crate::errors::{ShopError, ShopResult};
use crate::model::{
    normalize_phone, phones_match, Category, CustomerId, Order, OrderItem, OrderStatus, Product,
    VerifiedContact,
};
use crate::store::{CatalogStore, ContactRegistry, OrderLedger};

/// Notification channel carrying the id of an order whose status changed
pub const ORDER_STATUS_CHANNEL: &str = "order_status_changed";

/// Initialize the database schema
pub async fn init_database_schema(pool: &PgPool) -> Result<()> {
    info!("Initializing database schema...");

    sqlx::query(
        "CREATE TABLE IF NOT EXISTS categories (
            id TEXT PRIMARY KEY CHECK (octet_length(id) BETWEEN 1 AND 48),
            name TEXT NOT NULL,
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )",
    )
    .execute(pool)
    .await
    .context("Failed to create categories table")?;

    sqlx::query(
        "CREATE TABLE IF NOT EXISTS products (
            id TEXT PRIMARY KEY CHECK (octet_length(id) BETWEEN 1 AND 48),
            code TEXT NOT NULL DEFAULT '',
            name TEXT NOT NULL,
            price BIGINT NOT NULL CHECK (price >= 0),
            pack_size INTEGER NOT NULL DEFAULT 1,
            category_id TEXT REFERENCES categories(id) ON DELETE SET NULL,
            description TEXT NOT NULL DEFAULT '',
            image_ref TEXT NOT NULL DEFAULT '',
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )",
    )
    .execute(pool)
    .await
    .context("Failed to create products table")?;

    sqlx::query(
        "CREATE TABLE IF NOT EXISTS verified_contacts (
            customer_id BIGINT PRIMARY KEY,
            phone_number TEXT NOT NULL,
            first_name TEXT NOT NULL,
            last_name TEXT,
            username TEXT,
            verified_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )",
    )
    .execute(pool)
    .await
    .context("Failed to create verified_contacts table")?;

    sqlx::query(
        "CREATE TABLE IF NOT EXISTS orders (
            id TEXT PRIMARY KEY,
            customer_id BIGINT NOT NULL,
            customer_name TEXT NOT NULL,
            customer_phone TEXT NOT NULL,
            customer_address TEXT NOT NULL,
            items JSONB NOT NULL,
            shipping_method TEXT,
            shipping_cost BIGINT NOT NULL DEFAULT 0,
            total_amount BIGINT NOT NULL,
            status TEXT NOT NULL DEFAULT 'PENDING',
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )",
    )
    .execute(pool)
    .await
    .context("Failed to create orders table")?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_products_category ON products(category_id)")
        .execute(pool)
        .await
        .context("Failed to create products category index")?;

    sqlx::query(
        "CREATE OR REPLACE FUNCTION notify_order_status_changed() RETURNS trigger AS $$
         BEGIN
             IF NEW.status IS DISTINCT FROM OLD.status THEN
                 PERFORM pg_notify('order_status_changed', NEW.id);
             END IF;
             RETURN NEW;
         END;
         $$ LANGUAGE plpgsql",
    )
    .execute(pool)
    .await
    .context("Failed to create status notification function")?;

    sqlx::query("DROP TRIGGER IF EXISTS orders_status_changed ON orders")
        .execute(pool)
        .await
        .context("Failed to drop status trigger")?;

    sqlx::query(
        "CREATE TRIGGER orders_status_changed
         AFTER UPDATE OF status ON orders
         FOR EACH ROW EXECUTE FUNCTION notify_order_status_changed()",
    )
    .execute(pool)
    .await
    .context("Failed to create status trigger")?;

    info!("Database schema initialized successfully");
    Ok(())
}

/// Open a listener subscribed to order status changes
pub async fn status_change_listener(database_url: &str) -> Result<PgListener> {
    let mut listener = PgListener::connect(database_url)
        .await
        .context("Failed to connect status listener")?;
    listener
        .listen(ORDER_STATUS_CHANNEL)
        .await
        .context("Failed to listen for order status changes")?;
    info!(channel = ORDER_STATUS_CHANNEL, "Listening for order status changes");
    Ok(listener)
}

/// Postgres implementation of the storefront's stores
#[derive(Clone, Debug)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Insert or replace a category (staff tooling and tests)
    pub async fn upsert_category(&self, category: &Category) -> ShopResult<()> {
        check_id(&category.id)?;
        sqlx::query(
            "INSERT INTO categories (id, name) VALUES ($1, $2)
             ON CONFLICT (id) DO UPDATE SET name = EXCLUDED.name",
        )
        .bind(&category.id)
        .bind(&category.name)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Insert or replace a product (staff tooling and tests)
    pub async fn upsert_product(&self, product: &Product) -> ShopResult<()> {
        check_id(&product.id)?;
        let category_id = (!product.category_id.is_empty()).then_some(product.category_id.as_str());
        sqlx::query(
            "INSERT INTO products
                (id, code, name, price, pack_size, category_id, description, image_ref, created_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
             ON CONFLICT (id) DO UPDATE SET
                code = EXCLUDED.code,
                name = EXCLUDED.name,
                price = EXCLUDED.price,
                pack_size = EXCLUDED.pack_size,
                category_id = EXCLUDED.category_id,
                description = EXCLUDED.description,
                image_ref = EXCLUDED.image_ref",
        )
        .bind(&product.id)
        .bind(&product.code)
        .bind(&product.name)
        .bind(product.price)
        .bind(i32::try_from(product.pack_size).unwrap_or(i32::MAX))
        .bind(category_id)
        .bind(&product.description)
        .bind(&product.image_ref)
        .bind(product.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

/// Ids end up in button payloads, so they are bounded to [`MAX_ID_BYTES`]
fn check_id(id: &str) -> ShopResult<()> {
    if is_valid_id(id) {
        Ok(())
    } else {
        Err(ShopError::InvalidId(format!("{id:?} must be 1 to {MAX_ID_BYTES} bytes")))
    }
}

fn product_from_row(row: &PgRow) -> ShopResult<Product> {
    let pack_size: i32 = row.try_get("pack_size")?;
    Ok(Product {
        id: row.try_get("id")?,
        code: row.try_get("code")?,
        name: row.try_get("name")?,
        price: row.try_get("price")?,
        pack_size: u32::try_from(pack_size).unwrap_or(1),
        category_id: row
            .try_get::<Option<String>, _>("category_id")?
            .unwrap_or_default(),
        description: row.try_get("description")?,
        image_ref: row.try_get("image_ref")?,
        created_at: row.try_get("created_at")?,
    })
}

fn contact_from_row(row: &PgRow) -> ShopResult<VerifiedContact> {
    Ok(VerifiedContact {
        customer_id: row.try_get("customer_id")?,
        phone_number: row.try_get("phone_number")?,
        first_name: row.try_get("first_name")?,
        last_name: row.try_get("last_name")?,
        username: row.try_get("username")?,
        verified_at: row.try_get("verified_at")?,
    })
}

fn order_from_row(row: &PgRow) -> ShopResult<Order> {
    let items_json: String = row.try_get("items_json")?;
    let items: Vec<OrderItem> = serde_json::from_str(&items_json)?;
    let status: String = row.try_get("status")?;
    let created_at: DateTime<Utc> = row.try_get("created_at")?;
    Ok(Order {
        id: row.try_get("id")?,
        customer_id: row.try_get("customer_id")?,
        customer_name: row.try_get("customer_name")?,
        customer_phone: row.try_get("customer_phone")?,
        customer_address: row.try_get("customer_address")?,
        items,
        shipping_method: row.try_get("shipping_method")?,
        shipping_cost: row.try_get("shipping_cost")?,
        total_amount: row.try_get("total_amount")?,
        status: status.parse()?,
        created_at,
    })
}

#[async_trait]
impl CatalogStore for PgStore {
    async fn list_products(&self) -> ShopResult<Vec<Product>> {
        let rows = sqlx::query(
            "SELECT id, code, name, price, pack_size, category_id, description, image_ref, created_at
             FROM products ORDER BY created_at DESC",
        )
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(product_from_row).collect()
    }

    async fn list_categories(&self) -> ShopResult<Vec<Category>> {
        let rows = sqlx::query("SELECT id, name FROM categories ORDER BY name")
            .fetch_all(&self.pool)
            .await?;
        rows.iter()
            .map(|row| {
                Ok(Category {
                    id: row.try_get("id")?,
                    name: row.try_get("name")?,
                })
            })
            .collect()
    }
}

#[async_trait]
impl OrderLedger for PgStore {
    async fn create_order(&self, order: &Order) -> ShopResult<()> {
        let items = serde_json::to_string(&order.items)?;
        let result = sqlx::query(
            "INSERT INTO orders
                (id, customer_id, customer_name, customer_phone, customer_address, items,
                 shipping_method, shipping_cost, total_amount, status, created_at)
             VALUES ($1, $2, $3, $4, $5, $6::jsonb, $7, $8, $9, $10, $11)",
        )
        .bind(&order.id)
        .bind(order.customer_id)
        .bind(&order.customer_name)
        .bind(&order.customer_phone)
        .bind(&order.customer_address)
        .bind(items)
        .bind(&order.shipping_method)
        .bind(order.shipping_cost)
        .bind(order.total_amount)
        .bind(order.status.as_str())
        .bind(order.created_at)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => {
                debug!(order_id = %order.id, "Order persisted");
                Ok(())
            }
            Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => {
                Err(ShopError::DuplicateOrderId(order.id.clone()))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn find_order(&self, order_id: &str) -> ShopResult<Option<Order>> {
        let row = sqlx::query(
            "SELECT id, customer_id, customer_name, customer_phone, customer_address,
                    items::text AS items_json, shipping_method, shipping_cost, total_amount,
                    status, created_at
             FROM orders WHERE id = $1",
        )
        .bind(order_id)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(order_from_row).transpose()
    }

    async fn update_status(&self, order_id: &str, status: OrderStatus) -> ShopResult<bool> {
        let result = sqlx::query("UPDATE orders SET status = $1 WHERE id = $2")
            .bind(status.as_str())
            .bind(order_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl ContactRegistry for PgStore {
    async fn find_contact(&self, customer_id: CustomerId) -> ShopResult<Option<VerifiedContact>> {
        let row = sqlx::query(
            "SELECT customer_id, phone_number, first_name, last_name, username, verified_at
             FROM verified_contacts WHERE customer_id = $1",
        )
        .bind(customer_id)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(contact_from_row).transpose()
    }

    async fn upsert_contact(&self, contact: &VerifiedContact) -> ShopResult<()> {
        sqlx::query(
            "INSERT INTO verified_contacts
                (customer_id, phone_number, first_name, last_name, username, verified_at)
             VALUES ($1, $2, $3, $4, $5, $6)
             ON CONFLICT (customer_id) DO UPDATE SET
                phone_number = EXCLUDED.phone_number,
                first_name = EXCLUDED.first_name,
                last_name = EXCLUDED.last_name,
                username = EXCLUDED.username,
                verified_at = EXCLUDED.verified_at",
        )
        .bind(contact.customer_id)
        .bind(&contact.phone_number)
        .bind(&contact.first_name)
        .bind(&contact.last_name)
        .bind(&contact.username)
        .bind(contact.verified_at)
        .execute(&self.pool)
        .await?;
        debug!(customer_id = contact.customer_id, "Verified contact stored");
        Ok(())
    }

    async fn find_contact_by_phone(
        &self,
        phone: &str,
        country_code: &str,
    ) -> ShopResult<Option<VerifiedContact>> {
        // Narrow by the subscriber digits, then compare normalized forms
        let local = normalize_phone(phone, country_code);
        let digits: String = local.chars().filter(char::is_ascii_digit).collect();
        if digits.is_empty() {
            return Ok(None);
        }
        let tail = &digits[digits.len().saturating_sub(10)..];

        let rows = sqlx::query(
            "SELECT customer_id, phone_number, first_name, last_name, username, verified_at
             FROM verified_contacts
             WHERE right(regexp_replace(phone_number, '[^0-9]', '', 'g'), $2) = $1",
        )
        .bind(tail)
        .bind(tail.len() as i32)
        .fetch_all(&self.pool)
        .await?;

        for row in &rows {
            let contact = contact_from_row(row)?;
            if phones_match(&contact.phone_number, phone, country_code) {
                return Ok(Some(contact));
            }
        }
        Ok(None)
    }
}
