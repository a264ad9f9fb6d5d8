//! # Teleshop
//!
//! A storefront run entirely inside a Telegram chat. Customers browse the
//! catalog, fill a cart and place orders through a short wizard; staff see
//! the orders in Postgres and customers hear back when an order's status
//! changes.

pub mod bot;
pub mod cart;
pub mod catalog;
pub mod circuit_breaker;
pub mod command;
pub mod config;
pub mod cursor;
pub mod db;
pub mod dialogue;
pub mod errors;
pub mod event;
pub mod localization;
pub mod model;
pub mod poller;
pub mod session;
pub mod status_notifier;
pub mod store;
pub mod transport;
