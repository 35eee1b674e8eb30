//! regbridge — registration synchronization between a Telegram bot and a
//! backend record store, with event-driven welcome notifications.

pub mod bot;
pub mod config;
pub mod error;
pub mod events;
pub mod gateway;
pub mod notify;
pub mod store;
