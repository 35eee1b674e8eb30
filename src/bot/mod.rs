//! Bot-side components: the Telegram transport and the gateway client.

pub mod client;
pub mod telegram;

pub use client::{PlatformUser, RegistrationClient, RegistrationOutcome, reply_text};
pub use telegram::TelegramBot;
