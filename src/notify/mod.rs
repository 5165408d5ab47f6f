//! Outbound notifications

pub mod telegram;

pub use telegram::TelegramNotifier;
