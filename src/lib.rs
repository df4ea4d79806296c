//! Mail relay bot — forwards Telegram messages to an email address over SMTP.

pub mod channels;
pub mod config;
pub mod error;
pub mod mail;
pub mod relay;
pub mod session;
pub mod validate;
