//! Secondary indices the Validator consults before an event is trusted:
//! a known-bot identifier set and an email deliverability cache. Both are
//! read-mostly, upserted best-effort, and owned by the same Postgres pool as
//! the rest of the Store.

pub mod bot_registry;
pub mod email_validation_registry;

pub use bot_registry::BotRegistry;
pub use email_validation_registry::EmailValidationRegistry;
