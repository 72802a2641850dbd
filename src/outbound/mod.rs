//! Adapters for the external services behind the usecase traits.

mod codes;
mod mailer;
mod maps;
mod sheets;
mod storage;
mod stripe;

pub use codes::RedisActivationCodes;
pub use mailer::{LogMailer, SmtpMailer};
pub use maps::GoogleMapsResolver;
#[cfg(test)]
pub use maps::coordinates_from_link;
pub use sheets::GoogleSheetsParser;
pub use storage::GcsStorage;
pub use stripe::StripeConnector;
