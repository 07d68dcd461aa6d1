//! Notification rendering and delivery.

pub mod templates;
pub mod transport;

pub use templates::{Notification, Role, offer_notification, user_notification};
pub use transport::{DeliveryError, LogTransport, MailTransport, RelayTransport};
