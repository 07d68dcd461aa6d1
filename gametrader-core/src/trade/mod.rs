//! The offer trade lifecycle.
//!
//! - [`OfferValidator`]: distinctness and ownership checks
//! - [`TradeExecutor`]: two-sided ownership swap on acceptance
//! - [`TradeService`]: create/update/get entry points, publishes offer events
//! - [`AccountService`]: user signup and updates, publishes user events

pub mod accounts;
pub mod executor;
pub mod service;
pub mod validator;

pub use accounts::{AccountError, AccountService, NewUser, UserUpdate};
pub use executor::{ExecutionError, TradeExecutor};
pub use service::{TradeError, TradeService};
pub use validator::{OfferValidator, RejectReason, ValidationError};
