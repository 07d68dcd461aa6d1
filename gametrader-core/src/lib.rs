#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::panic))]
#![forbid(unsafe_code)]

pub mod entities;
pub mod events;
pub mod framework;
pub mod notifications;
pub mod processors;
pub mod store;
pub mod trade;
pub mod utils;
