//! Wire types for the GameTrader API.
//!
//! Everything in here is plain serde data shared by the HTTP server and
//! any client talking to it. Database representations live in
//! `gametrader-core::entities`.

pub mod objects;
