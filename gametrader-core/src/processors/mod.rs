//! Event processors for the notification pipeline.
//!
//! - `NotificationDispatcher`: turns an `EventRecord` into the messages it implies
//! - `NotificationConsumer`: consumes the offer and user topics as a consumer
//!   group member and feeds each record through a `RecordHandler`

pub mod dispatcher;
pub mod notification_consumer;

pub use dispatcher::{Dispatch, DispatchError, NotificationDispatcher};
pub use notification_consumer::{
    ConsumerSettings, NotificationConsumer, RecordHandler, Settled,
};
