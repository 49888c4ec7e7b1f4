//! Client for the [AlphaPoint APEX][apex] WebSocket gateway.
//!
//! A single connection carries both request/response calls and pushed market
//! and account events. [Client] correlates responses with calls by id and
//! exposes the events as typed streams.
//!
//! ```no_run
//! # async fn main_() -> anyhow::Result<()> {
//! use futures::prelude::*;
//!
//! let client = apex::Client::new(apex::Config::default());
//! client.open_connection().await?;
//!
//! let mut level1 = client.level1();
//! client
//!     .invoke(
//!         "SubscribeLevel1",
//!         Some(serde_json::json!({ "OMSId": 1, "InstrumentId": 1 })),
//!     )
//!     .await?;
//! while let Some(update) = level1.next().await {
//!     println!("{:?} {:?}", update.best_bid, update.best_offer);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! [apex]: https://apidoc.alphapoint.com

#[doc(hidden)]
pub mod cli;
pub mod config;
pub mod model;
pub mod rpc;
pub mod transport;
mod utils;

#[cfg(test)]
mod test_utils;

pub use config::Config;
pub use rpc::{CallError, Client, ConnectionState, EndpointResponse, Frame, MessageType};
pub use transport::TransportError;
pub use utils::DynError;
