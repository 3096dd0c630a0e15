//! A pure-rust client for Driveline, a unified stream-log and key-value
//! store with a query language (DQL).
//!
//! The client owns a single long-lived WebSocket connection over which it
//! issues commands and receives asynchronous, correlated replies for many
//! concurrent logical operations. Transient disconnects are survived
//! transparently: the connection is re-established with capped exponential
//! backoff, stream aliases are re-defined, and long-running operations
//! (continuous queries, in-flight loads) re-submit themselves.
//!
//! The entry point is [`Client`]:
//!
//! ```rust,no_run
//! use driveline::{Client, DrivelineResult};
//! use tokio_util::sync::CancellationToken;
//!
//! async fn sample() -> DrivelineResult<()> {
//!     let client = Client::new("ws://localhost:8080").await?;
//!     client.store("config/sample", b"v1").await?;
//!     let record = client.load(&CancellationToken::new(), "config/sample").await?;
//!     println!("loaded {}", record.id);
//!     client.close();
//!     Ok(())
//! }
//! ```

#![deny(missing_debug_implementations)]
#![deny(clippy::all)]
#![deny(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::cast_possible_truncation)]

#[macro_use]
extern crate log;

mod client;
mod conn;
mod consumer;
mod driveline_error;
mod protocol;

pub use crate::client::{Client, Stream};
pub use crate::conn::{ConnectParams, ConnectionConfiguration, IntoConnectParams};
pub use crate::driveline_error::{DrivelineError, DrivelineResult};
pub use crate::protocol::parts::{QueryOptions, Record, RecordId, StoreOptions, StreamId};

pub use tokio_util::sync::CancellationToken;
