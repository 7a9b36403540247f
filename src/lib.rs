//! # Lightstreamer TLCP Rust Client
//!
//! This crate is a Rust client for the Lightstreamer TLCP 2.1.0 (Text
//! Lightstreamer Client Protocol) over HTTP streaming. It establishes a
//! session with a Lightstreamer server, keeps a long-lived streaming
//! response open, parses the line-oriented message dialect and dispatches
//! per-item field updates to user listeners after applying the protocol's
//! delta-encoding rules. It was developed to ingest live telemetry feeds
//! into metrics pipelines, but is usable against any TLCP 2.1.0 server.
//!
//! ## About TLCP
//!
//! TLCP is the text protocol spoken by Lightstreamer servers. A client
//! POSTs `create_session.txt` and receives a streaming response whose lines
//! are protocol messages: `CONOK` binds the session, `U` carries delta
//! updates, `PROBE` keeps the connection alive, `SYNC` reports the server's
//! idea of the session age and `LOOP` asks the client to close the current
//! response and re-attach with `bind_session.txt`. Subscriptions are added
//! out of band through the `control.txt` endpoint.
//!
//! ## Features
//!
//! - **Session management**:
//!   - HTTP streaming transport with automatic LOOP-driven rebinding
//!   - A single reader task per session, even across rebinds
//!   - Bind-timeout handling and cancellation-safe shutdown
//!   - Server/client clock-skew detection on SYNC
//!
//! - **Subscriptions**:
//!   - MERGE-mode subscriptions on any data adapter, group and field schema
//!   - Full delta decoding: unchanged, null (`#`), empty (`$`), field
//!     skips (`^n`) and percent-encoded values
//!   - Per-item snapshots delivered to listeners in stream order
//!   - Optional maximum update frequency per subscription
//!
//! - **Diagnostics**:
//!   - Structured logging through the `tracing` crate
//!   - Typed errors distinguishing transport, protocol and server failures
//!
//! ## Usage
//!
//! ```ignore
//! use lightstreamer_tlcp::client::{ClientConfig, ClientSession};
//! use lightstreamer_tlcp::subscription::Values;
//!
//! async fn example() -> Result<(), lightstreamer_tlcp::utils::Error> {
//!     // Open a session against the ISS telemetry feed and wait for it to
//!     // be bound.
//!     let config = ClientConfig::new().adapter_set("ISSLIVE");
//!     let session = ClientSession::connect(config).await?;
//!
//!     // Subscribe with a closure listener; the callback receives the
//!     // fully reconciled snapshot for the updated item.
//!     session
//!         .subscribe("DEFAULT", "NODE3000005", &["Value"], None, |item: u32, values: &Values| {
//!             println!("item {item}: {values}");
//!         })
//!         .await?;
//!
//!     // ... consume updates until done ...
//!     session.disconnect();
//!     Ok(())
//! }
//! ```
//!
//! Updates can also be consumed through a channel with
//! [`subscription::ChannelListener`], which forwards `(item, Values)` pairs
//! into a tokio mpsc channel.

/// Module containing client-related functionality.
///
/// This module provides the main `ClientSession` type for connecting to
/// Lightstreamer servers, managing the session lifecycle and adding
/// subscriptions, together with its `ClientConfig` configuration.
pub mod client;

/// Module containing the TLCP message model.
///
/// This module provides the typed session-stream and control-reply
/// messages, their line parser and the streaming message sequence used by
/// the session reader.
pub mod protocol;

/// Module containing subscription-related functionality.
///
/// This module provides the subscription listener interface, the
/// channel-forwarding listener and the `Values` snapshot type with its
/// delta decoder.
pub mod subscription;

/// Module containing utility functions and error types.
pub mod utils;

/// Module containing the HTTP transport layer.
mod connection;
