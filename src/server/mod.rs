// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! Routing for client commands.
//!
//! Commands arrive already split into tokens. [`RpcConnection::dispatch`]
//! handles datastore-level commands itself and forwards
//! `node <UUID> <data name> ...` to the named data instance.
//!
//! # Example
//!
//! ```
//! use voxdag::datastore::Datastore;
//! use voxdag::server::{Request, RpcConnection};
//!
//! let store = Datastore::in_memory().unwrap();
//! let conn = RpcConnection::new(&store);
//!
//! let reply = conn.dispatch(&Request::new(["datasets", "new"])).unwrap();
//! assert!(reply.text.starts_with("New dataset"));
//! ```

mod rpc;

pub use rpc::{Request, Response, RpcConnection, RpcError};
