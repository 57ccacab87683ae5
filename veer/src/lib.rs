/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2023-2025 ByteDance and/or its affiliates.
 */

mod config;
mod connection;
mod error;
mod event;
mod loader;
mod protocol;
mod request;
mod response;
mod tls;

pub mod cmd;
pub mod cookie;
pub mod logger;
pub mod opts;
pub mod probe;
pub mod proxy;
pub mod router;
pub mod timer;

#[cfg(test)]
mod testing;

pub use config::StreamConfig;
pub use connection::{ConnectionState, StreamHttpClient};
pub use error::{ConnectError, EngineError, StreamError};
pub use event::LoadEvent;
pub use loader::{DEFAULT_MAX_REDIRECTS, LoadedResponse, Loader};
pub use protocol::ProxyProtocol;
pub use proxy::{ProxyDescriptor, ProxyEndpoint};
pub use request::{
    BodyReader, BodyStream, DEFAULT_TIMEOUT_INTERVAL, PASS_HEADER, RequestBody, RequestEnvelope,
};
pub use response::ResponseEnvelope;
