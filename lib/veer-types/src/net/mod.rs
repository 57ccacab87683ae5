/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2023-2025 ByteDance and/or its affiliates.
 */

mod auth;
mod host;
mod proxy;
mod tls;
mod upstream;

pub use auth::SocksAuth;
pub use host::Host;
pub use proxy::{HttpProxy, Proxy, ProxyParseError, Socks5Proxy};
pub use tls::TlsVersion;
pub use upstream::{UpstreamAddr, UpstreamAddrParseError};
