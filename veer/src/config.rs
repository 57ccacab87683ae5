/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2023-2025 ByteDance and/or its affiliates.
 */

use std::sync::Arc;
use std::time::Duration;

use rustls_pki_types::CertificateDer;

use veer_types::net::{Proxy, TlsVersion};

use crate::cookie::CookieStore;

const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(30);
const DEFAULT_MAX_HEADER_SIZE: usize = 64 * 1024;

/// Session level settings of a stream client.
#[derive(Clone)]
pub struct StreamConfig {
    pub proxy: Option<Proxy>,
    pub min_tls_version: Option<TlsVersion>,
    pub cookie_store: Option<Arc<dyn CookieStore>>,
    pub connect_timeout: Duration,
    pub max_header_size: usize,
    /// trusted in addition to the webpki roots
    pub extra_roots: Vec<CertificateDer<'static>>,
}

impl Default for StreamConfig {
    fn default() -> Self {
        StreamConfig {
            proxy: None,
            min_tls_version: None,
            cookie_store: None,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            max_header_size: DEFAULT_MAX_HEADER_SIZE,
            extra_roots: Vec::new(),
        }
    }
}

impl StreamConfig {
    pub fn with_proxy(mut self, proxy: Proxy) -> Self {
        self.proxy = Some(proxy);
        self
    }
}
