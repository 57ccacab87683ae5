/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2023-2025 ByteDance and/or its affiliates.
 */

use std::fmt;
use std::sync::Arc;

use veer_types::net::{
    HttpProxy, Proxy, ProxyParseError, Socks5Proxy, SocksAuth, UpstreamAddr,
    UpstreamAddrParseError,
};

use crate::probe::Probe;

/// Proxy endpoint picked by a router, with its optional probe.
#[derive(Clone)]
pub struct ProxyEndpoint {
    pub host: String,
    pub port: u16,
    /// only used by socks proxies
    pub auth: SocksAuth,
    pub probe: Option<Arc<dyn Probe>>,
}

impl fmt::Debug for ProxyEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProxyEndpoint")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("probe", &self.probe.is_some())
            .finish()
    }
}

/// The routing decision for one request.
#[derive(Clone, Debug)]
pub enum ProxyDescriptor {
    Socks(ProxyEndpoint),
    Http(ProxyEndpoint),
}

impl ProxyDescriptor {
    fn endpoint(host: &str, port: u16) -> ProxyEndpoint {
        ProxyEndpoint {
            host: host.to_string(),
            port,
            auth: SocksAuth::None,
            probe: None,
        }
    }

    pub fn socks(host: &str, port: u16) -> Self {
        ProxyDescriptor::Socks(Self::endpoint(host, port))
    }

    pub fn http(host: &str, port: u16) -> Self {
        ProxyDescriptor::Http(Self::endpoint(host, port))
    }

    pub fn with_probe(mut self, probe: Arc<dyn Probe>) -> Self {
        self.endpoint_mut().probe = Some(probe);
        self
    }

    pub fn with_auth(mut self, auth: SocksAuth) -> Self {
        self.endpoint_mut().auth = auth;
        self
    }

    fn endpoint_mut(&mut self) -> &mut ProxyEndpoint {
        match self {
            ProxyDescriptor::Socks(e) | ProxyDescriptor::Http(e) => e,
        }
    }

    #[inline]
    fn endpoint_ref(&self) -> &ProxyEndpoint {
        match self {
            ProxyDescriptor::Socks(e) | ProxyDescriptor::Http(e) => e,
        }
    }

    pub fn host(&self) -> &str {
        &self.endpoint_ref().host
    }

    pub fn port(&self) -> u16 {
        self.endpoint_ref().port
    }

    pub fn probe(&self) -> Option<&Arc<dyn Probe>> {
        self.endpoint_ref().probe.as_ref()
    }

    pub fn to_proxy(&self) -> Result<Proxy, ProxyParseError> {
        let e = self.endpoint_ref();
        let peer = UpstreamAddr::from_host_str_and_port(&e.host, e.port).map_err(|e| match e {
            UpstreamAddrParseError::InvalidPort | UpstreamAddrParseError::NoPortFound => {
                ProxyParseError::InvalidPort
            }
            _ => ProxyParseError::NoHostFound,
        })?;
        match self {
            ProxyDescriptor::Socks(_) => {
                let mut proxy = Socks5Proxy::new(peer);
                proxy.auth = e.auth.clone();
                Ok(Proxy::Socks5(proxy))
            }
            ProxyDescriptor::Http(_) => Ok(Proxy::Http(HttpProxy::new(peer))),
        }
    }
}

impl From<&Proxy> for ProxyDescriptor {
    fn from(proxy: &Proxy) -> Self {
        let peer = proxy.peer();
        match proxy {
            Proxy::Socks5(p) => {
                ProxyDescriptor::socks(&peer.host_str(), peer.port()).with_auth(p.auth.clone())
            }
            Proxy::Http(_) => ProxyDescriptor::http(&peer.host_str(), peer.port()),
        }
    }
}
