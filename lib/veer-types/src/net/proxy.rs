/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2023-2025 ByteDance and/or its affiliates.
 */

use thiserror::Error;
use url::Url;

use super::{Host, SocksAuth, UpstreamAddr};

const DEFAULT_SOCKS_PORT: u16 = 1080;

#[derive(Debug, Error)]
pub enum ProxyParseError {
    #[error("invalid scheme")]
    InvalidScheme,
    #[error("no host found")]
    NoHostFound,
    #[error("invalid port")]
    InvalidPort,
    #[error("invalid auth")]
    InvalidAuth,
}

#[derive(Clone, Debug)]
pub struct Socks5Proxy {
    peer: UpstreamAddr,
    pub auth: SocksAuth,
}

impl Socks5Proxy {
    pub fn new(peer: UpstreamAddr) -> Self {
        Socks5Proxy {
            peer,
            auth: SocksAuth::None,
        }
    }

    pub fn peer(&self) -> &UpstreamAddr {
        &self.peer
    }
}

#[derive(Clone, Debug)]
pub struct HttpProxy {
    peer: UpstreamAddr,
}

impl HttpProxy {
    pub fn new(peer: UpstreamAddr) -> Self {
        HttpProxy { peer }
    }

    pub fn peer(&self) -> &UpstreamAddr {
        &self.peer
    }
}

/// The proxy a single request attempt is sent through.
#[derive(Clone, Debug)]
pub enum Proxy {
    Socks5(Socks5Proxy),
    Http(HttpProxy),
}

impl Proxy {
    pub fn peer(&self) -> &UpstreamAddr {
        match self {
            Proxy::Socks5(p) => p.peer(),
            Proxy::Http(p) => p.peer(),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Proxy::Socks5(_) => "socks5",
            Proxy::Http(_) => "http",
        }
    }
}

fn peer_from_url(url: &Url, default_port: u16) -> Result<UpstreamAddr, ProxyParseError> {
    let host = url.host().ok_or(ProxyParseError::NoHostFound)?;
    if matches!(host, url::Host::Domain("")) {
        return Err(ProxyParseError::NoHostFound);
    }
    // url drops the port if it is the default one of a known scheme
    let port = url.port_or_known_default().unwrap_or(default_port);
    if port == 0 {
        return Err(ProxyParseError::InvalidPort);
    }
    Ok(UpstreamAddr::new(Host::from(host), port))
}

impl TryFrom<&Url> for Proxy {
    type Error = ProxyParseError;

    fn try_from(value: &Url) -> Result<Self, Self::Error> {
        match value.scheme().to_ascii_lowercase().as_str() {
            "socks" | "socks5" | "socks5h" => {
                let peer = peer_from_url(value, DEFAULT_SOCKS_PORT)?;
                let auth = SocksAuth::try_from(value)?;
                Ok(Proxy::Socks5(Socks5Proxy { peer, auth }))
            }
            "http" => {
                let peer = peer_from_url(value, 80)?;
                Ok(Proxy::Http(HttpProxy { peer }))
            }
            _ => Err(ProxyParseError::InvalidScheme),
        }
    }
}
