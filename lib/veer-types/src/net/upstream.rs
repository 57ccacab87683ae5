/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2023-2025 ByteDance and/or its affiliates.
 */

use std::fmt;
use std::net::IpAddr;
use std::str::FromStr;

use thiserror::Error;
use url::Url;

use super::Host;

#[derive(Debug, Error)]
pub enum UpstreamAddrParseError {
    #[error("no host found")]
    NoHostFound,
    #[error("invalid host: {0}")]
    InvalidHost(anyhow::Error),
    #[error("no port found")]
    NoPortFound,
    #[error("invalid port")]
    InvalidPort,
}

/// A host and port pair to connect to, either directly or through a proxy.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub struct UpstreamAddr {
    host: Host,
    port: u16,
}

impl UpstreamAddr {
    pub fn new(host: Host, port: u16) -> Self {
        UpstreamAddr { host, port }
    }

    pub fn from_ip_and_port(ip: IpAddr, port: u16) -> Self {
        UpstreamAddr {
            host: Host::Ip(ip),
            port,
        }
    }

    pub fn from_host_str_and_port(host: &str, port: u16) -> Result<Self, UpstreamAddrParseError> {
        if port == 0 {
            return Err(UpstreamAddrParseError::InvalidPort);
        }
        let host = Host::from_str(host).map_err(UpstreamAddrParseError::InvalidHost)?;
        Ok(UpstreamAddr { host, port })
    }

    #[inline]
    pub fn host(&self) -> &Host {
        &self.host
    }

    #[inline]
    pub fn port(&self) -> u16 {
        self.port
    }

    /// The host part as used for name resolution, without brackets.
    pub fn host_str(&self) -> String {
        self.host.to_string()
    }
}

impl fmt::Display for UpstreamAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.host {
            Host::Ip(IpAddr::V6(ip6)) => write!(f, "[{ip6}]:{}", self.port),
            host => write!(f, "{host}:{}", self.port),
        }
    }
}

impl TryFrom<&Url> for UpstreamAddr {
    type Error = UpstreamAddrParseError;

    fn try_from(url: &Url) -> Result<Self, Self::Error> {
        let host = url.host().ok_or(UpstreamAddrParseError::NoHostFound)?;
        if matches!(host, url::Host::Domain("")) {
            return Err(UpstreamAddrParseError::NoHostFound);
        }
        let port = url
            .port_or_known_default()
            .ok_or(UpstreamAddrParseError::NoPortFound)?;
        if port == 0 {
            return Err(UpstreamAddrParseError::InvalidPort);
        }
        Ok(UpstreamAddr {
            host: Host::from(host),
            port,
        })
    }
}
