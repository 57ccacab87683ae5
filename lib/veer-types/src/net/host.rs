/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2023-2025 ByteDance and/or its affiliates.
 */

use std::fmt;
use std::io;
use std::net::{IpAddr, Ipv6Addr};
use std::str::FromStr;

use anyhow::anyhow;
use rustls_pki_types::ServerName;

#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub enum Host {
    Ip(IpAddr),
    Domain(String),
}

impl Host {
    fn from_maybe_mapped_ip6(ip6: Ipv6Addr) -> Self {
        if let Some(ip4) = ip6.to_ipv4_mapped() {
            Host::Ip(IpAddr::V4(ip4))
        } else {
            Host::Ip(IpAddr::V6(ip6))
        }
    }

    fn from_domain_str(domain: &str) -> anyhow::Result<Self> {
        if domain.len() > u8::MAX as usize {
            return Err(anyhow!("too long domain"));
        }
        if domain
            .bytes()
            .any(|b| b.is_ascii_whitespace() || matches!(b, b'/' | b'@' | b'?' | b'#'))
        {
            return Err(anyhow!("invalid character in domain"));
        }
        Ok(Host::Domain(domain.to_ascii_lowercase()))
    }
}

impl fmt::Display for Host {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Host::Ip(ip) => write!(f, "{ip}"),
            Host::Domain(domain) => write!(f, "{domain}"),
        }
    }
}

impl From<url::Host<&str>> for Host {
    fn from(v: url::Host<&str>) -> Self {
        match v {
            url::Host::Ipv4(ip4) => Host::Ip(IpAddr::V4(ip4)),
            url::Host::Ipv6(ip6) => Host::from_maybe_mapped_ip6(ip6),
            url::Host::Domain(domain) => Host::Domain(domain.to_string()),
        }
    }
}

impl FromStr for Host {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Err(anyhow!("empty string"));
        }
        match s.as_bytes()[0] {
            b'[' => {
                let pos_last = s.len() - 1;
                if s.as_bytes()[pos_last] == b']'
                    && let Ok(ip6) = Ipv6Addr::from_str(&s[1..pos_last])
                {
                    return Ok(Host::from_maybe_mapped_ip6(ip6));
                }
                return Err(anyhow!("invalid ipv6 ip in squared brackets"));
            }
            b':' => {
                return if let Ok(ip6) = Ipv6Addr::from_str(s) {
                    Ok(Host::from_maybe_mapped_ip6(ip6))
                } else {
                    Err(anyhow!("invalid ipv6 ip"))
                };
            }
            b'0'..=b'9' | b'a'..=b'f' | b'A'..=b'F' => {
                if let Ok(ip) = IpAddr::from_str(s) {
                    return match ip {
                        IpAddr::V4(_) => Ok(Host::Ip(ip)),
                        IpAddr::V6(ip6) => Ok(Host::from_maybe_mapped_ip6(ip6)),
                    };
                }
            }
            _ => {}
        }

        Host::from_domain_str(s)
    }
}

impl TryFrom<&Host> for ServerName<'static> {
    type Error = io::Error;

    fn try_from(value: &Host) -> Result<Self, Self::Error> {
        match value {
            Host::Ip(ip) => Ok(ServerName::IpAddress((*ip).into())),
            Host::Domain(domain) => ServerName::try_from(domain.clone())
                .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e)),
        }
    }
}
