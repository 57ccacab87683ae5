/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2023-2025 ByteDance and/or its affiliates.
 */

use veer_types::net::SocksAuth;

/// Auth methods seen in the socks5 method negotiation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SocksAuthMethod {
    None,
    User,
    /// A method this client never offers, selected by a misbehaving server.
    Unsupported(u8),
    NoAcceptable,
}

impl SocksAuthMethod {
    pub(crate) fn code(&self) -> u8 {
        match self {
            SocksAuthMethod::None => 0x00,
            SocksAuthMethod::User => 0x02,
            SocksAuthMethod::Unsupported(v) => *v,
            SocksAuthMethod::NoAcceptable => 0xFF,
        }
    }

    /// The methods to offer for the configured credentials, in preference order.
    pub(crate) fn offered(auth: &SocksAuth) -> &'static [SocksAuthMethod] {
        match auth {
            SocksAuth::None => &[SocksAuthMethod::None],
            SocksAuth::User(_, _) => &[SocksAuthMethod::None, SocksAuthMethod::User],
        }
    }
}

impl From<u8> for SocksAuthMethod {
    fn from(code: u8) -> Self {
        match code {
            0x00 => SocksAuthMethod::None,
            0x02 => SocksAuthMethod::User,
            0xFF => SocksAuthMethod::NoAcceptable,
            v => SocksAuthMethod::Unsupported(v),
        }
    }
}
