/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2023-2025 ByteDance and/or its affiliates.
 */

use percent_encoding::percent_decode_str;
use url::Url;

use super::ProxyParseError;

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum SocksAuth {
    #[default]
    None,
    User(String, String),
}

impl TryFrom<&Url> for SocksAuth {
    type Error = ProxyParseError;

    fn try_from(url: &Url) -> Result<Self, Self::Error> {
        let username = url.username();
        if username.is_empty() {
            return Ok(SocksAuth::None);
        }
        let username = percent_decode_str(username)
            .decode_utf8()
            .map_err(|_| ProxyParseError::InvalidAuth)?;
        let password = percent_decode_str(url.password().unwrap_or_default())
            .decode_utf8()
            .map_err(|_| ProxyParseError::InvalidAuth)?;
        if username.len() > u8::MAX as usize || password.len() > u8::MAX as usize {
            return Err(ProxyParseError::InvalidAuth);
        }
        Ok(SocksAuth::User(username.into_owned(), password.into_owned()))
    }
}
