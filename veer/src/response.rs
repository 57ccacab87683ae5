/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2023-2025 ByteDance and/or its affiliates.
 */

use http::{HeaderMap, Version};
use url::Url;

use veer_http::HttpResponseHead;

#[derive(Clone, Debug)]
pub struct ResponseEnvelope {
    pub status: u16,
    pub reason: String,
    pub version: Version,
    pub headers: HeaderMap,
    pub url: Url,
}

impl ResponseEnvelope {
    pub(crate) fn new(head: &HttpResponseHead, url: Url) -> Self {
        ResponseEnvelope {
            status: head.code,
            reason: head.reason.clone(),
            version: head.version,
            headers: head.headers.clone(),
            url,
        }
    }

    pub fn version_str(&self) -> &'static str {
        match self.version {
            Version::HTTP_10 => "HTTP/1.0",
            _ => "HTTP/1.1",
        }
    }

    pub fn is_redirect(&self) -> bool {
        matches!(self.status, 301 | 302 | 307)
    }

    /// The `Location` header resolved against the url of this response.
    pub fn location(&self) -> Option<Url> {
        let value = self.headers.get(http::header::LOCATION)?;
        let location = value.to_str().ok()?;
        self.url.join(location).ok()
    }
}
