/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2023-2025 ByteDance and/or its affiliates.
 */

use std::sync::RwLock;

use cookie::Cookie;
use http::header::SET_COOKIE;
use http::{HeaderMap, HeaderValue};
use log::debug;
use url::Url;

/// Read only view of a cookie store, as used when building requests.
pub trait CookieStore: Send + Sync {
    /// The `Cookie` header value for a request to `url`, if any cookie applies.
    fn cookies(&self, url: &Url) -> Option<HeaderValue>;
}

/// In memory cookie store.
#[derive(Default)]
pub struct CookieJar {
    store: RwLock<cookie_store::CookieStore>,
}

impl CookieJar {
    pub fn new() -> Self {
        CookieJar::default()
    }

    /// Add a cookie in `Set-Cookie` syntax as if it was received from `url`.
    pub fn add_cookie_str(&self, cookie: &str, url: &Url) -> bool {
        let Ok(cookie) = Cookie::parse(cookie.to_string()) else {
            return false;
        };
        self.store.write().unwrap().insert_raw(&cookie, url).is_ok()
    }

    /// Save the cookies set by a response received from `url`.
    pub fn store_response_cookies(&self, headers: &HeaderMap, url: &Url) {
        let cookies = headers
            .get_all(SET_COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .filter_map(|s| Cookie::parse(s.to_string()).ok())
            .collect::<Vec<_>>();
        if cookies.is_empty() {
            return;
        }
        debug!("store {} cookie(s) from {url}", cookies.len());
        self.store
            .write()
            .unwrap()
            .store_response_cookies(cookies.into_iter(), url);
    }
}

impl CookieStore for CookieJar {
    fn cookies(&self, url: &Url) -> Option<HeaderValue> {
        let store = self.store.read().unwrap();
        let value = store
            .get_request_values(url)
            .map(|(name, value)| format!("{name}={value}"))
            .collect::<Vec<_>>()
            .join("; ");
        if value.is_empty() {
            None
        } else {
            HeaderValue::from_str(&value).ok()
        }
    }
}
