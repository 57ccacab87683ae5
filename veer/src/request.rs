/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2023-2025 ByteDance and/or its affiliates.
 */

use std::fmt;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use bytes::Bytes;
use http::{HeaderMap, HeaderName, HeaderValue};
use tokio::io::AsyncRead;
use url::Url;

/// Header mirroring the routed marker, so that copies of a request made by
/// other layers are still recognised as already routed.
pub const PASS_HEADER: HeaderName = HeaderName::from_static("x-veer-pass");

pub const DEFAULT_TIMEOUT_INTERVAL: f64 = 60.0;

pub type BodyReader = Box<dyn AsyncRead + Send + Unpin>;

/// A streaming request body, shared by all copies of the request.
///
/// The reader can be taken only once, so a request re-issued after a redirect
/// is sent with an empty body.
#[derive(Clone)]
pub struct BodyStream {
    inner: Arc<Mutex<Option<BodyReader>>>,
}

impl BodyStream {
    pub fn new<R>(reader: R) -> Self
    where
        R: AsyncRead + Send + Unpin + 'static,
    {
        BodyStream {
            inner: Arc::new(Mutex::new(Some(Box::new(reader)))),
        }
    }

    pub fn take(&self) -> Option<BodyReader> {
        self.inner.lock().unwrap().take()
    }
}

#[derive(Clone, Default)]
pub enum RequestBody {
    #[default]
    Empty,
    Buffer(Bytes),
    Stream(BodyStream),
}

impl fmt::Debug for RequestBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestBody::Empty => f.write_str("Empty"),
            RequestBody::Buffer(b) => write!(f, "Buffer({} bytes)", b.len()),
            RequestBody::Stream(_) => f.write_str("Stream"),
        }
    }
}

#[derive(Clone, Debug)]
pub struct RequestEnvelope {
    method: String,
    url: Url,
    headers: HeaderMap,
    body: RequestBody,
    main_document_url: Option<Url>,
    timeout_interval: f64,
    pipelining: bool,
    routed: bool,
}

impl RequestEnvelope {
    pub fn new(method: &str, url: Url) -> Self {
        RequestEnvelope {
            method: method.to_string(),
            url,
            headers: HeaderMap::new(),
            body: RequestBody::Empty,
            main_document_url: None,
            timeout_interval: DEFAULT_TIMEOUT_INTERVAL,
            pipelining: false,
            routed: false,
        }
    }

    pub fn get(url: Url) -> Self {
        RequestEnvelope::new("GET", url)
    }

    #[inline]
    pub fn method(&self) -> &str {
        &self.method
    }

    #[inline]
    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn set_url(&mut self, url: Url) {
        self.url = url;
    }

    pub fn host(&self) -> Option<&str> {
        self.url.host_str().filter(|h| !h.is_empty())
    }

    #[inline]
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    #[inline]
    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    #[inline]
    pub fn body(&self) -> &RequestBody {
        &self.body
    }

    pub fn set_body(&mut self, body: RequestBody) {
        self.body = body;
    }

    pub fn main_document_url(&self) -> Option<&Url> {
        self.main_document_url.as_ref()
    }

    pub fn set_main_document_url(&mut self, url: Option<Url>) {
        self.main_document_url = url;
    }

    /// Timeout interval in seconds.
    pub fn timeout_interval(&self) -> f64 {
        self.timeout_interval
    }

    pub fn set_timeout_interval(&mut self, seconds: f64) {
        self.timeout_interval = seconds;
    }

    pub fn timeout(&self) -> Duration {
        Duration::try_from_secs_f64(self.timeout_interval)
            .unwrap_or(Duration::from_secs_f64(DEFAULT_TIMEOUT_INTERVAL))
    }

    pub fn pipelining(&self) -> bool {
        self.pipelining
    }

    pub fn set_pipelining(&mut self, enable: bool) {
        self.pipelining = enable;
    }

    pub fn is_routed(&self) -> bool {
        self.routed || self.headers.contains_key(PASS_HEADER)
    }

    pub fn mark_routed(&mut self) {
        self.routed = true;
        self.headers
            .insert(PASS_HEADER, HeaderValue::from_static("1"));
    }

    pub fn clear_routed(&mut self) {
        self.routed = false;
        self.headers.remove(PASS_HEADER);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn routed_marker() {
        let url = Url::parse("http://example.com/").unwrap();
        let mut req = RequestEnvelope::get(url.clone());
        assert!(!req.is_routed());

        req.mark_routed();
        assert!(req.is_routed());
        assert!(req.headers().contains_key(PASS_HEADER));

        let copy = req.clone();
        req.clear_routed();
        assert!(!req.is_routed());
        assert!(copy.is_routed());

        let foreign =
            RequestEnvelope::get(url).with_header(PASS_HEADER, HeaderValue::from_static("1"));
        assert!(foreign.is_routed());
    }

    #[test]
    fn timeout() {
        let url = Url::parse("http://example.com/").unwrap();
        let mut req = RequestEnvelope::get(url);
        assert_eq!(req.timeout(), Duration::from_secs(60));
        req.set_timeout_interval(2.5);
        assert_eq!(req.timeout(), Duration::from_millis(2500));
        req.set_timeout_interval(-1.0);
        assert_eq!(req.timeout(), Duration::from_secs(60));
    }

    #[test]
    fn stream_body_taken_once() {
        let url = Url::parse("http://example.com/upload").unwrap();
        let mut req = RequestEnvelope::new("PUT", url);
        req.set_body(RequestBody::Stream(BodyStream::new(&b"data"[..])));
        let copy = req.clone();

        let RequestBody::Stream(s) = req.body() else {
            panic!("not a stream body");
        };
        assert!(s.take().is_some());
        let RequestBody::Stream(s) = copy.body() else {
            panic!("not a stream body");
        };
        assert!(s.take().is_none());
    }
}
