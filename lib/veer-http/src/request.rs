/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2023-2025 ByteDance and/or its affiliates.
 */

use std::io::Write;

use bytes::BufMut;
use http::header::{CONNECTION, CONTENT_LENGTH, HOST, TRANSFER_ENCODING};
use http::{HeaderMap, HeaderName, HeaderValue, Method};
use thiserror::Error;
use url::Url;

#[derive(Debug, Error)]
pub enum HttpRequestBuildError {
    #[error("invalid method token")]
    InvalidMethod,
    #[error("unsupported scheme {0}")]
    UnsupportedScheme(String),
    #[error("no host in url")]
    NoHost,
    #[error("invalid host header value")]
    InvalidHost,
}

/// The request-target form of the request line, see rfc9112 section 3.2.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RequestTargetForm {
    /// `/path?query`, used when talking to the origin or through a tunnel
    Origin,
    /// the full url, used when talking to a forward proxy
    Absolute,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BodyFraming {
    None,
    ContentLength(u64),
    Chunked,
}

pub struct HttpRequestHead {
    method: Method,
    target: String,
    headers: HeaderMap,
    framing: BodyFraming,
}

impl HttpRequestHead {
    pub fn build(
        method: &str,
        url: &Url,
        form: RequestTargetForm,
    ) -> Result<Self, HttpRequestBuildError> {
        let method =
            Method::from_bytes(method.as_bytes()).map_err(|_| HttpRequestBuildError::InvalidMethod)?;
        if method == Method::CONNECT {
            return Err(HttpRequestBuildError::InvalidMethod);
        }

        match url.scheme() {
            "http" | "https" => {}
            s => return Err(HttpRequestBuildError::UnsupportedScheme(s.to_string())),
        }
        let host = match url.host_str() {
            Some(h) if !h.is_empty() => h,
            _ => return Err(HttpRequestBuildError::NoHost),
        };
        let host_value = match url.port() {
            Some(port) => format!("{host}:{port}"),
            None => host.to_string(),
        };
        let host_value =
            HeaderValue::try_from(host_value).map_err(|_| HttpRequestBuildError::InvalidHost)?;

        let target = match form {
            RequestTargetForm::Origin => match url.query() {
                Some(query) => format!("{}?{query}", url.path()),
                None => url.path().to_string(),
            },
            RequestTargetForm::Absolute => {
                let mut url = url.clone();
                url.set_fragment(None);
                url.to_string()
            }
        };

        let mut headers = HeaderMap::new();
        headers.insert(HOST, host_value);
        Ok(HttpRequestHead {
            method,
            target,
            headers,
            framing: BodyFraming::None,
        })
    }

    #[inline]
    pub fn method(&self) -> &Method {
        &self.method
    }

    #[inline]
    pub fn target(&self) -> &str {
        &self.target
    }

    #[inline]
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Copy the caller supplied headers, replacing any generated one of the same name.
    ///
    /// Framing and connection management headers are owned by this type and skipped.
    pub fn extend_headers(&mut self, headers: &HeaderMap) {
        for name in headers.keys() {
            if is_managed_header(name) {
                continue;
            }
            self.headers.remove(name);
            for value in headers.get_all(name) {
                self.headers.append(name.clone(), value.clone());
            }
        }
    }

    /// Add a header only if no header of the same name is present.
    pub fn append_if_absent(&mut self, name: HeaderName, value: HeaderValue) -> bool {
        if is_managed_header(&name) || self.headers.contains_key(&name) {
            return false;
        }
        self.headers.insert(name, value);
        true
    }

    pub fn remove_header(&mut self, name: &str) {
        self.headers.remove(name);
    }

    pub fn set_framing(&mut self, framing: BodyFraming) {
        self.framing = framing;
    }

    pub fn serialize(&self) -> Vec<u8> {
        let mut buf = Vec::<u8>::with_capacity(512);
        let _ = write!(buf, "{} {} HTTP/1.1\r\n", self.method, self.target);
        for (name, value) in &self.headers {
            buf.put_slice(name.as_str().as_bytes());
            buf.put_slice(b": ");
            buf.put_slice(value.as_bytes());
            buf.put_slice(b"\r\n");
        }
        match self.framing {
            BodyFraming::None => {}
            BodyFraming::ContentLength(len) => {
                let _ = write!(buf, "Content-Length: {len}\r\n");
            }
            BodyFraming::Chunked => buf.put_slice(b"Transfer-Encoding: chunked\r\n"),
        }
        // persistent connection hint
        buf.put_slice(b"Connection: keep-alive\r\n");
        buf.put_slice(b"\r\n");
        buf
    }
}

fn is_managed_header(name: &HeaderName) -> bool {
    *name == CONTENT_LENGTH
        || *name == TRANSFER_ENCODING
        || *name == CONNECTION
        || name.as_str() == "proxy-connection"
        || name.as_str() == "keep-alive"
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::header::{COOKIE, USER_AGENT};

    #[test]
    fn origin_form() {
        let url = Url::parse("https://example.com/a/b?x=1#frag").unwrap();
        let head = HttpRequestHead::build("GET", &url, RequestTargetForm::Origin).unwrap();
        assert_eq!(head.target(), "/a/b?x=1");
        assert_eq!(
            String::from_utf8(head.serialize()).unwrap(),
            "GET /a/b?x=1 HTTP/1.1\r\nhost: example.com\r\nConnection: keep-alive\r\n\r\n"
        );
    }

    #[test]
    fn absolute_form() {
        let url = Url::parse("http://example.com:8080/index.html#top").unwrap();
        let mut head = HttpRequestHead::build("POST", &url, RequestTargetForm::Absolute).unwrap();
        head.set_framing(BodyFraming::ContentLength(3));
        let s = String::from_utf8(head.serialize()).unwrap();
        assert!(s.starts_with("POST http://example.com:8080/index.html HTTP/1.1\r\n"));
        assert!(s.contains("host: example.com:8080\r\n"));
        assert!(s.contains("Content-Length: 3\r\n"));
    }

    #[test]
    fn explicit_headers_win() {
        let url = Url::parse("http://example.com/").unwrap();
        let mut head = HttpRequestHead::build("GET", &url, RequestTargetForm::Origin).unwrap();

        let mut headers = HeaderMap::new();
        headers.insert(COOKIE, HeaderValue::from_static("a=explicit"));
        headers.insert(CONTENT_LENGTH, HeaderValue::from_static("100"));
        head.extend_headers(&headers);

        assert!(!head.append_if_absent(COOKIE, HeaderValue::from_static("b=stored")));
        assert!(head.append_if_absent(USER_AGENT, HeaderValue::from_static("veer")));

        assert_eq!(head.headers().get(COOKIE).unwrap(), "a=explicit");
        assert!(!head.headers().contains_key(CONTENT_LENGTH));
    }

    #[test]
    fn invalid_request() {
        let url = Url::parse("http://example.com/").unwrap();
        assert!(matches!(
            HttpRequestHead::build("GE T", &url, RequestTargetForm::Origin),
            Err(HttpRequestBuildError::InvalidMethod)
        ));

        let url = Url::parse("ftp://example.com/").unwrap();
        assert!(matches!(
            HttpRequestHead::build("GET", &url, RequestTargetForm::Origin),
            Err(HttpRequestBuildError::UnsupportedScheme(_))
        ));

        let url = Url::parse("file:///etc/hosts").unwrap();
        assert!(HttpRequestHead::build("GET", &url, RequestTargetForm::Origin).is_err());
    }
}
