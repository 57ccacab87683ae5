/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2023-2025 ByteDance and/or its affiliates.
 */

use std::str::FromStr;

use bytes::BytesMut;
use http::{HeaderMap, HeaderName, HeaderValue, Method, Version};
use thiserror::Error;

use crate::{HttpBodyType, HttpHeaderLine, HttpLineParseError, HttpStatusLine};

#[derive(Debug, Error)]
pub enum HttpResponseParseError {
    #[error("too large header, should be less than {0}")]
    TooLargeHeader(usize),
    #[error("invalid status line: {0}")]
    InvalidStatusLine(HttpLineParseError),
    #[error("invalid header line: {0}")]
    InvalidHeaderLine(HttpLineParseError),
    #[error("invalid chunked transfer-encoding")]
    InvalidChunkedTransferEncoding,
    #[error("invalid content length")]
    InvalidContentLength,
}

#[derive(Debug)]
pub struct HttpResponseHead {
    pub version: Version,
    pub code: u16,
    pub reason: String,
    pub headers: HeaderMap,
    header_size: usize,
    keep_alive: bool,
    content_length: u64,
    chunked_transfer: bool,
    has_transfer_encoding: bool,
    has_content_length: bool,
}

impl HttpResponseHead {
    fn new(version: Version, code: u16, reason: String) -> Self {
        HttpResponseHead {
            version,
            code,
            reason,
            headers: HeaderMap::new(),
            header_size: 0,
            keep_alive: version == Version::HTTP_11,
            content_length: 0,
            chunked_transfer: false,
            has_transfer_encoding: false,
            has_content_length: false,
        }
    }

    pub fn header_size(&self) -> usize {
        self.header_size
    }

    pub fn keep_alive(&self) -> bool {
        self.keep_alive
    }

    #[inline]
    fn is_interim(&self) -> bool {
        self.code < 200 && self.code != 101
    }

    fn expect_no_body(&self, method: &Method) -> bool {
        self.code < 200 || self.code == 204 || self.code == 304 || method.eq(&Method::HEAD)
    }

    pub fn body_type(&self, method: &Method) -> Option<HttpBodyType> {
        // see https://datatracker.ietf.org/doc/html/rfc9112#section-6.3 for Message Body Length
        if self.expect_no_body(method) {
            None
        } else if self.chunked_transfer {
            Some(HttpBodyType::Chunked)
        } else if self.has_content_length {
            if self.content_length > 0 {
                Some(HttpBodyType::ContentLength(self.content_length))
            } else {
                None
            }
        } else {
            Some(HttpBodyType::ReadUntilEnd)
        }
    }

    fn parse_block(block: &[u8]) -> Result<Self, HttpResponseParseError> {
        let mut lines = block.split_inclusive(|b| *b == b'\n');
        let status_line = lines.next().unwrap_or_default();
        let status =
            HttpStatusLine::parse(status_line).map_err(HttpResponseParseError::InvalidStatusLine)?;
        let mut rsp = HttpResponseHead::new(status.version, status.code, status.reason.to_string());

        for line in lines {
            if line == b"\r\n" || line == b"\n" {
                break;
            }
            let header =
                HttpHeaderLine::parse(line).map_err(HttpResponseParseError::InvalidHeaderLine)?;
            rsp.handle_header(header)?;
        }
        rsp.header_size = block.len();

        if !rsp.chunked_transfer && !rsp.has_content_length {
            // read to end and close the connection
            rsp.keep_alive = false;
        }
        Ok(rsp)
    }

    fn handle_header(&mut self, header: HttpHeaderLine) -> Result<(), HttpResponseParseError> {
        let name = HeaderName::from_str(header.name).map_err(|_| {
            HttpResponseParseError::InvalidHeaderLine(HttpLineParseError::InvalidHeaderName)
        })?;

        match name.as_str() {
            "connection" | "proxy-connection" => {
                for v in header.value.to_lowercase().split(',') {
                    match v.trim() {
                        "keep-alive" => self.keep_alive = true,
                        "close" => self.keep_alive = false,
                        _ => {}
                    }
                }
            }
            "transfer-encoding" => {
                self.has_transfer_encoding = true;
                if self.has_content_length {
                    self.headers.remove(http::header::CONTENT_LENGTH);
                    self.content_length = 0;
                    self.has_content_length = false;
                    self.keep_alive = false; // according to rfc9112 Section 6.1
                }

                let v = header.value.to_lowercase();
                if v.ends_with("chunked") {
                    self.chunked_transfer = true;
                } else if v.contains("chunked") {
                    return Err(HttpResponseParseError::InvalidChunkedTransferEncoding);
                }
            }
            "content-length" => {
                if self.has_transfer_encoding {
                    self.keep_alive = false; // according to rfc9112 Section 6.1
                    return Ok(());
                }

                let content_length = u64::from_str(header.value)
                    .map_err(|_| HttpResponseParseError::InvalidContentLength)?;
                if self.has_content_length && self.content_length != content_length {
                    return Err(HttpResponseParseError::InvalidContentLength);
                }
                self.has_content_length = true;
                self.content_length = content_length;
            }
            _ => {}
        }

        let value = HeaderValue::from_str(header.value).map_err(|_| {
            HttpResponseParseError::InvalidHeaderLine(HttpLineParseError::InvalidHeaderValue)
        })?;
        self.headers.append(name, value);
        Ok(())
    }
}

/// Incremental response header parser.
///
/// Bytes are accumulated by the caller in a single buffer. Once a complete
/// header block is found it is split off the front of the buffer, leaving any
/// body bytes in place. Interim 1xx responses other than 101 are skipped.
pub struct HttpResponseHeadParser {
    max_header_size: usize,
    scan_offset: usize,
}

impl HttpResponseHeadParser {
    pub fn new(max_header_size: usize) -> Self {
        HttpResponseHeadParser {
            max_header_size,
            scan_offset: 0,
        }
    }

    fn find_head_end(&mut self, buf: &[u8]) -> Option<usize> {
        let mut offset = self.scan_offset;
        while let Some(p) = memchr::memchr(b'\n', &buf[offset..]) {
            let line_end = offset + p + 1;
            let line = &buf[offset..line_end];
            if offset > 0 && (line == b"\r\n" || line == b"\n") {
                self.scan_offset = 0;
                return Some(line_end);
            }
            offset = line_end;
        }
        self.scan_offset = offset;
        None
    }

    pub fn parse(
        &mut self,
        buf: &mut BytesMut,
    ) -> Result<Option<HttpResponseHead>, HttpResponseParseError> {
        loop {
            let Some(end) = self.find_head_end(buf) else {
                if buf.len() > self.max_header_size {
                    return Err(HttpResponseParseError::TooLargeHeader(self.max_header_size));
                }
                return Ok(None);
            };
            if end > self.max_header_size {
                return Err(HttpResponseParseError::TooLargeHeader(self.max_header_size));
            }

            let block = buf.split_to(end);
            let rsp = HttpResponseHead::parse_block(&block)?;
            if rsp.is_interim() {
                continue;
            }
            return Ok(Some(rsp));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_length() {
        let mut buf = BytesMut::from(
            &b"HTTP/1.1 200 OK\r\n\
            Content-Type: text/plain\r\n\
            Content-Length: 4\r\n\r\ntest"[..],
        );
        let mut parser = HttpResponseHeadParser::new(4096);
        let rsp = parser.parse(&mut buf).unwrap().unwrap();
        assert_eq!(rsp.code, 200);
        assert!(rsp.keep_alive());
        assert_eq!(rsp.body_type(&Method::GET), Some(HttpBodyType::ContentLength(4)));
        assert_eq!(rsp.body_type(&Method::HEAD), None);
        assert_eq!(rsp.headers.get("content-type").unwrap(), "text/plain");
        assert_eq!(buf.as_ref(), b"test");
    }

    #[test]
    fn split_delivery() {
        let data: &[u8] = b"HTTP/1.1 302 Found\r\nLocation: /next\r\nContent-Length: 0\r\n\r\n";
        for split in 1..data.len() {
            let mut parser = HttpResponseHeadParser::new(4096);
            let mut buf = BytesMut::from(&data[..split]);
            assert!(parser.parse(&mut buf).unwrap().is_none(), "split at {split}");
            buf.extend_from_slice(&data[split..]);
            let rsp = parser.parse(&mut buf).unwrap().unwrap();
            assert_eq!(rsp.code, 302);
            assert_eq!(rsp.headers.get("location").unwrap(), "/next");
            assert_eq!(rsp.body_type(&Method::GET), None);
            assert!(buf.is_empty());
        }
    }

    #[test]
    fn skip_continue() {
        let mut buf = BytesMut::from(
            &b"HTTP/1.1 100 Continue\r\n\r\n\
            HTTP/1.1 200 OK\r\nTransfer-Encoding: chunked\r\n\r\n0\r\n\r\n"[..],
        );
        let mut parser = HttpResponseHeadParser::new(4096);
        let rsp = parser.parse(&mut buf).unwrap().unwrap();
        assert_eq!(rsp.code, 200);
        assert_eq!(rsp.body_type(&Method::GET), Some(HttpBodyType::Chunked));
        assert_eq!(buf.as_ref(), b"0\r\n\r\n");
    }

    #[test]
    fn read_until_end() {
        let mut buf = BytesMut::from(&b"HTTP/1.0 200 OK\r\nConnection: keep-alive\r\n\r\n"[..]);
        let mut parser = HttpResponseHeadParser::new(4096);
        let rsp = parser.parse(&mut buf).unwrap().unwrap();
        assert_eq!(rsp.version, Version::HTTP_10);
        assert!(!rsp.keep_alive());
        assert_eq!(rsp.body_type(&Method::GET), Some(HttpBodyType::ReadUntilEnd));
    }

    #[test]
    fn transfer_encoding_wins() {
        let mut buf = BytesMut::from(
            &b"HTTP/1.1 200 OK\r\nContent-Length: 10\r\nTransfer-Encoding: chunked\r\n\r\n"[..],
        );
        let mut parser = HttpResponseHeadParser::new(4096);
        let rsp = parser.parse(&mut buf).unwrap().unwrap();
        assert_eq!(rsp.body_type(&Method::GET), Some(HttpBodyType::Chunked));
        assert!(!rsp.headers.contains_key("content-length"));
        assert!(!rsp.keep_alive());
    }

    #[test]
    fn invalid() {
        let mut parser = HttpResponseHeadParser::new(4096);
        let mut buf = BytesMut::from(
            &b"HTTP/1.1 200 OK\r\nContent-Length: 1\r\nContent-Length: 2\r\n\r\n"[..],
        );
        assert!(matches!(
            parser.parse(&mut buf),
            Err(HttpResponseParseError::InvalidContentLength)
        ));

        let mut buf =
            BytesMut::from(&b"HTTP/1.1 200 OK\r\nTransfer-Encoding: chunked, gzip\r\n\r\n"[..]);
        assert!(matches!(
            parser.parse(&mut buf),
            Err(HttpResponseParseError::InvalidChunkedTransferEncoding)
        ));

        let mut buf = BytesMut::from(&b"SSH-2.0-OpenSSH\r\n\r\n"[..]);
        assert!(matches!(
            parser.parse(&mut buf),
            Err(HttpResponseParseError::InvalidStatusLine(_))
        ));
    }

    #[test]
    fn too_large() {
        let mut parser = HttpResponseHeadParser::new(32);
        let mut buf = BytesMut::from(&b"HTTP/1.1 200 OK\r\nX-Long-Header: aaaaaaaaaaaaaaaa"[..]);
        assert!(matches!(
            parser.parse(&mut buf),
            Err(HttpResponseParseError::TooLargeHeader(32))
        ));
    }
}
