/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2023-2025 ByteDance and/or its affiliates.
 */

use std::io::Write;

use bytes::BytesMut;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use veer_types::net::UpstreamAddr;

use super::HttpConnectError;
use crate::{HttpResponseHead, HttpResponseHeadParser};

fn build_request(addr: &UpstreamAddr) -> Vec<u8> {
    let mut buf = Vec::<u8>::with_capacity(128);
    let _ = write!(
        buf,
        "CONNECT {addr} HTTP/1.1\r\nHost: {addr}\r\nProxy-Connection: keep-alive\r\n\r\n"
    );
    buf
}

fn detect_error(rsp: &HttpResponseHead) -> Result<(), HttpConnectError> {
    if (200..300).contains(&rsp.code) {
        Ok(())
    } else if rsp.code == 504 || rsp.code == 522 || rsp.code == 524 {
        // Peer tells us it timeout
        Err(HttpConnectError::PeerTimeout(rsp.code))
    } else {
        Err(HttpConnectError::UnexpectedStatusCode(
            rsp.code,
            rsp.reason.to_string(),
        ))
    }
}

/// Open a tunnel to `addr` through an http proxy already connected on `stream`.
pub async fn http_connect_to<S>(
    stream: &mut S,
    addr: &UpstreamAddr,
    max_header_size: usize,
) -> Result<HttpResponseHead, HttpConnectError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let req = build_request(addr);
    stream
        .write_all(&req)
        .await
        .map_err(HttpConnectError::WriteFailed)?;
    stream
        .flush()
        .await
        .map_err(HttpConnectError::WriteFailed)?;

    let mut parser = HttpResponseHeadParser::new(max_header_size);
    let mut buf = BytesMut::with_capacity(1024);
    loop {
        let nr = stream
            .read_buf(&mut buf)
            .await
            .map_err(HttpConnectError::ReadFailed)?;
        if nr == 0 {
            return Err(HttpConnectError::RemoteClosed);
        }
        if let Some(rsp) = parser.parse(&mut buf)? {
            detect_error(&rsp)?;
            return Ok(rsp);
        }
    }
}
