/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2023-2025 ByteDance and/or its affiliates.
 */

use std::net::IpAddr;

use bytes::{BufMut, BytesMut};
use tokio::io::{AsyncWrite, AsyncWriteExt};

use veer_types::net::{Host, UpstreamAddr};

use super::{SocksConnectError, SocksNegotiationError};

const CMD_TCP_CONNECT: u8 = 0x01;

pub(super) struct Socks5Request;

impl Socks5Request {
    fn encode_connect(addr: &UpstreamAddr) -> Result<BytesMut, SocksNegotiationError> {
        let mut buf = BytesMut::with_capacity(262);
        buf.put_u8(0x05);
        buf.put_u8(CMD_TCP_CONNECT);
        buf.put_u8(0x00);
        match addr.host() {
            Host::Domain(domain) => {
                // the proxy does the resolving
                let len = u8::try_from(domain.len())
                    .map_err(|_| SocksNegotiationError::InvalidDomainString)?;
                if len == 0 {
                    return Err(SocksNegotiationError::InvalidDomainString);
                }
                buf.put_u8(0x03);
                buf.put_u8(len);
                buf.put_slice(domain.as_bytes());
            }
            Host::Ip(IpAddr::V4(ip4)) => {
                buf.put_u8(0x01);
                buf.put_slice(&ip4.octets());
            }
            Host::Ip(IpAddr::V6(ip6)) => {
                buf.put_u8(0x04);
                buf.put_slice(&ip6.octets());
            }
        }
        buf.put_u16(addr.port());
        Ok(buf)
    }

    pub(super) async fn send_connect<W>(
        writer: &mut W,
        addr: &UpstreamAddr,
    ) -> Result<(), SocksConnectError>
    where
        W: AsyncWrite + Unpin,
    {
        let buf = Self::encode_connect(addr)?;
        writer
            .write_all(buf.as_ref())
            .await
            .map_err(SocksConnectError::WriteFailed)?;
        writer.flush().await.map_err(SocksConnectError::WriteFailed)
    }
}
