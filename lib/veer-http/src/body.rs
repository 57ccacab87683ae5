/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2023-2025 ByteDance and/or its affiliates.
 */

use bytes::{Buf, BytesMut};
use thiserror::Error;

use crate::{HttpChunkedLine, HttpLineParseError};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HttpBodyType {
    ContentLength(u64),
    Chunked,
    ReadUntilEnd,
}

#[derive(Debug, Error)]
pub enum HttpBodyDecodeError {
    #[error("invalid chunk size line: {0}")]
    InvalidChunkLine(HttpLineParseError),
    #[error("too long chunk line (> {0})")]
    ChunkLineTooLong(usize),
    #[error("no end whitespace found after chunk data")]
    InvalidChunkEnd,
    #[error("connection closed before the end of body")]
    UnexpectedEof,
}

enum ChunkedState {
    Size,
    Data(u64),
    DataEndR,
    DataEndN,
    Trailer,
    End,
}

struct ChunkedDecoder {
    line_max_size: usize,
    line: Vec<u8>,
    state: ChunkedState,
}

impl ChunkedDecoder {
    fn new(line_max_size: usize) -> Self {
        ChunkedDecoder {
            line_max_size,
            line: Vec::with_capacity(32),
            state: ChunkedState::Size,
        }
    }

    /// Move a full line into `self.line`, or buffer the partial one.
    fn take_line(&mut self, input: &mut BytesMut) -> Result<bool, HttpBodyDecodeError> {
        match memchr::memchr(b'\n', input) {
            Some(p) => {
                if self.line.len() + p + 1 > self.line_max_size {
                    return Err(HttpBodyDecodeError::ChunkLineTooLong(self.line_max_size));
                }
                self.line.extend_from_slice(&input[..=p]);
                input.advance(p + 1);
                Ok(true)
            }
            None => {
                if self.line.len() + input.len() > self.line_max_size {
                    return Err(HttpBodyDecodeError::ChunkLineTooLong(self.line_max_size));
                }
                self.line.extend_from_slice(input);
                input.clear();
                Ok(false)
            }
        }
    }

    fn decode(
        &mut self,
        input: &mut BytesMut,
        output: &mut BytesMut,
    ) -> Result<bool, HttpBodyDecodeError> {
        loop {
            match self.state {
                ChunkedState::End => return Ok(true),
                _ if input.is_empty() => return Ok(false),
                ChunkedState::Size => {
                    if !self.take_line(input)? {
                        return Ok(false);
                    }
                    let chunk = HttpChunkedLine::parse(&self.line)
                        .map_err(HttpBodyDecodeError::InvalidChunkLine)?;
                    self.state = if chunk.chunk_size == 0 {
                        ChunkedState::Trailer
                    } else {
                        ChunkedState::Data(chunk.chunk_size)
                    };
                    self.line.clear();
                }
                ChunkedState::Data(left) => {
                    let n = usize::try_from(left)
                        .unwrap_or(usize::MAX)
                        .min(input.len());
                    output.extend_from_slice(&input.split_to(n));
                    let left = left - n as u64;
                    self.state = if left == 0 {
                        ChunkedState::DataEndR
                    } else {
                        ChunkedState::Data(left)
                    };
                }
                ChunkedState::DataEndR => match input[0] {
                    b'\r' => {
                        input.advance(1);
                        self.state = ChunkedState::DataEndN;
                    }
                    b'\n' => {
                        input.advance(1);
                        self.state = ChunkedState::Size;
                    }
                    _ => return Err(HttpBodyDecodeError::InvalidChunkEnd),
                },
                ChunkedState::DataEndN => {
                    if input[0] != b'\n' {
                        return Err(HttpBodyDecodeError::InvalidChunkEnd);
                    }
                    input.advance(1);
                    self.state = ChunkedState::Size;
                }
                ChunkedState::Trailer => {
                    if !self.take_line(input)? {
                        return Ok(false);
                    }
                    // trailer fields are dropped
                    if self.line.as_slice() == b"\r\n" || self.line.as_slice() == b"\n" {
                        self.state = ChunkedState::End;
                    }
                    self.line.clear();
                }
            }
        }
    }
}

enum DecoderKind {
    ContentLength(u64),
    Chunked(ChunkedDecoder),
    ReadUntilEnd,
}

/// Push style body decoder.
///
/// Feed it the raw bytes read after the response header and it appends the
/// decoded payload to the output buffer.
pub struct HttpBodyDecoder {
    kind: DecoderKind,
}

impl HttpBodyDecoder {
    pub fn new(body_type: HttpBodyType, line_max_size: usize) -> Self {
        let kind = match body_type {
            HttpBodyType::ContentLength(n) => DecoderKind::ContentLength(n),
            HttpBodyType::Chunked => DecoderKind::Chunked(ChunkedDecoder::new(line_max_size)),
            HttpBodyType::ReadUntilEnd => DecoderKind::ReadUntilEnd,
        };
        HttpBodyDecoder { kind }
    }

    /// Returns true once the end of body has been reached.
    ///
    /// Bytes after the end of body are left in `input`.
    pub fn decode(
        &mut self,
        input: &mut BytesMut,
        output: &mut BytesMut,
    ) -> Result<bool, HttpBodyDecodeError> {
        match &mut self.kind {
            DecoderKind::ContentLength(left) => {
                let n = usize::try_from(*left)
                    .unwrap_or(usize::MAX)
                    .min(input.len());
                output.extend_from_slice(&input.split_to(n));
                *left -= n as u64;
                Ok(*left == 0)
            }
            DecoderKind::Chunked(decoder) => decoder.decode(input, output),
            DecoderKind::ReadUntilEnd => {
                output.extend_from_slice(&input.split());
                Ok(false)
            }
        }
    }

    /// Check whether a close of the connection at this point ends the body cleanly.
    pub fn finish(&self) -> Result<(), HttpBodyDecodeError> {
        match &self.kind {
            DecoderKind::ContentLength(0) | DecoderKind::ReadUntilEnd => Ok(()),
            DecoderKind::Chunked(ChunkedDecoder {
                state: ChunkedState::End,
                ..
            }) => Ok(()),
            _ => Err(HttpBodyDecodeError::UnexpectedEof),
        }
    }
}
