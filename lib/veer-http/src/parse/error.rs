/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2023-2025 ByteDance and/or its affiliates.
 */

use std::str::Utf8Error;

use thiserror::Error;

/// Errors of the single line parsers.
#[derive(Debug, Error)]
pub enum HttpLineParseError {
    #[error("line too short")]
    TooShort,
    #[error("line is not utf-8: {0}")]
    NotUtf8(#[from] Utf8Error),
    #[error("missing delimiter '{0}'")]
    MissingDelimiter(char),
    #[error("invalid header name")]
    InvalidHeaderName,
    #[error("invalid header value")]
    InvalidHeaderValue,
    #[error("unsupported http version")]
    UnsupportedVersion,
    #[error("invalid status code")]
    InvalidStatusCode,
    #[error("invalid chunk size")]
    InvalidChunkSize,
}
