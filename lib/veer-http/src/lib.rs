/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2023-2025 ByteDance and/or its affiliates.
 */

mod parse;
pub use parse::{HttpChunkedLine, HttpHeaderLine, HttpLineParseError, HttpStatusLine};

mod body;
pub use body::{HttpBodyDecodeError, HttpBodyDecoder, HttpBodyType};

mod request;
pub use request::{BodyFraming, HttpRequestBuildError, HttpRequestHead, RequestTargetForm};

mod response;
pub use response::{HttpResponseHead, HttpResponseHeadParser, HttpResponseParseError};

pub mod connect;
