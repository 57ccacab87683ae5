/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2023-2025 ByteDance and/or its affiliates.
 */

use bytes::Bytes;

use crate::error::EngineError;
use crate::{RequestEnvelope, ResponseEnvelope};

/// Events reported for one request attempt.
///
/// At most one `Response` or `Redirect`, then any number of `Data`, then
/// exactly one `Completed`. Nothing follows `Completed`. A stream client
/// stops silently after its `Redirect`; the orchestrator closes the attempt
/// with `Completed(Some(EngineError::UserCancelled))`.
#[derive(Debug)]
pub enum LoadEvent {
    Response(ResponseEnvelope),
    Data(Bytes),
    Redirect(ResponseEnvelope, RequestEnvelope),
    Completed(Option<EngineError>),
}
