/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2023-2025 ByteDance and/or its affiliates.
 */

use super::types::*;

mod reply;
mod request;

pub use reply::Socks5Reply;
use request::Socks5Request;

mod auth;

pub mod client;
