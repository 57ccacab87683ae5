/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2023-2025 ByteDance and/or its affiliates.
 */

mod connect;

mod client;
pub use client::StreamHttpClient;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConnectionState {
    Idle,
    Open,
    ResponseReceived,
    Redirecting,
    Completed,
    Failed,
    Cancelled,
}

impl ConnectionState {
    /// No event follows once a client is in one of these states.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ConnectionState::Redirecting
                | ConnectionState::Completed
                | ConnectionState::Failed
                | ConnectionState::Cancelled
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_states() {
        assert!(!ConnectionState::Idle.is_terminal());
        assert!(!ConnectionState::Open.is_terminal());
        assert!(!ConnectionState::ResponseReceived.is_terminal());
        assert!(ConnectionState::Redirecting.is_terminal());
        assert!(ConnectionState::Completed.is_terminal());
        assert!(ConnectionState::Failed.is_terminal());
        assert!(ConnectionState::Cancelled.is_terminal());
    }
}
