/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2023-2025 ByteDance and/or its affiliates.
 */

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::Instant;

type TimerBlock = Box<dyn FnMut() + Send>;

/// A cancellable deadline, optionally repeating.
///
/// The cancel flag is checked before every fire, so a stopped timer stays silent.
pub struct Timer {
    timeout: Duration,
    repeatable: bool,
    fire_immediately: bool,
    block: Option<TimerBlock>,
    cancelled: Arc<AtomicBool>,
    task: Option<JoinHandle<()>>,
}

impl Timer {
    pub fn new<F>(timeout: Duration, repeatable: bool, fire_immediately: bool, block: F) -> Self
    where
        F: FnMut() + Send + 'static,
    {
        Timer {
            timeout,
            repeatable,
            fire_immediately,
            block: Some(Box::new(block)),
            cancelled: Arc::new(AtomicBool::new(false)),
            task: None,
        }
    }

    /// Arm the timer. Must be called within a tokio runtime.
    pub fn start(&mut self) {
        let Some(mut block) = self.block.take() else {
            return;
        };
        if self.cancelled.load(Ordering::Acquire) {
            return;
        }

        let cancelled = self.cancelled.clone();
        let timeout = self.timeout;
        let repeatable = self.repeatable;
        let start = if self.fire_immediately {
            Instant::now()
        } else {
            Instant::now() + timeout
        };
        self.task = Some(tokio::spawn(async move {
            if repeatable {
                // tokio interval panics on a zero period
                let period = timeout.max(Duration::from_millis(1));
                let mut interval = tokio::time::interval_at(start, period);
                loop {
                    interval.tick().await;
                    if cancelled.load(Ordering::Acquire) {
                        break;
                    }
                    block();
                }
            } else {
                tokio::time::sleep_until(start).await;
                if !cancelled.load(Ordering::Acquire) {
                    block();
                }
            }
        }));
    }

    pub fn stop(&mut self) {
        self.cancelled.store(true, Ordering::Release);
        self.block = None;
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}

impl Drop for Timer {
    fn drop(&mut self) {
        self.stop();
    }
}
