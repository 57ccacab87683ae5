/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2023-2025 ByteDance and/or its affiliates.
 */

use std::sync::{Arc, LazyLock};

use arc_swap::ArcSwapOption;

use crate::{ProxyDescriptor, RequestEnvelope};

/// Routing policy: whether and through which proxy a request is sent.
pub trait Router: Send + Sync {
    fn route(&self, request: &RequestEnvelope) -> Option<ProxyDescriptor>;
}

impl<F> Router for F
where
    F: Fn(&RequestEnvelope) -> Option<ProxyDescriptor> + Send + Sync,
{
    fn route(&self, request: &RequestEnvelope) -> Option<ProxyDescriptor> {
        self(request)
    }
}

/// Holder of the current routing policy.
///
/// Storing a router replaces the previous one, it is never composed with it.
/// Attempts pick up the router in place when they start.
#[derive(Default)]
pub struct RouterSlot {
    inner: ArcSwapOption<Box<dyn Router>>,
}

impl RouterSlot {
    pub fn new() -> Self {
        RouterSlot::default()
    }

    pub fn replace<R>(&self, router: R)
    where
        R: Router + 'static,
    {
        let router: Box<dyn Router> = Box::new(router);
        self.inner.store(Some(Arc::new(router)));
    }

    pub fn clear(&self) {
        self.inner.store(None);
    }

    pub fn is_set(&self) -> bool {
        self.inner.load().is_some()
    }

    pub fn route(&self, request: &RequestEnvelope) -> Option<ProxyDescriptor> {
        self.inner.load_full()?.route(request)
    }

    /// Whether a request should be taken by the engine.
    ///
    /// Requests already routed once are always left to the default path.
    pub fn can_handle(&self, request: &RequestEnvelope) -> bool {
        !request.is_routed() && self.route(request).is_some()
    }
}

static GLOBAL_ROUTER: LazyLock<RouterSlot> = LazyLock::new(RouterSlot::default);

pub fn global_router() -> &'static RouterSlot {
    &GLOBAL_ROUTER
}

/// Replace the process wide router. Only attempts started later see it.
pub fn set_router<R>(router: R)
where
    R: Router + 'static,
{
    GLOBAL_ROUTER.replace(router);
}

pub fn clear_router() {
    GLOBAL_ROUTER.clear();
}

pub fn can_handle(request: &RequestEnvelope) -> bool {
    GLOBAL_ROUTER.can_handle(request)
}
