//! Ready-made middleware built on `tracing`.
//!
//! - [`logging`] - logs every dispatch and its outcome
//! - [`timing`] - logs how long each dispatch took
//! - [`instrument`] - the typed counterpart of [`logging`], bound at registration
//!
//! # Example
//!
//! ```
//! use typemux::{middleware, Context, DispatchRegistry, Dispatcher};
//!
//! let registry = DispatchRegistry::new();
//! registry.register_with(|_ctx, _n: &u32| Ok(()), [middleware::instrument()]);
//!
//! let chain = [middleware::logging(), middleware::timing()];
//! registry.dispatch(&Context::new(), &1u32, &chain).unwrap();
//! ```

use std::any::type_name;
use std::time::Instant;

use crate::dispatch::{DispatchMiddleware, Middleware};

/// Cross-cutting middleware that logs each dispatch.
///
/// Emits a `debug` record before the call and after success, and a `warn`
/// record when the chain returns an error. The error itself is returned
/// unchanged.
pub fn logging() -> DispatchMiddleware {
    DispatchMiddleware::new(|ctx, event, next| {
        tracing::debug!("Processing event: {}", event.type_name());
        let result = next(ctx);
        match &result {
            Ok(()) => tracing::debug!("Successfully processed: {}", event.type_name()),
            Err(e) => tracing::warn!("Error processing {}: {}", event.type_name(), e),
        }
        result
    })
}

/// Cross-cutting middleware that logs the time spent in the rest of the chain.
pub fn timing() -> DispatchMiddleware {
    DispatchMiddleware::new(|ctx, event, next| {
        let start = Instant::now();
        let result = next(ctx);
        tracing::debug!("Event {} took {:?}", event.type_name(), start.elapsed());
        result
    })
}

/// Typed middleware that logs calls to the handler it wraps.
pub fn instrument<T: 'static>() -> Middleware<T> {
    Middleware::new(|ctx, value, next| {
        tracing::trace!("Handling {}", type_name::<T>());
        let result = next(ctx, value);
        if let Err(e) = &result {
            tracing::debug!("Handler for {} failed: {}", type_name::<T>(), e);
        }
        result
    })
}
