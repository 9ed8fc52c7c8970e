//! Immediate-or-deferred results
//!
//! Anything that may reach a host effect (a native call, a metatable
//! handler, a guest function body) returns a [`Deferred`]. Callers chain
//! onto it with [`Deferred::and_then`] or `.await` it; neither forces a
//! synchronous answer, and a ready result never allocates a future.

use crate::error::{LuaError, LuaResult};
use std::fmt;
use std::future::{Future, IntoFuture};
use std::pin::Pin;
use std::task::{Context, Poll};

/// A boxed, single-threaded future
pub type LocalBoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + 'a>>;

// Each nested guest call polls through several boxed futures on the native
// stack; debug builds need far more than the default thread stack at depth.
const STACK_RED_ZONE: usize = 128 * 1024; // 128KB remaining triggers growth
const STACK_GROW_SIZE: usize = 4 * 1024 * 1024; // Grow by 4MB each time

/// Polls the inner future on a grown stack segment when the current one
/// runs low.
pub struct GrowStack<'a, T>(LocalBoxFuture<'a, T>);

impl<'a, T> GrowStack<'a, T> {
    pub fn new(future: impl Future<Output = T> + 'a) -> Self {
        GrowStack(Box::pin(future))
    }
}

impl<T> Future for GrowStack<'_, T> {
    type Output = T;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<T> {
        let inner = &mut self.0;
        stacker::maybe_grow(STACK_RED_ZONE, STACK_GROW_SIZE, || inner.as_mut().poll(cx))
    }
}

/// Result of an operation that may suspend
pub enum Deferred<T> {
    /// Completed synchronously
    Ready(LuaResult<T>),
    /// Completes when the host resolves the pending work
    Pending(LocalBoxFuture<'static, LuaResult<T>>),
}

impl<T: 'static> Deferred<T> {
    pub fn ok(value: T) -> Self {
        Deferred::Ready(Ok(value))
    }

    pub fn err(error: LuaError) -> Self {
        Deferred::Ready(Err(error))
    }

    pub fn from_future(future: impl Future<Output = LuaResult<T>> + 'static) -> Self {
        Deferred::Pending(Box::pin(future))
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, Deferred::Ready(_))
    }

    /// Takes the result if it is already available.
    pub fn into_ready(self) -> Result<LuaResult<T>, Self> {
        match self {
            Deferred::Ready(result) => Ok(result),
            pending => Err(pending),
        }
    }

    /// Sequence a follow-up step on the success value. Errors short-circuit.
    pub fn and_then<U: 'static>(self, f: impl FnOnce(T) -> Deferred<U> + 'static) -> Deferred<U> {
        match self {
            Deferred::Ready(Ok(value)) => f(value),
            Deferred::Ready(Err(e)) => Deferred::Ready(Err(e)),
            Deferred::Pending(future) => Deferred::from_future(async move { f(future.await?).await }),
        }
    }

    /// Sequence a follow-up step on the whole result, success or failure.
    pub fn then<U: 'static>(
        self,
        f: impl FnOnce(LuaResult<T>) -> Deferred<U> + 'static,
    ) -> Deferred<U> {
        match self {
            Deferred::Ready(result) => f(result),
            Deferred::Pending(future) => Deferred::from_future(async move { f(future.await).await }),
        }
    }

    pub fn map<U: 'static>(self, f: impl FnOnce(T) -> U + 'static) -> Deferred<U> {
        match self {
            Deferred::Ready(result) => Deferred::Ready(result.map(f)),
            Deferred::Pending(future) => Deferred::from_future(async move { future.await.map(f) }),
        }
    }

    pub fn map_err(self, f: impl FnOnce(LuaError) -> LuaError + 'static) -> Self {
        match self {
            Deferred::Ready(result) => Deferred::Ready(result.map_err(f)),
            Deferred::Pending(future) => Deferred::from_future(async move { future.await.map_err(f) }),
        }
    }
}

impl<T> From<LuaResult<T>> for Deferred<T> {
    fn from(result: LuaResult<T>) -> Self {
        Deferred::Ready(result)
    }
}

impl<T: 'static> IntoFuture for Deferred<T> {
    type Output = LuaResult<T>;
    type IntoFuture = LocalBoxFuture<'static, LuaResult<T>>;

    fn into_future(self) -> Self::IntoFuture {
        match self {
            Deferred::Ready(result) => Box::pin(std::future::ready(result)),
            Deferred::Pending(future) => future,
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for Deferred<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Deferred::Ready(result) => f.debug_tuple("Ready").field(result).finish(),
            Deferred::Pending(_) => f.write_str("Pending(..)"),
        }
    }
}

/// Fold `items` through `step` strictly in order.
///
/// Each step starts only after the previous one resolved. While every step
/// completes synchronously the fold stays synchronous; the first pending
/// step moves the remainder into a single future.
pub fn try_fold<I, A, F>(items: I, init: A, mut step: F) -> Deferred<A>
where
    I: IntoIterator,
    I::IntoIter: 'static,
    I::Item: 'static,
    A: 'static,
    F: FnMut(A, I::Item) -> Deferred<A> + 'static,
{
    let mut iter = items.into_iter();
    let mut acc = init;
    loop {
        let Some(item) = iter.next() else {
            return Deferred::ok(acc);
        };
        match step(acc, item) {
            Deferred::Ready(Ok(next)) => acc = next,
            Deferred::Ready(Err(e)) => return Deferred::err(e),
            Deferred::Pending(future) => {
                return Deferred::from_future(async move {
                    let mut acc = future.await?;
                    for item in iter {
                        acc = step(acc, item).await?;
                    }
                    Ok(acc)
                });
            }
        }
    }
}
