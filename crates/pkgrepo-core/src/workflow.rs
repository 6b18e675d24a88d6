//! The workflow engine: a small `Result`-like sum type with `and_then`-style
//! combinators, plus two interchangeable executors.
//!
//! Generalizes libzypp's template-over-executor pattern (see
//! `ImportKeyFromRepoLogic<Executor>` in `zypp/ng/workflows/keyringwf.cc`):
//! the same pipeline of steps can run synchronously on the calling thread,
//! or cooperatively on a dedicated single-threaded async runtime, without
//! the pipeline's own code knowing which. Rust has no template-over-type
//! parameter for "which executor", so this crate expresses the same idea
//! with a trait object plus a thin `Expected<T, E>` combinator type that
//! mirrors `Result` but stays distinct so pipeline code reads as workflow
//! steps rather than ordinary fallible function calls.

use std::future::Future;

/// The outcome of a single workflow step: the libzypp `Expected<T>` monad.
/// Deliberately not just a `Result` alias — keeping it a distinct type
/// means a pipeline built from `and_then` chains reads as "workflow steps",
/// not as ordinary error propagation.
#[derive(Debug, Clone)]
pub enum Expected<T, E> {
    /// The step succeeded.
    Ok(T),
    /// The step failed.
    Err(E),
}

impl<T, E> Expected<T, E> {
    pub fn ok(value: T) -> Self {
        Self::Ok(value)
    }

    pub fn err(error: E) -> Self {
        Self::Err(error)
    }

    pub fn is_ok(&self) -> bool {
        matches!(self, Self::Ok(_))
    }

    pub fn is_err(&self) -> bool {
        matches!(self, Self::Err(_))
    }

    /// Chain a fallible next step, short-circuiting on the current error.
    pub fn and_then<U>(self, f: impl FnOnce(T) -> Expected<U, E>) -> Expected<U, E> {
        match self {
            Self::Ok(value) => f(value),
            Self::Err(error) => Expected::Err(error),
        }
    }

    /// Recover from an error, or pass a success through untouched.
    pub fn or_else(self, f: impl FnOnce(E) -> Expected<T, E>) -> Expected<T, E> {
        match self {
            Self::Ok(value) => Expected::Ok(value),
            Self::Err(error) => f(error),
        }
    }

    /// Transform a success value, leaving an error untouched.
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Expected<U, E> {
        match self {
            Self::Ok(value) => Expected::Ok(f(value)),
            Self::Err(error) => Expected::Err(error),
        }
    }

    /// Transform an error value, leaving a success untouched.
    pub fn map_err<F>(self, f: impl FnOnce(E) -> F) -> Expected<T, F> {
        match self {
            Self::Ok(value) => Expected::Ok(value),
            Self::Err(error) => Expected::Err(f(error)),
        }
    }

    pub fn into_result(self) -> Result<T, E> {
        self.into()
    }
}

impl<T, E> From<Result<T, E>> for Expected<T, E> {
    fn from(r: Result<T, E>) -> Self {
        match r {
            Ok(value) => Self::Ok(value),
            Err(error) => Self::Err(error),
        }
    }
}

impl<T, E> From<Expected<T, E>> for Result<T, E> {
    fn from(e: Expected<T, E>) -> Self {
        match e {
            Expected::Ok(value) => Ok(value),
            Expected::Err(error) => Err(error),
        }
    }
}

/// Runs workflow steps. Implemented by [`SyncExecutor`] (runs closures
/// directly on the calling thread) and [`AsyncExecutor`] (dispatches onto a
/// dedicated single-threaded runtime). Pipeline code that is generic over
/// `Exec: Executor` can be driven by either without change: `lift` starts a
/// pipeline, `and_then` chains the next step, and `ask_user` is the one
/// operation whose dispatch strategy actually differs between the two —
/// a blocking call on the calling thread for `SyncExecutor`, a call
/// dispatched onto the cooperative runtime for `AsyncExecutor`.
pub trait Executor {
    /// Lift a plain value into a fresh successful step.
    fn lift<T, E>(&self, value: T) -> Expected<T, E>;

    /// Chain a fallible next step onto a prior one.
    fn and_then<T, U, E>(&self, step: Expected<T, E>, f: impl FnOnce(T) -> Expected<U, E>) -> Expected<U, E>;

    /// Run a step that in an interactive front end means asking a human a
    /// question.
    fn ask_user<T>(&self, ask: impl FnOnce() -> T) -> T;
}

/// Runs every step inline on the calling thread. The default, and the only
/// executor needed by code that never awaits I/O mid-pipeline.
#[derive(Debug, Clone, Copy, Default)]
pub struct SyncExecutor;

impl Executor for SyncExecutor {
    fn lift<T, E>(&self, value: T) -> Expected<T, E> {
        Expected::ok(value)
    }

    fn and_then<T, U, E>(&self, step: Expected<T, E>, f: impl FnOnce(T) -> Expected<U, E>) -> Expected<U, E> {
        step.and_then(f)
    }

    fn ask_user<T>(&self, ask: impl FnOnce() -> T) -> T {
        ask()
    }
}

/// Runs workflow steps on a dedicated current-thread Tokio runtime via
/// `LocalSet`, so pipeline steps that are `!Send` (borrowing from a
/// `Context` that is not itself `Sync`) can still `.await` I/O
/// cooperatively instead of blocking the calling thread outright.
pub struct AsyncExecutor {
    runtime: tokio::runtime::Runtime,
    local: tokio::task::LocalSet,
}

impl AsyncExecutor {
    /// Build a new executor backed by its own current-thread runtime.
    pub fn new() -> std::io::Result<Self> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;
        Ok(Self {
            runtime,
            local: tokio::task::LocalSet::new(),
        })
    }

    /// Run `future` to completion on this executor's local task set.
    pub fn block_on<T>(&self, future: impl Future<Output = T>) -> T {
        self.local.block_on(&self.runtime, future)
    }
}

impl Executor for AsyncExecutor {
    fn lift<T, E>(&self, value: T) -> Expected<T, E> {
        Expected::ok(value)
    }

    fn and_then<T, U, E>(&self, step: Expected<T, E>, f: impl FnOnce(T) -> Expected<U, E>) -> Expected<U, E> {
        self.block_on(async { step.and_then(f) })
    }

    fn ask_user<T>(&self, ask: impl FnOnce() -> T) -> T {
        self.block_on(async { ask() })
    }
}
