// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use std::any::Any;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::domain::action::ActionError;
use crate::domain::invocation::Arguments;

/// A long-running action exposed to the ticket engine.
#[async_trait]
pub trait Service: Send + Sync {
    fn name(&self) -> &str;

    async fn run(&self, arguments: Arguments) -> Result<Value, ActionError>;
}

/// A service whose body blocks the calling thread.
pub trait BlockingService: Send + Sync + 'static {
    fn name(&self) -> &str;

    fn run(&self, arguments: Arguments) -> Result<Value, ActionError>;
}

/// Runs a [`BlockingService`] on Tokio's blocking pool so it never occupies
/// an async worker thread.
pub struct Blocking<S> {
    inner: Arc<S>,
}

impl<S: BlockingService> Blocking<S> {
    pub fn new(service: S) -> Self {
        Self {
            inner: Arc::new(service),
        }
    }
}

#[async_trait]
impl<S: BlockingService> Service for Blocking<S> {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn run(&self, arguments: Arguments) -> Result<Value, ActionError> {
        let inner = Arc::clone(&self.inner);
        match tokio::task::spawn_blocking(move || inner.run(arguments)).await {
            Ok(result) => result,
            Err(join_error) if join_error.is_panic() => Err(ActionError::Failed(format!(
                "service panicked: {}",
                panic_message(join_error.into_panic().as_ref())
            ))),
            Err(join_error) => Err(ActionError::Failed(join_error.to_string())),
        }
    }
}

/// A service backed by an async closure.
pub struct FnService<F> {
    name: String,
    body: F,
}

pub fn service_fn<F, Fut>(name: impl Into<String>, body: F) -> FnService<F>
where
    F: Fn(Arguments) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Value, ActionError>> + Send + 'static,
{
    FnService {
        name: name.into(),
        body,
    }
}

#[async_trait]
impl<F, Fut> Service for FnService<F>
where
    F: Fn(Arguments) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Value, ActionError>> + Send + 'static,
{
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(&self, arguments: Arguments) -> Result<Value, ActionError> {
        (self.body)(arguments).await
    }
}

/// Best-effort text of a panic payload.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct Doubler;

    impl BlockingService for Doubler {
        fn name(&self) -> &str {
            "doubler"
        }

        fn run(&self, arguments: Arguments) -> Result<Value, ActionError> {
            let x = arguments
                .get("x")
                .and_then(Value::as_i64)
                .ok_or_else(|| ActionError::InvalidArguments("x is required".to_string()))?;
            Ok(json!(x * 2))
        }
    }

    struct Exploder;

    impl BlockingService for Exploder {
        fn name(&self) -> &str {
            "exploder"
        }

        fn run(&self, _arguments: Arguments) -> Result<Value, ActionError> {
            panic!("kaboom");
        }
    }

    #[tokio::test]
    async fn test_blocking_service_runs_off_runtime() {
        let service = Blocking::new(Doubler);
        let mut args = Arguments::new();
        args.insert("x".to_string(), json!(21));

        assert_eq!(service.name(), "doubler");
        assert_eq!(service.run(args).await.unwrap(), json!(42));
    }

    #[tokio::test]
    async fn test_blocking_service_panic_becomes_error() {
        let service = Blocking::new(Exploder);
        let err = service.run(Arguments::new()).await.unwrap_err();
        assert_eq!(err.to_string(), "service panicked: kaboom");
    }

    #[tokio::test]
    async fn test_service_fn() {
        let service = service_fn("echo", |args: Arguments| async move {
            Ok::<Value, ActionError>(Value::Object(args))
        });
        let mut args = Arguments::new();
        args.insert("msg".to_string(), json!("hi"));
        assert_eq!(service.run(args).await.unwrap(), json!({"msg": "hi"}));
    }
}
