use crate::handler::Handler;
use crate::registry::FunctionRegistry;
use msgrpc_common::{Notification, Params, RemoteError, Request, Response, Value};
use msgrpc_metrics::MetricsCollector;
use std::any::Any;
use std::sync::Arc;
use std::time::Instant;

/// Routes decoded requests to bound handlers.
///
/// Built-in introspection methods are answered by the metrics collector;
/// everything else goes through the [`FunctionRegistry`]. Handlers run on
/// tokio's blocking pool, so a slow or panicking handler never stalls the
/// connection task that dispatched it.
#[derive(Clone)]
pub struct Dispatcher {
    registry: Arc<FunctionRegistry>,
    metrics: Arc<dyn MetricsCollector>,
}

impl Dispatcher {
    pub fn new(registry: Arc<FunctionRegistry>, metrics: Arc<dyn MetricsCollector>) -> Self {
        Self { registry, metrics }
    }

    /// Executes a request and builds its response. The response always
    /// carries the request's msgid.
    pub async fn dispatch(&self, request: Request) -> Response {
        tracing::debug!("Dispatching request {} for method: {}", request.msgid, request.method);

        let outcome = self.execute(&request.method, request.params).await;
        if let Err(err) = &outcome {
            tracing::debug!("Request {} failed: {}", request.msgid, err);
        }

        Response {
            msgid: request.msgid,
            outcome,
        }
    }

    /// Executes a notification. Failures are logged, never reported.
    pub async fn dispatch_notification(&self, notification: Notification) {
        tracing::debug!("Dispatching notification for method: {}", notification.method);

        if let Err(err) = self.execute(&notification.method, notification.params).await {
            tracing::error!("Notification '{}' failed: {}", notification.method, err);
        }
    }

    async fn execute(&self, method: &str, params: Params) -> Result<Value, RemoteError> {
        if self.metrics.is_builtin(method) {
            return self.metrics.handle_builtin(method, &self.registry.names());
        }

        let Some(handler) = self.registry.get(method) else {
            self.metrics.record_unknown_method(method);
            return Err(RemoteError::method_not_found(method));
        };

        let start_time = Instant::now();
        let outcome = invoke(method, handler, params).await;
        self.metrics.record_call(method, start_time, outcome.is_ok());
        outcome
    }
}

async fn invoke(method: &str, handler: Arc<dyn Handler>, params: Params) -> Result<Value, RemoteError> {
    let arity = handler.arity();
    if !arity.accepts(params.len()) {
        return Err(RemoteError::argument_mismatch(format!(
            "'{}' takes {}, got {}",
            method,
            arity,
            params.len()
        )));
    }

    match tokio::task::spawn_blocking(move || handler.call(params)).await {
        Ok(outcome) => outcome,
        Err(err) if err.is_panic() => {
            let message = panic_message(err.into_panic());
            tracing::error!("Handler for '{}' panicked: {}", method, message);
            Err(RemoteError::execution(message)
                .with_trace([format!("panicked in handler for '{}'", method)]))
        }
        Err(err) => Err(RemoteError::execution(format!("handler for '{}' was cancelled: {}", method, err))),
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "handler panicked".to_string()
    }
}
