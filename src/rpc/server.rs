//! The JSON-RPC dispatch engine
//!
//! Owns one loaded [`Module`] for its whole lifetime, resolves request
//! methods against it and wraps every outcome, including failures raised by
//! the module itself, in a response envelope.

use std::{any::Any, panic::AssertUnwindSafe, sync::Arc};

use futures_util::FutureExt;
use serde_json::{json, Value};
use tracing::{debug, info};

use crate::errors::MethodError;
use crate::module::{Export, Method, Module, Params};
use crate::rpc::envelope::{
    is_request, Request, Response, RpcError, INTERNAL_ERROR, INVALID_PARAMS, INVALID_REQUEST,
    METHOD_NOT_FOUND, PARSE_ERROR, SERVER_ERROR_MAX, SERVER_ERROR_MIN,
};

#[derive(Debug, Clone)]
pub struct RpcServer {
    module: Arc<Module>,
}

impl RpcServer {
    pub fn new(module: Module) -> Self {
        Self {
            module: Arc::new(module),
        }
    }

    /// Resolves `name` to a callable export. Value exports do not resolve.
    pub fn method(&self, name: &str) -> Option<&Method> {
        match self.module.export(name)? {
            Export::Method(method) => Some(method),
            Export::Value(_) => None,
        }
    }

    /// Names of every export that resolves through [`RpcServer::method`].
    pub fn methods(&self) -> Vec<String> {
        self.module
            .exports()
            .filter(|(name, _)| self.method(name).is_some())
            .map(|(name, _)| name.to_string())
            .collect()
    }

    pub async fn handle(&self, request: Request) -> Response {
        let audit_params = redact_audit_params(request.params.as_deref());

        let response = match self.method(&request.method) {
            None => Response::error(
                request.id,
                RpcError::new(METHOD_NOT_FOUND, "Method not found")
                    .with_data(json!({ "method": request.method.clone() })),
            ),
            Some(method) => {
                let params = Params::new(request.params.unwrap_or_default());
                match invoke(method, params).await {
                    Ok(result) => Response::result(request.jsonrpc, request.id, result),
                    Err(err) => Response::error(request.id, method_error_to_rpc(err)),
                }
            }
        };

        info!(
            module = %self.module.name(),
            method = %request.method,
            params = %audit_params,
            outcome = if response.is_error() { "failure" } else { "success" },
            "rpc call audited"
        );

        response
    }

    /// Decodes, validates, dispatches and encodes one raw frame. Always
    /// returns a JSON text.
    pub async fn serve(&self, input: &str) -> String {
        self.serve_response(input).await.to_json_string()
    }

    async fn serve_response(&self, input: &str) -> Response {
        let payload: Value = match serde_json::from_str(input) {
            Ok(value) => value,
            Err(err) => {
                debug!(error = %err, "frame is not valid json");
                return Response::error(
                    Value::Null,
                    RpcError::new(PARSE_ERROR, "Parse error").with_data(json!(err.to_string())),
                );
            }
        };

        if !is_request(&payload) {
            return invalid_request(&payload, "Not a request object");
        }

        match serde_json::from_value::<Request>(payload.clone()) {
            Ok(request) => self.handle(request).await,
            Err(err) => invalid_request(&payload, &err.to_string()),
        }
    }
}

fn invalid_request(payload: &Value, detail: &str) -> Response {
    let id = payload.get("id").cloned().unwrap_or(Value::Null);
    Response::error(
        id,
        RpcError::new(INVALID_REQUEST, "Invalid Request").with_data(json!(detail)),
    )
}

/// Runs the method, converting a panic inside it into a [`MethodError`].
async fn invoke(method: &Method, params: Params) -> Result<Value, MethodError> {
    let call = async { method.call(params).await };
    match AssertUnwindSafe(call).catch_unwind().await {
        Ok(outcome) => outcome,
        Err(payload) => Err(MethodError::Panicked(panic_message(payload.as_ref()))),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

pub fn method_error_to_rpc(err: MethodError) -> RpcError {
    match err {
        MethodError::InvalidParams(detail) => {
            RpcError::new(INVALID_PARAMS, "Invalid params").with_data(json!(detail))
        }
        MethodError::Failed { message, data } => {
            let error = RpcError::new(INTERNAL_ERROR, message);
            match data {
                Some(data) => error.with_data(data),
                None => error,
            }
        }
        MethodError::Server { code, message } => {
            let code = if (SERVER_ERROR_MIN..=SERVER_ERROR_MAX).contains(&code) {
                code
            } else {
                SERVER_ERROR_MAX
            };
            RpcError::new(code, message)
        }
        MethodError::Panicked(detail) => {
            RpcError::new(INTERNAL_ERROR, "Internal error").with_data(json!(detail))
        }
    }
}

pub fn redact_audit_params(params: Option<&[Value]>) -> Value {
    params
        .map(|items| Value::Array(items.iter().map(redact_audit_value).collect()))
        .unwrap_or(Value::Null)
}

pub fn redact_audit_value(value: &Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(key, item)| {
                    if is_sensitive_key(key) {
                        (key.clone(), Value::String("[REDACTED]".to_string()))
                    } else {
                        (key.clone(), redact_audit_value(item))
                    }
                })
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.iter().map(redact_audit_value).collect()),
        _ => value.clone(),
    }
}

pub fn is_sensitive_key(key: &str) -> bool {
    let normalized = key.trim().to_ascii_lowercase();
    matches!(
        normalized.as_str(),
        "authorization" | "bearer" | "credentials" | "credential" | "api_key" | "apikey"
    ) || normalized.contains("token")
        || normalized.contains("secret")
        || normalized.contains("password")
}
