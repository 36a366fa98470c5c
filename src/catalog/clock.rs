//! Time helpers; `sleep` and `delay` are the asynchronous exports.

use std::time::Duration;

use chrono::{SecondsFormat, Utc};
use serde_json::Value;

use crate::errors::MethodError;
use crate::module::Module;

pub const MAX_SLEEP_MS: u64 = 60_000;

pub fn module() -> Module {
    Module::builder("clock")
        .sync_function("now", |_| {
            Ok(Value::String(
                Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            ))
        })
        .typed("sleep", |(ms,): (u64,)| async move {
            let ms = checked_duration(ms)?;
            tokio::time::sleep(Duration::from_millis(ms)).await;
            Ok(ms)
        })
        .typed("delay", |(ms, value): (u64, Value)| async move {
            let ms = checked_duration(ms)?;
            tokio::time::sleep(Duration::from_millis(ms)).await;
            Ok(value)
        })
        .build()
}

fn checked_duration(ms: u64) -> Result<u64, MethodError> {
    if ms > MAX_SLEEP_MS {
        return Err(MethodError::invalid_params(format!(
            "duration must not exceed {MAX_SLEEP_MS} ms"
        )));
    }
    Ok(ms)
}

#[cfg(test)]
mod tests {
    use chrono::DateTime;
    use serde_json::{json, Value};

    use crate::errors::MethodError;
    use crate::module::{Export, Params};

    use super::module;

    async fn call(name: &str, params: Value) -> Result<Value, MethodError> {
        let module = module();
        let Some(Export::Method(method)) = module.export(name) else {
            panic!("{name} must be a method");
        };
        let params = params.as_array().cloned().expect("params array");
        method.call(Params::new(params)).await
    }

    #[tokio::test]
    async fn now_is_rfc3339_utc() {
        let now = call("now", json!([])).await.expect("now");
        let text = now.as_str().expect("string timestamp");
        assert!(text.ends_with('Z'));
        DateTime::parse_from_rfc3339(text).expect("valid rfc3339");
    }

    #[tokio::test]
    async fn sleep_and_delay_resolve() {
        assert_eq!(call("sleep", json!([1])).await.expect("sleep"), json!(1));
        assert_eq!(
            call("delay", json!([1, {"done": true}])).await.expect("delay"),
            json!({"done": true})
        );
    }

    #[tokio::test]
    async fn oversized_sleep_is_rejected() {
        let err = call("sleep", json!([60_001])).await.expect_err("must fail");
        assert!(matches!(err, MethodError::InvalidParams(_)));
    }
}
