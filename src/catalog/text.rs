//! String helpers

use regex::Regex;
use serde_json::{json, Value};

use crate::errors::MethodError;
use crate::module::Module;

pub fn module() -> Module {
    Module::builder("text")
        .sync_function("echo", |params| {
            let mut values = params.into_inner();
            Ok(if values.len() == 1 {
                values.remove(0)
            } else {
                Value::Array(values)
            })
        })
        .typed_sync("upper", |(text,): (String,)| Ok(text.to_uppercase()))
        .typed_sync("lower", |(text,): (String,)| Ok(text.to_lowercase()))
        .typed_sync("concat", |parts: Vec<String>| Ok(parts.concat()))
        .typed_sync("matches", |(pattern, text): (String, String)| {
            Ok(compile(&pattern)?.is_match(&text))
        })
        .typed_sync(
            "replace",
            |(pattern, text, replacement): (String, String, String)| {
                Ok(compile(&pattern)?
                    .replace_all(&text, replacement.as_str())
                    .into_owned())
            },
        )
        .value("encoding", json!("utf-8"))
        .build()
}

fn compile(pattern: &str) -> Result<Regex, MethodError> {
    Regex::new(pattern).map_err(|err| MethodError::invalid_params(format!("invalid pattern: {err}")))
}
