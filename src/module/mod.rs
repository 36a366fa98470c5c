//! Module registry exposed over JSON-RPC
//!
//! A [`Module`] is an immutable table of named exports. Callable exports are
//! registered once through [`ModuleBuilder`]; non-callable exports are plain
//! JSON values that stay visible to the module but never resolve as methods.

use std::{collections::BTreeMap, future::Future, sync::Arc};

use futures_util::future::{self, BoxFuture, FutureExt};
use serde::{
    de::{DeserializeOwned, Deserializer, Visitor},
    forward_to_deserialize_any, Serialize,
};
use serde_json::Value;

use crate::errors::MethodError;

pub type MethodFuture = BoxFuture<'static, Result<Value, MethodError>>;

type Handler = dyn Fn(Params) -> MethodFuture + Send + Sync;

/// Positional arguments of a call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Params(Vec<Value>);

impl Params {
    pub fn new(values: Vec<Value>) -> Self {
        Self(values)
    }

    pub fn into_inner(self) -> Vec<Value> {
        self.0
    }

    /// Deserializes the positional arguments, usually into a tuple. A tuple
    /// takes its leading arguments and ignores any surplus ones; missing
    /// arguments are an error.
    pub fn parse<T: DeserializeOwned>(self) -> Result<T, MethodError> {
        T::deserialize(Positional(self.0))
            .map_err(|err| MethodError::invalid_params(err.to_string()))
    }
}

struct Positional(Vec<Value>);

impl<'de> Deserializer<'de> for Positional {
    type Error = serde_json::Error;

    fn deserialize_any<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
        Value::Array(self.0).deserialize_any(visitor)
    }

    fn deserialize_tuple<V: Visitor<'de>>(
        self,
        len: usize,
        visitor: V,
    ) -> Result<V::Value, Self::Error> {
        let mut values = self.0;
        values.truncate(len);
        Value::Array(values).deserialize_tuple(len, visitor)
    }

    forward_to_deserialize_any! {
        bool i8 i16 i32 i64 i128 u8 u16 u32 u64 u128 f32 f64 char str string
        bytes byte_buf option unit unit_struct newtype_struct seq
        tuple_struct map struct enum identifier ignored_any
    }
}

#[derive(Clone)]
pub struct Method {
    handler: Arc<Handler>,
}

impl Method {
    pub fn call(&self, params: Params) -> MethodFuture {
        (self.handler)(params)
    }
}

impl std::fmt::Debug for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Method")
    }
}

#[derive(Debug, Clone)]
pub enum Export {
    Method(Method),
    Value(Value),
}

#[derive(Debug)]
pub struct Module {
    name: String,
    exports: BTreeMap<String, Export>,
}

impl Module {
    pub fn builder(name: impl Into<String>) -> ModuleBuilder {
        ModuleBuilder {
            name: name.into(),
            exports: BTreeMap::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn export(&self, name: &str) -> Option<&Export> {
        self.exports.get(name)
    }

    pub fn exports(&self) -> impl Iterator<Item = (&str, &Export)> {
        self.exports
            .iter()
            .map(|(name, export)| (name.as_str(), export))
    }
}

pub struct ModuleBuilder {
    name: String,
    exports: BTreeMap<String, Export>,
}

impl ModuleBuilder {
    /// Registers an async method over raw positional params. A later export
    /// with the same name replaces the earlier one.
    pub fn function<F, Fut>(mut self, name: impl Into<String>, handler: F) -> Self
    where
        F: Fn(Params) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, MethodError>> + Send + 'static,
    {
        let handler: Arc<Handler> = Arc::new(move |params| handler(params).boxed());
        self.exports
            .insert(name.into(), Export::Method(Method { handler }));
        self
    }

    pub fn sync_function<F>(self, name: impl Into<String>, handler: F) -> Self
    where
        F: Fn(Params) -> Result<Value, MethodError> + Send + Sync + 'static,
    {
        self.function(name, move |params| future::ready(handler(params)))
    }

    /// Registers an async method whose params deserialize into `A` and whose
    /// result serializes from `R`.
    pub fn typed<A, R, F, Fut>(self, name: impl Into<String>, handler: F) -> Self
    where
        A: DeserializeOwned + Send + 'static,
        R: Serialize + 'static,
        F: Fn(A) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<R, MethodError>> + Send + 'static,
    {
        let handler = Arc::new(handler);
        self.function(name, move |params: Params| {
            let handler = Arc::clone(&handler);
            async move {
                let args = params.parse::<A>()?;
                let result = handler(args).await?;
                to_result_value(result)
            }
        })
    }

    pub fn typed_sync<A, R, F>(self, name: impl Into<String>, handler: F) -> Self
    where
        A: DeserializeOwned + Send + 'static,
        R: Serialize + 'static,
        F: Fn(A) -> Result<R, MethodError> + Send + Sync + 'static,
    {
        self.sync_function(name, move |params| {
            let args = params.parse::<A>()?;
            to_result_value(handler(args)?)
        })
    }

    pub fn value(mut self, name: impl Into<String>, value: Value) -> Self {
        self.exports.insert(name.into(), Export::Value(value));
        self
    }

    pub fn build(self) -> Module {
        Module {
            name: self.name,
            exports: self.exports,
        }
    }
}

fn to_result_value<R: Serialize>(result: R) -> Result<Value, MethodError> {
    serde_json::to_value(result)
        .map_err(|err| MethodError::failed(format!("result is not serializable: {err}")))
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn sample() -> Module {
        Module::builder("sample")
            .typed_sync("double", |(n,): (i64,)| Ok(n * 2))
            .typed("shout", |(text,): (String,)| async move {
                Ok(text.to_uppercase())
            })
            .sync_function("count", |params| Ok(json!(params.into_inner().len())))
            .value("answer", json!(42))
            .build()
    }

    async fn call(module: &Module, name: &str, params: Vec<Value>) -> Result<Value, MethodError> {
        match module.export(name) {
            Some(Export::Method(method)) => method.call(Params::new(params)).await,
            _ => panic!("{name} is not a method"),
        }
    }

    #[tokio::test]
    async fn sync_and_async_methods_are_awaited_uniformly() {
        let module = sample();

        assert_eq!(
            call(&module, "double", vec![json!(21)])
                .await
                .expect("double succeeds"),
            json!(42)
        );
        assert_eq!(
            call(&module, "shout", vec![json!("hi")])
                .await
                .expect("shout succeeds"),
            json!("HI")
        );
        assert_eq!(
            call(&module, "count", vec![json!(1), json!(null), json!("x")])
                .await
                .expect("count succeeds"),
            json!(3)
        );
    }

    #[tokio::test]
    async fn typed_method_rejects_wrong_arity_and_types() {
        let module = sample();

        let err = call(&module, "double", vec![])
            .await
            .expect_err("missing argument must fail");
        assert!(matches!(err, MethodError::InvalidParams(_)));

        let err = call(&module, "double", vec![json!("two")])
            .await
            .expect_err("string argument must fail");
        assert!(matches!(err, MethodError::InvalidParams(_)));
    }

    #[tokio::test]
    async fn typed_method_ignores_surplus_arguments() {
        let module = sample();

        assert_eq!(
            call(&module, "double", vec![json!(4), json!("extra"), json!(null)])
                .await
                .expect("surplus arguments are ignored"),
            json!(8)
        );
    }

    #[test]
    fn params_parse_into_sequences_and_tuples() {
        let params = Params::new(vec![json!(1), json!(2), json!(3)]);
        let all: Vec<i64> = params.clone().parse().expect("sequence parses");
        assert_eq!(all, vec![1, 2, 3]);

        let (first, second): (i64, i64) = params.parse().expect("tuple parses");
        assert_eq!((first, second), (1, 2));
    }

    #[test]
    fn value_exports_are_not_methods() {
        let module = sample();
        assert!(matches!(module.export("answer"), Some(Export::Value(v)) if v == &json!(42)));
        assert!(module.export("missing").is_none());
    }

    #[test]
    fn later_registration_replaces_earlier_export() {
        let module = Module::builder("dup")
            .value("x", json!(1))
            .sync_function("x", |_| Ok(json!(2)))
            .build();
        assert!(matches!(module.export("x"), Some(Export::Method(_))));
        assert_eq!(module.exports().count(), 1);
        assert_eq!(module.name(), "dup");
    }
}
