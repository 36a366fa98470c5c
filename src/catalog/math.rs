//! Arithmetic over JSON numbers
//!
//! Integer operands stay integers (`add(2, 3)` is `5`, not `5.0`); any float
//! operand switches the operation to `f64`.

use serde_json::{json, Number, Value};

use crate::errors::MethodError;
use crate::module::Module;

#[derive(Debug, Clone, Copy)]
enum Op {
    Add,
    Sub,
    Mul,
    Div,
}

pub fn module() -> Module {
    Module::builder("math")
        .typed_sync("add", |(a, b): (Number, Number)| apply(Op::Add, &a, &b))
        .typed_sync("sub", |(a, b): (Number, Number)| apply(Op::Sub, &a, &b))
        .typed_sync("mul", |(a, b): (Number, Number)| apply(Op::Mul, &a, &b))
        .typed_sync("div", |(a, b): (Number, Number)| apply(Op::Div, &a, &b))
        .typed_sync("sum", |values: Vec<Number>| {
            values
                .iter()
                .try_fold(Number::from(0), |total, value| apply(Op::Add, &total, value))
        })
        .value("PI", json!(std::f64::consts::PI))
        .build()
}

fn apply(op: Op, a: &Number, b: &Number) -> Result<Number, MethodError> {
    if let (Some(a), Some(b)) = (a.as_i64(), b.as_i64()) {
        let result = match op {
            Op::Add => a.checked_add(b),
            Op::Sub => a.checked_sub(b),
            Op::Mul => a.checked_mul(b),
            Op::Div => {
                if b == 0 {
                    return Err(division_by_zero());
                }
                match a.checked_rem(b) {
                    Some(0) => a.checked_div(b),
                    _ => None,
                }
            }
        };
        if let Some(result) = result {
            return Ok(Number::from(result));
        }
    }

    let (a, b) = (to_f64(a)?, to_f64(b)?);
    let result = match op {
        Op::Add => a + b,
        Op::Sub => a - b,
        Op::Mul => a * b,
        Op::Div => {
            if b == 0.0 {
                return Err(division_by_zero());
            }
            a / b
        }
    };

    Number::from_f64(result).ok_or_else(|| {
        MethodError::failed_with_data("result is not a finite number", json!(result.to_string()))
    })
}

fn to_f64(number: &Number) -> Result<f64, MethodError> {
    number
        .as_f64()
        .ok_or_else(|| MethodError::invalid_params(format!("{number} is not representable")))
}

fn division_by_zero() -> MethodError {
    MethodError::failed_with_data("division by zero", Value::from("divisor must not be 0"))
}
