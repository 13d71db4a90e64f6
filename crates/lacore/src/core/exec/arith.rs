//! Element arithmetic and datapath latencies.
//!
//! Results are computed in the destination precision. Operands are expected
//! to be converted before they get here; a stray operand of the other
//! precision is converted to the precision of `a`.

use crate::common::{Datatype, Value};
use crate::config::DatapathConfig;
use crate::core::arch::{DataOp, Form, ReduceOp};

macro_rules! element_ops {
    ($ty:ty, $eval:ident, $min:ident, $max:ident) => {
        fn $eval(
            form: Form,
            subtract: bool,
            divide: bool,
            a: $ty,
            b: Option<$ty>,
            c: Option<$ty>,
        ) -> $ty {
            let scale = |x: $ty, y: Option<$ty>| match y {
                Some(y) if divide => x / y,
                Some(y) => x * y,
                None => x,
            };
            let shift = |x: $ty, y: Option<$ty>| match y {
                Some(y) if subtract => x - y,
                Some(y) => x + y,
                None => x,
            };
            match form {
                Form::MulAdd => shift(scale(a, b), c),
                Form::AddMul => scale(shift(a, b), c),
            }
        }

        /// IEEE 754-2008 `minNum`: a NaN operand loses, `-0.0 < +0.0`.
        fn $min(a: $ty, b: $ty) -> $ty {
            match (a.is_nan(), b.is_nan()) {
                (true, _) => b,
                (false, true) => a,
                _ if a == b => {
                    if a.is_sign_negative() {
                        a
                    } else {
                        b
                    }
                }
                _ => a.min(b),
            }
        }

        /// IEEE 754-2008 `maxNum`: a NaN operand loses, `+0.0 > -0.0`.
        fn $max(a: $ty, b: $ty) -> $ty {
            match (a.is_nan(), b.is_nan()) {
                (true, _) => b,
                (false, true) => a,
                _ if a == b => {
                    if a.is_sign_negative() {
                        b
                    } else {
                        a
                    }
                }
                _ => a.max(b),
            }
        }
    };
}

element_ops!(f32, eval_f32, min_f32, max_f32);
element_ops!(f64, eval_f64, min_f64, max_f64);

const fn single(v: Value) -> f32 {
    match v {
        Value::F32(x) => x,
        Value::F64(x) => x as f32,
    }
}

const fn double(v: Value) -> f64 {
    match v {
        Value::F32(x) => x as f64,
        Value::F64(x) => x,
    }
}

/// Computes one element of `op` in the precision of `a`.
///
/// A missing `b` or `c` takes the identity of its operator.
pub fn eval(op: &DataOp, a: Value, b: Option<Value>, c: Option<Value>) -> Value {
    match a {
        Value::F32(x) => Value::F32(eval_f32(
            op.form,
            op.subtract,
            op.divide,
            x,
            b.map(single),
            c.map(single),
        )),
        Value::F64(x) => Value::F64(eval_f64(
            op.form,
            op.subtract,
            op.divide,
            x,
            b.map(double),
            c.map(double),
        )),
    }
}

/// Folds `x` into a reduction accumulator.
///
/// An empty accumulator starts at zero for `Sum` and at `x` for `Min`/`Max`.
pub fn fold(op: ReduceOp, acc: Option<Value>, x: Value) -> Value {
    match (op, acc, x) {
        (ReduceOp::Sum, None, Value::F32(x)) => Value::F32(0.0 + x),
        (ReduceOp::Sum, None, Value::F64(x)) => Value::F64(0.0 + x),
        (_, None, x) => x,
        (op, Some(Value::F32(acc)), x) => {
            let x = single(x);
            Value::F32(match op {
                ReduceOp::Sum => acc + x,
                ReduceOp::Min => min_f32(acc, x),
                ReduceOp::Max => max_f32(acc, x),
            })
        }
        (op, Some(Value::F64(acc)), x) => {
            let x = double(x);
            Value::F64(match op {
                ReduceOp::Sum => acc + x,
                ReduceOp::Min => min_f64(acc, x),
                ReduceOp::Max => max_f64(acc, x),
            })
        }
    }
}

/// Elements the datapath accepts per cycle at `precision`.
pub fn lanes(config: &DatapathConfig, precision: Datatype) -> usize {
    (config.simd_width * (8 / precision.width() as usize)).max(1)
}

/// Cycles from accepting an element to its elementwise result.
///
/// Only the operators the instruction actually uses are charged.
pub fn vector_latency(op: &DataOp, precision: Datatype, config: &DatapathConfig) -> u64 {
    let (uses_scale, uses_shift) = match op.form {
        Form::MulAdd => (op.b.is_some(), op.c.is_some()),
        Form::AddMul => (op.c.is_some(), op.b.is_some()),
    };
    let mut latency = 0;
    if uses_scale {
        latency += if op.divide {
            config.div.get(precision)
        } else {
            config.mul.get(precision)
        };
    }
    if uses_shift {
        latency += config.add.get(precision);
    }
    latency.max(1)
}

/// Cycles one batch spends in the reduction tree.
pub fn reduce_latency(precision: Datatype, config: &DatapathConfig) -> u64 {
    let width = lanes(config, precision) as u64;
    let depth = u64::from(width.next_power_of_two().trailing_zeros()).max(1);
    config.add.get(precision).max(1) * depth
}
