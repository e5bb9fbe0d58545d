use std::f64::consts;

use crate::{
    runtime::Interpreter,
    value::{Arguments, Arity, CallResult, Module, Number, Value},
};

pub fn module(_: &mut Interpreter) -> Value {
    Module::new("Math")
        .with("Cos", Value::native("Cos", Arity::exact(1), cos))
        .with("Sin", Value::native("Sin", Arity::exact(1), sin))
        .with("Tan", Value::native("Tan", Arity::exact(1), tan))
        .with("ACos", Value::native("ACos", Arity::exact(1), acos))
        .with("ASin", Value::native("ASin", Arity::exact(1), asin))
        .with("ATan", Value::native("ATan", Arity::exact(1), atan))
        .with("Log10", Value::native("Log10", Arity::exact(1), log10))
        .with("Log2", Value::native("Log2", Arity::exact(1), log2))
        .with("Floor", Value::native("Floor", Arity::exact(1), floor))
        .with("Ceil", Value::native("Ceil", Arity::exact(1), ceil))
        .with("Sqrt", Value::native("Sqrt", Arity::exact(1), sqrt))
        .with("Abs", Value::native("Abs", Arity::exact(1), abs))
        .with("Max", Value::native("Max", Arity::exact(2), max))
        .with("Min", Value::native("Min", Arity::exact(2), min))
        .with("Pow", Value::native("Pow", Arity::exact(2), pow))
        .with("PI", Value::float(consts::PI))
        .with("2PI", Value::float(consts::TAU))
        .with("E", Value::float(consts::E))
        .into()
}

fn float_fn(args: &Arguments, f: fn(f64) -> f64) -> CallResult {
    let x = args.number(0)?.as_f64();
    Ok(Value::number(Number::from_float(f(x))))
}

fn cos(_: &mut Interpreter, args: &Arguments) -> CallResult {
    float_fn(args, f64::cos)
}

fn sin(_: &mut Interpreter, args: &Arguments) -> CallResult {
    float_fn(args, f64::sin)
}

fn tan(_: &mut Interpreter, args: &Arguments) -> CallResult {
    float_fn(args, f64::tan)
}

fn acos(_: &mut Interpreter, args: &Arguments) -> CallResult {
    float_fn(args, f64::acos)
}

fn asin(_: &mut Interpreter, args: &Arguments) -> CallResult {
    float_fn(args, f64::asin)
}

fn atan(_: &mut Interpreter, args: &Arguments) -> CallResult {
    float_fn(args, f64::atan)
}

fn log10(_: &mut Interpreter, args: &Arguments) -> CallResult {
    float_fn(args, f64::log10)
}

fn log2(_: &mut Interpreter, args: &Arguments) -> CallResult {
    float_fn(args, f64::log2)
}

fn floor(_: &mut Interpreter, args: &Arguments) -> CallResult {
    Ok(Value::number(args.number(0)?.floor()))
}

fn ceil(_: &mut Interpreter, args: &Arguments) -> CallResult {
    Ok(Value::number(args.number(0)?.ceil()))
}

fn sqrt(_: &mut Interpreter, args: &Arguments) -> CallResult {
    let x = args.number(0)?.as_f64();
    if x < 0.0 {
        return Err(args
            .blame(0, "Sqrt of a negative number is not possible")
            .into());
    }
    Ok(Value::number(Number::from_float(x.sqrt())))
}

fn abs(_: &mut Interpreter, args: &Arguments) -> CallResult {
    Ok(Value::number(args.number(0)?.abs()))
}

fn max(_: &mut Interpreter, args: &Arguments) -> CallResult {
    let (a, b) = (args.number(0)?, args.number(1)?);
    Ok(Value::number(if b.compare(a).is_some_and(|o| o.is_gt()) {
        b
    } else {
        a
    }))
}

fn min(_: &mut Interpreter, args: &Arguments) -> CallResult {
    let (a, b) = (args.number(0)?, args.number(1)?);
    Ok(Value::number(if b.compare(a).is_some_and(|o| o.is_lt()) {
        b
    } else {
        a
    }))
}

fn pow(_: &mut Interpreter, args: &Arguments) -> CallResult {
    let (base, exponent) = (args.number(0)?, args.number(1)?);
    if let (Number::Int(base), Number::Int(exponent)) = (base, exponent) {
        if let Some(result) = u32::try_from(exponent)
            .ok()
            .and_then(|exponent| base.checked_pow(exponent))
        {
            return Ok(Value::int(result));
        }
    }
    Ok(Value::number(Number::from_float(
        base.as_f64().powf(exponent.as_f64()),
    )))
}
