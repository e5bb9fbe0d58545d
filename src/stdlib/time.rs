use std::{
    thread,
    time::{Duration, SystemTime, UNIX_EPOCH},
};

use crate::{
    runtime::Interpreter,
    value::{Arguments, Arity, CallResult, Module, Value, ValueKind},
};

pub fn module(_: &mut Interpreter) -> Value {
    Module::new("Time")
        .with("GetEpoch", Value::native("GetEpoch", Arity::exact(0), get_epoch))
        .with("Sleep", Value::native("Sleep", Arity::exact(1), sleep))
        .into()
}

fn get_epoch(_: &mut Interpreter, _: &Arguments) -> CallResult {
    let seconds = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs_f64())
        .unwrap_or_default();
    Ok(Value::float(seconds))
}

fn sleep(_: &mut Interpreter, args: &Arguments) -> CallResult {
    let seconds = match args.get(0).map(Value::kind) {
        Some(ValueKind::Number(number)) => number.as_f64(),
        _ => return Err(args.blame(0, "Expected number").into()),
    };
    if seconds < 0.0 || !seconds.is_finite() {
        return Err(args.blame(0, "Expected a positive number").into());
    }
    thread::sleep(Duration::from_secs_f64(seconds));
    Ok(Value::void())
}
