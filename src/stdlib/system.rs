use std::rc::Rc;

use crate::{
    diagnostics::{RaelError, Source},
    parser,
    runtime::Interpreter,
    value::{Arguments, Arity, CallError, CallResult, Module, Struct, Value},
};

pub fn module(interp: &mut Interpreter) -> Value {
    let config = interp.config();
    let argv = config
        .program_args
        .iter()
        .map(|arg| Value::string(arg.as_str()))
        .collect();
    let filename = config
        .filename
        .as_deref()
        .map_or_else(Value::void, Value::string);
    let info = Struct::new("Info")
        .with("Os", Value::string(std::env::consts::OS))
        .with("Arch", Value::string(std::env::consts::ARCH))
        .with("Version", Value::string(env!("CARGO_PKG_VERSION")));

    Module::new("System")
        .with("ProgramArgv", Value::stack(argv))
        .with("ProgramFilename", filename)
        .with("Info", info.into())
        .with("Exit", Value::native("Exit", Arity::range(0, 1), exit))
        .with("Eval", Value::native("Eval", Arity::exact(1), eval))
        .with("Run", Value::native("Run", Arity::exact(1), run))
        .into()
}

fn exit(_: &mut Interpreter, args: &Arguments) -> CallResult {
    let code = if args.is_empty() { 1 } else { args.whole(0)? };
    let code = i32::try_from(code).map_err(|_| args.blame(0, "Exit code out of range"))?;
    tracing::debug!(code, "program requested exit");
    Err(CallError::Fatal(RaelError::Exit(code)))
}

fn eval(interp: &mut Interpreter, args: &Arguments) -> CallResult {
    let code = args.string(0)?.display();
    let value = interp.eval_in_current_scope(Source::anonymous(&code))?;
    Ok(value)
}

fn run(interp: &mut Interpreter, args: &Arguments) -> CallResult {
    let code = args.string(0)?.display();
    let source = Source::anonymous(&code);
    let program = parser::parse_program(Rc::clone(&source))?;
    interp.run_program(source, program)?;
    Ok(Value::void())
}

#[cfg(test)]
mod tests {
    use crate::{
        config::InterpreterConfig,
        diagnostics::RaelError,
        runtime::{Interpreter, OutputBuffer},
    };

    fn run(code: &str, config: InterpreterConfig) -> (String, Result<(), RaelError>) {
        let output = OutputBuffer::new();
        let mut interp = Interpreter::with_io(
            config,
            Box::new(output.clone()),
            Box::new(std::io::empty()),
        );
        let result = interp.run_str(code);
        (output.contents(), result)
    }

    #[test]
    fn exit_carries_the_code() {
        let (out, result) = run(
            "load :System\nlog 1\n:System:Exit(3)\nlog 2",
            Default::default(),
        );
        assert_eq!(out, "1\n");
        assert!(matches!(result, Err(RaelError::Exit(3))));
    }

    #[test]
    fn exit_without_code_fails() {
        let (_, result) = run("load :System\n:System:Exit()", Default::default());
        assert!(matches!(result, Err(RaelError::Exit(1))));
    }

    #[test]
    fn program_arguments_are_exposed() {
        let config = InterpreterConfig {
            program_args: vec!["a".into(), "bc".into()],
            filename: Some("main.rael".into()),
            ..Default::default()
        };
        let (out, result) = run(
            "load :System\nlog :System:ProgramArgv, :System:ProgramFilename",
            config,
        );
        assert!(result.is_ok());
        assert_eq!(out, "{ \"a\", \"bc\" } main.rael\n");
    }

    #[test]
    fn eval_sees_the_calling_scope() {
        let (out, result) = run(
            "load :System\n:x ?= 4\nlog :System:Eval(\":x * 2\")",
            Default::default(),
        );
        assert!(result.is_ok());
        assert_eq!(out, "8\n");
    }
}
