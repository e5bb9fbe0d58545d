use std::{fs, process};

use clap::Parser;

use rael::{cli::Args, logging, Interpreter, InterpreterConfig, RaelError, Source};

fn main() {
    logging::init_tracing();
    let args = Args::parse();
    if let Err(err) = run(&args) {
        if !matches!(err, RaelError::Exit(_)) {
            eprintln!("{err}");
        }
        process::exit(err.exit_code());
    }
}

fn run(args: &Args) -> Result<(), RaelError> {
    let config = InterpreterConfig::from_args(args);
    let source = match (&args.file, &args.string) {
        (Some(path), _) => {
            let bytes = fs::read(path)?;
            Source::new(Some(path.display().to_string()), bytes)
        }
        (None, Some(code)) => Source::anonymous(code),
        (None, None) => {
            eprintln!("Error: Expected a file or a string to run");
            process::exit(1);
        }
    };
    tracing::debug!(source = source.display_name(), "running program");
    let mut interpreter = Interpreter::new(config);
    interpreter.run_source(source)
}
