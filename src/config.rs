use crate::cli::Args;

/// Settings the interpreter needs from its embedder.
#[derive(Debug, Clone, Default)]
pub struct InterpreterConfig {
    pub warn_undefined: bool,
    pub program_args: Vec<String>,
    pub filename: Option<String>,
}

impl InterpreterConfig {
    pub fn from_args(args: &Args) -> Self {
        InterpreterConfig {
            warn_undefined: args.warn_undefined,
            program_args: args.program_args.clone(),
            filename: args
                .file
                .as_ref()
                .map(|path| path.display().to_string()),
        }
    }
}
