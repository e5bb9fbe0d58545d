use std::path::PathBuf;

use clap::Parser;

#[derive(Parser, Debug)]
#[command(name = "rael")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Interpreter for the Rael scripting language", long_about = None)]
pub struct Args {
    /// Script to run
    #[arg(value_name = "FILE", conflicts_with = "string")]
    pub file: Option<PathBuf>,

    /// Run CODE instead of a file
    #[arg(short, long, value_name = "CODE")]
    pub string: Option<String>,

    /// Print a warning whenever an undefined key is read
    #[arg(long = "warn-undefined")]
    pub warn_undefined: bool,

    /// Arguments exposed to the program through `:_Argv`
    #[arg(last = true, value_name = "ARGS")]
    pub program_args: Vec<String>,
}
