mod tokenise;
use tokenise::tokenise;
mod dump_lines;
use dump_lines::dump_lines;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

/// Convert and inspect tokenised BASIC program files
#[derive(Clone, Debug, Parser)]
struct Args {
    /// input filename
    #[arg(short, long)]
    input: PathBuf,
    // operation to execute
    #[command(subcommand)]
    operation: Operation,
}

#[derive(Clone, Debug, Subcommand)]
enum Operation {
    /// Tokenise an ASCII listing into a program file
    Tokenise {
        /// output filename, defaults to the input with a .tok extension
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Dump the line numbers and body bytes of a tokenised program
    DumpLines,
}

fn main() -> Result<()> {
    let args = Args::parse();

    match &args.operation {
        Operation::Tokenise { output } => tokenise(&args, output),
        Operation::DumpLines => dump_lines(&args),
    }
}
