use crate::Args;

use std::fs::File;
use std::io::{BufReader, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};

use gwbas_rs::program::tokenise_program;
use gwbas_rs::values::{Screen, Values};

/// Soft math errors during tokenisation print the way the dialect does.
struct ConsoleScreen;

impl Screen for ConsoleScreen {
    fn write_line(&mut self, text: &str) {
        println!("{text}");
    }
}

pub fn tokenise(args: &Args, output: &Option<PathBuf>) -> Result<()> {
    let input = BufReader::new(
        File::open(&args.input)
            .with_context(|| format!("opening {}", args.input.display()))?,
    );
    let mut values = Values::new(Some(Box::new(ConsoleScreen)), false);
    let bytes = tokenise_program(&mut values, input)?;
    let path = match output {
        Some(path) => path.clone(),
        None => args.input.with_extension("tok"),
    };
    File::create(&path)
        .with_context(|| format!("creating {}", path.display()))?
        .write_all(&bytes)?;
    println!("{} bytes -> {}", bytes.len(), path.display());
    Ok(())
}
