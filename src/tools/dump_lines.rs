use crate::Args;

use std::fs::File;
use std::io::BufReader;

use anyhow::{Context, Result};

use gwbas_rs::program::read_program;

pub fn dump_lines(args: &Args) -> Result<()> {
    let input = BufReader::new(
        File::open(&args.input)
            .with_context(|| format!("opening {}", args.input.display()))?,
    );
    for line in read_program(input)? {
        print!("{:5}", line.number);
        for b in &line.body {
            print!(" {b:02x}");
        }
        println!();
    }
    Ok(())
}
