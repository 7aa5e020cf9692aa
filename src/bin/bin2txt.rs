use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use std::process;

use anyhow::{Context, Result};
use clap::Parser;

use word2cvec::vectors::Vectors;

/// Converts a binary vector file to the text format.
#[derive(Parser)]
struct Options {
    /// Vector file in the binary format
    #[arg(value_name = "IN_FILE")]
    in_file: PathBuf,

    /// Where to write the text version
    #[arg(value_name = "OUT_FILE")]
    out_file: PathBuf,
}

fn run(options: &Options) -> Result<()> {
    let vectors = Vectors::load_binary(&options.in_file)?;
    let mut fo = BufWriter::new(
        File::create(&options.out_file)
            .with_context(|| format!("error creating output file {}", options.out_file.display()))?,
    );
    vectors.write_text(&mut fo)?;
    fo.flush().context("error writing output file")?;
    Ok(())
}

fn main() {
    let options = Options::parse();

    if let Err(err) = run(&options) {
        eprintln!("{err:#}");
        process::exit(1);
    }
}
