//! `avro-encode`: one Avro-JSON datum (stdin) to binary or JSON (stdout).
//!
//! Usage:
//!   avro-encode --schema <file> [--json]

use std::io::{self, Write};
use std::process::ExitCode;

use avro_joy::cli::{encode_stream, load_schema, CliError, EncodeArgs};

fn run() -> Result<(), CliError> {
    let args = EncodeArgs::parse(std::env::args().skip(1))?;
    let schema = load_schema(&args.schema)?;
    let stdout = io::stdout().lock();
    let mut stdout = encode_stream(&schema, args.json, io::stdin().lock(), stdout)?;
    if args.json {
        stdout
            .write_all(b"\n")
            .map_err(|e| CliError::Avro(avro_joy::AvroError::Io { op: "write", source: e }))?;
    }
    Ok(())
}

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("avro-encode: {e}");
            ExitCode::FAILURE
        }
    }
}
