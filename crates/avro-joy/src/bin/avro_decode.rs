//! `avro-decode`: binary datums (stdin) to one JSON document per line
//! (stdout), optionally resolved against a reader schema.
//!
//! Usage:
//!   avro-decode --schema <file> [--reader-schema <file>] [--pretty]

use std::io;
use std::process::ExitCode;

use avro_joy::cli::{decode_stream, load_schema, CliError, DecodeArgs};

fn run() -> Result<(), CliError> {
    let args = DecodeArgs::parse(std::env::args().skip(1))?;
    let writer = load_schema(&args.schema)?;
    let reader = args.reader_schema.as_deref().map(load_schema).transpose()?;
    decode_stream(
        &writer,
        reader.as_ref(),
        args.pretty,
        io::stdin().lock(),
        io::stdout().lock(),
    )?;
    Ok(())
}

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("avro-decode: {e}");
            ExitCode::FAILURE
        }
    }
}
