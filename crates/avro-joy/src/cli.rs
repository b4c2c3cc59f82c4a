//! Core of the `avro-encode` and `avro-decode` binaries.
//!
//! - `avro-encode --schema <file> [--json]`: one Avro-JSON datum on stdin,
//!   its binary (or re-encoded JSON) form on stdout
//! - `avro-decode --schema <file> [--reader-schema <file>] [--pretty]`:
//!   binary datums on stdin until end of input, one JSON datum per line on
//!   stdout

use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use avro_joy_buffers::IoSource;

use crate::binary::BinaryDecoder;
use crate::error::AvroError;
use crate::grammar::{json_grammar, Grammar};
use crate::json::{JsonEncoder, JsonEncoderConfig};
use crate::schema::Schema;
use crate::value::AvroValue;
use crate::{decode_json, encode, encode_json, read_datum, write_datum, Resolver};

// ---------------------------------------------------------------- errors

#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error("missing required flag {0}")]
    MissingFlag(&'static str),
    #[error("flag {0} needs a value")]
    MissingValue(String),
    #[error("unknown argument: {0}")]
    UnknownArgument(String),
    #[error("cannot read schema {}: {source}", .path.display())]
    SchemaFile {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error(transparent)]
    Avro(#[from] AvroError),
}

// ---------------------------------------------------------------- arguments

/// Flags of `avro-encode`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodeArgs {
    pub schema: PathBuf,
    pub json: bool,
}

impl EncodeArgs {
    /// Parses the arguments after the program name.
    pub fn parse<I: IntoIterator<Item = String>>(args: I) -> Result<Self, CliError> {
        let mut schema = None;
        let mut json = false;
        let mut args = args.into_iter();
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--schema" => schema = Some(flag_value(&arg, args.next())?),
                "--json" => json = true,
                _ => return Err(CliError::UnknownArgument(arg)),
            }
        }
        Ok(Self {
            schema: schema.ok_or(CliError::MissingFlag("--schema"))?,
            json,
        })
    }
}

/// Flags of `avro-decode`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodeArgs {
    pub schema: PathBuf,
    pub reader_schema: Option<PathBuf>,
    pub pretty: bool,
}

impl DecodeArgs {
    /// Parses the arguments after the program name.
    pub fn parse<I: IntoIterator<Item = String>>(args: I) -> Result<Self, CliError> {
        let mut schema = None;
        let mut reader_schema = None;
        let mut pretty = false;
        let mut args = args.into_iter();
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--schema" => schema = Some(flag_value(&arg, args.next())?),
                "--reader-schema" => reader_schema = Some(flag_value(&arg, args.next())?),
                "--pretty" => pretty = true,
                _ => return Err(CliError::UnknownArgument(arg)),
            }
        }
        Ok(Self {
            schema: schema.ok_or(CliError::MissingFlag("--schema"))?,
            reader_schema,
            pretty,
        })
    }
}

fn flag_value(flag: &str, value: Option<String>) -> Result<PathBuf, CliError> {
    match value {
        Some(v) if !v.starts_with("--") => Ok(PathBuf::from(v)),
        _ => Err(CliError::MissingValue(flag.to_string())),
    }
}

/// Reads and parses a schema file.
pub fn load_schema(path: &Path) -> Result<Schema, CliError> {
    let text = std::fs::read_to_string(path).map_err(|source| CliError::SchemaFile {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(Schema::parse_str(&text)?)
}

// ---------------------------------------------------------------- commands

/// Converts one Avro-JSON datum from `input` to binary, or back to JSON when
/// `json` is set.
pub fn encode_stream<R: Read, W: Write>(
    schema: &Schema,
    json: bool,
    input: R,
    output: W,
) -> Result<W, CliError> {
    let value = decode_json(schema, input)?;
    let output = if json {
        encode_json(&value, schema, output)?
    } else {
        encode(&value, schema, output)?
    };
    Ok(output)
}

/// Decodes binary datums until `input` is exhausted and prints each as one
/// JSON document per line. With a reader schema the data is resolved first.
///
/// Returns the number of datums written.
pub fn decode_stream<R: Read, W: Write>(
    writer: &Schema,
    reader: Option<&Schema>,
    pretty: bool,
    input: R,
    mut output: W,
) -> Result<usize, CliError> {
    let config = if pretty {
        JsonEncoderConfig::pretty()
    } else {
        JsonEncoderConfig::default()
    };
    let binary = BinaryDecoder::new(IoSource::new(input));
    let count = match reader {
        Some(reader) => {
            let resolver = Resolver::new(writer, reader)?;
            let mut printer = Printer::new(reader, config, &mut output)?;
            let mut decoder = resolver.decoder(binary);
            while !decoder.get_mut().is_end()? {
                let value = read_datum(&mut decoder, reader)?;
                decoder.drain()?;
                printer.print(&value)?;
            }
            printer.count
        }
        None => {
            let mut printer = Printer::new(writer, config, &mut output)?;
            let mut decoder = binary;
            while !decoder.is_end()? {
                let value = read_datum(&mut decoder, writer)?;
                printer.print(&value)?;
            }
            printer.count
        }
    };
    output.flush().map_err(|e| AvroError::io("flush", e))?;
    tracing::debug!(count, "decoded datums");
    Ok(count)
}

/// Writes one JSON document per line, sharing a grammar across documents.
struct Printer<'a, W: Write> {
    schema: &'a Schema,
    grammar: Arc<Grammar>,
    config: JsonEncoderConfig,
    out: &'a mut W,
    count: usize,
}

impl<'a, W: Write> Printer<'a, W> {
    fn new(schema: &'a Schema, config: JsonEncoderConfig, out: &'a mut W) -> Result<Self, CliError> {
        Ok(Self {
            schema,
            grammar: Arc::new(json_grammar(schema)?),
            config,
            out,
            count: 0,
        })
    }

    fn print(&mut self, value: &AvroValue) -> Result<(), CliError> {
        let mut encoder =
            JsonEncoder::with_grammar(Arc::clone(&self.grammar), &mut *self.out, self.config.clone());
        write_datum(&mut encoder, self.schema, value)?;
        let out = encoder.into_inner()?;
        out.write_all(b"\n").map_err(|e| AvroError::io("write", e))?;
        self.count += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn point() -> Schema {
        Schema::parse_str(
            r#"{"type":"record","name":"Pt","fields":[{"name":"x","type":"int"}]}"#,
        )
        .unwrap()
    }

    #[test]
    fn encode_flags() {
        let parsed = EncodeArgs::parse(args(&["--json", "--schema", "s.avsc"])).unwrap();
        assert_eq!(parsed.schema, PathBuf::from("s.avsc"));
        assert!(parsed.json);
        assert!(matches!(
            EncodeArgs::parse(args(&["--json"])),
            Err(CliError::MissingFlag("--schema"))
        ));
        assert!(matches!(
            EncodeArgs::parse(args(&["--schema"])),
            Err(CliError::MissingValue(_))
        ));
    }

    #[test]
    fn decode_flags() {
        let parsed =
            DecodeArgs::parse(args(&["--schema", "w.avsc", "--reader-schema", "r.avsc"])).unwrap();
        assert_eq!(parsed.reader_schema, Some(PathBuf::from("r.avsc")));
        assert!(!parsed.pretty);
        assert!(matches!(
            DecodeArgs::parse(args(&["--schema", "w.avsc", "-x"])),
            Err(CliError::UnknownArgument(a)) if a == "-x"
        ));
    }

    #[test]
    fn encode_stream_writes_binary_or_json() {
        let schema = point();
        let bytes = encode_stream(&schema, false, r#"{"x": 1}"#.as_bytes(), Vec::new()).unwrap();
        assert_eq!(bytes, vec![0x02]);
        let text = encode_stream(&schema, true, r#" {"x": 1} "#.as_bytes(), Vec::new()).unwrap();
        assert_eq!(text, br#"{"x":1}"#.to_vec());
    }

    #[test]
    fn decode_stream_prints_one_line_per_datum() {
        let schema = point();
        let mut out = Vec::new();
        let count = decode_stream(&schema, None, false, &[0x02, 0x04][..], &mut out).unwrap();
        assert_eq!(count, 2);
        assert_eq!(String::from_utf8(out).unwrap(), "{\"x\":1}\n{\"x\":2}\n");
    }

    #[test]
    fn decode_stream_resolves_against_reader() {
        let writer = point();
        let reader = Schema::parse_str(
            r#"{"type":"record","name":"Pt","fields":[
                {"name":"x","type":"long"},
                {"name":"y","type":"int","default":0}]}"#,
        )
        .unwrap();
        let mut out = Vec::new();
        decode_stream(&writer, Some(&reader), false, &[0x06][..], &mut out).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "{\"x\":3,\"y\":0}\n");
    }

    #[test]
    fn truncated_input_is_reported() {
        let schema = Schema::string();
        let err = decode_stream(&schema, None, false, &[0x06, b'a'][..], Vec::new()).unwrap_err();
        assert!(matches!(err, CliError::Avro(AvroError::EndOfInput)));
    }
}
