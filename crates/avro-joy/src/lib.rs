//! Avro for Rust: schemas, binary and JSON encodings, and reading data
//! written with one schema through another (schema resolution).
//!
//! Every codec is a [`Parser`](grammar::Parser) walking a grammar generated
//! from a schema. The plain codecs follow a single schema; the
//! [`ResolvingDecoder`] follows a grammar built from a writer and a reader
//! schema and adapts the writer's data on the fly.

mod datum;
mod error;
mod props;
mod resolving;
mod value;

pub mod binary;
pub mod cli;
pub mod grammar;
pub mod io;
pub mod json;
pub mod schema;

use std::io::{Read, Write};

use avro_joy_buffers::ByteSource;

pub use avro_joy_buffers::{IoSource, Reader};
pub use binary::{BinaryDecoder, BinaryEncoder, BinaryEncoderConfig};
pub use datum::{read_datum, read_datum_with, write_datum, DatumReaderConfig};
pub use error::{AvroError, Result};
pub use io::{Decoder, Encoder};
pub use json::{JsonDecoder, JsonEncoder, JsonEncoderConfig, JsonWriter};
pub use props::PropertyBag;
pub use resolving::{Resolver, ResolvingDecoder};
pub use schema::{apply_aliases, Field, Name, Order, Schema, SchemaKind, SchemaParser, SchemaType};
pub use value::{default_value, AvroValue};

// ---------------------------------------------------------------- binary

/// Writes `value` in the binary encoding and returns the flushed sink.
pub fn encode<W: Write>(value: &AvroValue, schema: &Schema, sink: W) -> Result<W> {
    let mut encoder = BinaryEncoder::new(sink);
    write_datum(&mut encoder, schema, value)?;
    encoder.into_inner()
}

/// Reads one binary value of `schema` from `source`.
pub fn decode<S: ByteSource>(schema: &Schema, source: S) -> Result<AvroValue> {
    read_datum(&mut BinaryDecoder::new(source), schema)
}

// ---------------------------------------------------------------- json

/// Writes `value` as one JSON document.
pub fn encode_json<W: Write>(value: &AvroValue, schema: &Schema, sink: W) -> Result<W> {
    let mut encoder = JsonEncoder::new(schema, sink)?;
    write_datum(&mut encoder, schema, value)?;
    encoder.into_inner()
}

/// Reads one JSON document of `schema`.
pub fn decode_json<R: Read>(schema: &Schema, source: R) -> Result<AvroValue> {
    read_datum(&mut JsonDecoder::new(schema, source)?, schema)
}

// ---------------------------------------------------------------- resolution

/// Prepares reading `writer` data as `reader` values. The resolver may be
/// shared between threads and reused for any number of datums.
pub fn build_resolver(writer: &Schema, reader: &Schema) -> Result<Resolver> {
    Resolver::new(writer, reader)
}

/// Reads one binary value written with the resolver's writer schema and
/// returns it shaped by the reader schema.
pub fn decode_resolved<S: ByteSource>(resolver: &Resolver, source: S) -> Result<AvroValue> {
    let mut decoder = resolver.decoder(BinaryDecoder::new(source));
    let value = read_datum(&mut decoder, resolver.reader())?;
    decoder.drain()?;
    Ok(value)
}

/// JSON counterpart of [`decode_resolved`].
pub fn decode_resolved_json<R: Read>(resolver: &Resolver, source: R) -> Result<AvroValue> {
    let inner = JsonDecoder::new(resolver.writer(), source)?;
    let mut decoder = resolver.decoder(inner);
    let value = read_datum(&mut decoder, resolver.reader())?;
    decoder.drain()?;
    Ok(value)
}
