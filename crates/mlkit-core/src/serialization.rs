//! Save and restore argument collections
//!
//! An archive is a JSON envelope `{ tag, version, payload }`. The tag is read
//! first and decides which subtype the payload is restored into; restored
//! tables always own their memory (`InternallyAllocated`), whatever the
//! ownership of the tables that were saved.

use crate::argument::{ArgumentCollection, ArgumentTag, Model, TypedArguments};
use crate::error::{ErrorDetail, ErrorKind, Result};
use serde::{Deserialize, Serialize};
use std::io::{Read, Write};
use std::sync::Arc;

/// Archive format version written by [`save`]
pub const ARCHIVE_VERSION: u32 = 1;

#[derive(Serialize)]
struct EnvelopeRef<'a, T: Serialize> {
    tag: ArgumentTag,
    version: u32,
    payload: &'a T,
}

#[derive(Deserialize)]
struct Envelope {
    tag: ArgumentTag,
    version: u32,
    payload: serde_json::Value,
}

impl Envelope {
    fn parse(archive: &str) -> Result<Self> {
        let envelope: Envelope = serde_json::from_str(archive)?;
        if envelope.version != ARCHIVE_VERSION {
            return Err(ErrorDetail::new(ErrorKind::IncorrectSerializationTag)
                .with_argument("version")
                .with_message(format!(
                    "unsupported archive version {} (expected {ARCHIVE_VERSION})",
                    envelope.version
                ))
                .into());
        }
        Ok(envelope)
    }

    fn expect_tag(&self, expected: ArgumentTag) -> Result<()> {
        if self.tag != expected {
            return Err(ErrorDetail::new(ErrorKind::IncorrectSerializationTag)
                .with_message(format!("expected tag {expected}, found {}", self.tag))
                .into());
        }
        Ok(())
    }

    fn into_arguments(self) -> Result<ArgumentCollection> {
        let arguments: ArgumentCollection = serde_json::from_value(self.payload)?;
        arguments.expect_tag(self.tag)?;
        Ok(arguments)
    }
}

fn encode<T: Serialize>(tag: ArgumentTag, payload: &T) -> Result<String> {
    Ok(serde_json::to_string(&EnvelopeRef {
        tag,
        version: ARCHIVE_VERSION,
        payload,
    })?)
}

/// Archive a typed collection (result, partial result, input)
pub fn save<T: TypedArguments>(value: &T) -> Result<String> {
    save_arguments(value.arguments())
}

pub fn save_arguments(arguments: &ArgumentCollection) -> Result<String> {
    encode(arguments.tag(), arguments)
}

/// Restore a typed collection, failing on a tag of another subtype
pub fn restore<T: TypedArguments>(archive: &str) -> Result<T> {
    let envelope = Envelope::parse(archive)?;
    envelope.expect_tag(T::TAG)?;
    Ok(T::from_arguments(envelope.into_arguments()?)?)
}

/// Restore whatever collection was archived; inspect `tag()` to dispatch
pub fn restore_any(archive: &str) -> Result<ArgumentCollection> {
    Envelope::parse(archive)?.into_arguments()
}

pub fn save_model(model: &Model) -> Result<String> {
    encode(model.tag(), model)
}

/// Restore a model, checking it carries `tag`
pub fn restore_model(archive: &str, tag: ArgumentTag) -> Result<Arc<Model>> {
    let envelope = Envelope::parse(archive)?;
    envelope.expect_tag(tag)?;
    let model: Model = serde_json::from_value(envelope.payload)?;
    Ok(Arc::new(model))
}

/// Write an archive of `value` to `writer`
pub fn save_to_writer<T: TypedArguments, W: Write>(value: &T, mut writer: W) -> Result<()> {
    writer.write_all(save(value)?.as_bytes())?;
    Ok(())
}

pub fn restore_from_reader<T: TypedArguments, R: Read>(mut reader: R) -> Result<T> {
    let mut archive = String::new();
    reader.read_to_string(&mut archive)?;
    restore(&archive)
}
