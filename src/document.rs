//! Typed access to raw parsed documents.
//!
//! Documents are plain [`serde_json::Value`]s. The accessors here fail with
//! [`Error::InvalidFormat`] instead of silently coercing, so a document of
//! the wrong shape never produces a partial tree.

use crate::error::{Error, Result};
use serde_json::{Map, Value};
use std::{fs::File, io::BufReader, path::Path};

pub type Document = Value;
pub type Attributes = Map<String, Value>;

pub(crate) fn object<'a>(value: &'a Value, what: &str) -> Result<&'a Attributes> {
    value
        .as_object()
        .ok_or_else(|| Error::InvalidFormat(format!("{} is not a map", what)))
}

pub(crate) fn required<'a>(map: &'a Attributes, key: &str) -> Result<&'a Value> {
    map.get(key)
        .ok_or_else(|| Error::InvalidFormat(format!("missing key {:?}", key)))
}

pub(crate) fn required_str<'a>(map: &'a Attributes, key: &str) -> Result<&'a str> {
    required(map, key)?
        .as_str()
        .ok_or_else(|| Error::InvalidFormat(format!("{:?} is not a string", key)))
}

pub(crate) fn required_array<'a>(map: &'a Attributes, key: &str) -> Result<&'a Vec<Value>> {
    required(map, key)?
        .as_array()
        .ok_or_else(|| Error::InvalidFormat(format!("{:?} is not a sequence", key)))
}

/// Strings of an optional sequence; absent means empty.
pub(crate) fn optional_strings(map: &Attributes, key: &str) -> Result<Vec<String>> {
    let Some(value) = map.get(key) else {
        return Ok(vec![]);
    };
    let items = value
        .as_array()
        .ok_or_else(|| Error::InvalidFormat(format!("{:?} is not a sequence", key)))?;
    items
        .iter()
        .map(|item| {
            item.as_str().map(str::to_owned).ok_or_else(|| {
                Error::InvalidFormat(format!("{:?} contains a non-string entry", key))
            })
        })
        .collect()
}

pub fn read_json(path: &Path) -> Result<Document> {
    let file = File::open(path).map_err(|e| Error::io(path, e))?;
    serde_json::from_reader(BufReader::new(file)).map_err(|source| Error::Json {
        path: path.to_owned(),
        source,
    })
}

pub fn write_json(path: &Path, document: &Document) -> Result<()> {
    use std::io::Write;

    let file = File::create(path).map_err(|e| Error::io(path, e))?;
    let mut writer = std::io::BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, document).map_err(|source| Error::Json {
        path: path.to_owned(),
        source,
    })?;
    writer.flush().map_err(|e| Error::io(path, e))
}
