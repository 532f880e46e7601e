//! `#[serde(serialize_with = ...)]` helpers for opaque byte fields.

use serde::ser::SerializeSeq;
use serde::Serializer;

pub fn serialize<T, S>(bytes: &T, serializer: S) -> Result<S::Ok, S::Error>
where
    T: AsRef<[u8]>,
    S: Serializer,
{
    serializer.serialize_str(&hex::encode(bytes))
}

pub fn serialize_stack<S>(stack: &Option<Vec<Vec<u8>>>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    match stack {
        None => serializer.serialize_none(),
        Some(items) => {
            let mut seq = serializer.serialize_seq(Some(items.len()))?;
            for item in items {
                seq.serialize_element(&hex::encode(item))?;
            }
            seq.end()
        }
    }
}
