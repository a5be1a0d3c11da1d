//! # Schema Collection: Ordered Id-Keyed Snapshot
//!
//! The whole-registry document: a JSON object mapping schema id to
//! [`SchemaData`]. It is the Local Provider's durable format and the body
//! of a sync push. Entry order is the enumeration order used to break sort
//! ties, so it is preserved on both serialization and deserialization.

use std::fmt;

use serde::de::{self, MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::identity::{Said, SchemaId};
use crate::schema::SchemaData;

/// Insertion-ordered collection of schema records, unique by id.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SchemaCollection {
    records: Vec<SchemaData>,
}

impl SchemaCollection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, SchemaData> {
        self.records.iter()
    }

    pub fn get(&self, id: &SchemaId) -> Option<&SchemaData> {
        self.records.iter().find(|r| &r.metadata.id == id)
    }

    /// Linear scan for the record carrying `said`.
    pub fn find_by_said(&self, said: &Said) -> Option<&SchemaData> {
        self.records.iter().find(|r| &r.metadata.said == said)
    }

    /// Whether a record other than `except` carries `said`.
    pub fn said_taken_by_other(&self, said: &Said, except: Option<&SchemaId>) -> bool {
        self.records
            .iter()
            .any(|r| &r.metadata.said == said && Some(&r.metadata.id) != except)
    }

    /// Insert or replace by id. A replaced record keeps its position.
    pub fn upsert(&mut self, record: SchemaData) {
        match self
            .records
            .iter_mut()
            .find(|r| r.metadata.id == record.metadata.id)
        {
            Some(slot) => *slot = record,
            None => self.records.push(record),
        }
    }

    pub fn remove(&mut self, id: &SchemaId) -> Option<SchemaData> {
        let pos = self.records.iter().position(|r| &r.metadata.id == id)?;
        Some(self.records.remove(pos))
    }

    pub fn into_vec(self) -> Vec<SchemaData> {
        self.records
    }
}

impl FromIterator<SchemaData> for SchemaCollection {
    fn from_iter<T: IntoIterator<Item = SchemaData>>(iter: T) -> Self {
        let mut collection = Self::new();
        for record in iter {
            collection.upsert(record);
        }
        collection
    }
}

impl IntoIterator for SchemaCollection {
    type Item = SchemaData;
    type IntoIter = std::vec::IntoIter<SchemaData>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.into_iter()
    }
}

impl Serialize for SchemaCollection {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.records.len()))?;
        for record in &self.records {
            map.serialize_entry(record.metadata.id.as_str(), record)?;
        }
        map.end()
    }
}

struct CollectionVisitor;

impl<'de> Visitor<'de> for CollectionVisitor {
    type Value = SchemaCollection;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a map of schema id to schema record")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
        let mut collection = SchemaCollection::new();
        while let Some((_key, record)) = access.next_entry::<String, SchemaData>()? {
            // The record's own metadata id is authoritative over the map key.
            if collection.get(&record.metadata.id).is_some() {
                return Err(de::Error::custom(format_args!(
                    "duplicate schema id {}",
                    record.metadata.id
                )));
            }
            collection.records.push(record);
        }
        Ok(collection)
    }
}

impl<'de> Deserialize<'de> for SchemaCollection {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_map(CollectionVisitor)
    }
}
