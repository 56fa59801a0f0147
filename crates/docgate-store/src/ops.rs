//! Operation descriptors and results exchanged with a store

use crate::value::{Document, Value};
use std::fmt;

/// A `database.collection` pair
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Namespace {
    pub db: String,
    pub collection: String,
}

impl Namespace {
    pub fn new(db: impl Into<String>, collection: impl Into<String>) -> Self {
        Self {
            db: db.into(),
            collection: collection.into(),
        }
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.db, self.collection)
    }
}

/// Sort direction of a single sort key
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SortDirection {
    Ascending,
    Descending,
}

/// Query parameters for `find` and `explain`
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FindOptions {
    /// Match criteria; empty matches everything
    pub criteria: Document,
    /// Field projection
    pub projection: Option<Document>,
    /// Ordered sort keys
    pub sort: Vec<(String, SortDirection)>,
    pub skip: u64,
    /// Maximum number of documents; 0 means unlimited
    pub limit: u64,
}

/// An update request
#[derive(Clone, Debug, PartialEq)]
pub struct UpdateSpec {
    pub criteria: Document,
    /// Either a replacement document or a document of update operators
    pub update: Document,
    pub upsert: bool,
    pub multi: bool,
}

/// Index description as reported by the store
#[derive(Clone, Debug, PartialEq)]
pub struct IndexInfo {
    pub name: String,
    pub key: Document,
    pub unique: bool,
}

impl IndexInfo {
    /// Name of the primary key index
    pub const PRIMARY: &'static str = "_id_";

    pub fn primary() -> Self {
        let mut key = Document::new();
        key.insert("_id".to_string(), Value::Int32(1));
        Self {
            name: Self::PRIMARY.to_string(),
            key,
            unique: true,
        }
    }

    /// Whether the index enforces uniqueness (the primary key always does)
    pub fn is_unique(&self) -> bool {
        self.unique || self.name == Self::PRIMARY
    }
}

/// Write acknowledgment returned alongside every write
#[derive(Clone, Debug, Default, PartialEq)]
pub struct WriteStatus {
    /// Documents affected
    pub n: u64,
    /// Write error message, if the write was rejected
    pub err: Option<String>,
    pub code: Option<i32>,
    pub updated_existing: Option<bool>,
    /// `_id` of an upserted document
    pub upserted: Option<Value>,
}

impl WriteStatus {
    pub fn affected(n: u64) -> Self {
        Self {
            n,
            ..Default::default()
        }
    }

    pub fn rejected(message: impl Into<String>, code: i32) -> Self {
        Self {
            err: Some(message.into()),
            code: Some(code),
            ..Default::default()
        }
    }

    /// Status document: `{n, err, code?, updatedExisting?, upserted?, ok: 1}`
    pub fn to_document(&self) -> Document {
        let mut doc = Document::new();
        doc.insert("n".to_string(), Value::from(self.n));
        if let Some(code) = self.code {
            doc.insert("code".to_string(), Value::Int32(code));
        }
        if let Some(updated) = self.updated_existing {
            doc.insert("updatedExisting".to_string(), Value::Bool(updated));
        }
        if let Some(id) = &self.upserted {
            doc.insert("upserted".to_string(), id.clone());
        }
        doc.insert("err".to_string(), Value::from(self.err.clone()));
        doc.insert("ok".to_string(), Value::Int32(1));
        doc
    }
}

/// Result of an insert: the `_id` of every submitted document, plus status
#[derive(Clone, Debug, PartialEq)]
pub struct InsertOutcome {
    pub ids: Vec<Value>,
    pub status: WriteStatus,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_status_document() {
        let doc = WriteStatus::affected(0).to_document();
        assert_eq!(doc.get("ok"), Some(&Value::Int32(1)));
        assert_eq!(doc.get("n"), Some(&Value::Int32(0)));
        assert_eq!(doc.get("err"), Some(&Value::Null));
        assert!(doc.get("code").is_none());

        let doc = WriteStatus::rejected("E11000 duplicate key error", 11000).to_document();
        assert_eq!(doc.get("code"), Some(&Value::Int32(11000)));
        assert_eq!(doc.get("err"), Some(&Value::from("E11000 duplicate key error")));
    }

    #[test]
    fn test_primary_index_is_unique() {
        let primary = IndexInfo::primary();
        assert!(primary.is_unique());
        assert_eq!(primary.name, "_id_");
    }
}
