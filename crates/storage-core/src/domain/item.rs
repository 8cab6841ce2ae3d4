//! The `Item` entity and its validation contract (`spec.md` §3, §4.1).
//!
//! Grounded on `examples/original_source/include/unity/storage/provider/Item.h`:
//! the field set here is kept almost verbatim (`item_id`, `parent_ids`,
//! `name`, `etag`, `item_type`, `metadata`), translated from the C++
//! `boost::variant<std::string, int64_t>` to a Rust enum.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::errors::StorageError;
use super::newtypes::{Etag, ItemId};

/// The type of a storage item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemType {
    File,
    Folder,
    Root,
}

/// A metadata value: either a string or a signed 64-bit integer.
/// Booleans are represented as a zero/non-zero `Int`, matching the C++
/// original's documented convention.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetadataValue {
    Text(String),
    Int(i64),
}

/// Well-known metadata keys and their expected value type
/// (`examples/original_source/include/unity/storage/provider/metadata_keys.h`).
pub mod metadata_keys {
    pub const SIZE_IN_BYTES: &str = "size_in_bytes";
    pub const CREATION_TIME: &str = "creation_time";
    pub const LAST_MODIFIED_TIME: &str = "last_modified_time";
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum KnownMetadataType {
    Int64,
    Iso8601DateTime,
}

fn known_metadata_type(key: &str) -> Option<KnownMetadataType> {
    match key {
        metadata_keys::SIZE_IN_BYTES => Some(KnownMetadataType::Int64),
        metadata_keys::CREATION_TIME | metadata_keys::LAST_MODIFIED_TIME => {
            Some(KnownMetadataType::Iso8601DateTime)
        }
        _ => None,
    }
}

/// One file, folder, or root within a provider (`spec.md` §3 `Item`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub item_id: ItemId,
    pub parent_ids: Vec<ItemId>,
    pub name: String,
    pub etag: Etag,
    pub item_type: ItemType,
    pub metadata: BTreeMap<String, MetadataValue>,
}

impl Item {
    pub fn new(
        item_id: ItemId,
        parent_ids: Vec<ItemId>,
        name: impl Into<String>,
        etag: Etag,
        item_type: ItemType,
    ) -> Self {
        Self {
            item_id,
            parent_ids,
            name: name.into(),
            etag,
            item_type,
            metadata: BTreeMap::new(),
        }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: MetadataValue) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }
}

/// Validates an `Item` emitted by a back-end before it crosses the IPC
/// boundary (`spec.md` §4.1). A failure here is always `StorageError::Unknown`
/// (internal), never attributed to the caller.
pub fn validate(item: &Item) -> Result<(), StorageError> {
    if item.item_id.as_str().is_empty() {
        return Err(StorageError::internal("item_id must not be empty"));
    }
    match item.item_type {
        ItemType::Root => {
            if !item.parent_ids.is_empty() {
                return Err(StorageError::internal("root item must have no parents"));
            }
        }
        ItemType::File | ItemType::Folder => {
            if item.parent_ids.is_empty() {
                return Err(StorageError::internal(
                    "non-root item must have at least one parent",
                ));
            }
        }
    }
    if item.name.is_empty() {
        return Err(StorageError::internal("item name must not be empty"));
    }
    for (key, value) in &item.metadata {
        if let Some(expected) = known_metadata_type(key) {
            let matches = matches!(
                (expected, value),
                (KnownMetadataType::Int64, MetadataValue::Int(_))
                    | (KnownMetadataType::Iso8601DateTime, MetadataValue::Text(_))
            );
            if !matches {
                return Err(StorageError::internal(format!(
                    "metadata key '{key}' has the wrong value type"
                )));
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file(id: &str, parents: Vec<&str>) -> Item {
        Item::new(
            ItemId::new(id).unwrap(),
            parents.into_iter().map(|p| ItemId::new(p).unwrap()).collect(),
            "name.txt",
            Etag::new("etag1"),
            ItemType::File,
        )
    }

    #[test]
    fn root_must_have_no_parents() {
        let root = Item::new(
            ItemId::new("/root").unwrap(),
            vec![],
            "root",
            Etag::empty(),
            ItemType::Root,
        );
        assert!(validate(&root).is_ok());

        let bad_root = Item::new(
            ItemId::new("/root").unwrap(),
            vec![ItemId::new("/parent").unwrap()],
            "root",
            Etag::empty(),
            ItemType::Root,
        );
        assert!(validate(&bad_root).is_err());
    }

    #[test]
    fn non_root_requires_parent() {
        assert!(validate(&file("/a/b", vec!["/a"])).is_ok());
        assert!(validate(&file("/a/b", vec![])).is_err());
    }

    #[test]
    fn empty_name_is_internal_error() {
        let mut item = file("/a/b", vec!["/a"]);
        item.name.clear();
        let err = validate(&item).unwrap_err();
        assert_eq!(err.kind(), "Unknown");
    }

    #[test]
    fn known_metadata_type_mismatch_is_rejected() {
        let item = file("/a/b", vec!["/a"])
            .with_metadata(metadata_keys::SIZE_IN_BYTES, MetadataValue::Text("oops".into()));
        assert!(validate(&item).is_err());

        let item = file("/a/b", vec!["/a"])
            .with_metadata(metadata_keys::SIZE_IN_BYTES, MetadataValue::Int(1024));
        assert!(validate(&item).is_ok());
    }
}
