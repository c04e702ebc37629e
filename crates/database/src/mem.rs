//! In-memory store backing the test suites.

use crate::kv::{DbError, Table, Transaction};
use crate::tables::TableId;
use primitives::Bytes;
use std::collections::{BTreeMap, BTreeSet};
use std::ops::Bound;

/// An ordered in-memory store implementing the [`Transaction`] contract,
/// dupsort tables included.
#[derive(Debug, Default)]
pub struct MemoryKv {
    tables: BTreeMap<&'static str, TableData>,
}

#[derive(Debug)]
struct TableData {
    dup_sort: bool,
    rows: BTreeMap<Vec<u8>, BTreeSet<Vec<u8>>>,
}

impl Transaction for MemoryKv {
    type TableHandle<'tx> = MemoryTable<'tx>;

    fn open(&mut self, table: TableId) -> Result<MemoryTable<'_>, DbError> {
        let data = self.tables.entry(table.name).or_insert_with(|| TableData {
            dup_sort: table.dup_sort,
            rows: BTreeMap::new(),
        });
        Ok(MemoryTable { data })
    }
}

/// Handle to one open [`MemoryKv`] table.
#[derive(Debug)]
pub struct MemoryTable<'tx> {
    data: &'tx mut TableData,
}

impl Table for MemoryTable<'_> {
    fn get(&self, key: &[u8]) -> Result<Option<Bytes>, DbError> {
        Ok(self
            .data
            .rows
            .get(key)
            .and_then(|items| items.first())
            .map(|item| Bytes::copy_from_slice(item)))
    }

    fn get_dup(&self, key: &[u8], sub_key: &[u8]) -> Result<Option<Bytes>, DbError> {
        Ok(self
            .data
            .rows
            .get(key)
            .and_then(|items| items.range::<[u8], _>((Bound::Included(sub_key), Bound::Unbounded)).next())
            .filter(|item| item.starts_with(sub_key))
            .map(|item| Bytes::copy_from_slice(item)))
    }

    fn put(&mut self, key: &[u8], value: &[u8]) -> Result<(), DbError> {
        let dup_sort = self.data.dup_sort;
        let items = self.data.rows.entry(key.to_vec()).or_default();
        if !dup_sort {
            items.clear();
        }
        items.insert(value.to_vec());
        Ok(())
    }

    fn delete(&mut self, key: &[u8]) -> Result<(), DbError> {
        self.data.rows.remove(key);
        Ok(())
    }

    fn delete_dup(&mut self, key: &[u8], sub_key: &[u8]) -> Result<(), DbError> {
        if let Some(items) = self.data.rows.get_mut(key) {
            let found = items
                .range::<[u8], _>((Bound::Included(sub_key), Bound::Unbounded))
                .next()
                .filter(|item| item.starts_with(sub_key))
                .cloned();
            if let Some(item) = found {
                items.remove(&item);
            }
            if items.is_empty() {
                self.data.rows.remove(key);
            }
        }
        Ok(())
    }

    fn seek(&self, key: &[u8]) -> Result<Option<(Bytes, Bytes)>, DbError> {
        for (row_key, items) in self
            .data
            .rows
            .range::<[u8], _>((Bound::Included(key), Bound::Unbounded))
        {
            if let Some(first) = items.first() {
                return Ok(Some((
                    Bytes::copy_from_slice(row_key),
                    Bytes::copy_from_slice(first),
                )));
            }
        }
        Ok(None)
    }
}
