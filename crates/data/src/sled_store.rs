// SPDX-License-Identifier: LGPL-3.0-only
//
// This file is provided WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.
use crate::{
    sled_utils::{clear_all_caches, get_or_open_db_tree},
    DataStore,
};
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use sled::Tree;
use std::path::Path;

/// A `DataStore` persisted to a named sled tree.
pub struct SledStore {
    db: Tree,
}

impl SledStore {
    pub fn new(path: &Path, tree: &str) -> Result<Self> {
        let db = get_or_open_db_tree(path, tree)?;
        Ok(Self { db })
    }

    pub fn close_all_connections() {
        clear_all_caches()
    }

    pub async fn flush(&self) -> Result<()> {
        self.db
            .flush_async()
            .await
            .context("Could not flush db")?;
        Ok(())
    }
}

#[async_trait]
impl DataStore for SledStore {
    type Error = anyhow::Error;

    async fn insert<T: Serialize + Send + Sync>(&mut self, key: &str, value: &T) -> Result<()> {
        self.db
            .insert(key.as_bytes(), bincode::serialize(value)?)
            .context("Could not insert data into db")?;
        Ok(())
    }

    async fn get<T: DeserializeOwned + Send + Sync>(&self, key: &str) -> Result<Option<T>> {
        let res = self
            .db
            .get(key.as_bytes())
            .with_context(|| format!("Failed to fetch {}", key))?;

        Ok(res
            .map(|bytes| bincode::deserialize(&bytes))
            .transpose()?)
    }

    async fn remove(&mut self, key: &str) -> Result<()> {
        self.db
            .remove(key.as_bytes())
            .context("Could not remove data from db")?;
        Ok(())
    }

    async fn modify<T, F>(&mut self, key: &str, mut f: F) -> Result<Option<T>>
    where
        T: Serialize + DeserializeOwned + Send + Sync,
        F: FnMut(Option<T>) -> Option<T> + Send,
    {
        let current: Option<T> = self.get(key).await?;
        match f(current) {
            Some(value) => {
                self.insert(key, &value).await?;
                Ok(Some(value))
            }
            None => {
                self.remove(key).await?;
                Ok(None)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_sled_store_shares_db_across_instances() -> Result<()> {
        let temp_dir = tempdir().expect("Failed to create temporary directory");
        let db_path = temp_dir.path().join("store.db");

        let mut first = SledStore::new(&db_path, "auth")?;
        first.insert("alpha", &"one".to_string()).await?;

        let second = SledStore::new(&db_path, "auth")?;
        assert_eq!(
            second.get::<String>("alpha").await?,
            Some("one".to_string()),
            "second handle should read what the first wrote"
        );

        let other_tree = SledStore::new(&db_path, "market")?;
        assert!(
            other_tree.get::<String>("alpha").await?.is_none(),
            "trees are isolated"
        );
        Ok(())
    }

    #[tokio::test]
    async fn test_sled_store_modify() -> Result<()> {
        let temp_dir = tempdir().expect("Failed to create temporary directory");
        let mut store = SledStore::new(&temp_dir.path().join("modify.db"), "t")?;

        let created = store
            .modify("list", |v: Option<Vec<u8>>| {
                let mut v = v.unwrap_or_default();
                v.push(7);
                Some(v)
            })
            .await?;
        assert_eq!(created, Some(vec![7]));

        store.modify("list", |_: Option<Vec<u8>>| None).await?;
        assert!(store.get::<Vec<u8>>("list").await?.is_none());
        Ok(())
    }
}
