// SPDX-License-Identifier: LGPL-3.0-only
//
// This file is provided WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.

use crate::DataStore;
use anyhow::Result;
use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use std::collections::HashMap;

/// Bincode encoded values held in a plain map. Used for tests and ephemeral runs.
#[derive(Default)]
pub struct InMemoryStore {
    data: HashMap<String, Vec<u8>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            data: HashMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

#[async_trait]
impl DataStore for InMemoryStore {
    type Error = anyhow::Error;

    async fn insert<T: Serialize + Send + Sync>(&mut self, key: &str, value: &T) -> Result<()> {
        self.data
            .insert(key.to_string(), bincode::serialize(value)?);
        Ok(())
    }

    async fn get<T: DeserializeOwned + Send + Sync>(&self, key: &str) -> Result<Option<T>> {
        Ok(self
            .data
            .get(key)
            .map(|bytes| bincode::deserialize(bytes))
            .transpose()?)
    }

    async fn remove(&mut self, key: &str) -> Result<()> {
        self.data.remove(key);
        Ok(())
    }

    async fn modify<T, F>(&mut self, key: &str, mut f: F) -> Result<Option<T>>
    where
        T: Serialize + DeserializeOwned + Send + Sync,
        F: FnMut(Option<T>) -> Option<T> + Send,
    {
        let current = self
            .data
            .get(key)
            .and_then(|bytes| bincode::deserialize(bytes).ok());

        match f(current) {
            Some(new_value) => {
                self.data
                    .insert(key.to_string(), bincode::serialize(&new_value)?);
                Ok(Some(new_value))
            }
            None => {
                self.data.remove(key);
                Ok(None)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_modify_removes_on_none() -> Result<()> {
        let mut store = InMemoryStore::new();
        store.insert("count", &1u64).await?;

        let next = store
            .modify("count", |v: Option<u64>| v.map(|n| n + 1))
            .await?;
        assert_eq!(next, Some(2));
        assert_eq!(store.get::<u64>("count").await?, Some(2));

        store.modify("count", |_: Option<u64>| None).await?;
        assert_eq!(store.get::<u64>("count").await?, None);
        assert!(store.is_empty());
        Ok(())
    }
}
