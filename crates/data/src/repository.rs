// SPDX-License-Identifier: LGPL-3.0-only
//
// This file is provided WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.
use crate::{DataStore, SharedStore};
use anyhow::{anyhow, Result};
use serde::{de::DeserializeOwned, Serialize};
use std::marker::PhantomData;

/// A typed view of a single key within a store.
pub struct Repository<S, T> {
    store: SharedStore<S>,
    key: String,
    _p: PhantomData<T>,
}

impl<S: DataStore, T> Clone for Repository<S, T> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            key: self.key.clone(),
            _p: PhantomData,
        }
    }
}

impl<S, T> Repository<S, T>
where
    S: DataStore,
    T: Serialize + DeserializeOwned + Send + Sync,
{
    pub fn new(store: SharedStore<S>, key: impl Into<String>) -> Self {
        Self {
            store,
            key: key.into(),
            _p: PhantomData,
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub async fn read(&self) -> Result<Option<T>> {
        let key = &self.key;
        self.store
            .get::<T>(key)
            .await
            .map_err(|e| anyhow!("Could not read '{key}' due to error: {e}"))
    }

    pub async fn write(&mut self, value: &T) -> Result<()> {
        let key = self.key.clone();
        self.store
            .insert(&key, value)
            .await
            .map_err(|e| anyhow!("Could not store '{key}' due to error: {e}"))
    }

    pub async fn clear(&mut self) -> Result<()> {
        let key = self.key.clone();
        self.store
            .remove(&key)
            .await
            .map_err(|e| anyhow!("Could not remove '{key}' due to error: {e}"))
    }

    pub async fn update<F>(&mut self, f: F) -> Result<Option<T>>
    where
        F: FnMut(Option<T>) -> Option<T> + Send,
    {
        let key = self.key.clone();
        self.store
            .modify(&key, f)
            .await
            .map_err(|e| anyhow!("Could not modify '{key}' due to error: {e}"))
    }
}
