//! Query store — persisted weather queries
//!
//! Every write that carries weather data goes through the pipeline first, so a
//! stored `weather_result` is always a complete document. Writes to an existing
//! record (update/delete) are serialized per id; reads never block.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::Utc;
use tokio::sync::OwnedMutexGuard;

use crate::error::WeatherlogError;
use crate::models::{validate_date_range, NewQuery, QueryFields, QueryRecord, QueryUpdate};
use crate::pipeline::WeatherPipeline;
use crate::repository::QueryRepository;

/// Per-id write locks. An entry lives only while some task holds or waits
/// on it, so the map stays bounded by in-flight writes.
#[derive(Default)]
struct RecordLocks {
    inner: Mutex<HashMap<i64, Arc<tokio::sync::Mutex<()>>>>,
}

impl RecordLocks {
    fn map(&self) -> std::sync::MutexGuard<'_, HashMap<i64, Arc<tokio::sync::Mutex<()>>>> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    async fn acquire(&self, id: i64) -> RecordGuard<'_> {
        let lock = self.map().entry(id).or_default().clone();
        RecordGuard {
            locks: self,
            guard: Some(lock.lock_owned().await),
        }
    }

    /// Drop every entry nobody holds or waits on. Sweeping the whole map also
    /// clears ids left behind by waiters cancelled before they got the lock.
    fn release(&self) {
        self.map().retain(|_, lock| Arc::strong_count(lock) > 1);
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.map().len()
    }

    /// Tasks holding or queued on `id`.
    #[cfg(test)]
    fn holders(&self, id: i64) -> usize {
        self.map()
            .get(&id)
            .map_or(0, |lock| Arc::strong_count(lock) - 1)
    }
}

struct RecordGuard<'a> {
    locks: &'a RecordLocks,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for RecordGuard<'_> {
    fn drop(&mut self) {
        drop(self.guard.take());
        self.locks.release();
    }
}

#[derive(Clone)]
pub struct QueryStore {
    pipeline: WeatherPipeline,
    repo: Arc<dyn QueryRepository>,
    locks: Arc<RecordLocks>,
}

impl QueryStore {
    pub fn new(pipeline: WeatherPipeline, repo: Arc<dyn QueryRepository>) -> Self {
        Self {
            pipeline,
            repo,
            locks: Arc::new(RecordLocks::default()),
        }
    }

    pub fn pipeline(&self) -> &WeatherPipeline {
        &self.pipeline
    }

    pub async fn create(&self, query: NewQuery) -> Result<QueryRecord, WeatherlogError> {
        validate_date_range(query.start_date, query.end_date)?;

        let document = self.pipeline.fetch_by_location(&query.location_input).await?;
        let fields = QueryFields::new(query.location_input, query.start_date, query.end_date, document);

        self.repo.insert(fields, Utc::now()).await
    }

    pub async fn list(&self) -> Result<Vec<QueryRecord>, WeatherlogError> {
        self.repo.list().await
    }

    pub async fn get(&self, id: i64) -> Result<QueryRecord, WeatherlogError> {
        self.repo.get(id).await?.ok_or(WeatherlogError::NotFound(id))
    }

    /// Merge `update` over the stored record and refetch weather for the
    /// merged location, even when only the dates changed.
    pub async fn update(&self, id: i64, update: QueryUpdate) -> Result<QueryRecord, WeatherlogError> {
        let _guard = self.locks.acquire(id).await;

        let existing = self.get(id).await?;

        let location_input = update
            .location_input
            .filter(|input| !input.is_empty())
            .unwrap_or(existing.location_input);
        let start_date = update.start_date.or(existing.start_date);
        let end_date = update.end_date.or(existing.end_date);

        validate_date_range(start_date, end_date)?;

        let document = self.pipeline.fetch_by_location(&location_input).await?;
        let fields = QueryFields::new(location_input, start_date, end_date, document);

        self.repo
            .replace(id, fields)
            .await?
            .ok_or(WeatherlogError::NotFound(id))
    }

    pub async fn delete(&self, id: i64) -> Result<(), WeatherlogError> {
        let _guard = self.locks.acquire(id).await;

        if !self.repo.delete(id).await? {
            return Err(WeatherlogError::NotFound(id));
        }
        Ok(())
    }

    pub async fn health_check(&self) -> Result<String, WeatherlogError> {
        self.repo.health_check().await
    }
}
