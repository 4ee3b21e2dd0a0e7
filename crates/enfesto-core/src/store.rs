//! Collaborator interfaces for model and log persistence, plus in-memory
//! implementations used by the API service and tests.

use crate::types::*;
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

/// Holds at most one active model per user.
pub trait ModelStore: Send + Sync {
    fn active_model(&self, user_id: &str) -> Result<Option<TrainedModel>>;

    /// Stores `model` as the user's active model, replacing any previous one.
    /// Returns the id of the stored model.
    fn save_model(&self, user_id: &str, model: TrainedModel) -> Result<String>;

    /// Removes every model of the user. Returns whether one existed.
    fn delete_models(&self, user_id: &str) -> Result<bool>;
}

/// Append-only record of optimization and training events.
pub trait LogStore: Send + Sync {
    fn append_optimization_log(&self, entry: OptimizationLog) -> Result<()>;

    fn append_training_log(&self, entry: TrainingLog) -> Result<()>;

    /// Entries of one user, newest first.
    fn optimization_logs(&self, user_id: &str) -> Result<Vec<OptimizationLog>>;

    /// Entries of one user, newest first.
    fn training_logs(&self, user_id: &str) -> Result<Vec<TrainingLog>>;

    /// Deletes one optimization entry. Returns whether it existed.
    fn delete_optimization_log(&self, user_id: &str, log_id: &str) -> Result<bool>;

    /// Deletes one training entry. Returns whether it existed.
    fn delete_training_log(&self, user_id: &str, log_id: &str) -> Result<bool>;
}

fn poisoned<T>(_: PoisonError<T>) -> OptimizerError {
    OptimizerError::Store("lock poisoned".to_string())
}

#[derive(Debug, Clone)]
struct StoredModel {
    id: String,
    model: TrainedModel,
}

#[derive(Debug, Default)]
pub struct InMemoryModelStore {
    models: RwLock<HashMap<String, StoredModel>>,
}

impl InMemoryModelStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Id returned by the `save_model` call that produced the active model.
    pub fn active_model_id(&self, user_id: &str) -> Result<Option<String>> {
        let models = self.models.read().map_err(poisoned)?;
        Ok(models.get(user_id).map(|stored| stored.id.clone()))
    }
}

impl ModelStore for InMemoryModelStore {
    fn active_model(&self, user_id: &str) -> Result<Option<TrainedModel>> {
        let models = self.models.read().map_err(poisoned)?;
        Ok(models.get(user_id).map(|stored| stored.model.clone()))
    }

    fn save_model(&self, user_id: &str, model: TrainedModel) -> Result<String> {
        let id = uuid::Uuid::new_v4().to_string();
        let mut models = self.models.write().map_err(poisoned)?;
        models.insert(
            user_id.to_string(),
            StoredModel {
                id: id.clone(),
                model,
            },
        );
        Ok(id)
    }

    fn delete_models(&self, user_id: &str) -> Result<bool> {
        let mut models = self.models.write().map_err(poisoned)?;
        Ok(models.remove(user_id).is_some())
    }
}

#[derive(Debug, Default)]
pub struct InMemoryLogStore {
    optimizations: RwLock<Vec<OptimizationLog>>,
    trainings: RwLock<Vec<TrainingLog>>,
}

impl InMemoryLogStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl LogStore for InMemoryLogStore {
    fn append_optimization_log(&self, entry: OptimizationLog) -> Result<()> {
        self.optimizations.write().map_err(poisoned)?.push(entry);
        Ok(())
    }

    fn append_training_log(&self, entry: TrainingLog) -> Result<()> {
        self.trainings.write().map_err(poisoned)?.push(entry);
        Ok(())
    }

    fn optimization_logs(&self, user_id: &str) -> Result<Vec<OptimizationLog>> {
        let logs = self.optimizations.read().map_err(poisoned)?;
        let mut entries: Vec<OptimizationLog> = logs
            .iter()
            .filter(|entry| entry.user_id == user_id)
            .cloned()
            .collect();
        entries.reverse();
        entries.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        Ok(entries)
    }

    fn training_logs(&self, user_id: &str) -> Result<Vec<TrainingLog>> {
        let logs = self.trainings.read().map_err(poisoned)?;
        let mut entries: Vec<TrainingLog> = logs
            .iter()
            .filter(|entry| entry.user_id == user_id)
            .cloned()
            .collect();
        entries.reverse();
        entries.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        Ok(entries)
    }

    fn delete_optimization_log(&self, user_id: &str, log_id: &str) -> Result<bool> {
        let mut logs = self.optimizations.write().map_err(poisoned)?;
        let before = logs.len();
        logs.retain(|entry| !(entry.user_id == user_id && entry.id == log_id));
        Ok(logs.len() != before)
    }

    fn delete_training_log(&self, user_id: &str, log_id: &str) -> Result<bool> {
        let mut logs = self.trainings.write().map_err(poisoned)?;
        let before = logs.len();
        logs.retain(|entry| !(entry.user_id == user_id && entry.id == log_id));
        Ok(logs.len() != before)
    }
}
