use crate::optimizer::Optimizer;
use crate::store::{LogStore, ModelStore};
use crate::trainer::{RawRecord, Trainer};
use crate::types::*;
use chrono::Utc;
use tracing::{info, warn};

/// Runs one optimization or training request against the user's stores.
///
/// Each call reads the model at most once and writes one log entry. Nothing
/// is kept between calls, so sessions can be built per request.
pub struct OptimizationSession<'a> {
    models: &'a dyn ModelStore,
    logs: &'a dyn LogStore,
    trainer: Trainer,
}

impl<'a> OptimizationSession<'a> {
    pub fn new(models: &'a dyn ModelStore, logs: &'a dyn LogStore) -> Self {
        Self {
            models,
            logs,
            trainer: Trainer::default(),
        }
    }

    pub fn with_trainer(mut self, trainer: Trainer) -> Self {
        self.trainer = trainer;
        self
    }

    /// Optimizes `items`, taking the hybrid path when the user has an active model.
    pub fn optimize(
        &self,
        user_id: &str,
        items: Vec<ProductionItem>,
        tolerance: f64,
    ) -> Result<OptimizationResult> {
        let lines_processed = items.len();
        let model = match self.models.active_model(user_id) {
            Ok(model) => model,
            Err(err) => {
                warn!(user_id, error = %err, "Model lookup failed, using rules only");
                None
            }
        };

        info!(
            user_id,
            lines = lines_processed,
            tolerance,
            model = model.as_ref().map(|m| m.version.as_str()),
            "Optimizing batch"
        );

        let result = Optimizer::new(items, tolerance)?
            .with_optional_model(model)
            .optimize();

        let entry = OptimizationLog {
            id: uuid::Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            timestamp: Utc::now(),
            tolerance,
            lines_processed,
            summary: LogSummary::from(&result.summary),
        };
        if let Err(err) = self.logs.append_optimization_log(entry) {
            warn!(user_id, error = %err, "Failed to record optimization log");
        }

        Ok(result)
    }

    /// Trains a model from historical rows and makes it the user's active model.
    /// Success and failure are both recorded in the training history.
    pub fn train(&self, user_id: &str, records: &[RawRecord]) -> Result<TrainedModel> {
        let started_at = Utc::now();
        let outcome = self
            .trainer
            .train_at(records, started_at)
            .and_then(|model| {
                let model_id = self.models.save_model(user_id, model.clone())?;
                info!(user_id, model_id = %model_id, version = %model.version, "Model activated");
                Ok(model)
            });

        let entry = match &outcome {
            Ok(model) => TrainingLog {
                id: uuid::Uuid::new_v4().to_string(),
                user_id: user_id.to_string(),
                started_at,
                finished_at: Utc::now(),
                status: TrainingStatus::Success,
                examples_processed: records.len(),
                model_version: Some(model.version.clone()),
                error_message: None,
            },
            Err(err) => TrainingLog {
                id: uuid::Uuid::new_v4().to_string(),
                user_id: user_id.to_string(),
                started_at,
                finished_at: Utc::now(),
                status: TrainingStatus::Failure,
                examples_processed: records.len(),
                model_version: None,
                error_message: Some(err.to_string()),
            },
        };
        if let Err(err) = self.logs.append_training_log(entry) {
            warn!(user_id, error = %err, "Failed to record training log");
        }

        outcome
    }

    /// Deletes one training entry and resets the user's model, so the next
    /// optimization runs on rules until a new model is trained.
    /// Returns whether the entry existed; nothing is reset otherwise.
    pub fn delete_training(&self, user_id: &str, log_id: &str) -> Result<bool> {
        if !self.logs.delete_training_log(user_id, log_id)? {
            return Ok(false);
        }
        let had_model = self.models.delete_models(user_id)?;
        info!(user_id, log_id, had_model, "Training deleted, model reset");
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{InMemoryLogStore, InMemoryModelStore};
    use serde_json::json;

    fn items(quantities: &[u32]) -> Vec<ProductionItem> {
        quantities
            .iter()
            .enumerate()
            .map(|(i, &q)| ProductionItem::new(i.to_string(), "RefA", "Azul", "M", q))
            .collect()
    }

    fn history(optimized: &[u32]) -> Vec<RawRecord> {
        optimized
            .iter()
            .map(|&q| {
                let value = json!({
                    "Referência": "RefZ", "Cor": "Preto", "Tamanho": "G",
                    "Qtd": q, "Qtd_Otimizada": q,
                });
                value.as_object().cloned().unwrap()
            })
            .collect()
    }

    struct FailingStore;

    impl ModelStore for FailingStore {
        fn active_model(&self, _: &str) -> Result<Option<TrainedModel>> {
            Err(OptimizerError::Store("offline".to_string()))
        }
        fn save_model(&self, _: &str, _: TrainedModel) -> Result<String> {
            Err(OptimizerError::Store("offline".to_string()))
        }
        fn delete_models(&self, _: &str) -> Result<bool> {
            Err(OptimizerError::Store("offline".to_string()))
        }
    }

    #[test]
    fn test_without_model_uses_rules_and_logs() {
        let models = InMemoryModelStore::new();
        let logs = InMemoryLogStore::new();
        let session = OptimizationSession::new(&models, &logs);

        let result = session.optimize("u1", items(&[24, 48, 36]), 0.0).unwrap();

        assert_eq!(result.summary.stack_heights["RefA-Azul"].method, Method::Rules);
        let entries = logs.optimization_logs("u1").unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].lines_processed, 3);
        assert_eq!(entries[0].summary.inalterados, 3);
    }

    #[test]
    fn test_trained_model_drives_next_optimization() {
        let models = InMemoryModelStore::new();
        let logs = InMemoryLogStore::new();
        let session = OptimizationSession::new(&models, &logs);

        let mut records = history(&[48, 96, 144, 48]);
        records.push(json!({"Referência": "RefZ"}).as_object().cloned().unwrap());
        let model = session.train("u1", &records).unwrap();
        assert_eq!(model.sample_size, 4);
        assert_eq!(model.global_stack_heights[0], 48);
        assert_eq!(models.active_model("u1").unwrap(), Some(model));

        let result = session.optimize("u1", items(&[47, 95]), 5.0).unwrap();
        let decision = result.summary.stack_heights["RefA-Azul"];
        assert_eq!(decision.best_stack_height, 48);
        assert_eq!(decision.method, Method::Model);

        // another user has no model
        let other = session.optimize("u2", items(&[47, 95]), 5.0).unwrap();
        assert_eq!(other.summary.stack_heights["RefA-Azul"].method, Method::Rules);

        let trainings = logs.training_logs("u1").unwrap();
        assert_eq!(trainings.len(), 1);
        assert_eq!(trainings[0].status, TrainingStatus::Success);
        // raw rows, including the one dropped while cleaning
        assert_eq!(trainings[0].examples_processed, 5);
    }

    #[test]
    fn test_deleting_training_resets_model() {
        let models = InMemoryModelStore::new();
        let logs = InMemoryLogStore::new();
        let session = OptimizationSession::new(&models, &logs);

        session.train("u1", &history(&[48, 96])).unwrap();
        let log_id = logs.training_logs("u1").unwrap()[0].id.clone();

        assert!(!session.delete_training("u2", &log_id).unwrap());
        assert!(models.active_model("u1").unwrap().is_some());

        assert!(session.delete_training("u1", &log_id).unwrap());
        assert!(models.active_model("u1").unwrap().is_none());
        assert!(logs.training_logs("u1").unwrap().is_empty());
        assert!(!session.delete_training("u1", &log_id).unwrap());

        let result = session.optimize("u1", items(&[47, 95]), 5.0).unwrap();
        assert_eq!(result.summary.stack_heights["RefA-Azul"].method, Method::Rules);
    }

    #[test]
    fn test_failed_training_is_recorded_and_returned() {
        let models = InMemoryModelStore::new();
        let logs = InMemoryLogStore::new();
        let session = OptimizationSession::new(&models, &logs);

        let err = session.train("u1", &[]).unwrap_err();

        assert!(matches!(err, OptimizerError::InsufficientData));
        assert!(models.active_model("u1").unwrap().is_none());
        let trainings = logs.training_logs("u1").unwrap();
        assert_eq!(trainings[0].status, TrainingStatus::Failure);
        assert!(trainings[0].error_message.is_some());
    }

    #[test]
    fn test_model_store_failure_degrades_to_rules() {
        let models = FailingStore;
        let logs = InMemoryLogStore::new();
        let session = OptimizationSession::new(&models, &logs);

        let result = session.optimize("u1", items(&[24, 36]), 0.0).unwrap();
        assert_eq!(result.summary.stack_heights["RefA-Azul"].method, Method::Rules);

        assert!(matches!(
            session.train("u1", &history(&[36])),
            Err(OptimizerError::Store(_))
        ));
    }
}
