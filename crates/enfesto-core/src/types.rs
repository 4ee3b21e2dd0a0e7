use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One cut-order line as submitted by the caller, before ids are assigned.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemInput {
    pub referencia: String,
    pub cor: String,
    pub tamanho: String,
    pub qtd: i64,
}

/// One cut-order line inside an optimization batch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductionItem {
    pub id: String,
    pub referencia: String,
    pub cor: String,
    /// Descriptive only, never used to pick a stack height
    pub tamanho: String,
    pub qtd: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub qtd_otimizada: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diferenca: Option<i64>,
    #[serde(default = "default_true")]
    pub editavel: bool,
}

fn default_true() -> bool {
    true
}

impl ProductionItem {
    pub fn new(
        id: impl Into<String>,
        referencia: impl Into<String>,
        cor: impl Into<String>,
        tamanho: impl Into<String>,
        qtd: u32,
    ) -> Self {
        Self {
            id: id.into(),
            referencia: referencia.into(),
            cor: cor.into(),
            tamanho: tamanho.into(),
            qtd,
            qtd_otimizada: None,
            diferenca: None,
            editavel: true,
        }
    }

    /// Key shared by every item cut from the same stack.
    pub fn group_key(&self) -> String {
        format!("{}-{}", self.referencia, self.cor)
    }

    pub(crate) fn set_optimized(&mut self, qtd_otimizada: u32) {
        self.qtd_otimizada = Some(qtd_otimizada);
        self.diferenca = Some(i64::from(qtd_otimizada) - i64::from(self.qtd));
    }

    /// Applies a manual correction on top of the optimizer output.
    pub fn override_quantity(&mut self, qtd_otimizada: u32) -> Result<()> {
        if !self.editavel {
            return Err(OptimizerError::NotEditable(self.id.clone()));
        }
        self.set_optimized(qtd_otimizada);
        Ok(())
    }
}

/// Strategy that produced the stack height of a group
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Method {
    #[serde(rename = "Modelo")]
    Model,
    #[serde(rename = "Padrão Global")]
    GlobalDefault,
    #[serde(rename = "Regra de Tolerância")]
    ToleranceRule,
    #[serde(rename = "Regras")]
    Rules,
}

impl Method {
    pub fn label(&self) -> &'static str {
        match self {
            Method::Model => "Modelo",
            Method::GlobalDefault => "Padrão Global",
            Method::ToleranceRule => "Regra de Tolerância",
            Method::Rules => "Regras",
        }
    }
}

impl std::fmt::Display for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Stack height chosen for one (referencia, cor) group
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StackHeightDecision {
    pub best_stack_height: u32,
    pub method: Method,
}

/// Learned preference of stack heights, ranked best first
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainedModel {
    pub global_stack_heights: Vec<u32>,
    /// Set when no candidate matched the history and the default height was emitted
    #[serde(default)]
    pub used_default: bool,
    pub sample_size: usize,
    pub trained_at: DateTime<Utc>,
    pub version: String,
}

/// Aggregate statistics of an optimization run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizationSummary {
    pub total_items: usize,
    pub increases: usize,
    pub decreases: usize,
    pub unchanged: usize,
    /// Decision per group, keyed by `"{referencia}-{cor}"`
    pub stack_heights: BTreeMap<String, StackHeightDecision>,
}

/// Output: adjusted items plus summary
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizationResult {
    pub items: Vec<ProductionItem>,
    pub summary: OptimizationSummary,
}

/// Counters persisted with every optimization log entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogSummary {
    pub aumentos: usize,
    pub diminuicoes: usize,
    pub inalterados: usize,
}

impl From<&OptimizationSummary> for LogSummary {
    fn from(summary: &OptimizationSummary) -> Self {
        Self {
            aumentos: summary.increases,
            diminuicoes: summary.decreases,
            inalterados: summary.unchanged,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizationLog {
    pub id: String,
    pub user_id: String,
    pub timestamp: DateTime<Utc>,
    pub tolerance: f64,
    pub lines_processed: usize,
    pub summary: LogSummary,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TrainingStatus {
    #[serde(rename = "Sucesso")]
    Success,
    #[serde(rename = "Falha")]
    Failure,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingLog {
    pub id: String,
    pub user_id: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub status: TrainingStatus,
    pub examples_processed: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

/// Error type for optimization and training
#[derive(Debug, thiserror::Error)]
pub enum OptimizerError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Invalid quantity {qtd} for item '{item_id}'")]
    InvalidQuantity { item_id: String, qtd: i64 },

    #[error("Too many items: {count} rows exceed the limit of {max}")]
    TooManyItems { count: usize, max: usize },

    #[error("Insufficient data: no valid training records")]
    InsufficientData,

    #[error("Item '{0}' is not editable")]
    NotEditable(String),

    #[error("Store error: {0}")]
    Store(String),
}

pub type Result<T> = std::result::Result<T, OptimizerError>;
