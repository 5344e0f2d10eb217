use crate::plan::{PLAN_DAYS, PlanDay};
use std::path::Path;
use thiserror::Error;
use tokio::fs;
use tracing::{error, info, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reading {
    pub label: String,
    pub text: String,
}

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("failed to parse reading catalog: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("reading catalog has {0} entries, expected {expected}", expected = PLAN_DAYS)]
    WrongLength(usize),
}

/// The fixed schedule, one reading per plan day.
#[derive(Debug, Clone)]
pub struct ReadingCatalog {
    readings: Vec<Reading>,
}

impl ReadingCatalog {
    /// Parses a JSON array of `[label, text]` pairs.
    pub fn from_json(bytes: &[u8]) -> Result<Self, CatalogError> {
        let pairs: Vec<(String, String)> = serde_json::from_slice(bytes)?;
        if pairs.len() != usize::from(PLAN_DAYS) {
            return Err(CatalogError::WrongLength(pairs.len()));
        }
        Ok(Self {
            readings: pairs
                .into_iter()
                .map(|(label, text)| Reading { label, text })
                .collect(),
        })
    }

    pub fn placeholder() -> Self {
        Self {
            readings: (1..=PLAN_DAYS)
                .map(|day| Reading {
                    label: day.to_string(),
                    text: String::new(),
                })
                .collect(),
        }
    }

    pub fn get(&self, day: PlanDay) -> &Reading {
        &self.readings[day.index()]
    }

    pub fn len(&self) -> usize {
        self.readings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.readings.is_empty()
    }
}

pub async fn load_catalog(path: &Path) -> ReadingCatalog {
    match fs::read(path).await {
        Ok(bytes) => match ReadingCatalog::from_json(&bytes) {
            Ok(catalog) => {
                info!(path = %path.display(), "loaded reading catalog");
                catalog
            }
            Err(err) => {
                error!("failed to load reading catalog: {err}");
                ReadingCatalog::placeholder()
            }
        },
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            warn!(path = %path.display(), "reading catalog not found, using placeholder readings");
            ReadingCatalog::placeholder()
        }
        Err(err) => {
            error!("failed to read reading catalog: {err}");
            ReadingCatalog::placeholder()
        }
    }
}
