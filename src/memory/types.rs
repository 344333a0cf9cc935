//! Fact type definitions.
//!
//! Defines [`Category`] (the closed set of fact categories), [`Fact`] (a full
//! row), [`NewFact`] (the input to an upsert), and the result types returned by
//! search and stats.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    /// Who the household members are.
    User,
    /// Rooms, zones, and the building itself.
    Home,
    /// Individual devices and sensors.
    Device,
    /// Recurring patterns of activity.
    Routine,
    Preference,
    /// How the assistant itself is wired up.
    Architecture,
}

impl Category {
    pub const ALL: [Category; 6] = [
        Self::User,
        Self::Home,
        Self::Device,
        Self::Routine,
        Self::Preference,
        Self::Architecture,
    ];

    /// SQL-compatible string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Home => "home",
            Self::Device => "device",
            Self::Routine => "routine",
            Self::Preference => "preference",
            Self::Architecture => "architecture",
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| format!("unknown fact category: {s}"))
    }
}

/// A fact row, matching the `facts` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fact {
    /// UUID v7 (time-sortable); preserved across soft delete and resurrection.
    pub id: String,
    pub category: Category,
    pub key: String,
    pub value: String,
    /// Provenance, e.g. `user-stated`, `observation`, or an ingestion batch tag.
    pub source: String,
    /// In `[0.0, 1.0]`.
    pub confidence: f64,
    /// Tags such as `entity:light.kitchen` or `zone:driveway`.
    pub subjects: Vec<String>,
    /// Relative path of a knowledge-base document with the full details.
    #[serde(rename = "ref", skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
    #[serde(skip)]
    pub embedding: Option<Vec<f32>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub accessed_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<DateTime<Utc>>,
}

/// Input to [`super::FactStore::set`].
#[derive(Debug, Clone, PartialEq)]
pub struct NewFact {
    pub category: Category,
    pub key: String,
    pub value: String,
    pub source: String,
    pub confidence: f64,
    pub subjects: Vec<String>,
    pub reference: Option<String>,
}

impl NewFact {
    /// A fact with source `user-stated`, full confidence, no subjects or ref.
    pub fn new(category: Category, key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            category,
            key: key.into(),
            value: value.into(),
            source: "user-stated".into(),
            confidence: 1.0,
            subjects: Vec::new(),
            reference: None,
        }
    }

    pub fn source(mut self, source: impl Into<String>) -> Self {
        self.source = source.into();
        self
    }

    pub fn confidence(mut self, confidence: f64) -> Self {
        self.confidence = confidence;
        self
    }

    pub fn subjects<I, S>(mut self, subjects: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.subjects = subjects.into_iter().map(Into::into).collect();
        self
    }

    pub fn reference(mut self, reference: impl Into<String>) -> Self {
        let reference = reference.into();
        self.reference = (!reference.is_empty()).then_some(reference);
        self
    }
}

/// A fact with its cosine similarity to a query vector.
#[derive(Debug, Clone, Serialize)]
pub struct ScoredFact {
    #[serde(flatten)]
    pub fact: Fact,
    pub score: f32,
}

/// Counts of active facts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FactStats {
    pub total: u64,
    pub by_category: BTreeMap<String, u64>,
}
