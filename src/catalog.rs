//! The static credit card catalog used for grounding and browsing.
//!
//! The catalog is loaded once at startup, validated, and then shared
//! read-only behind an `Arc` for the lifetime of the process.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::CatalogError;

const EMBEDDED_CATALOG: &str = include_str!("../data/credit_cards.json");

/// The fixed field set every card surfaced to the UI must carry.
///
/// This is also the shape the model is asked to produce in structured output,
/// so deserialization rejects records with missing or null fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreditCardRecord {
    pub bank: String,
    pub card_name: String,
    pub url: String,
    pub annual_percentage_rate: String,
    pub joining_fee: String,
    pub annual_fee: String,
    pub benefits: Vec<String>,
}

/// AI-generated enrichment shown in browse mode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CardInsights {
    pub summary: String,
    pub advantages: Vec<String>,
    pub disadvantages: Vec<String>,
    /// Category name -> score out of 10.
    pub ratings: BTreeMap<String, f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CatalogEntry {
    #[serde(flatten)]
    pub card: CreditCardRecord,
    #[serde(flatten)]
    pub insights: Option<CardInsights>,
}

/// An entry as it appears on disk. The enrichment fields are read one by one
/// so a partial or mistyped block is an error instead of silently dropped.
#[derive(Debug, Deserialize)]
struct RawEntry {
    #[serde(flatten)]
    card: CreditCardRecord,
    summary: Option<String>,
    advantages: Option<Vec<String>>,
    disadvantages: Option<Vec<String>>,
    ratings: Option<BTreeMap<String, f64>>,
}

impl TryFrom<RawEntry> for CatalogEntry {
    type Error = CatalogError;

    fn try_from(raw: RawEntry) -> Result<Self, Self::Error> {
        let insights = match (raw.summary, raw.advantages, raw.disadvantages, raw.ratings) {
            (None, None, None, None) => None,
            (Some(summary), Some(advantages), Some(disadvantages), Some(ratings)) => Some(CardInsights {
                summary,
                advantages,
                disadvantages,
                ratings,
            }),
            (summary, advantages, disadvantages, ratings) => {
                let missing: Vec<&str> = [
                    ("summary", summary.is_none()),
                    ("advantages", advantages.is_none()),
                    ("disadvantages", disadvantages.is_none()),
                    ("ratings", ratings.is_none()),
                ]
                .into_iter()
                .filter_map(|(field, absent)| absent.then_some(field))
                .collect();
                return Err(CatalogError::IncompleteInsights {
                    card: raw.card.card_name,
                    missing: missing.join(", "),
                });
            }
        };
        Ok(Self {
            card: raw.card,
            insights,
        })
    }
}

#[derive(Debug)]
pub struct Catalog {
    entries: Vec<CatalogEntry>,
    // Pretty-printed once so every prompt embeds byte-identical data.
    dump: String,
}

impl Catalog {
    /// Loads the catalog from `path`, or the embedded catalog when `path` is `None`.
    pub fn load(path: Option<&Path>) -> Result<Self, CatalogError> {
        match path {
            Some(path) => {
                info!("Loading credit card catalog from {}", path.display());
                let raw = std::fs::read_to_string(path).map_err(|source| CatalogError::Io {
                    path: path.display().to_string(),
                    source,
                })?;
                Self::from_json(&raw)
            }
            None => {
                info!("Loading embedded credit card catalog");
                Self::from_json(EMBEDDED_CATALOG)
            }
        }
    }

    pub fn from_json(raw: &str) -> Result<Self, CatalogError> {
        let raw_entries: Vec<RawEntry> = serde_json::from_str(raw)?;
        let entries = raw_entries
            .into_iter()
            .map(CatalogEntry::try_from)
            .collect::<Result<Vec<_>, _>>()?;
        Self::from_entries(entries)
    }

    pub fn from_entries(entries: Vec<CatalogEntry>) -> Result<Self, CatalogError> {
        if entries.is_empty() {
            return Err(CatalogError::Empty);
        }
        for entry in &entries {
            let Some(insights) = &entry.insights else {
                continue;
            };
            for (category, value) in &insights.ratings {
                if !(0.0..=10.0).contains(value) {
                    return Err(CatalogError::RatingOutOfRange {
                        card: entry.card.card_name.clone(),
                        category: category.clone(),
                        value: *value,
                    });
                }
            }
        }
        let dump = serde_json::to_string_pretty(&entries)?;
        debug!(cards = entries.len(), bytes = dump.len(), "Catalog validated");
        Ok(Self { entries, dump })
    }

    pub fn entries(&self) -> &[CatalogEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Case-insensitive lookup by card name.
    pub fn find(&self, card_name: &str) -> Option<&CatalogEntry> {
        self.entries
            .iter()
            .find(|entry| entry.card.card_name.eq_ignore_ascii_case(card_name.trim()))
    }

    /// The catalog as pretty-printed JSON, as embedded into prompts.
    pub fn grounding_dump(&self) -> &str {
        &self.dump
    }
}
