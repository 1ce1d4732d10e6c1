//! Record store for the catalog.
//!
//! The whole catalog lives in a single JSON file holding a list of records.
//! Every save rewrites the file and renumbers the records by position, so an
//! `id` is only meaningful until the next save.

use std::{
    fs,
    io::{ErrorKind, Write},
    path::{Path, PathBuf},
};

use anyhow::{Context, Result, bail};
use parking_lot::Mutex;
use serde::{Deserialize, Deserializer, Serialize, de::DeserializeOwned};
use serde_json::{Map, Value};
use tempfile::NamedTempFile;
use tracing::{error, info, warn};

use crate::platform::classify;

/// Keys of the evidence checklist attached to every external link.
pub const EVIDENCE_CRITERIA_KEYS: [&str; 11] = [
    "author_expertise",
    "source_reputation",
    "neutrality_fairness",
    "fact_vs_opinion",
    "purpose",
    "definitive_proof",
    "direct_connection",
    "source_transparency",
    "evidence_integrity",
    "fact_verifiability",
    "clarity_relevance",
];

/// Fixed evidence-quality criteria for one external link.
///
/// Keys outside the eleven criteria never survive a decode, and missing
/// criteria read as `false`, so whatever the browser posts is normalised
/// before it reaches the data file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EvidenceChecklist {
    #[serde(deserialize_with = "lenient_bool")]
    pub author_expertise: bool,
    #[serde(deserialize_with = "lenient_bool")]
    pub source_reputation: bool,
    #[serde(deserialize_with = "lenient_bool")]
    pub neutrality_fairness: bool,
    #[serde(deserialize_with = "lenient_bool")]
    pub fact_vs_opinion: bool,
    #[serde(deserialize_with = "lenient_bool")]
    pub purpose: bool,
    #[serde(deserialize_with = "lenient_bool")]
    pub definitive_proof: bool,
    #[serde(deserialize_with = "lenient_bool")]
    pub direct_connection: bool,
    #[serde(deserialize_with = "lenient_bool")]
    pub source_transparency: bool,
    #[serde(deserialize_with = "lenient_bool")]
    pub evidence_integrity: bool,
    #[serde(deserialize_with = "lenient_bool")]
    pub fact_verifiability: bool,
    #[serde(deserialize_with = "lenient_bool")]
    pub clarity_relevance: bool,
}

/// Reference URL attached to a record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExternalLink {
    #[serde(deserialize_with = "lenient_string")]
    pub url: String,
    #[serde(deserialize_with = "lenient_string")]
    pub description: String,
    #[serde(deserialize_with = "object_or_default")]
    pub checklist: EvidenceChecklist,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// One catalog entry: a social-media video claim plus its fact-check context.
///
/// Every field has a default so files written by older versions of the UI
/// still load. Keys this struct does not know about are kept in `extra` and
/// written back untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Record {
    #[serde(deserialize_with = "lenient_index")]
    pub id: usize,
    #[serde(deserialize_with = "lenient_string")]
    pub politifact_url: String,
    #[serde(deserialize_with = "lenient_string")]
    pub politifact_headline: String,
    #[serde(deserialize_with = "lenient_string")]
    pub politifact_subheadline: String,
    #[serde(deserialize_with = "lenient_string")]
    pub rating: String,
    #[serde(deserialize_with = "lenient_string")]
    pub social_link: String,
    #[serde(deserialize_with = "lenient_string")]
    pub social_platform: String,
    #[serde(deserialize_with = "lenient_f64")]
    pub social_duration: f64,
    #[serde(deserialize_with = "lenient_string")]
    pub social_text: String,
    #[serde(deserialize_with = "lenient_bool")]
    pub download_success: bool,
    #[serde(deserialize_with = "lenient_string")]
    pub download_message: String,
    #[serde(deserialize_with = "lenient_string")]
    pub drive_path: String,
    #[serde(deserialize_with = "lenient_links")]
    pub external_links_info: Vec<ExternalLink>,
    #[serde(deserialize_with = "lenient_bool")]
    pub ooc_temporal_misattribution: bool,
    #[serde(deserialize_with = "lenient_bool")]
    pub ooc_geographical_misattribution: bool,
    #[serde(deserialize_with = "lenient_bool")]
    pub ooc_person_misidentification: bool,
    #[serde(deserialize_with = "lenient_bool")]
    pub ooc_contextual_misrepresentation: bool,
    #[serde(deserialize_with = "lenient_bool")]
    pub ooc_exaggeration_scale: bool,
    #[serde(deserialize_with = "lenient_bool")]
    pub ooc_exaggeration_urgency: bool,
    #[serde(deserialize_with = "lenient_bool")]
    pub ooc_fabricated_consequences: bool,
    #[serde(deserialize_with = "lenient_bool")]
    pub ooc_misleading_intent: bool,
    #[serde(deserialize_with = "lenient_bool")]
    pub ooc_misleading_emotional_framing: bool,
    #[serde(deserialize_with = "lenient_bool")]
    pub ooc_causal_misattribution: bool,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Decodes a list that arrived from a client (save request or imported
/// file). Every element must be a JSON object.
pub fn decode_records(values: Vec<Value>) -> Result<Vec<Record>> {
    values
        .into_iter()
        .enumerate()
        .map(|(index, value)| {
            if !value.is_object() {
                bail!("item at index {index} is not an object");
            }
            serde_json::from_value(value).with_context(|| format!("decoding item at index {index}"))
        })
        .collect()
}

/// Labels records whose platform is still blank from their social link.
pub fn fill_missing_platforms(records: &mut [Record]) {
    for record in records {
        if record.social_platform.trim().is_empty() && !record.social_link.trim().is_empty() {
            record.social_platform = classify(&record.social_link);
        }
    }
}

/// Assigns `id = position` to every record.
pub fn renumber(records: &mut [Record]) {
    for (index, record) in records.iter_mut().enumerate() {
        record.id = index;
    }
}

/// File-backed list of records.
///
/// Saves inside one process are serialised and land atomically; separate
/// processes still race and the last writer wins.
pub struct RecordStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl RecordStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Creates an empty list file when none exists yet.
    pub fn ensure_exists(&self) -> Result<()> {
        if self.path.exists() {
            return Ok(());
        }
        let _guard = self.write_lock.lock();
        write_json_atomic(&self.path, &Vec::<Record>::new())
            .with_context(|| format!("creating data file {}", self.path.display()))?;
        info!("Created empty data file '{}'", self.path.display());
        Ok(())
    }

    /// Reads every record. Missing, empty or unreadable files all yield an
    /// empty list; failures are logged rather than returned.
    pub fn load(&self) -> Vec<Record> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                info!(
                    "Data file '{}' not found, returning empty list",
                    self.path.display()
                );
                return Vec::new();
            }
            Err(err) => {
                error!("Reading data file '{}' failed: {err}", self.path.display());
                return Vec::new();
            }
        };

        if content.trim().is_empty() {
            info!(
                "Data file '{}' is empty, returning empty list",
                self.path.display()
            );
            return Vec::new();
        }

        match serde_json::from_str::<Vec<Record>>(&content) {
            Ok(records) => {
                info!(
                    "Loaded {} items from '{}'",
                    records.len(),
                    self.path.display()
                );
                records
            }
            Err(err) => {
                error!(
                    "Error decoding JSON from data file '{}': {err}",
                    self.path.display()
                );
                Vec::new()
            }
        }
    }

    /// Overwrites the file with `records`, renumbered by position. Returns
    /// `false` when the write fails; the previous file is left in place.
    pub fn save(&self, mut records: Vec<Record>) -> bool {
        renumber(&mut records);
        let _guard = self.write_lock.lock();
        match write_json_atomic(&self.path, &records) {
            Ok(()) => {
                info!("Saved {} items to '{}'", records.len(), self.path.display());
                true
            }
            Err(err) => {
                error!("Saving data file '{}' failed: {err:#}", self.path.display());
                false
            }
        }
    }
}

fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(parent).with_context(|| format!("creating {}", parent.display()))?;
    let payload = serde_json::to_vec_pretty(value).context("serializing records")?;
    let mut tmp = NamedTempFile::new_in(parent)
        .with_context(|| format!("creating temp file in {}", parent.display()))?;
    tmp.write_all(&payload)?;
    tmp.write_all(b"\n")?;
    tmp.persist(path)
        .with_context(|| format!("replacing {}", path.display()))?;
    Ok(())
}

// Browser forms post numbers as strings and checkboxes in several shapes,
// and old data files may carry nulls. The helpers below fold all of that
// into the field's default instead of rejecting the whole record.

fn lenient_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::String(value) => value,
        Value::Number(value) => value.to_string(),
        Value::Bool(value) => value.to_string(),
        _ => String::new(),
    })
}

fn lenient_f64<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
    let parsed = match Value::deserialize(deserializer)? {
        Value::Number(value) => value.as_f64(),
        Value::String(value) => value.trim().parse::<f64>().ok(),
        _ => None,
    };
    Ok(parsed.filter(|value| value.is_finite()).unwrap_or(0.0))
}

fn lenient_bool<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::Bool(value) => value,
        Value::String(value) => matches!(
            value.trim().to_ascii_lowercase().as_str(),
            "true" | "on" | "1" | "yes"
        ),
        Value::Number(value) => value.as_f64().is_some_and(|value| value != 0.0),
        _ => false,
    })
}

fn lenient_index<'de, D: Deserializer<'de>>(deserializer: D) -> Result<usize, D::Error> {
    let parsed = match Value::deserialize(deserializer)? {
        Value::Number(value) => value.as_u64(),
        Value::String(value) => value.trim().parse::<u64>().ok(),
        _ => None,
    };
    Ok(parsed.and_then(|value| usize::try_from(value).ok()).unwrap_or(0))
}

fn object_or_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned + Default,
{
    match Value::deserialize(deserializer)? {
        value @ Value::Object(_) => serde_json::from_value(value).map_err(serde::de::Error::custom),
        _ => Ok(T::default()),
    }
}

fn lenient_links<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Vec<ExternalLink>, D::Error> {
    let Value::Array(items) = Value::deserialize(deserializer)? else {
        return Ok(Vec::new());
    };
    let mut links = Vec::with_capacity(items.len());
    for item in items {
        if !item.is_object() {
            warn!("Dropping external link that is not an object: {item}");
            continue;
        }
        links.push(serde_json::from_value(item).map_err(serde::de::Error::custom)?);
    }
    Ok(links)
}
