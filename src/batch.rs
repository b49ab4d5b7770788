//! Sequential batch resolution.
//!
//! Records are resolved one at a time with a fixed pause between them, so the
//! aggregate request rate stays bounded regardless of which provider answers.
//! Each record keeps all of its own fields and gains `citations`, `found` and
//! `lastUpdated`; a record whose resolution fails also gains `error`. Output
//! length and order always match the input.

use crate::error::{CiteError, Result};
use crate::model::{timestamp, PublicationQuery, ResolutionResult};
use crate::resolver::Resolver;
use serde_json::{Map, Value};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

#[derive(Debug, Clone)]
pub struct BatchOrchestrator {
    resolver: Arc<Resolver>,
    delay: Duration,
}

impl BatchOrchestrator {
    pub fn new(resolver: Arc<Resolver>, delay: Duration) -> Self {
        Self { resolver, delay }
    }

    pub async fn run(&self, records: Vec<Value>) -> Vec<Value> {
        let total = records.len();
        info!(count = total, "Starting batch resolution");

        let mut output = Vec::with_capacity(total);
        let mut found = 0usize;

        for (index, record) in records.into_iter().enumerate() {
            let mut fields = match record {
                Value::Object(map) => map,
                other => {
                    let mut map = Map::new();
                    map.insert("input".to_string(), other);
                    map
                }
            };

            match self.resolve_record(&fields).await {
                Ok(result) => {
                    if result.found {
                        found += 1;
                    }
                    merge(&mut fields, &result, None);
                }
                Err(e) => {
                    warn!(index = index, error = %e, "Batch item failed");
                    merge(&mut fields, &ResolutionResult::not_found(), Some(e.to_string()));
                }
            }
            output.push(Value::Object(fields));

            // pause between records; nothing follows the last one
            if index + 1 < total {
                tokio::time::sleep(self.delay).await;
            }
        }

        info!(total = total, found = found, "Batch resolution complete");
        output
    }

    async fn resolve_record(&self, fields: &Map<String, Value>) -> Result<ResolutionResult> {
        let query = query_from_record(fields)?;
        let resolver = Arc::clone(&self.resolver);

        // a panic inside one resolution must not take the batch down with it
        tokio::spawn(async move { resolver.resolve(&query).await })
            .await
            .map_err(|e| CiteError::Internal(format!("resolution task aborted: {}", e)))?
    }
}

fn merge(fields: &mut Map<String, Value>, result: &ResolutionResult, error: Option<String>) {
    fields.insert("citations".to_string(), Value::from(result.citations));
    fields.insert("found".to_string(), Value::Bool(result.found));
    fields.insert("lastUpdated".to_string(), Value::String(timestamp()));
    if let Some(message) = error {
        fields.insert("error".to_string(), Value::String(message));
    }
}

/// Build a query from a record's `title`, `authors` and optional `doi`.
///
/// `authors` may be a string or an array of names.
pub fn query_from_record(fields: &Map<String, Value>) -> Result<PublicationQuery> {
    let title = fields
        .get("title")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();

    let authors = match fields.get("authors") {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Array(names)) => names
            .iter()
            .filter_map(Value::as_str)
            .collect::<Vec<_>>()
            .join(", "),
        _ => String::new(),
    };

    let doi = fields
        .get("doi")
        .and_then(Value::as_str)
        .map(str::to_string)
        .filter(|d| !d.trim().is_empty());

    let query = PublicationQuery::new(title, authors, doi);
    query.validate()?;
    Ok(query)
}

/// Load batch records from a JSON array or a CSV file with a header row.
pub fn load_records(path: &Path) -> Result<Vec<Value>> {
    let is_csv = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case("csv"))
        .unwrap_or(false);

    if !is_csv {
        let content = std::fs::read_to_string(path)?;
        return match serde_json::from_str::<Value>(&content)? {
            Value::Array(records) => Ok(records),
            _ => Err(CiteError::Validation(format!(
                "{}: expected a JSON array of publications",
                path.display()
            ))),
        };
    }

    let mut reader = csv::Reader::from_path(path)?;
    let headers = reader.headers()?.clone();
    let mut records = Vec::new();
    for row in reader.records() {
        let row = row?;
        let map: Map<String, Value> = headers
            .iter()
            .zip(row.iter())
            .map(|(k, v)| (k.to_string(), Value::String(v.to_string())))
            .collect();
        records.push(Value::Object(map));
    }
    Ok(records)
}
