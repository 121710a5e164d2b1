//! # Seed Loader
//!
//! Loads reference data from fixture JSON into backend tables, once. A table
//! is seeded only while it is empty; anything already there is left alone.
//! Each table goes in as a single insert, so a run never leaves a table
//! half-seeded. Failures are logged per table and the run carries on.
//!
//! Fixture rows are document-database exports. Before insert each row is
//! reshaped: `_id`/`__v` are dropped, extended-JSON wrappers (`{"$oid": ..}`,
//! `{"$date": ..}`, ...) are unwrapped, and top-level keys are renamed from
//! camelCase to snake_case unless the table declares an explicit rename.

use crate::backend::Backend;
use crate::error::{BazaarError, BazaarResult};
use serde_json::{Map, Value};
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};

/// Default fixture directory, relative to the working directory
pub const DEFAULT_FIXTURE_DIR: &str = "data/seed";

/// Keys that only make sense in the source database
const DROPPED_KEYS: [&str; 2] = ["_id", "__v"];

/// One fixture file feeding one table
#[derive(Debug, Clone)]
pub struct TableSeed {
    pub fixture: &'static str,
    pub table: &'static str,
    /// (source key, destination column) pairs applied before case conversion
    pub renames: &'static [(&'static str, &'static str)],
}

/// A named group of tables seeded together
#[derive(Debug, Clone)]
pub struct SeedCategory {
    pub name: &'static str,
    pub tables: Vec<TableSeed>,
    /// Skipped categories are reported but never touched
    pub skip: bool,
}

/// The reference data this application ships with
pub fn default_categories() -> Vec<SeedCategory> {
    vec![
        SeedCategory {
            name: "settings",
            tables: vec![TableSeed {
                fixture: "settings.json",
                table: "settings",
                renames: &[],
            }],
            skip: false,
        },
        SeedCategory {
            name: "report reasons",
            tables: vec![TableSeed {
                fixture: "report_reasons.json",
                table: "report_reasons",
                renames: &[("reason", "title")],
            }],
            skip: false,
        },
        SeedCategory {
            name: "tips",
            tables: vec![TableSeed {
                fixture: "tips.json",
                table: "tips",
                renames: &[],
            }],
            skip: false,
        },
        SeedCategory {
            name: "id proofs",
            tables: vec![TableSeed {
                fixture: "id_proofs.json",
                table: "id_proofs",
                renames: &[],
            }],
            skip: false,
        },
        // Geography is loaded separately; it is far too large for this path
        SeedCategory {
            name: "geography",
            tables: vec![
                TableSeed {
                    fixture: "countries.json",
                    table: "countries",
                    renames: &[],
                },
                TableSeed {
                    fixture: "states.json",
                    table: "states",
                    renames: &[],
                },
                TableSeed {
                    fixture: "cities.json",
                    table: "cities",
                    renames: &[],
                },
            ],
            skip: true,
        },
    ]
}

/// What happened to one table
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SeedOutcome {
    Inserted(u64),
    SkippedNotEmpty(u64),
    SkippedDisabled,
    NoRows,
    Failed(String),
}

impl fmt::Display for SeedOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SeedOutcome::Inserted(n) => write!(f, "inserted {} rows", n),
            SeedOutcome::SkippedNotEmpty(n) => write!(f, "skipped ({} rows already present)", n),
            SeedOutcome::SkippedDisabled => write!(f, "skipped (disabled)"),
            SeedOutcome::NoRows => write!(f, "nothing to insert"),
            SeedOutcome::Failed(e) => write!(f, "failed: {}", e),
        }
    }
}

/// Outcome per table, in run order
#[derive(Debug, Clone, Default)]
pub struct SeedReport {
    pub entries: Vec<(String, SeedOutcome)>,
}

impl SeedReport {
    pub fn outcome(&self, table: &str) -> Option<&SeedOutcome> {
        self.entries.iter().find(|(t, _)| t == table).map(|(_, o)| o)
    }

    pub fn failures(&self) -> usize {
        self.entries
            .iter()
            .filter(|(_, o)| matches!(o, SeedOutcome::Failed(_)))
            .count()
    }

    pub fn inserted(&self) -> u64 {
        self.entries
            .iter()
            .map(|(_, o)| match o {
                SeedOutcome::Inserted(n) => *n,
                _ => 0,
            })
            .sum()
    }
}

/// Reads a fixture file. A missing file is an empty fixture.
pub async fn load_fixture(path: &Path) -> BazaarResult<Vec<Value>> {
    let raw = match tokio::fs::read_to_string(path).await {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            warn!("Fixture {} not found, nothing to seed from it", path.display());
            return Ok(vec![]);
        }
        Err(e) => return Err(e.into()),
    };

    match serde_json::from_str::<Value>(&raw)? {
        Value::Array(rows) => Ok(rows),
        other => Err(BazaarError::InvalidPayload(format!(
            "{} must hold a JSON array, found {}",
            path.display(),
            json_kind(&other)
        ))),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// `isActive` -> `is_active`, `redirectURL` -> `redirect_url`
pub fn to_snake_case(key: &str) -> String {
    let chars: Vec<char> = key.chars().collect();
    let mut out = String::with_capacity(key.len() + 4);

    for (i, &c) in chars.iter().enumerate() {
        if c.is_ascii_uppercase() {
            let prev = i.checked_sub(1).map(|p| chars[p]);
            let next = chars.get(i + 1).copied();
            let boundary = match prev {
                Some(p) if p.is_ascii_lowercase() || p.is_ascii_digit() => true,
                Some(p) if p.is_ascii_uppercase() => next.is_some_and(|n| n.is_ascii_lowercase()),
                _ => false,
            };
            if boundary && !out.ends_with('_') {
                out.push('_');
            }
            out.push(c.to_ascii_lowercase());
        } else {
            out.push(c);
        }
    }
    out
}

/// Unwraps extended-JSON scalars at any depth
fn unwrap_extended(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            if let (1, Some((key, inner))) = (map.len(), map.iter().next()) {
                match key.as_str() {
                    "$oid" | "$date" | "$numberDecimal" => return unwrap_extended(inner.clone()),
                    "$numberInt" | "$numberLong" => {
                        if let Some(n) = inner.as_str().and_then(|s| s.parse::<i64>().ok()) {
                            return Value::from(n);
                        }
                    }
                    "$numberDouble" => {
                        if let Some(n) = inner.as_str().and_then(|s| s.parse::<f64>().ok()) {
                            return Value::from(n);
                        }
                    }
                    _ => {}
                }
            }
            Value::Object(map.into_iter().map(|(k, v)| (k, unwrap_extended(v))).collect())
        }
        Value::Array(items) => Value::Array(items.into_iter().map(unwrap_extended).collect()),
        other => other,
    }
}

/// Reshapes one fixture row for `seed`. Non-object rows yield `None`.
pub fn transform_row(row: Value, seed: &TableSeed) -> Option<Value> {
    let Value::Object(map) = row else {
        return None;
    };

    let mut out = Map::with_capacity(map.len());
    for (key, value) in map {
        if DROPPED_KEYS.contains(&key.as_str()) {
            continue;
        }
        let column = seed
            .renames
            .iter()
            .find(|(from, _)| *from == key)
            .map(|(_, to)| to.to_string())
            .unwrap_or_else(|| to_snake_case(&key));
        out.insert(column, unwrap_extended(value));
    }
    Some(Value::Object(out))
}

/// Seeds reference tables from a fixture directory
pub struct Seeder<'a, B: Backend> {
    backend: &'a B,
    fixture_dir: PathBuf,
}

impl<'a, B: Backend> Seeder<'a, B> {
    pub fn new(backend: &'a B, fixture_dir: impl Into<PathBuf>) -> Self {
        Self {
            backend,
            fixture_dir: fixture_dir.into(),
        }
    }

    /// Seeds every category in order. Never fails; see the report for outcomes.
    pub async fn run(&self, categories: &[SeedCategory]) -> SeedReport {
        info!(
            "Seeding from {} into {}",
            self.fixture_dir.display(),
            self.backend.describe()
        );

        let mut report = SeedReport::default();
        for category in categories {
            if category.skip {
                info!("Skipping {} seed", category.name);
                for seed in &category.tables {
                    report.entries.push((seed.table.to_string(), SeedOutcome::SkippedDisabled));
                }
                continue;
            }

            for seed in &category.tables {
                let outcome = match self.seed_table(seed).await {
                    Ok(outcome) => outcome,
                    Err(e) => {
                        error!("[{}] Error seeding {}: {}", e.error_code(), seed.table, e);
                        SeedOutcome::Failed(e.to_string())
                    }
                };
                report.entries.push((seed.table.to_string(), outcome));
            }
        }

        info!(
            "Seeding finished: {} rows inserted, {} tables failed",
            report.inserted(),
            report.failures()
        );
        report
    }

    /// Seeds one table if it is empty
    pub async fn seed_table(&self, seed: &TableSeed) -> BazaarResult<SeedOutcome> {
        let existing = self.backend.count_rows(seed.table).await?;
        if existing > 0 {
            info!("{} already has {} rows, skipping seed", seed.table, existing);
            return Ok(SeedOutcome::SkippedNotEmpty(existing));
        }

        let path = self.fixture_dir.join(seed.fixture);
        let rows: Vec<Value> = load_fixture(&path)
            .await?
            .into_iter()
            .filter_map(|row| {
                let shaped = transform_row(row, seed);
                if shaped.is_none() {
                    warn!("Dropping non-object row in {}", seed.fixture);
                }
                shaped
            })
            .collect();

        if rows.is_empty() {
            info!("No rows to seed into {}", seed.table);
            return Ok(SeedOutcome::NoRows);
        }

        let inserted = self.backend.insert_rows(seed.table, &rows).await?;
        info!("Seeded {} rows into {}", inserted, seed.table);
        Ok(SeedOutcome::Inserted(inserted))
    }
}
