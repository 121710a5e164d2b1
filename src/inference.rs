//! # Column Inference
//!
//! Maps JSON fixture values onto SQLite column affinities so the local
//! backend can create seed tables on demand.
//!
//! | JSON Type       | SQLite Affinity |
//! |-----------------|-----------------|
//! | Number (Int)    | INTEGER         |
//! | Number (Float)  | REAL            |
//! | Boolean         | INTEGER (0/1)   |
//! | String          | TEXT            |
//! | Object / Array  | TEXT (JSON)     |
//! | Null            | ignored         |

use crate::error::{BazaarError, BazaarResult};
use serde_json::Value;

/// SQLite type affinity for column definitions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    Integer,
    Real,
    Text,
    Null,
}

impl ColumnType {
    /// Returns the SQL type name for column creation
    pub fn as_sql(self) -> &'static str {
        match self {
            ColumnType::Integer => "INTEGER",
            ColumnType::Real => "REAL",
            ColumnType::Text => "TEXT",
            ColumnType::Null => "NULL",
        }
    }

    /// Smallest type that holds values of both `a` and `b`
    pub fn common(a: ColumnType, b: ColumnType) -> ColumnType {
        match (a, b) {
            (a, b) if a == b => a,
            (ColumnType::Null, other) | (other, ColumnType::Null) => other,
            (ColumnType::Integer, ColumnType::Real) | (ColumnType::Real, ColumnType::Integer) => {
                ColumnType::Real
            }
            _ => ColumnType::Text,
        }
    }
}

/// Infers the column type of a single JSON value
pub fn infer_type(value: &Value) -> ColumnType {
    match value {
        Value::Null => ColumnType::Null,
        Value::Bool(_) => ColumnType::Integer,
        Value::Number(n) if n.is_i64() || n.is_u64() => ColumnType::Integer,
        Value::Number(_) => ColumnType::Real,
        Value::String(_) | Value::Object(_) | Value::Array(_) => ColumnType::Text,
    }
}

/// A column derived from one or more rows
#[derive(Debug, Clone, PartialEq)]
pub struct InferredColumn {
    pub name: String,
    pub column_type: ColumnType,
}

/// Infers one unified column set for a batch of rows.
///
/// Columns keep first-seen order. A key that is null in every row gets
/// `ColumnType::Null`, which callers create as untyped TEXT.
pub fn infer_columns(rows: &[Value]) -> BazaarResult<Vec<InferredColumn>> {
    let mut columns: Vec<InferredColumn> = Vec::new();

    for row in rows {
        let obj = row.as_object().ok_or_else(|| {
            BazaarError::InvalidPayload("Each row must be a JSON object".to_string())
        })?;

        for (key, value) in obj {
            let ty = infer_type(value);
            match columns.iter_mut().find(|c| &c.name == key) {
                Some(existing) => existing.column_type = ColumnType::common(existing.column_type, ty),
                None => columns.push(InferredColumn {
                    name: key.clone(),
                    column_type: ty,
                }),
            }
        }
    }

    Ok(columns)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_type_inference() {
        assert_eq!(infer_type(&json!(42)), ColumnType::Integer);
        assert_eq!(infer_type(&json!(3.5)), ColumnType::Real);
        assert_eq!(infer_type(&json!("hello")), ColumnType::Text);
        assert_eq!(infer_type(&json!(true)), ColumnType::Integer);
        assert_eq!(infer_type(&json!(null)), ColumnType::Null);
        assert_eq!(infer_type(&json!(["a", "b"])), ColumnType::Text);
    }

    #[test]
    fn test_batch_unifies_types() {
        let rows = vec![
            json!({"title": "Aadhaar", "sort": 1, "weight": null}),
            json!({"title": "PAN", "sort": 2.5, "is_active": true}),
        ];
        let columns = infer_columns(&rows).unwrap();
        let names: Vec<_> = columns.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["sort", "title", "weight", "is_active"]);

        let sort = columns.iter().find(|c| c.name == "sort").unwrap();
        assert_eq!(sort.column_type, ColumnType::Real);
        let weight = columns.iter().find(|c| c.name == "weight").unwrap();
        assert_eq!(weight.column_type, ColumnType::Null);
    }

    #[test]
    fn test_non_object_row_rejected() {
        assert!(infer_columns(&[json!("nope")]).is_err());
    }
}
