use super::{Backend, Dialect};
use crate::config::RemoteConfig;
use crate::error::{BazaarError, BazaarResult};
use crate::guard::validate_identifier;
use reqwest::header::CONTENT_RANGE;
use reqwest::{Client, Method, RequestBuilder, Response};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use std::collections::BTreeSet;
use tracing::debug;

/// Name of the SQL-executing RPC installed on the remote database
pub const EXEC_SQL_FUNCTION: &str = "exec_sql";

/// Postgres `undefined_column`
const UNDEFINED_COLUMN_CODE: &str = "42703";

/// Backend over a PostgREST-style REST API (`/rest/v1`)
#[derive(Clone)]
pub struct RestBackend {
    client: Client,
    base_url: String,
    api_key: String,
}

/// Error body returned by PostgREST
#[derive(Debug, Default, Deserialize)]
struct PostgrestError {
    code: Option<String>,
    message: Option<String>,
    details: Option<String>,
    hint: Option<String>,
}

impl RestBackend {
    pub fn new(config: &RemoteConfig) -> BazaarResult<Self> {
        let client = Client::builder().timeout(config.timeout).build()?;
        Ok(Self {
            client,
            base_url: config.url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
        })
    }

    fn table_url(&self, table: &str) -> BazaarResult<String> {
        validate_identifier(table)?;
        Ok(format!("{}/rest/v1/{}", self.base_url, table))
    }

    fn request(&self, method: Method, url: String) -> RequestBuilder {
        self.client
            .request(method, url)
            .header("apikey", &self.api_key)
            .bearer_auth(&self.api_key)
    }

    /// Turns a failed response into an error, typing the undefined-column case
    async fn error_from(response: Response, table: &str, column: Option<&str>) -> BazaarError {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        let parsed: PostgrestError = serde_json::from_str(&body).unwrap_or_default();
        debug!(
            "Remote error {} on {}: details={:?} hint={:?}",
            status, table, parsed.details, parsed.hint
        );

        if let (Some(column), Some(UNDEFINED_COLUMN_CODE)) = (column, parsed.code.as_deref()) {
            return BazaarError::UndefinedColumn {
                table: table.to_string(),
                column: column.to_string(),
            };
        }

        let message = parsed
            .message
            .or_else(|| (!body.trim().is_empty()).then(|| body.trim().to_string()))
            .unwrap_or_else(|| status.canonical_reason().unwrap_or("unknown").to_string());

        BazaarError::Remote {
            status: status.as_u16(),
            code: parsed.code,
            message,
        }
    }
}

/// Pads every row with `null` up to the union of all keys. PostgREST
/// rejects a bulk insert whose objects do not share one key set (PGRST102).
fn uniform_rows(rows: &[Value]) -> BazaarResult<Vec<Value>> {
    let mut keys = BTreeSet::new();
    for row in rows {
        let obj = row.as_object().ok_or_else(|| {
            BazaarError::InvalidPayload("Each row must be a JSON object".to_string())
        })?;
        keys.extend(obj.keys().cloned());
    }

    Ok(rows
        .iter()
        .filter_map(Value::as_object)
        .map(|obj| {
            let padded: Map<String, Value> = keys
                .iter()
                .map(|k| (k.clone(), obj.get(k).cloned().unwrap_or(Value::Null)))
                .collect();
            Value::Object(padded)
        })
        .collect())
}

/// Parses the total out of a `Content-Range` header (`0-24/3573`, `*/0`)
pub fn parse_content_range(header: &str) -> Option<u64> {
    header.rsplit_once('/')?.1.trim().parse().ok()
}

impl Backend for RestBackend {
    fn dialect(&self) -> Dialect {
        Dialect::Postgres
    }

    fn describe(&self) -> String {
        self.base_url.clone()
    }

    async fn count_rows(&self, table: &str) -> BazaarResult<u64> {
        let response = self
            .request(Method::HEAD, self.table_url(table)?)
            .query(&[("select", "*")])
            .header("Prefer", "count=exact")
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::error_from(response, table, None).await);
        }

        let range = response
            .headers()
            .get(CONTENT_RANGE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default();
        parse_content_range(range).ok_or_else(|| BazaarError::Remote {
            status: response.status().as_u16(),
            code: None,
            message: format!("Missing row count in Content-Range '{}'", range),
        })
    }

    async fn insert_rows(&self, table: &str, rows: &[Value]) -> BazaarResult<u64> {
        if rows.is_empty() {
            return Ok(0);
        }

        let body = uniform_rows(rows)?;
        let response = self
            .request(Method::POST, self.table_url(table)?)
            .header("Prefer", "return=minimal")
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::error_from(response, table, None).await);
        }
        Ok(rows.len() as u64)
    }

    async fn exec_sql(&self, sql: &str) -> BazaarResult<()> {
        let url = format!("{}/rest/v1/rpc/{}", self.base_url, EXEC_SQL_FUNCTION);
        let response = self
            .request(Method::POST, url)
            .json(&json!({ "sql": sql }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::error_from(response, EXEC_SQL_FUNCTION, None).await);
        }
        Ok(())
    }

    async fn probe_column(&self, table: &str, column: &str) -> BazaarResult<()> {
        validate_identifier(column)?;
        let response = self
            .request(Method::GET, self.table_url(table)?)
            .query(&[("select", column), ("limit", "1")])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::error_from(response, table, Some(column)).await);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::mock::MockRemote;
    use serde_json::json;

    #[test]
    fn test_parse_content_range() {
        assert_eq!(parse_content_range("0-24/3573"), Some(3573));
        assert_eq!(parse_content_range("*/0"), Some(0));
        assert_eq!(parse_content_range("0-24/*"), None);
        assert_eq!(parse_content_range(""), None);
    }

    #[tokio::test]
    async fn test_count_and_insert() {
        let mock = MockRemote::start().await;
        mock.create_table("tips", vec![]);
        let backend = mock.backend();

        assert_eq!(backend.count_rows("tips").await.unwrap(), 0);
        let rows = vec![json!({"title": "Never pay in advance"}), json!({"title": "Inspect first"})];
        assert_eq!(backend.insert_rows("tips", &rows).await.unwrap(), 2);
        assert_eq!(backend.count_rows("tips").await.unwrap(), 2);

        assert_eq!(mock.rows("tips"), rows);
        assert!(mock.api_keys_seen().iter().all(|k| k == "service-key"));
    }

    #[tokio::test]
    async fn test_insert_pads_rows_to_one_key_set() {
        let mock = MockRemote::start().await;
        mock.create_table("tips", vec![]);
        let rows = vec![
            json!({"title": "Meet in public", "description": "Pick a busy spot"}),
            json!({"title": "Inspect first"}),
        ];

        assert_eq!(mock.backend().insert_rows("tips", &rows).await.unwrap(), 2);
        assert_eq!(
            mock.rows("tips"),
            vec![
                json!({"title": "Meet in public", "description": "Pick a busy spot"}),
                json!({"title": "Inspect first", "description": null}),
            ]
        );
    }

    #[tokio::test]
    async fn test_insert_rejects_non_object_rows() {
        let mock = MockRemote::start().await;
        mock.create_table("tips", vec![]);
        let err = mock.backend().insert_rows("tips", &[json!("x")]).await.unwrap_err();
        assert!(matches!(err, BazaarError::InvalidPayload(_)));
        assert!(mock.api_keys_seen().is_empty());
    }

    #[tokio::test]
    async fn test_missing_table_is_remote_error() {
        let mock = MockRemote::start().await;
        let err = mock.backend().count_rows("tips").await.unwrap_err();
        match err {
            BazaarError::Remote { status, .. } => assert_eq!(status, 404),
            other => panic!("unexpected error: {other:?}"),
        }

        let err = mock
            .backend()
            .insert_rows("tips", &[json!({"title": "x"})])
            .await
            .unwrap_err();
        match err {
            BazaarError::Remote { code, message, .. } => {
                assert_eq!(code.as_deref(), Some("42P01"));
                assert!(message.contains("tips"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_probe_column_types_undefined_column() {
        let mock = MockRemote::start().await;
        mock.create_table("staff", vec!["email"]);
        let backend = mock.backend();

        backend.probe_column("staff", "email").await.unwrap();
        let err = backend.probe_column("staff", "auth_id").await.unwrap_err();
        assert!(matches!(err, BazaarError::UndefinedColumn { .. }), "got {err:?}");
    }

    #[tokio::test]
    async fn test_exec_sql_posts_statement() {
        let mock = MockRemote::start().await;
        mock.set_rpc_available(true);
        mock.create_table("staff", vec![]);

        mock.backend()
            .exec_sql("ALTER TABLE staff ADD COLUMN IF NOT EXISTS auth_id UUID")
            .await
            .unwrap();
        assert_eq!(
            mock.executed_sql(),
            vec!["ALTER TABLE staff ADD COLUMN IF NOT EXISTS auth_id UUID".to_string()]
        );
    }

    #[tokio::test]
    async fn test_invalid_table_never_sent() {
        let mock = MockRemote::start().await;
        let err = mock.backend().count_rows("tips?select=1").await.unwrap_err();
        assert!(matches!(err, BazaarError::InvalidIdentifier(_)));
        assert!(mock.api_keys_seen().is_empty());
    }
}
