//! # Document Store
//!
//! Persists [`Model`] records as JSON documents in the local store, one table
//! per collection:
//!
//! ```sql
//! CREATE TABLE <collection> (id TEXT PRIMARY KEY, doc TEXT NOT NULL, created_at TEXT, updated_at TEXT)
//! ```
//!
//! Every write runs `normalize -> validate -> before_save`, so a record that
//! misses a required field or breaks a constraint is never stored. Index hints
//! declared by the model become expression indexes over `json_extract(doc, ...)`,
//! and unique ones surface as `Conflict` errors.

use crate::db::{json_to_sql_value, BazaarStore, Row, SqlValue};
use crate::error::{BazaarError, BazaarResult};
use crate::guard::validate_identifier;
use crate::models::{Category, CategoryTree, Model, RecordId};
use chrono::{DateTime, SecondsFormat, SubsecRound, Utc};
use dashmap::DashSet;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info};

/// A stored record with its id and timestamps
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document<M> {
    pub id: RecordId,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(flatten)]
    pub data: M,
}

pub struct DocumentStore {
    store: Arc<BazaarStore>,
    ready: DashSet<&'static str>,
}

impl DocumentStore {
    pub fn new(store: Arc<BazaarStore>) -> Self {
        Self {
            store,
            ready: DashSet::new(),
        }
    }

    /// Creates the collection table and its indexes on first use
    async fn ensure<M: Model>(&self) -> BazaarResult<()> {
        if self.ready.contains(M::COLLECTION) {
            return Ok(());
        }
        validate_identifier(M::COLLECTION)?;

        let mut sql = format!(
            "CREATE TABLE IF NOT EXISTS {} (id TEXT PRIMARY KEY, doc TEXT NOT NULL, created_at TEXT NOT NULL, updated_at TEXT NOT NULL);",
            M::COLLECTION
        );
        for index in M::indexes() {
            for field in index.fields {
                validate_identifier(field)?;
            }
            let exprs: Vec<String> = index.fields.iter().map(|f| json_path(f)).collect();
            sql.push_str(&format!(
                "\nCREATE {}INDEX IF NOT EXISTS idx_{}_{} ON {} ({});",
                if index.unique { "UNIQUE " } else { "" },
                M::COLLECTION,
                index.fields.join("_"),
                M::COLLECTION,
                exprs.join(", ")
            ));
        }
        self.store.execute_batch(sql).await?;

        info!("Collection ready: {} ({} indexes)", M::COLLECTION, M::indexes().len());
        self.ready.insert(M::COLLECTION);
        Ok(())
    }

    /// Runs the write pipeline on `model`
    fn prepare<M: Model>(mut model: M) -> BazaarResult<M> {
        model.normalize();
        model.validate()?;
        model.before_save()?;
        Ok(model)
    }

    pub async fn create<M: Model>(&self, model: M) -> BazaarResult<Document<M>> {
        self.ensure::<M>().await?;
        let data = Self::prepare(model)?;
        let id = RecordId::generate();
        let now = now();

        self.store
            .execute(
                format!(
                    "INSERT INTO {} (id, doc, created_at, updated_at) VALUES (?, ?, ?, ?)",
                    M::COLLECTION
                ),
                vec![
                    SqlValue::Text(id.to_string()),
                    SqlValue::Text(serde_json::to_string(&data)?),
                    SqlValue::Text(timestamp(&now)),
                    SqlValue::Text(timestamp(&now)),
                ],
            )
            .await?;
        debug!("Created {} in {}", id, M::COLLECTION);

        Ok(Document {
            id,
            created_at: now,
            updated_at: now,
            data,
        })
    }

    /// Creates a record from untyped JSON. Missing required fields and wrong
    /// types are reported as validation errors.
    pub async fn create_from_json<M: Model>(&self, value: Value) -> BazaarResult<Document<M>> {
        let model: M = serde_json::from_value(value)
            .map_err(|e| BazaarError::Validation(format!("{}: {}", M::COLLECTION, e)))?;
        self.create(model).await
    }

    pub async fn get<M: Model>(&self, id: &RecordId) -> BazaarResult<Document<M>> {
        self.ensure::<M>().await?;
        let rows = self
            .store
            .query(
                format!(
                    "SELECT id, doc, created_at, updated_at FROM {} WHERE id = ?",
                    M::COLLECTION
                ),
                vec![SqlValue::Text(id.to_string())],
            )
            .await?;
        match rows.first() {
            Some(row) => decode_row(row),
            None => Err(BazaarError::not_found(format!("{} {}", M::COLLECTION, id))),
        }
    }

    /// All records, oldest first
    pub async fn find_all<M: Model>(&self) -> BazaarResult<Vec<Document<M>>> {
        self.ensure::<M>().await?;
        let rows = self
            .store
            .query_simple(format!(
                "SELECT id, doc, created_at, updated_at FROM {} ORDER BY created_at, id",
                M::COLLECTION
            ))
            .await?;
        rows.iter().map(decode_row).collect()
    }

    /// Records whose top-level `field` equals `value`
    pub async fn find_by<M: Model>(&self, field: &str, value: &Value) -> BazaarResult<Vec<Document<M>>> {
        self.ensure::<M>().await?;
        validate_identifier(field)?;
        let rows = self
            .store
            .query(
                format!(
                    "SELECT id, doc, created_at, updated_at FROM {} WHERE {} = ? ORDER BY created_at, id",
                    M::COLLECTION,
                    json_path(field)
                ),
                vec![json_to_sql_value(value)],
            )
            .await?;
        rows.iter().map(decode_row).collect()
    }

    /// Replaces the record's data, keeping `created_at`
    pub async fn update<M: Model>(&self, id: &RecordId, model: M) -> BazaarResult<Document<M>> {
        self.ensure::<M>().await?;
        let data = Self::prepare(model)?;
        let affected = self
            .store
            .execute(
                format!("UPDATE {} SET doc = ?, updated_at = ? WHERE id = ?", M::COLLECTION),
                vec![
                    SqlValue::Text(serde_json::to_string(&data)?),
                    SqlValue::Text(timestamp(&now())),
                    SqlValue::Text(id.to_string()),
                ],
            )
            .await?;
        if affected == 0 {
            return Err(BazaarError::not_found(format!("{} {}", M::COLLECTION, id)));
        }
        self.get(id).await
    }

    pub async fn delete<M: Model>(&self, id: &RecordId) -> BazaarResult<()> {
        self.ensure::<M>().await?;
        let affected = self
            .store
            .execute(
                format!("DELETE FROM {} WHERE id = ?", M::COLLECTION),
                vec![SqlValue::Text(id.to_string())],
            )
            .await?;
        if affected == 0 {
            return Err(BazaarError::not_found(format!("{} {}", M::COLLECTION, id)));
        }
        Ok(())
    }

    pub async fn count<M: Model>(&self) -> BazaarResult<u64> {
        self.ensure::<M>().await?;
        self.store.count_rows(M::COLLECTION).await
    }

    /// Loads every category into a navigable tree
    pub async fn category_tree(&self) -> BazaarResult<CategoryTree> {
        Ok(CategoryTree::new(self.find_all::<Category>().await?))
    }
}

fn json_path(field: &str) -> String {
    format!("json_extract(doc, '$.{}')", field)
}

/// Current time at the precision timestamps are stored with
fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}

fn timestamp(at: &DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn decode_row<M: Model>(row: &Row) -> BazaarResult<Document<M>> {
    let text = |idx: usize| -> BazaarResult<&str> {
        row.get(idx)
            .and_then(|(_, v)| v.as_str())
            .ok_or_else(|| BazaarError::Database(format!("{}: malformed row", M::COLLECTION)))
    };
    let parse_time = |idx: usize| -> BazaarResult<DateTime<Utc>> {
        DateTime::parse_from_rfc3339(text(idx)?)
            .map(|t| t.with_timezone(&Utc))
            .map_err(|e| BazaarError::Database(format!("{}: bad timestamp: {}", M::COLLECTION, e)))
    };

    Ok(Document {
        id: RecordId::from(text(0)?),
        data: serde_json::from_str(text(1)?)?,
        created_at: parse_time(2)?,
        updated_at: parse_time(3)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        AttributeField, Banner, Blog, Category, City, Country, Faq, FeatureAdPackage, IdProof, Role,
        Staff, State,
    };
    use serde_json::json;

    async fn store() -> DocumentStore {
        DocumentStore::new(Arc::new(BazaarStore::in_memory().await.unwrap()))
    }

    #[tokio::test]
    async fn test_missing_required_field_is_rejected() {
        let docs = store().await;
        let err = docs
            .create_from_json::<Category>(json!({ "name": "Cars" }))
            .await
            .unwrap_err();
        assert_eq!(err.error_code(), "VALIDATION_ERROR");
        assert!(err.to_string().contains("slug"), "{err}");
        assert_eq!(docs.count::<Category>().await.unwrap(), 0);
    }

    async fn assert_rejected<M: Model + std::fmt::Debug>(docs: &DocumentStore, value: Value, missing: &str) {
        let err = docs.create_from_json::<M>(value).await.unwrap_err();
        assert_eq!(err.error_code(), "VALIDATION_ERROR", "{}: {err}", M::COLLECTION);
        assert!(err.to_string().contains(missing), "{}: {err}", M::COLLECTION);
        assert_eq!(docs.count::<M>().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_required_fields_per_collection() {
        let docs = store().await;
        assert_rejected::<IdProof>(&docs, json!({ "isActive": true }), "title").await;
        assert_rejected::<City>(&docs, json!({ "name": "Pune" }), "state_id").await;
        assert_rejected::<City>(&docs, json!({ "state_id": "mh" }), "name").await;
        assert_rejected::<State>(&docs, json!({ "name": "Maharashtra" }), "country_id").await;
        assert_rejected::<Country>(&docs, json!({ "iso2": "IN" }), "name").await;
        assert_rejected::<Faq>(&docs, json!({ "question": "How do I post?" }), "answer").await;
        assert_rejected::<Banner>(&docs, json!({ "redirectUrl": "https://bazaar.test" }), "image").await;
        assert_rejected::<Role>(&docs, json!({ "permissions": [] }), "name").await;
        assert_rejected::<AttributeField>(&docs, json!({ "name": "Fuel", "fieldType": 1 }), "categoryId").await;
    }

    #[tokio::test]
    async fn test_optional_fields_take_defaults() {
        let docs = store().await;

        let proof = docs
            .create_from_json::<IdProof>(json!({ "title": " Passport " }))
            .await
            .unwrap();
        assert_eq!(proof.data.title, "Passport");
        assert!(proof.data.is_active);

        let state = docs
            .create_from_json::<State>(json!({ "country_id": "in", "name": "Maharashtra" }))
            .await
            .unwrap();
        assert_eq!(state.data.state_code, None);
        assert_eq!(state.data.latitude, None);

        let city = docs
            .create_from_json::<City>(json!({ "state_id": state.id, "name": "Pune" }))
            .await
            .unwrap();
        assert_eq!(city.data.longitude, None);
        let in_state = docs.find_by::<City>("state_id", &json!(state.id)).await.unwrap();
        assert_eq!(in_state.len(), 1);

        let role = docs
            .create_from_json::<Role>(json!({ "name": "Viewer" }))
            .await
            .unwrap();
        assert!(role.data.permissions.is_empty());
        assert!(role.data.is_active);
    }

    #[tokio::test]
    async fn test_out_of_range_coordinates_rejected() {
        let docs = store().await;
        let err = docs
            .create_from_json::<City>(json!({ "state_id": "mh", "name": "Nowhere", "latitude": 91.0 }))
            .await
            .unwrap_err();
        assert_eq!(err.error_code(), "VALIDATION_ERROR");
        assert_eq!(docs.count::<City>().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_defaults_and_derived_fields() {
        let docs = store().await;
        let pkg = docs
            .create_from_json::<FeatureAdPackage>(json!({
                "name": " Silver ", "price": 200.0, "discount": 50.0, "days": 7, "advertisementLimit": 2
            }))
            .await
            .unwrap();
        assert!(pkg.data.is_active);
        assert_eq!(pkg.data.name, "Silver");
        assert_eq!(pkg.data.final_price, Some(150.0));

        let stored = docs.get::<FeatureAdPackage>(&pkg.id).await.unwrap();
        assert_eq!(stored.data, pkg.data);
    }

    #[tokio::test]
    async fn test_unique_index_conflict() {
        let docs = store().await;
        let blog = json!({ "title": "Safety", "slug": "stay-safe", "image": "a.png", "description": "Tips" });
        docs.create_from_json::<Blog>(blog.clone()).await.unwrap();

        let err = docs.create_from_json::<Blog>(blog).await.unwrap_err();
        assert_eq!(err.error_code(), "CONFLICT");
        assert_eq!(docs.count::<Blog>().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_update_keeps_created_at() {
        let docs = store().await;
        let created = docs
            .create_from_json::<Category>(json!({ "name": "Cars", "slug": "cars" }))
            .await
            .unwrap();

        let mut data = created.data.clone();
        data.name = "Used Cars".to_string();
        let updated = docs.update(&created.id, data).await.unwrap();
        assert_eq!(updated.data.name, "Used Cars");
        assert_eq!(updated.created_at, created.created_at);
        assert!(updated.updated_at >= created.updated_at);

        let missing = docs.update(&RecordId::from("nope"), updated.data).await;
        assert!(matches!(missing, Err(BazaarError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_find_by_and_delete() {
        let docs = store().await;
        let vehicles = docs
            .create_from_json::<Category>(json!({ "name": "Vehicles", "slug": "vehicles" }))
            .await
            .unwrap();
        for (name, slug) in [("Cars", "cars"), ("Bikes", "bikes")] {
            docs.create_from_json::<Category>(json!({ "name": name, "slug": slug, "parent": vehicles.id }))
                .await
                .unwrap();
        }

        let children = docs
            .find_by::<Category>("parent", &json!(vehicles.id))
            .await
            .unwrap();
        assert_eq!(children.len(), 2);

        let tree = docs.category_tree().await.unwrap();
        assert_eq!(tree.children(&vehicles.id).len(), 2);
        assert_eq!(tree.roots().len(), 1);

        docs.delete::<Category>(&children[0].id).await.unwrap();
        assert_eq!(docs.count::<Category>().await.unwrap(), 2);
        assert!(docs.get::<Category>(&children[0].id).await.is_err());
        assert!(docs.find_by::<Category>("parent; --", &json!(1)).await.is_err());
    }

    #[tokio::test]
    async fn test_staff_password_is_hashed_on_save() {
        let docs = store().await;
        let staff = docs
            .create_from_json::<Staff>(json!({
                "name": "Ravi", "email": "Ravi@Example.com", "password": "s3cret-pass", "role": "admin"
            }))
            .await
            .unwrap();
        assert_ne!(staff.data.password, "s3cret-pass");

        let found = docs
            .find_by::<Staff>("email", &json!("ravi@example.com"))
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
        assert!(found[0].data.verify_password("s3cret-pass"));

        // Saving again must not re-hash the stored hash
        let again = docs.update(&staff.id, found[0].data.clone()).await.unwrap();
        assert!(again.data.verify_password("s3cret-pass"));
    }
}
