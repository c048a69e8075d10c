use serde_json::Value;
use time::OffsetDateTime;

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ProductRow {
	pub product_id: i64,
	pub name: String,
	pub active: bool,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ClauseRow {
	pub clause_id: i64,
	pub product_id: i64,
	pub content: String,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ClauseMatchRow {
	pub clause_id: i64,
	pub product_id: i64,
	pub content: String,
	pub similarity: f32,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct CardCacheRow {
	pub cache_key: String,
	pub key_version: i32,
	pub product_keys: Vec<String>,
	pub raw_query: String,
	pub card: Value,
	pub created_at: OffsetDateTime,
	pub expires_at: OffsetDateTime,
	pub hit_count: i64,
}
