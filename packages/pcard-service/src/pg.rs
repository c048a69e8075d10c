//! Postgres-backed collaborators.

use std::sync::Arc;

use pcard_domain::card::StructuredCard;
use pcard_storage::{
	db::Db,
	models::{CardCacheRow, ClauseMatchRow, ClauseRow, ProductRow},
	queries,
};

use crate::{
	BoxFuture, CacheEntry, CardCacheStore, Clause, ClauseVectorStore, Error, Product,
	ProductRegistry, Result,
};

pub struct PgRegistry {
	db: Arc<Db>,
}
impl PgRegistry {
	pub fn new(db: Arc<Db>) -> Self {
		Self { db }
	}
}

impl ProductRegistry for PgRegistry {
	fn list_active(&self) -> BoxFuture<'_, Result<Vec<Product>>> {
		Box::pin(async move {
			let rows = queries::list_active_products(&self.db.pool).await?;

			Ok(rows.into_iter().map(Product::from).collect())
		})
	}

	fn find_by_name_substring<'a>(&'a self, text: &'a str) -> BoxFuture<'a, Result<Vec<Product>>> {
		Box::pin(async move {
			let rows = queries::find_products_by_name_substring(&self.db.pool, text).await?;

			Ok(rows.into_iter().map(Product::from).collect())
		})
	}

	fn clauses_for_products<'a>(
		&'a self,
		product_ids: &'a [i64],
	) -> BoxFuture<'a, Result<Vec<Clause>>> {
		Box::pin(async move {
			let rows = queries::clauses_for_products(&self.db.pool, product_ids).await?;

			Ok(rows.into_iter().map(Clause::from).collect())
		})
	}

	fn set_active(&self, product_id: i64, active: bool) -> BoxFuture<'_, Result<Product>> {
		Box::pin(async move {
			let now = time::OffsetDateTime::now_utc();
			let row = queries::set_product_active(&self.db.pool, product_id, active, now).await?;

			Ok(Product::from(row))
		})
	}
}

pub struct PgVectorStore {
	db: Arc<Db>,
}
impl PgVectorStore {
	pub fn new(db: Arc<Db>) -> Self {
		Self { db }
	}
}

impl ClauseVectorStore for PgVectorStore {
	fn match_clauses<'a>(
		&'a self,
		embedding: &'a [f32],
		threshold: f32,
		count: u32,
	) -> BoxFuture<'a, Result<Vec<Clause>>> {
		Box::pin(async move {
			let rows =
				queries::match_clauses(&self.db.pool, embedding, threshold, i64::from(count))
					.await?;

			Ok(rows.into_iter().map(Clause::from).collect())
		})
	}
}

pub struct PgCardCache {
	db: Arc<Db>,
}
impl PgCardCache {
	pub fn new(db: Arc<Db>) -> Self {
		Self { db }
	}
}

impl CardCacheStore for PgCardCache {
	fn get<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<Option<CacheEntry>>> {
		Box::pin(async move {
			let Some(row) = queries::get_card_cache(&self.db.pool, key).await? else {
				return Ok(None);
			};

			entry_from_row(row).map(Some)
		})
	}

	fn put(&self, entry: CacheEntry) -> BoxFuture<'_, Result<()>> {
		Box::pin(async move {
			let row = row_from_entry(entry)?;

			queries::upsert_card_cache(&self.db.pool, &row).await?;

			Ok(())
		})
	}

	fn record_hit<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<Option<i64>>> {
		Box::pin(async move { Ok(queries::record_card_cache_hit(&self.db.pool, key).await?) })
	}

	fn remove<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<u64>> {
		Box::pin(async move { Ok(queries::delete_card_cache(&self.db.pool, key).await?) })
	}

	fn remove_for_product<'a>(
		&'a self,
		product_key: &'a str,
		raw_fragments: &'a [String],
	) -> BoxFuture<'a, Result<u64>> {
		Box::pin(async move {
			Ok(queries::delete_card_cache_for_product(&self.db.pool, product_key, raw_fragments)
				.await?)
		})
	}
}

impl From<ProductRow> for Product {
	fn from(row: ProductRow) -> Self {
		Self { id: row.product_id, name: row.name, active: row.active }
	}
}

impl From<ClauseRow> for Clause {
	fn from(row: ClauseRow) -> Self {
		Self {
			id: row.clause_id,
			product_id: row.product_id,
			content: row.content,
			similarity: None,
		}
	}
}

impl From<ClauseMatchRow> for Clause {
	fn from(row: ClauseMatchRow) -> Self {
		Self {
			id: row.clause_id,
			product_id: row.product_id,
			content: row.content,
			similarity: Some(row.similarity),
		}
	}
}

fn entry_from_row(row: CardCacheRow) -> Result<CacheEntry> {
	let card: StructuredCard = serde_json::from_value(row.card).map_err(|err| Error::Storage {
		message: format!("Cached card for key {:?} is unreadable: {err}", row.cache_key),
	})?;

	Ok(CacheEntry {
		key: row.cache_key,
		key_version: row.key_version,
		product_keys: row.product_keys,
		raw_query: row.raw_query,
		card,
		created_at: row.created_at,
		expires_at: row.expires_at,
		hit_count: row.hit_count,
	})
}

fn row_from_entry(entry: CacheEntry) -> Result<CardCacheRow> {
	let card = serde_json::to_value(&entry.card)
		.map_err(|err| Error::Storage { message: format!("Card is not serializable: {err}") })?;

	Ok(CardCacheRow {
		cache_key: entry.key,
		key_version: entry.key_version,
		product_keys: entry.product_keys,
		raw_query: entry.raw_query,
		card,
		created_at: entry.created_at,
		expires_at: entry.expires_at,
		hit_count: entry.hit_count,
	})
}
