use sqlx::PgExecutor;
use time::OffsetDateTime;

use crate::{
	Error, Result,
	models::{CardCacheRow, ClauseMatchRow, ClauseRow, ProductRow},
};

pub async fn list_active_products<'e, E>(executor: E) -> Result<Vec<ProductRow>>
where
	E: PgExecutor<'e>,
{
	let rows = sqlx::query_as::<_, ProductRow>(
		"\
SELECT product_id, name, active
FROM products
WHERE active
ORDER BY product_id ASC",
	)
	.fetch_all(executor)
	.await?;

	Ok(rows)
}

/// Case-insensitive substring lookup over active product names. `%` and `_` in the input are
/// matched literally.
pub async fn find_products_by_name_substring<'e, E>(
	executor: E,
	text: &str,
) -> Result<Vec<ProductRow>>
where
	E: PgExecutor<'e>,
{
	let trimmed = text.trim();

	if trimmed.is_empty() {
		return Err(Error::InvalidArgument("Name substring must be non-empty.".to_string()));
	}

	let pattern = format!("%{}%", escape_like(trimmed));
	let rows = sqlx::query_as::<_, ProductRow>(
		"\
SELECT product_id, name, active
FROM products
WHERE active AND name ILIKE $1 ESCAPE '\\'
ORDER BY product_id ASC",
	)
	.bind(pattern)
	.fetch_all(executor)
	.await?;

	Ok(rows)
}

pub async fn clauses_for_products<'e, E>(executor: E, product_ids: &[i64]) -> Result<Vec<ClauseRow>>
where
	E: PgExecutor<'e>,
{
	if product_ids.is_empty() {
		return Ok(Vec::new());
	}

	let rows = sqlx::query_as::<_, ClauseRow>(
		"\
SELECT clause_id, product_id, content
FROM product_clauses
WHERE product_id = ANY($1)
ORDER BY product_id ASC, clause_id ASC",
	)
	.bind(product_ids)
	.fetch_all(executor)
	.await?;

	Ok(rows)
}

/// Cosine similarity search over clause embeddings of active products.
pub async fn match_clauses<'e, E>(
	executor: E,
	embedding: &[f32],
	threshold: f32,
	count: i64,
) -> Result<Vec<ClauseMatchRow>>
where
	E: PgExecutor<'e>,
{
	let vec_text = crate::vector_to_pg(embedding);
	let rows = sqlx::query_as::<_, ClauseMatchRow>(
		"\
SELECT
	c.clause_id,
	c.product_id,
	c.content,
	(1 - (c.embedding <=> $1::text::vector))::real AS similarity
FROM product_clauses c
JOIN products p ON p.product_id = c.product_id
WHERE p.active
	AND c.embedding IS NOT NULL
	AND 1 - (c.embedding <=> $1::text::vector) > $2
ORDER BY c.embedding <=> $1::text::vector ASC
LIMIT $3",
	)
	.bind(vec_text)
	.bind(threshold)
	.bind(count)
	.fetch_all(executor)
	.await?;

	Ok(rows)
}

pub async fn insert_product<'e, E>(executor: E, name: &str, active: bool) -> Result<ProductRow>
where
	E: PgExecutor<'e>,
{
	let row = sqlx::query_as::<_, ProductRow>(
		"\
INSERT INTO products (name, active)
VALUES ($1, $2)
RETURNING product_id, name, active",
	)
	.bind(name)
	.bind(active)
	.fetch_one(executor)
	.await?;

	Ok(row)
}

pub async fn insert_clause<'e, E>(
	executor: E,
	product_id: i64,
	content: &str,
	embedding: Option<&[f32]>,
) -> Result<i64>
where
	E: PgExecutor<'e>,
{
	let vec_text = embedding.map(crate::vector_to_pg);
	let clause_id: i64 = sqlx::query_scalar(
		"\
INSERT INTO product_clauses (product_id, content, embedding)
VALUES ($1, $2, $3::text::vector)
RETURNING clause_id",
	)
	.bind(product_id)
	.bind(content)
	.bind(vec_text)
	.fetch_one(executor)
	.await?;

	Ok(clause_id)
}

pub async fn set_product_active<'e, E>(
	executor: E,
	product_id: i64,
	active: bool,
	now: OffsetDateTime,
) -> Result<ProductRow>
where
	E: PgExecutor<'e>,
{
	sqlx::query_as::<_, ProductRow>(
		"\
UPDATE products
SET active = $2, updated_at = $3
WHERE product_id = $1
RETURNING product_id, name, active",
	)
	.bind(product_id)
	.bind(active)
	.bind(now)
	.fetch_optional(executor)
	.await?
	.ok_or_else(|| Error::NotFound(format!("Product {product_id} does not exist.")))
}

pub async fn get_card_cache<'e, E>(executor: E, cache_key: &str) -> Result<Option<CardCacheRow>>
where
	E: PgExecutor<'e>,
{
	let row = sqlx::query_as::<_, CardCacheRow>(
		"\
SELECT cache_key, key_version, product_keys, raw_query, card, created_at, expires_at, hit_count
FROM card_cache
WHERE cache_key = $1",
	)
	.bind(cache_key)
	.fetch_optional(executor)
	.await?;

	Ok(row)
}

pub async fn upsert_card_cache<'e, E>(executor: E, row: &CardCacheRow) -> Result<()>
where
	E: PgExecutor<'e>,
{
	sqlx::query(
		"\
INSERT INTO card_cache (
	cache_key,
	key_version,
	product_keys,
	raw_query,
	card,
	created_at,
	expires_at,
	hit_count
)
VALUES ($1,$2,$3,$4,$5,$6,$7,$8)
ON CONFLICT (cache_key) DO UPDATE
SET
	key_version = EXCLUDED.key_version,
	product_keys = EXCLUDED.product_keys,
	raw_query = EXCLUDED.raw_query,
	card = EXCLUDED.card,
	created_at = EXCLUDED.created_at,
	expires_at = EXCLUDED.expires_at,
	hit_count = EXCLUDED.hit_count",
	)
	.bind(row.cache_key.as_str())
	.bind(row.key_version)
	.bind(&row.product_keys)
	.bind(row.raw_query.as_str())
	.bind(&row.card)
	.bind(row.created_at)
	.bind(row.expires_at)
	.bind(row.hit_count)
	.execute(executor)
	.await?;

	Ok(())
}

/// Increments the hit counter and returns the new value, or `None` when the row vanished.
pub async fn record_card_cache_hit<'e, E>(executor: E, cache_key: &str) -> Result<Option<i64>>
where
	E: PgExecutor<'e>,
{
	let hits: Option<i64> = sqlx::query_scalar(
		"UPDATE card_cache SET hit_count = hit_count + 1 WHERE cache_key = $1 RETURNING hit_count",
	)
	.bind(cache_key)
	.fetch_optional(executor)
	.await?;

	Ok(hits)
}

pub async fn delete_card_cache<'e, E>(executor: E, cache_key: &str) -> Result<u64>
where
	E: PgExecutor<'e>,
{
	let result = sqlx::query("DELETE FROM card_cache WHERE cache_key = $1")
		.bind(cache_key)
		.execute(executor)
		.await?;

	Ok(result.rows_affected())
}

/// Deletes every entry tied to a product: by exact key, by any entry's product keys, and by
/// substring match of any of `raw_fragments` against the stored raw query text.
pub async fn delete_card_cache_for_product<'e, E>(
	executor: E,
	product_key: &str,
	raw_fragments: &[String],
) -> Result<u64>
where
	E: PgExecutor<'e>,
{
	let fragments: Vec<&str> =
		raw_fragments.iter().map(|fragment| fragment.trim()).filter(|f| !f.is_empty()).collect();
	let result = sqlx::query(
		"\
DELETE FROM card_cache
WHERE cache_key = $1
	OR $1 = ANY(product_keys)
	OR EXISTS (
		SELECT 1 FROM unnest($2::text[]) AS fragment
		WHERE strpos(raw_query, fragment) > 0
	)",
	)
	.bind(product_key)
	.bind(fragments)
	.execute(executor)
	.await?;

	Ok(result.rows_affected())
}

fn escape_like(input: &str) -> String {
	let mut out = String::with_capacity(input.len());

	for ch in input.chars() {
		if matches!(ch, '%' | '_' | '\\') {
			out.push('\\');
		}

		out.push(ch);
	}

	out
}
