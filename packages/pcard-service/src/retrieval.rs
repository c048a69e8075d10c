use std::collections::{BTreeSet, HashMap};

use serde::Serialize;

use pcard_domain::{
	card::Strategy,
	normalize::{names_overlap, normalize},
};

use crate::{PcardService, Result};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
	pub id: i64,
	pub name: String,
	pub active: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Clause {
	pub id: i64,
	pub product_id: i64,
	pub content: String,
	/// Present only on rows returned by the similarity search.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub similarity: Option<f32>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RetrievalCandidate {
	pub clause: Clause,
	pub product_name: Option<String>,
}

#[derive(Debug, Clone)]
pub struct RetrievalResult {
	pub candidates: Vec<RetrievalCandidate>,
	pub strategy: Strategy,
	pub priority_product_ids: BTreeSet<i64>,
	pub matched_product_name: Option<String>,
	/// Similarity rows as returned by the vector store, before any policy was applied.
	pub raw_matches: Vec<Clause>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NameMatch {
	pub priority_product_ids: BTreeSet<i64>,
	/// Every matched product name, in registry order.
	pub matched_names: Vec<String>,
}
impl NameMatch {
	pub fn first_name(&self) -> Option<&str> {
		self.matched_names.first().map(String::as_str)
	}
}

/// Bidirectional containment between the normalized query and each product's normalized name.
pub fn match_product_names(query: &str, products: &[Product]) -> NameMatch {
	let key = normalize(query);
	let mut out = NameMatch::default();

	for product in products {
		if names_overlap(&key, &normalize(&product.name)) {
			out.priority_product_ids.insert(product.id);
			out.matched_names.push(product.name.clone());
		}
	}

	out
}

/// Applies the name-match policy to similarity rows and returns the surviving rows with the
/// strategy that produced them. An empty result carries [`Strategy::NoResults`]; the caller is
/// expected to try the substring fallback next.
pub fn resolve_strategy(
	mut hits: Vec<Clause>,
	priority_product_ids: &BTreeSet<i64>,
	match_count: usize,
) -> (Strategy, Vec<Clause>) {
	if hits.is_empty() {
		return (Strategy::NoResults, hits);
	}

	let has_priority_hit = hits.iter().any(|hit| priority_product_ids.contains(&hit.product_id));
	let strategy = if has_priority_hit {
		hits.retain(|hit| priority_product_ids.contains(&hit.product_id));
		sort_by_similarity(&mut hits);

		Strategy::ProductNameMatch
	} else if !priority_product_ids.is_empty() {
		// A name matched, but none of its clauses cleared the threshold.
		sort_by_similarity(&mut hits);

		Strategy::ProductNameRerank
	} else {
		sort_by_similarity(&mut hits);

		Strategy::VectorOnly
	};

	hits.truncate(match_count);

	(strategy, hits)
}

fn sort_by_similarity(hits: &mut [Clause]) {
	hits.sort_by(|a, b| {
		let a = a.similarity.unwrap_or(f32::NEG_INFINITY);
		let b = b.similarity.unwrap_or(f32::NEG_INFINITY);

		b.total_cmp(&a)
	});
}

impl PcardService {
	/// Runs the retrieval policy for one query. Any registry, embedding or vector store failure
	/// aborts the request; nothing is retried.
	pub async fn retrieve(
		&self,
		query: &str,
		match_count: u32,
		match_threshold: f32,
	) -> Result<RetrievalResult> {
		let products = self.bounded("registry", self.backends.registry.list_active()).await?;
		let names = match_product_names(query, &products);

		if names.matched_names.len() > 1 {
			tracing::info!(
				matched_names = ?names.matched_names,
				chosen = names.first_name(),
				"Query matches several products. Using registry order."
			);
		}

		let embedding = self
			.backends
			.providers
			.embedding
			.embed(&self.cfg.providers.embedding, query)
			.await?;
		let fetch_count = match_count.saturating_mul(self.cfg.retrieval.overfetch_factor.max(1));
		let hits = self
			.bounded(
				"vector_store",
				self.backends.vectors.match_clauses(&embedding, match_threshold, fetch_count),
			)
			.await?;
		let raw_matches = hits.clone();
		let (strategy, rows) =
			resolve_strategy(hits, &names.priority_product_ids, match_count as usize);
		let mut product_names: HashMap<i64, String> =
			products.into_iter().map(|product| (product.id, product.name)).collect();

		tracing::debug!(
			hits = raw_matches.len(),
			kept = rows.len(),
			priority = names.priority_product_ids.len(),
			strategy = %strategy,
			"Similarity policy applied."
		);

		if !rows.is_empty() {
			return Ok(RetrievalResult {
				candidates: candidates(rows, &product_names),
				strategy,
				matched_product_name: names.first_name().map(str::to_string),
				priority_product_ids: names.priority_product_ids,
				raw_matches,
			});
		}

		let fallback_products = self
			.bounded("registry", self.backends.registry.find_by_name_substring(query.trim()))
			.await?;
		let fallback_ids: Vec<i64> = fallback_products.iter().map(|product| product.id).collect();
		let clauses = if fallback_ids.is_empty() {
			Vec::new()
		} else {
			self.bounded("registry", self.backends.registry.clauses_for_products(&fallback_ids))
				.await?
		};

		if clauses.is_empty() {
			return Ok(RetrievalResult {
				candidates: Vec::new(),
				strategy: Strategy::NoResults,
				matched_product_name: names.first_name().map(str::to_string),
				priority_product_ids: names.priority_product_ids,
				raw_matches,
			});
		}

		let matched_product_name = names
			.first_name()
			.map(str::to_string)
			.or_else(|| fallback_products.first().map(|product| product.name.clone()));

		for product in fallback_products {
			product_names.entry(product.id).or_insert(product.name);
		}

		tracing::info!(clauses = clauses.len(), "Using name substring fallback.");

		Ok(RetrievalResult {
			candidates: candidates(clauses, &product_names),
			strategy: Strategy::FallbackIlike,
			matched_product_name,
			priority_product_ids: names.priority_product_ids,
			raw_matches,
		})
	}
}

fn candidates(
	clauses: Vec<Clause>,
	product_names: &HashMap<i64, String>,
) -> Vec<RetrievalCandidate> {
	clauses
		.into_iter()
		.map(|clause| RetrievalCandidate {
			product_name: product_names.get(&clause.product_id).cloned(),
			clause,
		})
		.collect()
}
