use serde::{Deserialize, Serialize};

use pcard_domain::{
	card::{Strategy, StructuredCard},
	input_gate::{RejectCode, input_gate},
	normalize::normalize,
};

use crate::{
	Clause, Error, PcardService, Result, context::assemble_context,
	validator::validate_generated,
};

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LookupRequest {
	pub query: String,
	pub match_count: Option<u32>,
	pub match_threshold: Option<f32>,
	#[serde(default)]
	pub debug: bool,
}
impl LookupRequest {
	pub fn new(query: impl Into<String>) -> Self {
		Self { query: query.into(), match_count: None, match_threshold: None, debug: false }
	}
}

#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum LookupResponse {
	Card(Box<CardResponse>),
	NotFound(NotFoundResponse),
}
impl LookupResponse {
	fn not_found(query: &str, reason: NotFoundReason, message: Option<&str>) -> Self {
		Self::NotFound(NotFoundResponse {
			not_found: NotFound {
				query: query.to_string(),
				reason,
				message: message.map(str::to_string),
			},
		})
	}

	pub fn card(&self) -> Option<&StructuredCard> {
		match self {
			Self::Card(response) => Some(&response.card),
			Self::NotFound(_) => None,
		}
	}
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CardResponse {
	#[serde(flatten)]
	pub card: StructuredCard,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub debug: Option<DebugInfo>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NotFoundResponse {
	pub not_found: NotFound,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NotFound {
	pub query: String,
	pub reason: NotFoundReason,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub message: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NotFoundReason {
	NoSimilarProduct,
	InvalidInput,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DebugInfo {
	pub cache_key: String,
	pub strategy: Strategy,
	pub fallback_used: bool,
	pub priority_product_ids: Vec<i64>,
	pub matches: Vec<Clause>,
	pub context: String,
	pub context_truncated: bool,
}

impl PcardService {
	/// Resolves a product-name query into a validated card.
	///
	/// Invalid input and empty retrieval are answers, not errors. Upstream failures and schema
	/// violations are errors and are never cached.
	pub async fn lookup(&self, req: LookupRequest) -> Result<LookupResponse> {
		let (match_count, match_threshold) = self.resolve_params(&req)?;
		let query = req.query.trim();
		let cache_key = normalize(query);
		let gate = input_gate(query).and_then(|()| {
			if cache_key.is_empty() {
				return Err(RejectCode::RejectEmptyKey);
			}

			Ok(())
		});

		if let Err(code) = gate {
			tracing::info!(reason_code = code.as_str(), "Query rejected at the input gate.");

			return Ok(LookupResponse::not_found(
				query,
				NotFoundReason::InvalidInput,
				Some(code.message()),
			));
		}

		if !req.debug
			&& let Some(entry) = self.cache.lookup(&cache_key).await
		{
			tracing::info!(
				cache_key = %cache_key,
				hit_count = entry.hit_count,
				"Card served from cache."
			);

			let mut card = entry.card;

			card.cached = true;

			return Ok(LookupResponse::Card(Box::new(CardResponse { card, debug: None })));
		}

		let retrieval = match self.retrieve(query, match_count, match_threshold).await {
			Ok(retrieval) => retrieval,
			Err(err) => {
				tracing::warn!(strategy = %Strategy::Failed, error = %err, "Retrieval failed.");

				return Err(err);
			},
		};

		tracing::info!(
			strategy = %retrieval.strategy,
			candidates = retrieval.candidates.len(),
			product_name = retrieval.matched_product_name.as_deref(),
			"Retrieval resolved."
		);

		if retrieval.candidates.is_empty() {
			return Ok(LookupResponse::not_found(query, NotFoundReason::NoSimilarProduct, None));
		}

		let context = assemble_context(
			&retrieval.candidates,
			self.cfg.context.max_chars as usize,
			self.cfg.context.snippet_chars as usize,
		);
		let product_name = retrieval.matched_product_name.as_deref();
		let raw = self.extract_card(query, product_name, &context).await?;
		let generated = validate_generated(&raw, &context.clause_map).inspect_err(|err| {
			tracing::warn!(
				error = %err,
				strategy = %retrieval.strategy,
				"Generated card rejected."
			);
		})?;
		let card = StructuredCard::new(
			query.to_string(),
			retrieval.matched_product_name.clone(),
			retrieval.strategy,
			generated,
			context.clause_map.clone(),
			context.sources.clone(),
		);

		if self.cache.enabled()
			&& let Some(name) = product_name
		{
			let evidence_products =
				context.sources.iter().filter_map(|source| source.product_name.as_deref());
			let product_names: Vec<&str> =
				std::iter::once(name).chain(evidence_products).collect();

			if let Err(err) =
				self.cache.store(&cache_key, &req.query, &product_names, &card).await
			{
				tracing::warn!(error = %err, cache_key = %cache_key, "Failed to write card cache.");
			}
		}

		let debug = req.debug.then(|| DebugInfo {
			cache_key,
			strategy: retrieval.strategy,
			fallback_used: retrieval.strategy.is_fallback(),
			priority_product_ids: retrieval.priority_product_ids.iter().copied().collect(),
			matches: retrieval.raw_matches,
			context: context.text,
			context_truncated: context.truncated,
		});

		Ok(LookupResponse::Card(Box::new(CardResponse { card, debug })))
	}

	fn resolve_params(&self, req: &LookupRequest) -> Result<(u32, f32)> {
		let retrieval = &self.cfg.retrieval;
		let match_count = req.match_count.unwrap_or(retrieval.default_match_count);

		if match_count == 0 || match_count > retrieval.max_match_count {
			return Err(Error::InvalidRequest {
				message: format!("matchCount must be between 1 and {}.", retrieval.max_match_count),
			});
		}

		let match_threshold = req.match_threshold.unwrap_or(retrieval.default_match_threshold);

		if !(0.0..=1.0).contains(&match_threshold) {
			return Err(Error::InvalidRequest {
				message: "matchThreshold must be between 0 and 1.".to_string(),
			});
		}

		Ok((match_count, match_threshold))
	}
}
