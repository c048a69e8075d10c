use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Reserved value meaning no retrieved clause supports the field.
pub const FALLBACK_MARKER: &str = "未提及";

pub type ClauseMap = BTreeMap<i64, ClauseRef>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Strategy {
	ProductNameMatch,
	ProductNameRerank,
	VectorOnly,
	FallbackIlike,
	NoResults,
	Failed,
}
impl Strategy {
	pub fn as_str(self) -> &'static str {
		match self {
			Self::ProductNameMatch => "PRODUCT_NAME_MATCH",
			Self::ProductNameRerank => "PRODUCT_NAME_RERANK",
			Self::VectorOnly => "VECTOR_ONLY",
			Self::FallbackIlike => "FALLBACK_ILIKE",
			Self::NoResults => "NO_RESULTS",
			Self::Failed => "FAILED",
		}
	}

	pub fn is_fallback(self) -> bool {
		matches!(self, Self::FallbackIlike)
	}
}
impl std::fmt::Display for Strategy {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.write_str(self.as_str())
	}
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CitedField {
	pub value: String,
	pub source_clause_id: Option<i64>,
}
impl CitedField {
	pub fn fallback() -> Self {
		Self { value: FALLBACK_MARKER.to_string(), source_clause_id: None }
	}

	pub fn is_fallback(&self) -> bool {
		self.value == FALLBACK_MARKER
	}
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CitedItem {
	pub name: String,
	pub detail: String,
	pub source_clause_id: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClauseRef {
	pub snippet: String,
	pub product_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Source {
	pub clause_id: i64,
	pub product_name: Option<String>,
}

/// The object the generation model must return, exactly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct GeneratedCard {
	pub insurer: CitedField,
	pub product_type: CitedField,
	pub coverage_amount: CitedField,
	pub coverage_period: CitedField,
	pub waiting_period: CitedField,
	pub eligible_age: CitedField,
	pub deductible: CitedField,
	pub renewal: CitedField,
	pub coverages: Vec<CitedItem>,
	pub exclusions: Vec<CitedItem>,
	/// Editorial hints. The only part of the card allowed to carry no citation.
	pub advisories: Vec<String>,
}

/// One citation-bearing value of a card, addressed by its JSON path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Citation<'a> {
	pub path: String,
	pub value: &'a str,
	pub source_clause_id: Option<i64>,
}

/// A validated card as returned to callers and stored in the cache.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StructuredCard {
	pub query: String,
	pub product_name: Option<String>,
	pub strategy: Strategy,
	pub insurer: CitedField,
	pub product_type: CitedField,
	pub coverage_amount: CitedField,
	pub coverage_period: CitedField,
	pub waiting_period: CitedField,
	pub eligible_age: CitedField,
	pub deductible: CitedField,
	pub renewal: CitedField,
	pub coverages: Vec<CitedItem>,
	pub exclusions: Vec<CitedItem>,
	pub advisories: Vec<String>,
	pub clause_map: ClauseMap,
	pub sources: Vec<Source>,
	#[serde(default)]
	pub cached: bool,
}
impl StructuredCard {
	pub fn new(
		query: String,
		product_name: Option<String>,
		strategy: Strategy,
		generated: GeneratedCard,
		clause_map: ClauseMap,
		sources: Vec<Source>,
	) -> Self {
		let GeneratedCard {
			insurer,
			product_type,
			coverage_amount,
			coverage_period,
			waiting_period,
			eligible_age,
			deductible,
			renewal,
			coverages,
			exclusions,
			advisories,
		} = generated;

		Self {
			query,
			product_name,
			strategy,
			insurer,
			product_type,
			coverage_amount,
			coverage_period,
			waiting_period,
			eligible_age,
			deductible,
			renewal,
			coverages,
			exclusions,
			advisories,
			clause_map,
			sources,
			cached: false,
		}
	}

	pub fn citations(&self) -> Vec<Citation<'_>> {
		collect_citations(
			[
				("insurer", &self.insurer),
				("productType", &self.product_type),
				("coverageAmount", &self.coverage_amount),
				("coveragePeriod", &self.coverage_period),
				("waitingPeriod", &self.waiting_period),
				("eligibleAge", &self.eligible_age),
				("deductible", &self.deductible),
				("renewal", &self.renewal),
			],
			&self.coverages,
			&self.exclusions,
		)
	}
}

impl GeneratedCard {
	pub fn citations(&self) -> Vec<Citation<'_>> {
		collect_citations(
			[
				("insurer", &self.insurer),
				("productType", &self.product_type),
				("coverageAmount", &self.coverage_amount),
				("coveragePeriod", &self.coverage_period),
				("waitingPeriod", &self.waiting_period),
				("eligibleAge", &self.eligible_age),
				("deductible", &self.deductible),
				("renewal", &self.renewal),
			],
			&self.coverages,
			&self.exclusions,
		)
	}

	pub fn list_lengths(&self) -> [(&'static str, usize); 3] {
		[
			("coverages", self.coverages.len()),
			("exclusions", self.exclusions.len()),
			("advisories", self.advisories.len()),
		]
	}
}

fn collect_citations<'a>(
	fields: [(&'static str, &'a CitedField); 8],
	coverages: &'a [CitedItem],
	exclusions: &'a [CitedItem],
) -> Vec<Citation<'a>> {
	let mut out = Vec::with_capacity(fields.len() + coverages.len() + exclusions.len());

	for (name, field) in fields {
		out.push(Citation {
			path: name.to_string(),
			value: field.value.as_str(),
			source_clause_id: field.source_clause_id,
		});
	}

	for (label, items) in [("coverages", coverages), ("exclusions", exclusions)] {
		for (idx, item) in items.iter().enumerate() {
			out.push(Citation {
				path: format!("{label}[{idx}]"),
				value: item.detail.as_str(),
				source_clause_id: item.source_clause_id,
			});
		}
	}

	out
}
