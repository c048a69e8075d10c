use pcard_domain::card::FALLBACK_MARKER;

use crate::{PcardService, Result, context::AssembledContext};

const SYSTEM_INSTRUCTION_TEMPLATE: &str = r#"You extract a structured information card for an insurance product from the evidence clauses supplied by the user.

Return exactly one JSON object with this shape and no other keys:
{
  "insurer": CitedField,
  "productType": CitedField,
  "coverageAmount": CitedField,
  "coveragePeriod": CitedField,
  "waitingPeriod": CitedField,
  "eligibleAge": CitedField,
  "deductible": CitedField,
  "renewal": CitedField,
  "coverages": [CitedItem],
  "exclusions": [CitedItem],
  "advisories": [string]
}
CitedField is {"value": string, "sourceClauseId": integer or null}.
CitedItem is {"name": string, "detail": string, "sourceClauseId": integer or null}.

Rules:
- Use only facts stated in the evidence. Never infer, estimate, or use outside knowledge.
- Every value taken from the evidence must set sourceClauseId to the number N of the [clause N] block it came from. Only the clause ids listed by the user are valid.
- When the evidence does not state a field, set "value" to "{FALLBACK}" and "sourceClauseId" to null.
- Keep values short and copy figures, ages, and periods exactly as written.
- coverages and exclusions hold one entry per benefit or exclusion found in the evidence. Leave them empty when none are stated.
- advisories may hold short reading notes for the user and never carry citations.
- Output JSON only. No markdown, no commentary."#;

pub fn system_instruction() -> String {
	SYSTEM_INSTRUCTION_TEMPLATE.replace("{FALLBACK}", FALLBACK_MARKER)
}

pub fn build_user_prompt(
	query: &str,
	product_name: Option<&str>,
	context: &AssembledContext,
) -> String {
	let allowed = context.clause_ids().iter().map(i64::to_string).collect::<Vec<_>>().join(", ");

	format!(
		"Query: {query}\nMatched product: {}\nAllowed clause ids: [{allowed}]\n\nEvidence:\n{}",
		product_name.unwrap_or(FALLBACK_MARKER),
		context.text
	)
}

impl PcardService {
	/// Sends the evidence to the generation model and returns its raw output.
	pub async fn extract_card(
		&self,
		query: &str,
		product_name: Option<&str>,
		context: &AssembledContext,
	) -> Result<String> {
		let system = system_instruction();
		let user = build_user_prompt(query, product_name, context);

		tracing::debug!(
			clauses = context.clause_map.len(),
			context_chars = context.text.chars().count(),
			"Requesting card generation."
		);

		self.backends
			.providers
			.generation
			.generate(&self.cfg.providers.generation, &system, &user)
			.await
	}
}
