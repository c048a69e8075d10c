use crate::card::{ClauseMap, FALLBACK_MARKER, GeneratedCard};

const MAX_LIST_ITEMS: usize = 32;
const MAX_VALUE_CHARS: usize = 1_000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CitationViolation {
	EmptyValue { path: String },
	ValueTooLong { path: String },
	TooManyItems { path: &'static str },
	FallbackWithSource { path: String, clause_id: i64 },
	UnknownClause { path: String, clause_id: i64 },
}
impl std::fmt::Display for CitationViolation {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			Self::EmptyValue { path } => write!(f, "{path} must not be empty."),
			Self::ValueTooLong { path } =>
				write!(f, "{path} must be at most {MAX_VALUE_CHARS} characters."),
			Self::TooManyItems { path } =>
				write!(f, "{path} must have at most {MAX_LIST_ITEMS} items."),
			Self::FallbackWithSource { path, clause_id } => write!(
				f,
				"{path} uses the fallback marker {FALLBACK_MARKER:?} but cites clause {clause_id}."
			),
			Self::UnknownClause { path, clause_id } =>
				write!(f, "{path} cites clause {clause_id}, which is not in the evidence context."),
		}
	}
}

/// Enforces the structural and citation contract on a parsed card.
pub fn validate_citations(
	card: &GeneratedCard,
	clause_map: &ClauseMap,
) -> Result<(), CitationViolation> {
	for (path, len) in card.list_lengths() {
		if len > MAX_LIST_ITEMS {
			return Err(CitationViolation::TooManyItems { path });
		}
	}

	for (label, items) in [("coverages", &card.coverages), ("exclusions", &card.exclusions)] {
		for (idx, item) in items.iter().enumerate() {
			check_text(&item.name, || format!("{label}[{idx}].name"))?;
		}
	}
	for (idx, advisory) in card.advisories.iter().enumerate() {
		check_text(advisory, || format!("advisories[{idx}]"))?;
	}

	for citation in card.citations() {
		check_text(citation.value, || citation.path.clone())?;

		let Some(clause_id) = citation.source_clause_id else {
			continue;
		};

		if citation.value == FALLBACK_MARKER {
			return Err(CitationViolation::FallbackWithSource { path: citation.path, clause_id });
		}
		if !clause_map.contains_key(&clause_id) {
			return Err(CitationViolation::UnknownClause { path: citation.path, clause_id });
		}
	}

	Ok(())
}

fn check_text(value: &str, path: impl Fn() -> String) -> Result<(), CitationViolation> {
	let trimmed = value.trim();

	if trimmed.is_empty() {
		return Err(CitationViolation::EmptyValue { path: path() });
	}
	if trimmed.chars().count() > MAX_VALUE_CHARS {
		return Err(CitationViolation::ValueTooLong { path: path() });
	}

	Ok(())
}
