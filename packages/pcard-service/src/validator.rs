use pcard_domain::{
	card::{ClauseMap, GeneratedCard},
	citation::{CitationViolation, validate_citations},
};

use crate::{Error, Result};

#[derive(Debug, thiserror::Error)]
pub enum SchemaError {
	#[error("Output is not a card object: {0}")]
	Shape(#[from] serde_json::Error),
	#[error("{0}")]
	Citation(CitationViolation),
}

/// Strict parse of the model output. Unknown keys, missing keys, plain-string fields and
/// surrounding prose are all rejected.
pub fn parse_card(raw: &str) -> Result<GeneratedCard, SchemaError> {
	Ok(serde_json::from_str(raw)?)
}

pub fn check_card(raw: &str, clause_map: &ClauseMap) -> Result<GeneratedCard, SchemaError> {
	let card = parse_card(raw)?;

	validate_citations(&card, clause_map).map_err(SchemaError::Citation)?;

	Ok(card)
}

/// [`check_card`] with failures reported as [`Error::SchemaViolation`] carrying the raw output.
pub fn validate_generated(raw: &str, clause_map: &ClauseMap) -> Result<GeneratedCard> {
	check_card(raw, clause_map)
		.map_err(|err| Error::SchemaViolation { details: err.to_string(), raw: raw.to_string() })
}
