//! Evidence context handed to the generation model.

use unicode_segmentation::UnicodeSegmentation;

use pcard_domain::card::{ClauseMap, ClauseRef, Source};

use crate::RetrievalCandidate;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AssembledContext {
	pub text: String,
	pub clause_map: ClauseMap,
	pub sources: Vec<Source>,
	pub truncated: bool,
}
impl AssembledContext {
	pub fn clause_ids(&self) -> Vec<i64> {
		self.clause_map.keys().copied().collect()
	}
}

/// Concatenates one block per candidate, in order, and cuts the tail at `max_chars` characters.
/// Only clauses whose block at least partly survives the cut enter the clause map and sources,
/// so every clause id the model can see is citable.
pub fn assemble_context(
	candidates: &[RetrievalCandidate],
	max_chars: usize,
	snippet_chars: usize,
) -> AssembledContext {
	let mut out = AssembledContext::default();
	let mut used = 0_usize;

	for candidate in candidates {
		let clause = &candidate.clause;

		if out.clause_map.contains_key(&clause.id) {
			continue;
		}
		if used >= max_chars {
			out.truncated = true;

			break;
		}

		let block = render_block(candidate);
		let block_chars = block.chars().count();
		let remaining = max_chars - used;

		if block_chars > remaining {
			out.text.extend(block.chars().take(remaining));
			used = max_chars;
			out.truncated = true;
		} else {
			out.text.push_str(&block);
			used += block_chars;
		}

		out.clause_map.insert(
			clause.id,
			ClauseRef {
				snippet: snippet(&clause.content, snippet_chars),
				product_name: candidate.product_name.clone(),
			},
		);
		out.sources
			.push(Source { clause_id: clause.id, product_name: candidate.product_name.clone() });
	}

	out
}

fn render_block(candidate: &RetrievalCandidate) -> String {
	let clause = &candidate.clause;

	match candidate.product_name.as_deref() {
		Some(name) => format!("【{name}】[clause {}]\n{}\n\n", clause.id, clause.content.trim()),
		None => format!("[clause {}]\n{}\n\n", clause.id, clause.content.trim()),
	}
}

/// First `max` grapheme clusters of the collapsed content, with an ellipsis when cut.
pub fn snippet(content: &str, max: usize) -> String {
	let collapsed = content.split_whitespace().collect::<Vec<_>>().join(" ");
	let mut graphemes = collapsed.graphemes(true);
	let mut out: String = graphemes.by_ref().take(max).collect();

	if graphemes.next().is_some() {
		out.push('…');
	}

	out
}
