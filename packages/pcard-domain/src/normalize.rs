//! Canonical product-name keys.
//!
//! The output of [`normalize`] is used both for cache-key equality and for name matching, so the
//! rule set is a versioned contract. Any change to the rules must bump [`NORMALIZER_VERSION`];
//! cache entries written under another version are treated as misses.

use unicode_normalization::UnicodeNormalization;

pub const NORMALIZER_VERSION: i32 = 2;

/// Punctuation removed after NFKC folding. Fullwidth ASCII forms are already folded by NFKC, so
/// only marks without an ASCII compatibility mapping are listed here.
const STRIPPED_PUNCTUATION: &[char] = &[
	'，', '。', '、', '；', '：', '？', '！', '“', '”', '‘', '’', '（', '）', '【', '】', '《', '》',
	'〈', '〉', '「', '」', '『', '』', '〔', '〕', '·', '・', '—', '–', '…', '～', '〜', '※', '°',
];

/// Folds `input` into its key. The output is a fixed point: stripping can leave a combining mark
/// next to a new base character, so the filtered text is composed once more.
pub fn normalize(input: &str) -> String {
	input
		.nfkc()
		.flat_map(char::to_lowercase)
		.filter(|ch| !is_stripped(*ch))
		.nfkc()
		.collect()
}

/// Bidirectional substring containment between two already-normalized keys.
pub fn names_overlap(a: &str, b: &str) -> bool {
	if a.is_empty() || b.is_empty() {
		return false;
	}

	a.contains(b) || b.contains(a)
}

fn is_stripped(ch: char) -> bool {
	ch.is_whitespace() || ch.is_ascii_punctuation() || STRIPPED_PUNCTUATION.contains(&ch)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn collapses_spacing_and_punctuation_variants() {
		assert_eq!(normalize("安心无忧医疗险"), normalize("安心 无忧-医疗险！"));
		assert_eq!(normalize("安心无忧医疗险"), "安心无忧医疗险");
	}

	#[test]
	fn folds_width_and_case() {
		assert_eq!(normalize("Ｅ生保 Plus（2024版）"), "e生保plus2024版");
	}

	#[test]
	fn is_idempotent() {
		for input in [
			"  Super MEDICAL · 百万医疗 ",
			"《好医保》长期医疗",
			"a-b_c/d",
			"",
			"cafe-\u{301}",
			"e \u{301}生保",
		] {
			let once = normalize(input);

			assert_eq!(normalize(&once), once, "Not idempotent for {input:?}.");
		}
	}

	#[test]
	fn composes_marks_left_behind_by_stripping() {
		assert_eq!(normalize("cafe-\u{301}"), "caf\u{e9}");
		assert_eq!(normalize("cafe-\u{301}"), normalize("café"));
	}

	#[test]
	fn overlap_is_bidirectional_and_ignores_empty_keys() {
		assert!(names_overlap("安心无忧", "安心无忧医疗险"));
		assert!(names_overlap("安心无忧医疗险", "安心无忧"));
		assert!(!names_overlap("", "安心无忧"));
		assert!(!names_overlap("好医保", "安心无忧"));
	}
}
