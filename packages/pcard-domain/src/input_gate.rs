#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectCode {
	RejectTooShort,
	RejectDigitsOnly,
	RejectShortLetters,
	RejectPunctuationOnly,
	RejectRepeatedChar,
	/// The query passed the gate but normalizes to an empty key.
	RejectEmptyKey,
}
impl RejectCode {
	pub fn as_str(self) -> &'static str {
		match self {
			Self::RejectTooShort => "REJECT_TOO_SHORT",
			Self::RejectDigitsOnly => "REJECT_DIGITS_ONLY",
			Self::RejectShortLetters => "REJECT_SHORT_LETTERS",
			Self::RejectPunctuationOnly => "REJECT_PUNCTUATION_ONLY",
			Self::RejectRepeatedChar => "REJECT_REPEATED_CHAR",
			Self::RejectEmptyKey => "REJECT_EMPTY_KEY",
		}
	}

	pub fn message(self) -> &'static str {
		match self {
			Self::RejectTooShort => "Query must contain at least 2 characters.",
			Self::RejectDigitsOnly => "Query must not consist of digits only.",
			Self::RejectShortLetters => "Letter-only queries must contain at least 3 characters.",
			Self::RejectPunctuationOnly => "Query must contain more than whitespace or punctuation.",
			Self::RejectRepeatedChar => "Query must not be a single repeated character.",
			Self::RejectEmptyKey => "Query has no characters left after normalization.",
		}
	}
}

const MIN_CHARS: usize = 2;
const MIN_LETTER_CHARS: usize = 3;
const MAX_SAME_CHAR_RUN: usize = 3;

/// Rejects queries that cannot name a product. Runs on the trimmed query and performs no I/O.
pub fn input_gate(query: &str) -> Result<(), RejectCode> {
	let trimmed = query.trim();
	let count = trimmed.chars().count();

	if count < MIN_CHARS {
		return Err(RejectCode::RejectTooShort);
	}
	if trimmed.chars().all(|ch| ch.is_ascii_digit()) {
		return Err(RejectCode::RejectDigitsOnly);
	}
	if count < MIN_LETTER_CHARS && trimmed.chars().all(|ch| ch.is_ascii_alphabetic()) {
		return Err(RejectCode::RejectShortLetters);
	}
	if trimmed.chars().all(|ch| ch.is_whitespace() || ch.is_ascii_punctuation()) {
		return Err(RejectCode::RejectPunctuationOnly);
	}
	if count > MAX_SAME_CHAR_RUN && is_single_repeated_char(trimmed) {
		return Err(RejectCode::RejectRepeatedChar);
	}

	Ok(())
}

fn is_single_repeated_char(text: &str) -> bool {
	let mut chars = text.chars();
	let Some(first) = chars.next() else {
		return false;
	};

	chars.all(|ch| ch == first)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn rejects_single_character() {
		assert_eq!(input_gate("a"), Err(RejectCode::RejectTooShort));
		assert_eq!(input_gate("  险  "), Err(RejectCode::RejectTooShort));
	}

	#[test]
	fn rejects_digits_only() {
		assert_eq!(input_gate("12345"), Err(RejectCode::RejectDigitsOnly));
	}

	#[test]
	fn rejects_short_letter_only_queries() {
		assert_eq!(input_gate("ab"), Err(RejectCode::RejectShortLetters));
		assert!(input_gate("abc").is_ok());
	}

	#[test]
	fn two_cjk_characters_are_accepted() {
		assert!(input_gate("医疗").is_ok());
	}

	#[test]
	fn rejects_punctuation_only() {
		assert_eq!(input_gate("?!"), Err(RejectCode::RejectPunctuationOnly));
		assert_eq!(input_gate("!!!!!"), Err(RejectCode::RejectPunctuationOnly));
		assert!(input_gate("？！").is_ok());
	}

	#[test]
	fn rejects_repeated_character() {
		assert_eq!(input_gate("哈哈哈哈"), Err(RejectCode::RejectRepeatedChar));
		assert_eq!(input_gate("aaaaa"), Err(RejectCode::RejectRepeatedChar));
		assert!(input_gate("哈哈哈").is_ok());
	}
}
