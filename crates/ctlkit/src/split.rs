//! Quote-aware splitting of a command line into tokens.

const QUOTE: char = '"';

/// Split `text` into arguments, keeping double-quoted phrases together.
///
/// Whitespace runs collapse to a single space before scanning. A closing
/// quote always ends the current token, even when more text follows it
/// before the next space. There is no escape for a literal `"`; an
/// unterminated quote is flushed as the last token.
pub fn split(text: &str) -> Vec<String> {
	let text = text.split_whitespace().collect::<Vec<_>>().join(" ");

	let mut parts = Vec::new();
	let mut part = String::new();
	let mut quoted = false;

	for c in text.chars() {
		match c {
			QUOTE if !quoted => quoted = true,
			QUOTE => {
				quoted = false;
				parts.push(part.trim().to_string());
				part.clear();
			}
			' ' if quoted => part.push(c),
			' ' => {
				if !part.is_empty() {
					parts.push(std::mem::take(&mut part));
				}
			}
			_ => part.push(c),
		}
	}

	if !part.is_empty() {
		parts.push(part.trim().to_string());
	}

	parts
}
