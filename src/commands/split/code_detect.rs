use super::*;

/// Identifier of the issuing notary office, constant for this deployment.
pub const REGISTRY_ID: &str = "1101007";

pub const SEQUENCE_DIGITS: usize = 5;

/// `YYYY` + registry id + type letter + sequence.
pub const CODE_LEN: usize = 4 + REGISTRY_ID.len() + 1 + SEQUENCE_DIGITS;

/// Letter/digit look-alikes that OCR routinely swaps inside codes.
const OCR_SUBSTITUTIONS: [(char, char); 5] =
    [('O', '0'), ('o', '0'), ('l', '1'), ('I', '1'), ('|', '1')];

/// Applies the substitution table and drops all whitespace.
///
/// The output contains none of the substituted characters and no whitespace, so applying it
/// twice is the same as applying it once.
pub fn normalize_ocr_text(text: &str) -> String {
    text.chars()
        .filter(|character| !character.is_whitespace())
        .map(|character| {
            OCR_SUBSTITUTIONS
                .iter()
                .find(|(from, _)| *from == character)
                .map(|(_, to)| *to)
                .unwrap_or(character)
        })
        .collect()
}

/// Code grammar bound to one year and book type.
///
/// Matching runs over normalized text, so the type letter is normalized as well (`O` is looked
/// up as `0`); every match is re-emitted with the canonical letter.
#[derive(Debug, Clone)]
pub struct CodePattern {
    year: u16,
    book_type: BookType,
    prefix: String,
    regex: Regex,
}

impl CodePattern {
    pub fn new(year: u16, book_type: BookType) -> Result<Self> {
        if !(1000..=9999).contains(&year) {
            bail!("year must have exactly four digits, got {year}");
        }

        let normalized_letter = normalize_ocr_text(&book_type.letter().to_string());
        let pattern = format!(
            "{year}{REGISTRY_ID}{}[0-9]{{5}}",
            regex::escape(&normalized_letter)
        );
        let regex = Regex::new(&pattern)
            .with_context(|| format!("failed to compile code pattern {pattern}"))?;

        Ok(Self {
            year,
            book_type,
            prefix: format!("{year}{REGISTRY_ID}{}", book_type.letter()),
            regex,
        })
    }

    pub fn year(&self) -> u16 {
        self.year
    }

    pub fn book_type(&self) -> BookType {
        self.book_type
    }

    pub fn describe(&self) -> String {
        format!("{}NNNNN", self.prefix)
    }

    pub fn code_for_sequence(&self, sequence: &str) -> String {
        format!("{}{}", self.prefix, sequence)
    }

    /// Unique codes in order of first appearance.
    pub fn find_codes(&self, text: &str) -> Vec<String> {
        let normalized = normalize_ocr_text(text);
        let mut seen = HashSet::new();
        let mut codes = Vec::new();

        for found in self.regex.find_iter(&normalized) {
            let matched = found.as_str();
            let code = self.code_for_sequence(&matched[matched.len() - SEQUENCE_DIGITS..]);
            if seen.insert(code.clone()) {
                codes.push(code);
            }
        }

        codes
    }

    /// Exact grammar check for an operator-typed code, without OCR correction.
    pub fn matches(&self, code: &str) -> bool {
        code.len() == CODE_LEN
            && code.is_ascii()
            && code.starts_with(&self.prefix)
            && code[self.prefix.len()..]
                .bytes()
                .all(|byte| byte.is_ascii_digit())
    }
}
