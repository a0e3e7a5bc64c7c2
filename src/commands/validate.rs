use std::collections::HashSet;
use std::fs;

use anyhow::{Context, Result, bail};
use tracing::{info, warn};

use crate::cli::ValidateArgs;
use crate::model::ValidationReport;
use crate::util::print_json;

const SEQUENCE_WIDTH: usize = 5;
const NOT_AVAILABLE: &str = "N/A";

pub fn run(args: ValidateArgs) -> Result<()> {
    let mut codes = args.codes.clone();
    if let Some(path) = &args.codes_file {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        codes.extend(
            raw.lines()
                .map(str::trim)
                .filter(|line| !line.is_empty())
                .map(ToOwned::to_owned),
        );
    }

    if codes.is_empty() {
        bail!("no codes to validate, pass --code or --codes-file");
    }

    let report = validate_sequence(&codes);
    if report.total_found < codes.len() {
        warn!(
            skipped = codes.len() - report.total_found,
            "codes without a numeric sequence suffix were skipped"
        );
    }

    if args.json {
        return print_json(&report);
    }

    info!(
        total = report.total_found,
        range = %report.expected_range,
        missing = report.missing.len(),
        duplicates = report.duplicates.len(),
        continuous = report.is_continuous,
        "sequence validation"
    );
    if !report.missing.is_empty() {
        warn!(missing = ?report.missing, "sequence gaps");
    }
    if !report.duplicates.is_empty() {
        warn!(duplicates = ?report.duplicates, "duplicated sequence numbers");
    }

    Ok(())
}

/// Trailing five-digit sequence number of a code, `None` unless all five are ASCII digits.
pub fn sequence_suffix(code: &str) -> Option<u32> {
    let bytes = code.as_bytes();
    if bytes.len() < SEQUENCE_WIDTH {
        return None;
    }

    let suffix = &bytes[bytes.len() - SEQUENCE_WIDTH..];
    if !suffix.iter().all(u8::is_ascii_digit) {
        return None;
    }

    Some(
        suffix
            .iter()
            .fold(0_u32, |value, digit| value * 10 + u32::from(digit - b'0')),
    )
}

fn pad_sequence(value: u32) -> String {
    format!("{value:0SEQUENCE_WIDTH$}")
}

/// Gap and duplicate analysis over the sequence suffixes.
///
/// Depends only on the multiset of suffixes: order and prefixes of the input are irrelevant,
/// and codes without a numeric suffix are skipped.
pub fn validate_sequence<S: AsRef<str>>(codes: &[S]) -> ValidationReport {
    let mut sequences = codes
        .iter()
        .filter_map(|code| sequence_suffix(code.as_ref()))
        .collect::<Vec<u32>>();
    sequences.sort_unstable();

    let (Some(&first), Some(&last)) = (sequences.first(), sequences.last()) else {
        return ValidationReport {
            total_found: 0,
            first_sequence: NOT_AVAILABLE.to_string(),
            last_sequence: NOT_AVAILABLE.to_string(),
            expected_range: NOT_AVAILABLE.to_string(),
            missing: Vec::new(),
            duplicates: Vec::new(),
            is_continuous: true,
        };
    };

    let mut missing = Vec::new();
    for pair in sequences.windows(2) {
        for value in pair[0].saturating_add(1)..pair[1] {
            missing.push(pad_sequence(value));
        }
    }

    let mut seen = HashSet::new();
    let duplicates = sequences
        .iter()
        .filter(|value| !seen.insert(**value))
        .map(|value| pad_sequence(*value))
        .collect::<Vec<String>>();

    ValidationReport {
        total_found: sequences.len(),
        first_sequence: pad_sequence(first),
        last_sequence: pad_sequence(last),
        expected_range: format!("{} - {}", pad_sequence(first), pad_sequence(last)),
        is_continuous: missing.is_empty(),
        missing,
        duplicates,
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    use super::*;

    fn code(sequence: &str) -> String {
        format!("20241101007P{sequence}")
    }

    #[test]
    fn gaps_are_listed_between_first_and_last() {
        let report = validate_sequence(&[code("00001"), code("00002"), code("00004")]);

        assert_eq!(report.missing, vec!["00003".to_string()]);
        assert_eq!(report.first_sequence, "00001");
        assert_eq!(report.last_sequence, "00004");
        assert_eq!(report.expected_range, "00001 - 00004");
        assert!(!report.is_continuous);
    }

    #[test]
    fn repeated_suffixes_are_reported_as_duplicates() {
        let report = validate_sequence(&[code("00001"), code("00001"), code("00002")]);

        assert_eq!(report.duplicates, vec!["00001".to_string()]);
        assert!(report.missing.is_empty());
        assert!(report.is_continuous);
        assert_eq!(report.total_found, 3);
    }

    #[test]
    fn every_repeat_occurrence_is_flagged() {
        let report = validate_sequence(&[code("00007"), code("00007"), code("00007")]);
        assert_eq!(
            report.duplicates,
            vec!["00007".to_string(), "00007".to_string()]
        );
    }

    #[test]
    fn malformed_suffixes_are_skipped() {
        let report = validate_sequence(&[
            code("00010"),
            "20241101007P0001X".to_string(),
            "123".to_string(),
            code("00011"),
        ]);

        assert_eq!(report.total_found, 2);
        assert_eq!(report.expected_range, "00010 - 00011");
        assert!(report.is_continuous);
    }

    #[test]
    fn empty_input_yields_not_available_bounds() {
        let report = validate_sequence::<String>(&[]);

        assert_eq!(report.total_found, 0);
        assert_eq!(report.first_sequence, "N/A");
        assert_eq!(report.last_sequence, "N/A");
        assert!(report.is_continuous);
    }

    #[test]
    fn report_serializes_with_wire_field_names() {
        let report = validate_sequence(&[code("00001"), code("00003")]);
        let value = serde_json::to_value(&report).unwrap();

        assert_eq!(value["total_encontrados"], 2);
        assert_eq!(value["primer_secuencial"], "00001");
        assert_eq!(value["ultimo_secuencial"], "00003");
        assert_eq!(value["rango_esperado"], "00001 - 00003");
        assert_eq!(value["faltantes"], serde_json::json!(["00002"]));
        assert_eq!(value["duplicados"], serde_json::json!([]));
        assert_eq!(value["es_continuo"], false);
    }

    #[test]
    fn sequence_suffix_requires_five_ascii_digits() {
        assert_eq!(sequence_suffix("20241101007P00042"), Some(42));
        assert_eq!(sequence_suffix("99999"), Some(99_999));
        assert_eq!(sequence_suffix("0042"), None);
        assert_eq!(sequence_suffix("20241101007P 0042"), None);
        assert_eq!(sequence_suffix("20241101007P0004²"), None);
    }

    proptest! {
        #[test]
        fn report_ignores_input_order(
            sequences in proptest::collection::vec(0_u32..200, 0..40),
            seed in any::<u64>(),
        ) {
            let codes = sequences
                .iter()
                .map(|value| code(&pad_sequence(*value)))
                .collect::<Vec<String>>();

            let mut shuffled = codes.clone();
            let len = shuffled.len();
            if len > 1 {
                let mut state = seed;
                for index in (1..len).rev() {
                    state = state.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
                    let other = (state >> 33) as usize % (index + 1);
                    shuffled.swap(index, other);
                }
            }

            prop_assert_eq!(validate_sequence(&codes), validate_sequence(&shuffled));
        }

        #[test]
        fn consecutive_runs_are_continuous(start in 0_u32..90_000, len in 1_u32..50) {
            let codes = (start..start + len)
                .map(|value| code(&pad_sequence(value)))
                .collect::<Vec<String>>();

            let report = validate_sequence(&codes);
            prop_assert!(report.is_continuous);
            prop_assert_eq!(report.total_found, len as usize);
            prop_assert!(report.duplicates.is_empty());
        }
    }
}
