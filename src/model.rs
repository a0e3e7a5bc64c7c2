use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Book category selected by the single type letter embedded in every code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BookType {
    #[serde(rename = "P")]
    Protocolo,
    #[serde(rename = "D")]
    Diligencia,
    #[serde(rename = "C")]
    Certificaciones,
    #[serde(rename = "O")]
    Otros,
    #[serde(rename = "A")]
    Arriendos,
}

impl BookType {
    pub const ALL: [BookType; 5] = [
        Self::Protocolo,
        Self::Diligencia,
        Self::Certificaciones,
        Self::Otros,
        Self::Arriendos,
    ];

    pub fn letter(self) -> char {
        match self {
            Self::Protocolo => 'P',
            Self::Diligencia => 'D',
            Self::Certificaciones => 'C',
            Self::Otros => 'O',
            Self::Arriendos => 'A',
        }
    }

    /// Directory name used under `{output_root}/{year}/`.
    pub fn folder_name(self) -> &'static str {
        match self {
            Self::Protocolo => "PROTOCOLO",
            Self::Diligencia => "DILIGENCIA",
            Self::Certificaciones => "CERTIFICACIONES",
            Self::Otros => "OTROS",
            Self::Arriendos => "ARRIENDOS",
        }
    }

    pub fn from_letter(letter: char) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|book_type| book_type.letter() == letter.to_ascii_uppercase())
    }
}

impl fmt::Display for BookType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.letter())
    }
}

impl FromStr for BookType {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let mut chars = value.trim().chars();
        match (chars.next(), chars.next()) {
            (Some(letter), None) => Self::from_letter(letter)
                .ok_or_else(|| format!("unknown book type '{value}', expected one of P, D, C, O, A")),
            _ => Err(format!(
                "book type must be a single letter (P, D, C, O, A), got '{value}'"
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnchorSource {
    Detected,
    Manual,
}

/// Operator assertion that `code` starts on `page_index` (0-based).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManualAnchor {
    pub code: String,
    pub page_index: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeOccurrence {
    pub code: String,
    pub page_index: usize,
    pub source: AnchorSource,
}

/// Inclusive page range assigned to one code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Segment {
    pub code: String,
    pub anchor_page: usize,
    pub start_page: usize,
    pub end_page: usize,
    pub page_count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationReport {
    #[serde(rename = "total_encontrados")]
    pub total_found: usize,
    #[serde(rename = "primer_secuencial")]
    pub first_sequence: String,
    #[serde(rename = "ultimo_secuencial")]
    pub last_sequence: String,
    #[serde(rename = "rango_esperado")]
    pub expected_range: String,
    #[serde(rename = "faltantes")]
    pub missing: Vec<String>,
    #[serde(rename = "duplicados")]
    pub duplicates: Vec<String>,
    #[serde(rename = "es_continuo")]
    pub is_continuous: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageExtractionProvenance {
    pub page_index: usize,
    pub backend: String,
    pub reason: String,
    pub text_layer_char_count: usize,
    pub ocr_char_count: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessingSession {
    pub session_id: String,
    pub created_at: String,
    pub updated_at: String,
    pub input_path: String,
    pub source_sha256: String,
    pub year: u16,
    pub book_type: BookType,
    pub output_root: String,
    pub page_count: usize,
    pub page_texts: Vec<String>,
    pub codes: Vec<String>,
    pub manual_anchors: Vec<ManualAnchor>,
    pub generated_files: Vec<String>,
    pub validation: ValidationReport,
}

#[derive(Debug, Clone, Serialize)]
pub struct ToolVersions {
    pub pdftotext: Option<String>,
    pub pdftoppm: Option<String>,
    pub tesseract: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SourceInfo {
    pub path: String,
    pub sha256: String,
    pub page_count: usize,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct SplitCounts {
    pub text_layer_page_count: usize,
    pub ocr_page_count: usize,
    pub ocr_failed_page_count: usize,
    pub empty_page_count: usize,
    pub codes_detected: usize,
    pub segments: usize,
    pub files_generated: usize,
    pub unanchored_codes: usize,
    pub leading_pages: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct SplitRunManifest {
    pub manifest_version: u32,
    pub run_id: String,
    pub session_id: String,
    pub status: String,
    pub started_at: String,
    pub completed_at: String,
    pub command: String,
    pub tool_versions: ToolVersions,
    pub source: SourceInfo,
    pub year: u16,
    pub book_type: BookType,
    pub output_directory: String,
    pub counts: SplitCounts,
    pub codes: Vec<String>,
    pub segments: Vec<Segment>,
    pub generated_files: Vec<String>,
    pub unanchored_codes: Vec<String>,
    pub validation: ValidationReport,
    pub page_provenance: Vec<PageExtractionProvenance>,
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct BatchEntry {
    pub input_path: String,
    pub status: String,
    pub session_id: Option<String>,
    pub page_count: Option<usize>,
    pub codes: Vec<String>,
    pub validation: Option<ValidationReport>,
    pub generated_files: Vec<String>,
    pub unanchored_codes: Vec<String>,
    pub warnings: Vec<String>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct BatchManifest {
    pub manifest_version: u32,
    pub run_id: String,
    pub started_at: String,
    pub completed_at: String,
    pub year: u16,
    pub book_type: BookType,
    pub split: bool,
    pub document_count: usize,
    pub failed_count: usize,
    pub entries: Vec<BatchEntry>,
}

/// What `split` and `add-code` print for the caller.
#[derive(Debug, Clone, Serialize)]
pub struct SplitSummary {
    pub session_id: String,
    pub output_directory: String,
    pub codes: Vec<String>,
    pub generated_files: Vec<String>,
    pub unanchored_codes: Vec<String>,
    pub validation: ValidationReport,
}
