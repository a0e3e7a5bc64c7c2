use std::collections::BTreeSet;
use std::path::Path;

use anyhow::{Result, anyhow};
use lopdf::content::{Content, Operation};
use lopdf::{Dictionary, Document, Object, Stream, StringFormat};

use crate::cli::OcrMode;
use crate::commands::split::{ExtractionOptions, PageTextBackend};

/// Writes a PDF with one page per entry, each page drawing its label as text.
pub fn write_test_pdf(path: &Path, labels: &[String]) {
    let mut doc = Document::with_version("1.7");
    let pages_id = doc.new_object_id();

    let mut page_ids = Vec::new();
    for label in labels {
        let content = Content {
            operations: vec![
                Operation::new("BT", vec![]),
                Operation::new("Tf", vec![Object::Name(b"F1".to_vec()), Object::Integer(12)]),
                Operation::new("Td", vec![Object::Integer(72), Object::Integer(720)]),
                Operation::new(
                    "Tj",
                    vec![Object::String(
                        label.clone().into_bytes(),
                        StringFormat::Literal,
                    )],
                ),
                Operation::new("ET", vec![]),
            ],
        };
        let content_id = doc.add_object(Stream::new(
            Dictionary::new(),
            content.encode().unwrap(),
        ));

        let page = Dictionary::from_iter(vec![
            ("Type", Object::Name(b"Page".to_vec())),
            ("Parent", Object::Reference(pages_id)),
            (
                "MediaBox",
                Object::Array(vec![
                    Object::Integer(0),
                    Object::Integer(0),
                    Object::Integer(612),
                    Object::Integer(792),
                ]),
            ),
            ("Contents", Object::Reference(content_id)),
        ]);
        page_ids.push(doc.add_object(page));
    }

    let pages = Dictionary::from_iter(vec![
        ("Type", Object::Name(b"Pages".to_vec())),
        ("Count", Object::Integer(labels.len() as i64)),
        (
            "Kids",
            Object::Array(page_ids.iter().map(|id| Object::Reference(*id)).collect()),
        ),
    ]);
    doc.objects.insert(pages_id, Object::Dictionary(pages));

    let catalog = Dictionary::from_iter(vec![
        ("Type", Object::Name(b"Catalog".to_vec())),
        ("Pages", Object::Reference(pages_id)),
    ]);
    let catalog_id = doc.add_object(catalog);
    doc.trailer.set("Root", Object::Reference(catalog_id));

    doc.save(path).unwrap();
}

pub fn page_count_of(path: &Path) -> usize {
    Document::load(path).unwrap().get_pages().len()
}

/// Serves canned text per page instead of running poppler and tesseract.
#[derive(Default)]
pub struct FakeBackend {
    pub text_layer: Vec<String>,
    pub ocr_pages: Vec<String>,
    pub failing_pages: BTreeSet<usize>,
    pub ocr_unavailable: bool,
}

impl FakeBackend {
    pub fn with_text_layer(pages: Vec<String>) -> Self {
        Self {
            text_layer: pages,
            ..Self::default()
        }
    }
}

impl PageTextBackend for FakeBackend {
    fn text_layer(&self, _pdf_path: &Path) -> Result<Vec<String>> {
        Ok(self.text_layer.clone())
    }

    fn ocr_available(&self) -> bool {
        !self.ocr_unavailable
    }

    fn recognize_page(
        &self,
        _pdf_path: &Path,
        page_index: usize,
        _options: &ExtractionOptions,
    ) -> Result<String> {
        if self.failing_pages.contains(&page_index) {
            return Err(anyhow!("tesseract exited with status 1"));
        }
        Ok(self.ocr_pages.get(page_index).cloned().unwrap_or_default())
    }
}

pub fn extraction_options(ocr_mode: OcrMode) -> ExtractionOptions {
    ExtractionOptions {
        ocr_mode,
        ocr_lang: "spa".to_string(),
        min_text_chars: 50,
        ocr_dpi: 200,
        ocr_workers: 2,
    }
}

/// A page body that clears the text-layer threshold on its own.
pub fn filler(label: &str) -> String {
    format!("{label} Ante mi, notario publico, comparecen las partes y otorgan la presente escritura.")
}
