use anyhow::anyhow;

use super::*;

#[derive(Debug, Clone)]
pub struct ExtractionOptions {
    pub ocr_mode: OcrMode,
    pub ocr_lang: String,
    /// A page's text layer is used only when its stripped text is longer than this.
    pub min_text_chars: usize,
    pub ocr_dpi: u32,
    pub ocr_workers: usize,
}

impl From<&OcrArgs> for ExtractionOptions {
    fn from(args: &OcrArgs) -> Self {
        Self {
            ocr_mode: args.ocr_mode,
            ocr_lang: args.ocr_lang.clone(),
            min_text_chars: args.ocr_min_text_chars,
            ocr_dpi: args.ocr_dpi,
            ocr_workers: args.ocr_workers,
        }
    }
}

/// Source of per-page text. Implementations must be shareable across OCR worker threads.
pub trait PageTextBackend: Sync {
    /// Embedded text, one entry per page. The count may disagree with the real page count.
    fn text_layer(&self, pdf_path: &Path) -> Result<Vec<String>>;

    fn ocr_available(&self) -> bool;

    fn recognize_page(
        &self,
        pdf_path: &Path,
        page_index: usize,
        options: &ExtractionOptions,
    ) -> Result<String>;
}

/// `pdftotext` for the text layer, `pdftoppm` + `tesseract` for recognition.
pub struct PopplerTesseractBackend;

impl PageTextBackend for PopplerTesseractBackend {
    fn text_layer(&self, pdf_path: &Path) -> Result<Vec<String>> {
        run_pdftotext(pdf_path)
    }

    fn ocr_available(&self) -> bool {
        command_available("pdftoppm") && command_available("tesseract")
    }

    fn recognize_page(
        &self,
        pdf_path: &Path,
        page_index: usize,
        options: &ExtractionOptions,
    ) -> Result<String> {
        let raster = rasterize_page(pdf_path, page_index, options.ocr_dpi)?;
        run_tesseract(raster.path(), &options.ocr_lang)
    }
}

#[derive(Debug, Default, Clone)]
pub struct ExtractedPages {
    pub pages: Vec<String>,
    pub text_layer_page_count: usize,
    pub ocr_page_count: usize,
    pub ocr_failed_page_count: usize,
    pub empty_page_count: usize,
    pub page_provenance: Vec<PageExtractionProvenance>,
    pub warnings: Vec<String>,
}

impl ExtractedPages {
    /// All pages in order, the input for document-wide code discovery.
    pub fn joined_text(&self) -> String {
        self.pages.join("\n")
    }
}

fn stripped_char_count(text: &str) -> usize {
    text.trim().chars().count()
}

/// Builds one text per page, choosing text layer or OCR page by page.
///
/// Never fails: a page whose recognition fails becomes empty text and a warning.
pub fn extract_pages(
    pdf_path: &Path,
    page_count: usize,
    backend: &dyn PageTextBackend,
    options: &ExtractionOptions,
) -> ExtractedPages {
    let mut warnings = Vec::new();

    let mut pages = match backend.text_layer(pdf_path) {
        Ok(pages) => pages,
        Err(error) => {
            warn!(pdf = %pdf_path.display(), error = %error, "text layer unavailable");
            warnings.push(format!(
                "text layer unavailable for {}: {error:#}",
                pdf_path.display()
            ));
            Vec::new()
        }
    };
    pages.resize(page_count, String::new());

    let mut extraction = ExtractedPages {
        page_provenance: pages
            .iter()
            .enumerate()
            .map(|(page_index, page)| {
                let chars = stripped_char_count(page);
                PageExtractionProvenance {
                    page_index,
                    backend: "text_layer".to_string(),
                    reason: if chars == 0 {
                        "text_layer_empty".to_string()
                    } else {
                        "text_layer_default".to_string()
                    },
                    text_layer_char_count: chars,
                    ocr_char_count: None,
                }
            })
            .collect(),
        pages,
        warnings,
        ..ExtractedPages::default()
    };

    let candidates = collect_ocr_candidates(
        &extraction.pages,
        options.ocr_mode,
        options.min_text_chars,
    );
    extraction.text_layer_page_count = page_count - candidates.len();

    if candidates.is_empty() {
        return finish_extraction(extraction, pdf_path);
    }

    if !backend.ocr_available() {
        let message = format!(
            "OCR mode '{}' needs recognition for {} pages of {} but pdftoppm/tesseract are unavailable",
            options.ocr_mode.as_str(),
            candidates.len(),
            pdf_path.display()
        );
        warn!(
            pages = candidates.len(),
            "OCR tooling unavailable, low-text pages keep their text layer"
        );
        for &page_index in &candidates {
            if extraction.page_provenance[page_index].text_layer_char_count > 0 {
                keep_text_layer(&mut extraction, page_index, "ocr_unavailable_text_layer_fallback");
            } else {
                degrade_page(&mut extraction, page_index, "ocr_unavailable");
            }
        }
        extraction.warnings.push(message);
        return finish_extraction(extraction, pdf_path);
    }

    for (page_index, result) in recognize_pages(pdf_path, &candidates, backend, options) {
        match result {
            Ok(ocr_text) => {
                let ocr_chars = stripped_char_count(&ocr_text);
                let text_layer_chars = extraction.page_provenance[page_index].text_layer_char_count;

                if ocr_chars == 0 && text_layer_chars > 0 {
                    keep_text_layer(&mut extraction, page_index, "ocr_empty_text_layer_fallback");
                    extraction.page_provenance[page_index].ocr_char_count = Some(0);
                    continue;
                }

                extraction.pages[page_index] = ocr_text;
                extraction.ocr_page_count += 1;

                let entry = &mut extraction.page_provenance[page_index];
                entry.backend = "ocr".to_string();
                entry.reason = if matches!(options.ocr_mode, OcrMode::Force) {
                    "ocr_force_mode".to_string()
                } else {
                    "ocr_auto_low_text".to_string()
                };
                entry.ocr_char_count = Some(ocr_chars);
            }
            Err(error) => {
                warn!(
                    pdf = %pdf_path.display(),
                    page = page_index,
                    error = %error,
                    "OCR failed, page left empty"
                );
                extraction.warnings.push(format!(
                    "OCR failed for {} page {}: {error:#}",
                    pdf_path.display(),
                    page_index
                ));
                degrade_page(&mut extraction, page_index, "ocr_failed");
            }
        }
    }

    finish_extraction(extraction, pdf_path)
}

fn keep_text_layer(extraction: &mut ExtractedPages, page_index: usize, reason: &str) {
    extraction.text_layer_page_count += 1;
    extraction.page_provenance[page_index].reason = reason.to_string();
}

fn degrade_page(extraction: &mut ExtractedPages, page_index: usize, reason: &str) {
    extraction.pages[page_index].clear();
    extraction.ocr_failed_page_count += 1;

    let entry = &mut extraction.page_provenance[page_index];
    entry.backend = "none".to_string();
    entry.reason = reason.to_string();
}

fn finish_extraction(mut extraction: ExtractedPages, pdf_path: &Path) -> ExtractedPages {
    extraction.empty_page_count = extraction
        .pages
        .iter()
        .filter(|page| stripped_char_count(page) == 0)
        .count();

    info!(
        pdf = %pdf_path.display(),
        pages = extraction.pages.len(),
        text_layer = extraction.text_layer_page_count,
        ocr = extraction.ocr_page_count,
        ocr_failed = extraction.ocr_failed_page_count,
        empty = extraction.empty_page_count,
        "text extraction completed"
    );

    extraction
}

/// 0-based indices of the pages that need recognition.
pub fn collect_ocr_candidates(
    pages: &[String],
    ocr_mode: OcrMode,
    min_text_chars: usize,
) -> Vec<usize> {
    match ocr_mode {
        OcrMode::Off => Vec::new(),
        OcrMode::Force => (0..pages.len()).collect(),
        OcrMode::Auto => pages
            .iter()
            .enumerate()
            .filter_map(|(index, page)| {
                if stripped_char_count(page) > min_text_chars {
                    None
                } else {
                    Some(index)
                }
            })
            .collect(),
    }
}

/// Runs recognition on a bounded set of scoped worker threads. Output order is unspecified;
/// callers place results by page index.
fn recognize_pages(
    pdf_path: &Path,
    candidates: &[usize],
    backend: &dyn PageTextBackend,
    options: &ExtractionOptions,
) -> Vec<(usize, Result<String>)> {
    let workers = options.ocr_workers.clamp(1, candidates.len().max(1));
    if workers == 1 {
        return candidates
            .iter()
            .map(|&page_index| {
                (
                    page_index,
                    backend.recognize_page(pdf_path, page_index, options),
                )
            })
            .collect();
    }

    let chunk_size = candidates.len().div_ceil(workers);
    std::thread::scope(|scope| {
        let handles = candidates
            .chunks(chunk_size)
            .map(|chunk| {
                let handle = scope.spawn(move || {
                    chunk
                        .iter()
                        .map(|&page_index| {
                            (
                                page_index,
                                backend.recognize_page(pdf_path, page_index, options),
                            )
                        })
                        .collect::<Vec<_>>()
                });
                (chunk, handle)
            })
            .collect::<Vec<_>>();

        handles
            .into_iter()
            .flat_map(|(chunk, handle)| match handle.join() {
                Ok(results) => results,
                Err(_) => chunk
                    .iter()
                    .map(|&page_index| (page_index, Err(anyhow!("OCR worker panicked"))))
                    .collect(),
            })
            .collect()
    })
}
