use super::*;

/// Source document loaded once per run; its pages are the only input to segmentation.
pub struct SourcePdf {
    pub path: PathBuf,
    pub document: Document,
    pub page_count: usize,
    pub sha256: String,
}

impl SourcePdf {
    pub fn open(path: &Path) -> Result<Self, SplitError> {
        let sha256 = sha256_file(path).map_err(|source| SplitError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let document = Document::load(path).map_err(|source| SplitError::LoadPdf {
            path: path.to_path_buf(),
            source,
        })?;
        let page_count = document.get_pages().len();

        Ok(Self {
            path: path.to_path_buf(),
            document,
            page_count,
            sha256,
        })
    }

    pub fn info(&self) -> SourceInfo {
        SourceInfo {
            path: self.path.display().to_string(),
            sha256: self.sha256.clone(),
            page_count: self.page_count,
        }
    }
}

#[derive(Debug)]
pub struct DocumentAnalysis {
    pub extraction: ExtractedPages,
    pub codes: Vec<String>,
}

/// Extracts every page once and discovers the codes over the ordered concatenation.
pub fn analyze_document(
    source: &SourcePdf,
    pattern: &CodePattern,
    backend: &dyn PageTextBackend,
    options: &ExtractionOptions,
) -> Result<DocumentAnalysis, SplitError> {
    let extraction = extract_pages(&source.path, source.page_count, backend, options);
    let codes = pattern.find_codes(&extraction.joined_text());

    if codes.is_empty() {
        return Err(SplitError::NoCodesFound {
            path: source.path.clone(),
            year: pattern.year(),
            book_type: pattern.book_type().letter(),
        });
    }

    info!(
        pdf = %source.path.display(),
        codes = codes.len(),
        pattern = %pattern.describe(),
        "codes detected"
    );
    log_sequence_gaps(pattern, &codes);

    Ok(DocumentAnalysis { extraction, codes })
}

fn log_sequence_gaps(pattern: &CodePattern, codes: &[String]) {
    let report = validate_sequence(codes);
    if report.missing.is_empty() {
        return;
    }

    let preview = report
        .missing
        .iter()
        .take(10)
        .map(|sequence| pattern.code_for_sequence(sequence))
        .collect::<Vec<String>>();
    warn!(
        missing = report.missing.len(),
        first_missing = ?preview,
        "detected codes are not contiguous"
    );
}

#[derive(Debug, Clone)]
pub struct SplitOutcome {
    pub output_directory: PathBuf,
    pub segments: Vec<Segment>,
    pub generated_files: Vec<PathBuf>,
    pub unanchored: Vec<String>,
    pub leading_pages: usize,
    pub validation: ValidationReport,
}

impl SplitOutcome {
    pub fn generated_file_strings(&self) -> Vec<String> {
        self.generated_files
            .iter()
            .map(|path| path.display().to_string())
            .collect()
    }
}

/// Anchors `codes` against the retained page text, writes one PDF per segment into
/// `{output_root}/{year}/{TYPE_NAME}` and validates the full code list.
pub fn segment_and_validate(
    source: &SourcePdf,
    pattern: &CodePattern,
    output_root: &Path,
    page_texts: &[String],
    codes: &[String],
    manual_anchors: &[ManualAnchor],
) -> Result<SplitOutcome, SplitError> {
    let scan = locate_anchors(page_texts, codes, manual_anchors);
    for code in &scan.unanchored {
        warn!(code = %code, "code has no anchor page, excluded from split");
    }

    let segments = plan_segments(&scan.anchors, source.page_count);
    let leading_pages = leading_page_count(&segments);
    if leading_pages > 0 {
        warn!(
            pages = leading_pages,
            "pages before the first code were added to the first segment"
        );
    }

    let output_dir = output_directory(output_root, pattern.year(), pattern.book_type());
    let generated_files = write_segments(&source.document, &segments, &output_dir)?;
    let validation = validate_sequence(codes);

    info!(
        segments = segments.len(),
        unanchored = scan.unanchored.len(),
        continuous = validation.is_continuous,
        "split completed"
    );

    Ok(SplitOutcome {
        output_directory: output_dir,
        segments,
        generated_files,
        unanchored: scan.unanchored,
        leading_pages,
        validation,
    })
}

pub fn new_session(
    source: &SourcePdf,
    pattern: &CodePattern,
    output_root: &Path,
    page_texts: Vec<String>,
    codes: Vec<String>,
    outcome: &SplitOutcome,
) -> ProcessingSession {
    let now = now_utc_string();
    ProcessingSession {
        session_id: uuid::Uuid::new_v4().to_string(),
        created_at: now.clone(),
        updated_at: now,
        input_path: source.path.display().to_string(),
        source_sha256: source.sha256.clone(),
        year: pattern.year(),
        book_type: pattern.book_type(),
        output_root: output_root.display().to_string(),
        page_count: source.page_count,
        page_texts,
        codes,
        manual_anchors: Vec::new(),
        generated_files: outcome.generated_file_strings(),
        validation: outcome.validation.clone(),
    }
}
