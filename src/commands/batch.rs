use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use chrono::Utc;
use tracing::{info, warn};

use crate::cli::BatchArgs;
use crate::commands::split::{
    CodePattern, ExtractionOptions, PageTextBackend, PopplerTesseractBackend, SourcePdf,
    analyze_document, new_session, segment_and_validate,
};
use crate::commands::validate::validate_sequence;
use crate::model::{BatchEntry, BatchManifest, ProcessingSession};
use crate::session::open_session_store;
use crate::util::{ensure_directory, now_utc_string, utc_compact_string, write_json_pretty};

pub fn run(args: BatchArgs) -> Result<()> {
    let started_ts = Utc::now();
    let started_at = now_utc_string();
    let run_id = format!("batch-{}", utc_compact_string(started_ts));

    let inputs = collect_inputs(&args.inputs, args.input_dir.as_deref())?;
    if inputs.is_empty() {
        bail!("no PDF inputs, pass --input or --input-dir");
    }

    let manifest_dir = args.cache_root.join("manifests");
    ensure_directory(&manifest_dir)?;
    let manifest_path = args.manifest_path.clone().unwrap_or_else(|| {
        manifest_dir.join(format!("batch_run_{}.json", utc_compact_string(started_ts)))
    });

    let pattern = CodePattern::new(args.year, args.book_type)?;
    let options = ExtractionOptions::from(&args.ocr);
    let store = open_session_store(args.session_store, &args.cache_root)?;
    let output_root = args.split.then_some(args.output_root.as_path());

    info!(
        run_id = %run_id,
        documents = inputs.len(),
        jobs = args.jobs,
        split = args.split,
        pattern = %pattern.describe(),
        "starting batch"
    );

    let processed = process_documents(
        &inputs,
        &pattern,
        &PopplerTesseractBackend,
        &options,
        output_root,
        args.jobs,
    );

    if args.split {
        for (code, paths) in code_collisions(&processed) {
            warn!(
                code = %code,
                inputs = ?paths,
                "code found in several documents, its output file was overwritten"
            );
        }
    }

    let mut entries = Vec::with_capacity(processed.len());
    for document in processed {
        if let Some(session) = &document.session {
            store.put(&session.session_id, session)?;
        }
        entries.push(document.entry);
    }

    let failed_count = entries
        .iter()
        .filter(|entry| entry.status != "ok")
        .count();
    let manifest = BatchManifest {
        manifest_version: 1,
        run_id,
        started_at,
        completed_at: now_utc_string(),
        year: args.year,
        book_type: args.book_type,
        split: args.split,
        document_count: entries.len(),
        failed_count,
        entries,
    };
    write_json_pretty(&manifest_path, &manifest)?;

    info!(
        path = %manifest_path.display(),
        documents = manifest.document_count,
        failed = failed_count,
        "wrote batch manifest"
    );

    Ok(())
}

/// Explicit inputs first, then the PDFs of `input_dir` sorted by path.
pub fn collect_inputs(inputs: &[PathBuf], input_dir: Option<&Path>) -> Result<Vec<PathBuf>> {
    let mut collected = inputs.to_vec();
    if let Some(dir) = input_dir {
        let mut discovered = discover_pdfs(dir)?;
        discovered.sort();
        for path in discovered {
            if !collected.contains(&path) {
                collected.push(path);
            }
        }
    }
    Ok(collected)
}

fn discover_pdfs(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut pdfs = Vec::new();

    let entries = fs::read_dir(dir).with_context(|| format!("failed to read {}", dir.display()))?;

    for entry in entries {
        let entry = entry.with_context(|| format!("failed to read entry in {}", dir.display()))?;
        let path = entry.path();

        if !entry
            .file_type()
            .with_context(|| format!("failed to inspect file type: {}", path.display()))?
            .is_file()
        {
            continue;
        }

        let is_pdf = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.eq_ignore_ascii_case("pdf"))
            .unwrap_or(false);

        if is_pdf {
            pdfs.push(path);
        }
    }

    Ok(pdfs)
}

#[derive(Debug)]
pub struct ProcessedDocument {
    pub entry: BatchEntry,
    pub session: Option<ProcessingSession>,
}

/// Processes every input independently on up to `jobs` scoped threads.
///
/// Output follows input order. A failing document becomes an `error` entry and never stops the
/// others.
pub fn process_documents(
    inputs: &[PathBuf],
    pattern: &CodePattern,
    backend: &dyn PageTextBackend,
    options: &ExtractionOptions,
    output_root: Option<&Path>,
    jobs: usize,
) -> Vec<ProcessedDocument> {
    let process = |path: &PathBuf| {
        process_document(path, pattern, backend, options, output_root)
            .unwrap_or_else(|err| failed_document(path, &err))
    };

    let jobs = jobs.clamp(1, inputs.len().max(1));
    if jobs == 1 {
        return inputs.iter().map(process).collect();
    }

    let chunk_size = inputs.len().div_ceil(jobs);
    std::thread::scope(|scope| {
        let handles = inputs
            .chunks(chunk_size)
            .map(|chunk| {
                let handle = scope.spawn(move || chunk.iter().map(process).collect::<Vec<_>>());
                (chunk, handle)
            })
            .collect::<Vec<_>>();

        handles
            .into_iter()
            .flat_map(|(chunk, handle)| match handle.join() {
                Ok(documents) => documents,
                Err(_) => chunk
                    .iter()
                    .map(|path| failed_document(path, &anyhow::anyhow!("batch worker panicked")))
                    .collect(),
            })
            .collect()
    })
}

fn process_document(
    path: &Path,
    pattern: &CodePattern,
    backend: &dyn PageTextBackend,
    options: &ExtractionOptions,
    output_root: Option<&Path>,
) -> Result<ProcessedDocument> {
    let source = SourcePdf::open(path)?;
    let analysis = analyze_document(&source, pattern, backend, options)?;

    let mut entry = BatchEntry {
        input_path: path.display().to_string(),
        status: "ok".to_string(),
        session_id: None,
        page_count: Some(source.page_count),
        codes: analysis.codes.clone(),
        validation: None,
        generated_files: Vec::new(),
        unanchored_codes: Vec::new(),
        warnings: analysis.extraction.warnings.clone(),
        error: None,
    };

    let Some(output_root) = output_root else {
        entry.validation = Some(validate_sequence(&analysis.codes));
        return Ok(ProcessedDocument {
            entry,
            session: None,
        });
    };

    let outcome = segment_and_validate(
        &source,
        pattern,
        output_root,
        &analysis.extraction.pages,
        &analysis.codes,
        &[],
    )?;
    let session = new_session(
        &source,
        pattern,
        output_root,
        analysis.extraction.pages,
        analysis.codes,
        &outcome,
    );

    entry.session_id = Some(session.session_id.clone());
    entry.validation = Some(outcome.validation.clone());
    entry.generated_files = outcome.generated_file_strings();
    entry.unanchored_codes = outcome.unanchored;

    Ok(ProcessedDocument {
        entry,
        session: Some(session),
    })
}

fn failed_document(path: &Path, err: &anyhow::Error) -> ProcessedDocument {
    warn!(pdf = %path.display(), error = %format!("{err:#}"), "document failed");
    ProcessedDocument {
        entry: BatchEntry {
            input_path: path.display().to_string(),
            status: "error".to_string(),
            session_id: None,
            page_count: None,
            codes: Vec::new(),
            validation: None,
            generated_files: Vec::new(),
            unanchored_codes: Vec::new(),
            warnings: Vec::new(),
            error: Some(format!("{err:#}")),
        },
        session: None,
    }
}

/// Codes detected in more than one document, with the documents that carry them.
pub fn code_collisions(documents: &[ProcessedDocument]) -> BTreeMap<String, Vec<String>> {
    let mut owners = BTreeMap::<String, Vec<String>>::new();
    for document in documents {
        for code in &document.entry.codes {
            owners
                .entry(code.clone())
                .or_default()
                .push(document.entry.input_path.clone());
        }
    }
    owners.retain(|_, paths| paths.len() > 1);
    owners
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    use super::*;
    use crate::cli::OcrMode;
    use crate::model::BookType;
    use crate::test_support::{FakeBackend, extraction_options, filler, write_test_pdf};

    fn book(dir: &Path, name: &str, texts: &[String]) -> PathBuf {
        let path = dir.join(name);
        write_test_pdf(&path, texts);
        path
    }

    fn three_page_texts() -> Vec<String> {
        vec![
            filler("20241101007P00001"),
            filler("continuacion"),
            filler("20241101007P00002"),
        ]
    }

    #[test]
    fn directory_inputs_are_sorted_and_filtered() {
        let dir = TempDir::new().unwrap();
        for name in ["b.PDF", "a.pdf", "notes.txt"] {
            fs::write(dir.path().join(name), b"x").unwrap();
        }
        fs::create_dir(dir.path().join("nested.pdf")).unwrap();

        let explicit = vec![dir.path().join("b.PDF")];
        let inputs = collect_inputs(&explicit, Some(dir.path())).unwrap();

        assert_eq!(
            inputs,
            vec![dir.path().join("b.PDF"), dir.path().join("a.pdf")]
        );
    }

    #[test]
    fn failing_document_does_not_stop_the_batch() {
        let dir = TempDir::new().unwrap();
        let good = book(dir.path(), "libro1.pdf", &three_page_texts());
        let broken = dir.path().join("roto.pdf");
        fs::write(&broken, b"not a pdf").unwrap();

        let pattern = CodePattern::new(2024, BookType::Protocolo).unwrap();
        let backend = FakeBackend::with_text_layer(three_page_texts());
        let documents = process_documents(
            &[broken.clone(), good.clone()],
            &pattern,
            &backend,
            &extraction_options(OcrMode::Off),
            None,
            2,
        );

        assert_eq!(documents.len(), 2);
        assert_eq!(documents[0].entry.status, "error");
        assert!(documents[0].entry.error.is_some());
        assert_eq!(documents[1].entry.status, "ok");
        assert_eq!(documents[1].entry.page_count, Some(3));
        assert_eq!(
            documents[1].entry.codes,
            vec![
                "20241101007P00001".to_string(),
                "20241101007P00002".to_string()
            ]
        );
        assert!(documents[1].entry.validation.as_ref().unwrap().is_continuous);
        assert!(documents[1].session.is_none());
    }

    #[test]
    fn split_mode_writes_files_and_sessions() {
        let dir = TempDir::new().unwrap();
        let input = book(dir.path(), "libro1.pdf", &three_page_texts());
        let output_root = dir.path().join("processed");

        let pattern = CodePattern::new(2024, BookType::Protocolo).unwrap();
        let backend = FakeBackend::with_text_layer(three_page_texts());
        let documents = process_documents(
            &[input],
            &pattern,
            &backend,
            &extraction_options(OcrMode::Off),
            Some(&output_root),
            4,
        );

        let document = &documents[0];
        assert_eq!(document.entry.generated_files.len(), 2);
        let session = document.session.as_ref().unwrap();
        assert_eq!(document.entry.session_id.as_deref(), Some(session.session_id.as_str()));
        assert!(
            output_root
                .join("2024/PROTOCOLO/20241101007P00002.pdf")
                .is_file()
        );
    }

    #[test]
    fn shared_codes_across_documents_are_reported() {
        let dir = TempDir::new().unwrap();
        let first = book(dir.path(), "libro1.pdf", &three_page_texts());
        let second = book(dir.path(), "libro2.pdf", &three_page_texts());

        let pattern = CodePattern::new(2024, BookType::Protocolo).unwrap();
        let backend = FakeBackend::with_text_layer(three_page_texts());
        let documents = process_documents(
            &[first.clone(), second.clone()],
            &pattern,
            &backend,
            &extraction_options(OcrMode::Off),
            None,
            1,
        );

        let collisions = code_collisions(&documents);
        assert_eq!(collisions.len(), 2);
        assert_eq!(
            collisions["20241101007P00001"],
            vec![first.display().to_string(), second.display().to_string()]
        );
    }
}
