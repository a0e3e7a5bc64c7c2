use super::*;

pub fn run(args: SplitArgs) -> Result<()> {
    let started_ts = Utc::now();
    let started_at = now_utc_string();
    let run_id = format!("split-{}", utc_compact_string(started_ts));

    let manifest_dir = args.cache_root.join("manifests");
    ensure_directory(&manifest_dir)?;
    let manifest_path = args.manifest_path.clone().unwrap_or_else(|| {
        manifest_dir.join(format!("split_run_{}.json", utc_compact_string(started_ts)))
    });

    info!(
        input = %args.input.display(),
        year = args.year,
        book_type = %args.book_type,
        run_id = %run_id,
        "starting split"
    );

    let pattern = CodePattern::new(args.year, args.book_type)?;
    let options = ExtractionOptions::from(&args.ocr);
    let store = open_session_store(args.session_store, &args.cache_root)?;
    let tool_versions = collect_tool_versions();

    let source = SourcePdf::open(&args.input)?;
    info!(pages = source.page_count, sha256 = %source.sha256, "loaded source PDF");

    let analysis = analyze_document(&source, &pattern, &PopplerTesseractBackend, &options)
        .with_context(|| format!("cannot split {}", args.input.display()))?;
    let outcome = segment_and_validate(
        &source,
        &pattern,
        &args.output_root,
        &analysis.extraction.pages,
        &analysis.codes,
        &[],
    )?;

    let session = new_session(
        &source,
        &pattern,
        &args.output_root,
        analysis.extraction.pages.clone(),
        analysis.codes.clone(),
        &outcome,
    );
    store.put(&session.session_id, &session)?;
    info!(session_id = %session.session_id, "stored processing session");

    let extraction = &analysis.extraction;
    let manifest = SplitRunManifest {
        manifest_version: 1,
        run_id,
        session_id: session.session_id.clone(),
        status: "completed".to_string(),
        started_at,
        completed_at: now_utc_string(),
        command: render_split_command(&args),
        tool_versions,
        source: source.info(),
        year: args.year,
        book_type: args.book_type,
        output_directory: outcome.output_directory.display().to_string(),
        counts: SplitCounts {
            text_layer_page_count: extraction.text_layer_page_count,
            ocr_page_count: extraction.ocr_page_count,
            ocr_failed_page_count: extraction.ocr_failed_page_count,
            empty_page_count: extraction.empty_page_count,
            codes_detected: analysis.codes.len(),
            segments: outcome.segments.len(),
            files_generated: outcome.generated_files.len(),
            unanchored_codes: outcome.unanchored.len(),
            leading_pages: outcome.leading_pages,
        },
        codes: analysis.codes.clone(),
        segments: outcome.segments.clone(),
        generated_files: outcome.generated_file_strings(),
        unanchored_codes: outcome.unanchored.clone(),
        validation: outcome.validation.clone(),
        page_provenance: extraction.page_provenance.clone(),
        warnings: extraction.warnings.clone(),
    };
    write_json_pretty(&manifest_path, &manifest)?;
    info!(path = %manifest_path.display(), "wrote split run manifest");

    report_outcome(&session, &outcome, args.json)
}

/// Prints the summary as JSON, or logs it.
pub fn report_outcome(
    session: &ProcessingSession,
    outcome: &SplitOutcome,
    json: bool,
) -> Result<()> {
    if json {
        return print_json(&SplitSummary {
            session_id: session.session_id.clone(),
            output_directory: outcome.output_directory.display().to_string(),
            codes: session.codes.clone(),
            generated_files: session.generated_files.clone(),
            unanchored_codes: outcome.unanchored.clone(),
            validation: outcome.validation.clone(),
        });
    }

    let report = &outcome.validation;
    info!(
        session_id = %session.session_id,
        files = session.generated_files.len(),
        first = %report.first_sequence,
        last = %report.last_sequence,
        missing = report.missing.len(),
        duplicates = report.duplicates.len(),
        continuous = report.is_continuous,
        "split summary"
    );
    if !report.missing.is_empty() {
        warn!(missing = ?report.missing, "sequence gaps");
    }
    if !outcome.unanchored.is_empty() {
        warn!(codes = ?outcome.unanchored, "codes without an anchor page");
    }

    Ok(())
}

fn render_split_command(args: &SplitArgs) -> String {
    let mut command = vec![
        "notarial-split".to_string(),
        "split".to_string(),
        "--input".to_string(),
        args.input.display().to_string(),
        "--year".to_string(),
        args.year.to_string(),
        "--book-type".to_string(),
        args.book_type.to_string(),
        "--output-root".to_string(),
        args.output_root.display().to_string(),
        "--cache-root".to_string(),
        args.cache_root.display().to_string(),
    ];

    if let Some(path) = &args.manifest_path {
        command.push("--manifest-path".to_string());
        command.push(path.display().to_string());
    }
    command.push("--ocr-mode".to_string());
    command.push(args.ocr.ocr_mode.as_str().to_string());
    if args.ocr.ocr_mode != OcrMode::Off {
        command.push("--ocr-lang".to_string());
        command.push(args.ocr.ocr_lang.clone());
        command.push("--ocr-min-text-chars".to_string());
        command.push(args.ocr.ocr_min_text_chars.to_string());
        command.push("--ocr-dpi".to_string());
        command.push(args.ocr.ocr_dpi.to_string());
        command.push("--ocr-workers".to_string());
        command.push(args.ocr.ocr_workers.to_string());
    }

    command.join(" ")
}
