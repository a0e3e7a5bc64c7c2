use std::collections::{HashMap, HashSet};
use std::path::Path;

use anyhow::{Context, Result, bail};
use tracing::{info, warn};

use crate::cli::{AddCodeArgs, SessionBackend};
use crate::commands::split::{
    CodePattern, SourcePdf, SplitOutcome, report_outcome, segment_and_validate,
};
use crate::error::SplitError;
use crate::model::{ManualAnchor, ProcessingSession};
use crate::session::open_session_store;
use crate::util::now_utc_string;

pub fn run(args: AddCodeArgs) -> Result<()> {
    if args.codes.len() != args.pages.len() {
        bail!(
            "every --code needs a matching --page ({} codes, {} pages)",
            args.codes.len(),
            args.pages.len()
        );
    }

    let store = open_session_store(SessionBackend::Sqlite, &args.cache_root)?;
    let session = store
        .get(&args.session_id)?
        .ok_or_else(|| SplitError::SessionNotFound(args.session_id.clone()))?;

    let manual = args
        .codes
        .iter()
        .zip(&args.pages)
        .map(|(code, page_index)| ManualAnchor {
            code: code.trim().to_string(),
            page_index: *page_index,
        })
        .collect::<Vec<ManualAnchor>>();

    let merged = merge_manual_codes(&session, &manual)
        .with_context(|| format!("cannot add codes to session {}", session.session_id))?;

    let updated = merged.apply_to(&session);
    store.put(&updated.session_id, &updated)?;
    info!(
        session_id = %updated.session_id,
        added = manual.len(),
        codes = updated.codes.len(),
        "session updated with manual codes"
    );

    report_outcome(&updated, &merged.outcome, args.json)
}

/// Result of a successful merge, not yet committed to any session.
#[derive(Debug)]
pub struct MergeOutcome {
    pub codes: Vec<String>,
    pub manual_anchors: Vec<ManualAnchor>,
    pub outcome: SplitOutcome,
    /// Files of the previous split that this one no longer produces. They stay on disk.
    pub stale_files: Vec<String>,
}

impl MergeOutcome {
    pub fn apply_to(&self, session: &ProcessingSession) -> ProcessingSession {
        ProcessingSession {
            updated_at: now_utc_string(),
            codes: self.codes.clone(),
            manual_anchors: self.manual_anchors.clone(),
            generated_files: self.outcome.generated_file_strings(),
            validation: self.outcome.validation.clone(),
            ..session.clone()
        }
    }
}

/// Appends operator codes to the session's list and re-segments with every manual anchor pinned
/// to its declared page.
///
/// All checks run before the source is touched, so a rejected batch leaves files and session as
/// they were.
pub fn merge_manual_codes(
    session: &ProcessingSession,
    manual: &[ManualAnchor],
) -> Result<MergeOutcome> {
    let pattern = CodePattern::new(session.year, session.book_type)?;
    check_manual_anchors(session, &pattern, manual)?;

    let input_path = Path::new(&session.input_path);
    let source = SourcePdf::open(input_path)?;
    if source.sha256 != session.source_sha256 {
        return Err(SplitError::SourceChanged {
            path: input_path.to_path_buf(),
        }
        .into());
    }

    let mut codes = session.codes.clone();
    codes.extend(manual.iter().map(|anchor| anchor.code.clone()));

    let mut manual_anchors = session.manual_anchors.clone();
    manual_anchors.extend_from_slice(manual);

    let outcome = segment_and_validate(
        &source,
        &pattern,
        Path::new(&session.output_root),
        &session.page_texts,
        &codes,
        &manual_anchors,
    )?;

    let produced = outcome.generated_file_strings();
    let stale_files = session
        .generated_files
        .iter()
        .filter(|path| !produced.contains(path))
        .cloned()
        .collect::<Vec<String>>();
    for path in &stale_files {
        warn!(path = %path, "file from the previous split is no longer produced, left on disk");
    }

    Ok(MergeOutcome {
        codes,
        manual_anchors,
        outcome,
        stale_files,
    })
}

fn check_manual_anchors(
    session: &ProcessingSession,
    pattern: &CodePattern,
    manual: &[ManualAnchor],
) -> Result<(), SplitError> {
    let mut known = session
        .codes
        .iter()
        .map(String::as_str)
        .collect::<HashSet<&str>>();
    let mut claimed = session
        .manual_anchors
        .iter()
        .map(|anchor| (anchor.page_index, anchor.code.as_str()))
        .collect::<HashMap<usize, &str>>();

    for anchor in manual {
        if !known.insert(anchor.code.as_str()) {
            return Err(SplitError::DuplicateManualCode(anchor.code.clone()));
        }
        if !pattern.matches(&anchor.code) {
            return Err(SplitError::MalformedManualCode {
                code: anchor.code.clone(),
                expected: pattern.describe(),
            });
        }
        if anchor.page_index >= session.page_count {
            return Err(SplitError::ManualPageOutOfRange {
                code: anchor.code.clone(),
                page_index: anchor.page_index,
                page_count: session.page_count,
            });
        }
        if let Some(existing) = claimed.insert(anchor.page_index, anchor.code.as_str()) {
            return Err(SplitError::ManualPageConflict {
                code: anchor.code.clone(),
                existing: existing.to_string(),
                page_index: anchor.page_index,
            });
        }
    }

    Ok(())
}
