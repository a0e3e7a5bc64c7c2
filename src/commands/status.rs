use anyhow::Result;
use tracing::{info, warn};

use crate::cli::{SessionBackend, StatusArgs};
use crate::session::{SessionStore, open_session_store};

pub fn run(args: StatusArgs) -> Result<()> {
    let db_path = args.cache_root.join("sessions.sqlite");
    info!(cache_root = %args.cache_root.display(), session_id = %args.session_id, "status requested");

    if !db_path.exists() {
        warn!(path = %db_path.display(), "session database missing");
        return Ok(());
    }

    let store = open_session_store(SessionBackend::Sqlite, &args.cache_root)?;
    report_session(store.as_ref(), &args.session_id)?;

    if args.discard {
        if store.remove(&args.session_id)? {
            info!(session_id = %args.session_id, "session discarded");
        } else {
            warn!(session_id = %args.session_id, "nothing to discard");
        }
    }

    Ok(())
}

fn report_session(store: &dyn SessionStore, session_id: &str) -> Result<()> {
    let Some(session) = store.get(session_id)? else {
        warn!(session_id = %session_id, "session not found");
        return Ok(());
    };

    info!(
        session_id = %session.session_id,
        input = %session.input_path,
        sha256 = %session.source_sha256,
        year = session.year,
        book_type = %session.book_type,
        folder = session.book_type.folder_name(),
        pages = session.page_count,
        codes = session.codes.len(),
        manual_anchors = session.manual_anchors.len(),
        files = session.generated_files.len(),
        created_at = %session.created_at,
        updated_at = %session.updated_at,
        "loaded session"
    );

    let report = &session.validation;
    info!(
        range = %report.expected_range,
        missing = report.missing.len(),
        duplicates = report.duplicates.len(),
        continuous = report.is_continuous,
        "session validation"
    );
    for anchor in &session.manual_anchors {
        info!(code = %anchor.code, page = anchor.page_index, "manual anchor");
    }

    Ok(())
}
