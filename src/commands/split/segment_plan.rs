use super::*;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AnchorScan {
    /// Sorted by page.
    pub anchors: Vec<CodeOccurrence>,
    /// Target codes never found, in target order.
    pub unanchored: Vec<String>,
}

/// Finds the first page of every target code.
///
/// Manual anchors are placed first and their pages are claimed. The remaining pages are scanned
/// in order; each page claims at most one code, the first not-yet-located target (in `codes`
/// order) whose normalized form the normalized page contains. A located code never moves, and a
/// code first mentioned on a manually claimed page stays unanchored.
pub fn locate_anchors(
    pages: &[String],
    codes: &[String],
    manual_anchors: &[ManualAnchor],
) -> AnchorScan {
    let mut located = HashMap::<String, CodeOccurrence>::new();
    let mut claimed_pages = HashSet::<usize>::new();

    for anchor in manual_anchors {
        if anchor.page_index >= pages.len()
            || located.contains_key(&anchor.code)
            || !claimed_pages.insert(anchor.page_index)
        {
            continue;
        }
        located.insert(
            anchor.code.clone(),
            CodeOccurrence {
                code: anchor.code.clone(),
                page_index: anchor.page_index,
                source: AnchorSource::Manual,
            },
        );
    }

    let mut pending = codes
        .iter()
        .filter(|code| !located.contains_key(*code))
        .map(|code| (code.clone(), normalize_ocr_text(code)))
        .collect::<Vec<(String, String)>>();

    for (page_index, page_text) in pages.iter().enumerate() {
        if pending.is_empty() {
            break;
        }
        let normalized = normalize_ocr_text(page_text);
        if claimed_pages.contains(&page_index) {
            // A code whose first mention sits on a manual page lost that page; later mentions
            // are references and must not become its anchor.
            pending.retain(|(code, needle)| {
                let displaced = normalized.contains(needle.as_str());
                if displaced {
                    warn!(code = %code, page = page_index, "anchor page taken by a manual code");
                }
                !displaced
            });
            continue;
        }

        let Some(position) = pending
            .iter()
            .position(|(_, needle)| normalized.contains(needle.as_str()))
        else {
            continue;
        };

        let (code, _) = pending.remove(position);
        claimed_pages.insert(page_index);
        located.insert(
            code.clone(),
            CodeOccurrence {
                code,
                page_index,
                source: AnchorSource::Detected,
            },
        );
    }

    let mut unanchored = Vec::new();
    let mut seen = HashSet::new();
    for code in codes {
        if !located.contains_key(code) && seen.insert(code.as_str()) {
            unanchored.push(code.clone());
        }
    }

    let mut anchors = located.into_values().collect::<Vec<CodeOccurrence>>();
    anchors.sort_by_key(|occurrence| occurrence.page_index);

    AnchorScan {
        anchors,
        unanchored,
    }
}

/// Turns anchors into segments covering `[0, total_pages - 1]` without gaps or overlaps.
///
/// Each segment runs from its anchor to the page before the next anchor; the last one runs to
/// the end of the document. Pages before the first anchor are folded into the first segment.
pub fn plan_segments(anchors: &[CodeOccurrence], total_pages: usize) -> Vec<Segment> {
    let mut ordered = anchors
        .iter()
        .filter(|occurrence| occurrence.page_index < total_pages)
        .collect::<Vec<&CodeOccurrence>>();
    ordered.sort_by_key(|occurrence| occurrence.page_index);
    ordered.dedup_by_key(|occurrence| occurrence.page_index);

    ordered
        .iter()
        .enumerate()
        .map(|(index, occurrence)| {
            let start_page = if index == 0 { 0 } else { occurrence.page_index };
            let end_page = ordered
                .get(index + 1)
                .map(|next| next.page_index - 1)
                .unwrap_or(total_pages - 1);

            Segment {
                code: occurrence.code.clone(),
                anchor_page: occurrence.page_index,
                start_page,
                end_page,
                page_count: end_page - start_page + 1,
            }
        })
        .collect()
}

/// Pages folded into the first segment because no code was found on them.
pub fn leading_page_count(segments: &[Segment]) -> usize {
    segments
        .first()
        .map(|segment| segment.anchor_page - segment.start_page)
        .unwrap_or(0)
}
