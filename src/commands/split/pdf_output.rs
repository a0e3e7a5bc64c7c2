use super::*;

/// `{output_root}/{year}/{TYPE_NAME}`.
pub fn output_directory(output_root: &Path, year: u16, book_type: BookType) -> PathBuf {
    output_root
        .join(year.to_string())
        .join(book_type.folder_name())
}

/// Copy of `source` that keeps only the inclusive 0-based range `start..=end`, in original order.
pub fn extract_page_range(source: &Document, start_page: usize, end_page: usize) -> Document {
    let mut document = source.clone();

    let page_numbers = document.get_pages().into_keys().collect::<Vec<u32>>();
    let to_delete = page_numbers
        .iter()
        .enumerate()
        .filter(|(page_index, _)| *page_index < start_page || *page_index > end_page)
        .map(|(_, page_number)| *page_number)
        .collect::<Vec<u32>>();

    if !to_delete.is_empty() {
        document.delete_pages(&to_delete);
    }
    document.prune_objects();
    document.compress();
    document
}

/// Writes one `{code}.pdf` per segment and returns the paths in segment order.
pub fn write_segments(
    source: &Document,
    segments: &[Segment],
    output_dir: &Path,
) -> Result<Vec<PathBuf>, SplitError> {
    fs::create_dir_all(output_dir).map_err(|source| SplitError::Io {
        path: output_dir.to_path_buf(),
        source,
    })?;

    let mut generated = Vec::with_capacity(segments.len());
    for segment in segments {
        let path = output_dir.join(format!("{}.pdf", segment.code));
        let mut document = extract_page_range(source, segment.start_page, segment.end_page);
        document
            .save(&path)
            .map_err(|source| SplitError::WriteSegment {
                code: segment.code.clone(),
                path: path.clone(),
                source,
            })?;

        info!(
            code = %segment.code,
            start = segment.start_page,
            end = segment.end_page,
            pages = segment.page_count,
            path = %path.display(),
            "segment written"
        );
        generated.push(path);
    }

    Ok(generated)
}
