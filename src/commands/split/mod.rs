use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use anyhow::{Context, Result, bail};
use chrono::Utc;
use lopdf::Document;
use regex::Regex;
use tracing::{info, warn};

use crate::cli::{OcrArgs, OcrMode, SplitArgs};
use crate::commands::validate::validate_sequence;
use crate::error::SplitError;
use crate::model::{
    AnchorSource, BookType, CodeOccurrence, ManualAnchor, PageExtractionProvenance,
    ProcessingSession, Segment, SourceInfo, SplitCounts, SplitRunManifest, SplitSummary,
    ToolVersions, ValidationReport,
};
use crate::session::open_session_store;
use crate::util::{
    ensure_directory, file_stem_token, now_utc_string, print_json, sha256_file,
    utc_compact_string, write_json_pretty,
};

mod code_detect;
mod ocr_tools;
mod page_extract;
mod pdf_output;
mod pipeline;
mod run;
mod segment_plan;

pub use run::{report_outcome, run};

pub use code_detect::CodePattern;
pub use page_extract::{ExtractionOptions, PageTextBackend, PopplerTesseractBackend};
pub use pipeline::{
    SourcePdf, SplitOutcome, analyze_document, new_session, segment_and_validate,
};

use code_detect::*;
use ocr_tools::*;
use page_extract::*;
use pdf_output::*;
use segment_plan::*;
