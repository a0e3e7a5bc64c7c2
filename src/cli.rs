use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::model::BookType;

#[derive(Parser, Debug)]
#[command(
    name = "notarial-split",
    version,
    about = "Split scanned notarial books into one PDF per act and check sequence completeness"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    Split(SplitArgs),
    AddCode(AddCodeArgs),
    Validate(ValidateArgs),
    Batch(BatchArgs),
    Status(StatusArgs),
}

#[derive(Args, Debug, Clone)]
pub struct SplitArgs {
    #[arg(long)]
    pub input: PathBuf,

    #[arg(long, value_parser = clap::value_parser!(u16).range(1000..=9999))]
    pub year: u16,

    #[arg(long)]
    pub book_type: BookType,

    #[arg(long, default_value = "processed")]
    pub output_root: PathBuf,

    #[arg(long, default_value = ".cache/notarial")]
    pub cache_root: PathBuf,

    #[arg(long)]
    pub manifest_path: Option<PathBuf>,

    #[arg(long, value_enum, default_value_t = SessionBackend::Sqlite)]
    pub session_store: SessionBackend,

    #[command(flatten)]
    pub ocr: OcrArgs,

    #[arg(long, default_value_t = false)]
    pub json: bool,
}

#[derive(Args, Debug, Clone)]
pub struct OcrArgs {
    #[arg(long, value_enum, default_value_t = OcrMode::Auto)]
    pub ocr_mode: OcrMode,

    #[arg(long, default_value = "spa")]
    pub ocr_lang: String,

    #[arg(long, default_value_t = 50)]
    pub ocr_min_text_chars: usize,

    #[arg(long, default_value_t = 200)]
    pub ocr_dpi: u32,

    #[arg(long, default_value_t = 2)]
    pub ocr_workers: usize,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum OcrMode {
    Off,
    Auto,
    Force,
}

impl OcrMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Off => "off",
            Self::Auto => "auto",
            Self::Force => "force",
        }
    }
}

/// Where processing sessions live between `split` and `add-code`.
#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum SessionBackend {
    /// Discarded when the process exits.
    Memory,
    Sqlite,
}

#[derive(Args, Debug, Clone)]
pub struct AddCodeArgs {
    #[arg(long)]
    pub session_id: String,

    #[arg(long = "code", required = true)]
    pub codes: Vec<String>,

    #[arg(long = "page", required = true)]
    pub pages: Vec<usize>,

    #[arg(long, default_value = ".cache/notarial")]
    pub cache_root: PathBuf,

    #[arg(long, default_value_t = false)]
    pub json: bool,
}

#[derive(Args, Debug, Clone)]
pub struct ValidateArgs {
    #[arg(long = "code")]
    pub codes: Vec<String>,

    #[arg(long)]
    pub codes_file: Option<PathBuf>,

    #[arg(long, default_value_t = false)]
    pub json: bool,
}

#[derive(Args, Debug, Clone)]
pub struct BatchArgs {
    #[arg(long = "input")]
    pub inputs: Vec<PathBuf>,

    #[arg(long)]
    pub input_dir: Option<PathBuf>,

    #[arg(long, value_parser = clap::value_parser!(u16).range(1000..=9999))]
    pub year: u16,

    #[arg(long)]
    pub book_type: BookType,

    #[arg(long, default_value_t = false)]
    pub split: bool,

    #[arg(long, default_value_t = 2)]
    pub jobs: usize,

    #[arg(long, default_value = "processed")]
    pub output_root: PathBuf,

    #[arg(long, default_value = ".cache/notarial")]
    pub cache_root: PathBuf,

    #[arg(long)]
    pub manifest_path: Option<PathBuf>,

    #[arg(long, value_enum, default_value_t = SessionBackend::Sqlite)]
    pub session_store: SessionBackend,

    #[command(flatten)]
    pub ocr: OcrArgs,
}

#[derive(Args, Debug, Clone)]
pub struct StatusArgs {
    #[arg(long)]
    pub session_id: String,

    #[arg(long, default_value = ".cache/notarial")]
    pub cache_root: PathBuf,

    #[arg(long, default_value_t = false)]
    pub discard: bool,
}
