use std::fs::{self, File};
use std::io::{Write, stdout};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use log::{error, info};
use serde::Serialize;
use simplelog::{Config, LevelFilter, WriteLogger};

use pagefarm::panic_handler::initialize_panic_handler;
use pagefarm::{Document, FarmSettings, ImageConverter, RenderedImage};

#[derive(Parser, Debug)]
#[command(
    name = "pagefarm",
    version,
    about = "Render parsed note pages to images on a pool of worker threads"
)]
struct Args {
    /// Parsed note document in JSON interchange form
    document: PathBuf,

    /// Pages to render, in output order (e.g. 3,1,2). All pages when omitted
    #[arg(short, long, value_delimiter = ',')]
    pages: Option<Vec<usize>>,

    /// Worker units per conversion (overrides config and PAGEFARM_WORKERS)
    #[arg(short, long)]
    workers: Option<usize>,

    /// Settings file (defaults to the user config directory)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Invert page colors
    #[arg(long)]
    invert: bool,

    /// Longest image side in pixels
    #[arg(long)]
    max_dimension: Option<u32>,

    #[arg(long, default_value = "pagefarm.log")]
    log_file: PathBuf,

    /// off, error, warn, info, debug or trace
    #[arg(long, default_value = "info", value_parser = parse_level_filter)]
    log_level: LevelFilter,
}

fn parse_level_filter(value: &str) -> Result<LevelFilter, String> {
    value.parse().map_err(|_| {
        format!("invalid log level '{value}' (expected off, error, warn, info, debug or trace)")
    })
}

#[derive(Serialize)]
struct ImageRecord {
    page: usize,
    mime: String,
    width: u32,
    height: u32,
    data_url: String,
}

impl From<&RenderedImage> for ImageRecord {
    fn from(img: &RenderedImage) -> Self {
        Self {
            page: img.page,
            mime: img.mime.clone(),
            width: img.width,
            height: img.height,
            data_url: img.to_data_url(),
        }
    }
}

fn load_settings(args: &Args) -> Result<FarmSettings> {
    let mut settings = match &args.config {
        Some(path) => FarmSettings::load_from_path(path)?,
        None => FarmSettings::load_or_default(),
    };

    if args.invert {
        settings.render.invert = true;
    }
    if args.max_dimension.is_some() {
        settings.render.max_dimension = args.max_dimension;
    }
    Ok(settings)
}

fn run(args: &Args) -> Result<()> {
    let settings = load_settings(args)?;

    let json = fs::read_to_string(&args.document)
        .with_context(|| format!("reading {}", args.document.display()))?;
    let document = Arc::new(
        Document::from_json(&json)
            .with_context(|| format!("parsing {}", args.document.display()))?,
    );
    info!(
        "Loaded {} ({} pages, {}x{})",
        args.document.display(),
        document.page_count(),
        document.width,
        document.height
    );

    let mut converter = ImageConverter::from_settings(&settings);
    if let Some(workers) = args.workers {
        converter = converter.with_pool_size(workers);
    }

    let images = converter.convert_to_images(&document, args.pages.as_deref())?;
    let records: Vec<ImageRecord> = images.iter().map(ImageRecord::from).collect();

    let mut out = stdout().lock();
    serde_json::to_writer_pretty(&mut out, &records)?;
    writeln!(out)?;
    Ok(())
}

fn main() -> Result<()> {
    let args = Args::parse();

    WriteLogger::init(args.log_level, Config::default(), File::create(&args.log_file)?)?;
    initialize_panic_handler();

    info!("Starting pagefarm");
    let res = run(&args);
    if let Err(err) = &res {
        error!("Conversion failed: {err:?}");
    }
    info!("Shutting down pagefarm");
    res
}
