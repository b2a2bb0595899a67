//
// cli.rs
// Tag2Dcm-rs
//
// Defines the CLI surface with Clap and dispatches user-selected commands to the corresponding modules.
//

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{anyhow, bail, Context};
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use tracing::{warn, Level};

use crate::config::Tag2DcmOptions;
use crate::explorer::{self, Explorer};
use crate::labels::TagFileReader;
use crate::models::OutputArtifactSet;
use crate::render::FigureSize;
use crate::{batch, detect, pipeline, raw, render};

/// Command-line interface glue code: defines the available verbs and dispatches to modules.
#[derive(Parser)]
#[command(name = "tag2dcm")]
#[command(about = "Tag overlay compositing and DICOM utilities", long_about = None)]
pub struct Cli {
    /// Log debug output
    #[arg(short, long, global = true)]
    pub verbose: bool,
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Composite a tag file onto its CT image as a new RGB DICOM
    Tag2dcm {
        image: PathBuf,
        /// Tag file; resolved next to the image when omitted
        #[arg(long)]
        tag: Option<PathBuf>,
        #[command(flatten)]
        output: OutputArgs,
    },
    /// Composite every DICOM/tag pair found under a directory
    Batch {
        directory: PathBuf,
        #[command(flatten)]
        output: OutputArgs,
    },
    /// Render a CT image with the soft-tissue window as PNG
    ToPng {
        file: PathBuf,
        #[arg(short, long, default_value = ".")]
        output_dir: PathBuf,
        #[command(flatten)]
        figure: FigureArgs,
    },
    /// Recompress files (or directories of files) to raw with gdcmconv
    ToRaw {
        #[arg(required = true)]
        inputs: Vec<PathBuf>,
        /// Fresh directory for the converted files; `<stem>_raw.<ext>` next to each input otherwise
        #[arg(short, long)]
        output_dir: Option<PathBuf>,
        #[arg(long, default_value_t = raw::DEFAULT_TIMEOUT.as_secs())]
        timeout_secs: u64,
    },
    /// Dump the header of a DICOM file
    Header { file: PathBuf },
    /// Print one attribute for every DICOM file under a directory
    TagValues { directory: PathBuf, keyword: String },
    /// List DICOM files whose pixel data cannot be decoded
    CheckPixels { directory: PathBuf },
    /// Report whether a file is DICOM or a tag file
    Detect { file: PathBuf },
}

#[derive(Args)]
pub struct OutputArgs {
    /// JSON file with default options; flags override it
    #[arg(long)]
    options: Option<PathBuf>,
    #[arg(short, long)]
    output_dir: Option<PathBuf>,
    #[arg(long)]
    copy_image: bool,
    #[arg(long)]
    copy_tag: bool,
    /// Also write PNG snapshots of the image and the composite
    #[arg(long)]
    pngs: bool,
    #[command(flatten)]
    figure: FigureArgs,
    /// Print the result as JSON
    #[arg(long)]
    json: bool,
}

#[derive(Args)]
pub struct FigureArgs {
    /// PNG figure width in inches
    #[arg(long)]
    figure_width: Option<f64>,
    /// PNG figure height in inches
    #[arg(long)]
    figure_height: Option<f64>,
}

impl FigureArgs {
    fn apply(&self, base: FigureSize) -> anyhow::Result<FigureSize> {
        let figure = FigureSize {
            width: self.figure_width.unwrap_or(base.width),
            height: self.figure_height.unwrap_or(base.height),
        };
        if !(figure.width > 0.0 && figure.height > 0.0) {
            bail!("Figure size must be positive, got {}x{}", figure.width, figure.height);
        }
        Ok(figure)
    }
}

impl OutputArgs {
    fn to_options(&self) -> anyhow::Result<Tag2DcmOptions> {
        let base = match &self.options {
            Some(path) => Tag2DcmOptions::from_json_file(path)
                .with_context(|| format!("Failed to load options from {:?}", path))?,
            None => Tag2DcmOptions::default(),
        };
        Ok(Tag2DcmOptions {
            output_dir: self.output_dir.clone().unwrap_or(base.output_dir),
            copy_source_image: self.copy_image || base.copy_source_image,
            copy_label_file: self.copy_tag || base.copy_label_file,
            render_pngs: self.pngs || base.render_pngs,
            png_figure_size: self.figure.apply(base.png_figure_size)?,
        })
    }
}

fn init_logging(verbose: bool) {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn print_artifacts(artifacts: &OutputArtifactSet) {
    println!("Composite DICOM: {:?}", artifacts.composite_dcm);
    println!("  SOP Instance UID: {}", artifacts.sop_instance_uid);
    println!("  Pixel SHA-256:    {}", artifacts.pixel_sha256);
    for file in artifacts.files().into_iter().skip(1) {
        println!("  Also wrote: {:?}", file);
    }
}

fn explorer_for(directory: &Path) -> anyhow::Result<Explorer> {
    let mut explorer = Explorer::new();
    let count = explorer
        .load_dir(directory)
        .with_context(|| format!("Failed to scan {:?}", directory))?;
    println!("Loaded {} DICOM file(s) from {:?}", count, directory);
    Ok(explorer)
}

pub async fn run() -> anyhow::Result<()> {
    // Parse the raw CLI arguments once and dispatch to a subcommand handler.
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Tag2dcm { image, tag, output } => {
            let options = output.to_options()?;
            let artifacts = match tag {
                Some(tag) => {
                    if !detect::check_pair(&image, &tag)? {
                        warn!(?image, ?tag, "Image and tag file do not seem to belong together");
                    }
                    pipeline::run(&image, &tag, &options, &TagFileReader)
                }
                None => pipeline::run_with_companion(&image, &options),
            }
            .with_context(|| format!("Failed to composite {:?}", image))?;
            if output.json {
                print_json(&artifacts)?;
            } else {
                print_artifacts(&artifacts);
            }
        }
        Commands::Batch { directory, output } => {
            let options = output.to_options()?;
            let summary = batch::process_directory(&directory, &options);
            if output.json {
                print_json(&summary)?;
            } else {
                println!(
                    "Succeeded: {} | Failed: {} | Skipped (no tag file): {}",
                    summary.succeeded.len(),
                    summary.failed.len(),
                    summary.skipped.len()
                );
                for failure in &summary.failed {
                    println!("  Error in {:?}: {}", failure.image, failure.error);
                }
            }
            if !summary.failed.is_empty() {
                bail!("{} file(s) failed", summary.failed.len());
            }
        }
        Commands::ToPng {
            file,
            output_dir,
            figure,
        } => {
            let figure = figure.apply(FigureSize::default())?;
            let png = render::render_png(&file, &output_dir, figure)
                .with_context(|| format!("Failed to render {:?}", file))?;
            println!("Image saved to: {:?}", png);
        }
        Commands::ToRaw {
            inputs,
            output_dir,
            timeout_secs,
        } => {
            let timeout = Duration::from_secs(timeout_secs);
            let mut explorer = Explorer::new();
            for input in &inputs {
                if input.is_dir() {
                    explorer.load_dir(input)?;
                } else if !explorer.load_file(input) {
                    bail!("{:?} is not a DICOM file", input);
                }
            }
            match output_dir {
                Some(dir) => {
                    let converted = raw::to_raw(explorer.files(), &dir, timeout).await?;
                    println!("Converted {} file(s) into {:?}", converted.len(), dir);
                }
                None => {
                    for file in explorer.files() {
                        let target = raw::to_raw_file(file, timeout).await?;
                        println!("Converted {:?} -> {:?}", file, target);
                    }
                }
            }
        }
        Commands::Header { file } => {
            let dump = explorer::header_dump(&file)
                .with_context(|| format!("Failed to read header of {:?}", file))?;
            println!("{dump}");
        }
        Commands::TagValues { directory, keyword } => {
            let explorer = explorer_for(&directory)?;
            let values = explorer.tag_values(&keyword)?;
            println!("{} {}", values.keyword, values.tag);
            for (file, value) in &values.values {
                println!("  {:?}: {}", file, value);
            }
        }
        Commands::CheckPixels { directory } => {
            let explorer = explorer_for(&directory)?;
            let failures = explorer.check_pixels();
            if failures.is_empty() {
                println!("All pixel data decodes");
            }
            for failure in &failures {
                println!("ERROR: {:?}: {}", failure.file, failure.error);
            }
        }
        Commands::Detect { file } => {
            if detect::is_dicom_file(&file) {
                println!("{:?}: DICOM", file);
                match detect::companion_tag_file(&file) {
                    Ok(tag) => println!("  Tag file: {:?}", tag),
                    Err(_) => println!("  Tag file: none"),
                }
            } else if detect::is_tag_file(&file) {
                println!("{:?}: tag file", file);
            } else if file.exists() {
                println!("{:?}: unknown", file);
            } else {
                return Err(anyhow!("{:?} does not exist", file));
            }
        }
    }

    Ok(())
}
