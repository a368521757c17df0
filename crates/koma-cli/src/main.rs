//! `koma`: export saved pages, list layouts, lint and import from the
//! command line.

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use koma_core::geometry::PageMetrics;
use koma_core::layout::LAYOUTS;
use koma_core::lint::{LintSeverity, lint_page};
use koma_core::model::Page;
use koma_core::snapshot::Snapshot;
use koma_render::{ExportOptions, SourceCache, export_png, load_font};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[clap(author, version, about)]
struct Cli {
    /// Log filter, e.g. `debug` or `koma_render=trace`.
    #[clap(short, long, global = true, default_value = "warn")]
    log_level: String,
    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Render a saved page to PNG.
    Export {
        /// Snapshot JSON written by the editor.
        snapshot: PathBuf,
        #[clap(short, long, default_value = "page.png")]
        output: PathBuf,
        /// Page width in pixels.
        #[clap(short, long, default_value_t = 800.0)]
        width: f32,
        /// TrueType font for bubble captions; captions are skipped without one.
        #[clap(short, long)]
        font: Option<PathBuf>,
        /// Directory image paths are relative to. Defaults to the snapshot's directory.
        #[clap(long)]
        assets: Option<PathBuf>,
        /// Render this many times larger and downscale.
        #[clap(long, default_value_t = 1)]
        supersample: u32,
    },
    /// List registered group layouts.
    Layouts {
        /// Only layouts for this many panels.
        #[clap(short, long)]
        count: Option<usize>,
    },
    /// Report layout problems in a saved page.
    Lint {
        snapshot: PathBuf,
        /// Exit with an error when any warning is reported.
        #[clap(long)]
        deny_warnings: bool,
    },
    /// Add bubbles from an import document to a saved page.
    Import {
        snapshot: PathBuf,
        bubbles: PathBuf,
        /// Where to write the updated snapshot. Defaults to overwriting the input.
        #[clap(short, long)]
        output: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(&cli.log_level)).init();

    match cli.command {
        Commands::Export {
            snapshot,
            output,
            width,
            font,
            assets,
            supersample,
        } => export(&snapshot, &output, width, font.as_deref(), assets, supersample),
        Commands::Layouts { count } => {
            list_layouts(count);
            Ok(())
        }
        Commands::Lint {
            snapshot,
            deny_warnings,
        } => lint(&snapshot, deny_warnings),
        Commands::Import {
            snapshot,
            bubbles,
            output,
        } => import(&snapshot, &bubbles, output.as_deref()),
    }
}

fn load_page(path: &Path) -> Result<Page> {
    let text = fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    let snapshot = Snapshot::from_json(&text).with_context(|| format!("parsing {}", path.display()))?;
    snapshot
        .restore()
        .with_context(|| format!("restoring {}", path.display()))
}

fn export(
    snapshot: &Path,
    output: &Path,
    width: f32,
    font: Option<&Path>,
    assets: Option<PathBuf>,
    supersample: u32,
) -> Result<()> {
    if !(width.is_finite() && width > 0.0) {
        bail!("page width must be positive, got {width}");
    }
    let page = load_page(snapshot)?;

    let font = match font {
        Some(path) => {
            let bytes = fs::read(path).with_context(|| format!("reading font {}", path.display()))?;
            Some(load_font(&bytes).map_err(anyhow::Error::msg).context("loading font")?)
        }
        None => None,
    };
    let base_dir = assets
        .or_else(|| snapshot.parent().map(Path::to_path_buf))
        .unwrap_or_default();
    let mut cache = SourceCache::with_base_dir(base_dir);

    let default = PageMetrics::default();
    let options = ExportOptions {
        metrics: default.scaled(width / default.page_width),
        font: font.as_ref(),
        supersample,
        ..ExportOptions::default()
    };
    let png = export_png(&page, &mut cache, &options).context("exporting page")?;
    fs::write(output, &png).with_context(|| format!("writing {}", output.display()))?;
    log::info!("wrote {} ({} bytes)", output.display(), png.len());
    Ok(())
}

fn list_layouts(count: Option<usize>) {
    for def in LAYOUTS.iter().filter(|d| count.is_none_or(|c| d.count == c)) {
        println!(
            "{:<16} {}  cols: {:<10} rows: {:<12} {}",
            def.key, def.count, def.cols, def.rows, def.label
        );
    }
}

fn lint(snapshot: &Path, deny_warnings: bool) -> Result<()> {
    let page = load_page(snapshot)?;
    let diagnostics = lint_page(&page);
    let mut warnings = 0;
    for d in &diagnostics {
        let level = match d.severity {
            LintSeverity::Warning => {
                warnings += 1;
                "warning"
            }
            LintSeverity::Info => "info",
        };
        println!("{level}[{}]: {}", d.rule, d.message);
    }
    if diagnostics.is_empty() {
        println!("no problems found");
    }
    if deny_warnings && warnings > 0 {
        bail!("{warnings} warning(s)");
    }
    Ok(())
}

fn import(snapshot: &Path, bubbles: &Path, output: Option<&Path>) -> Result<()> {
    let mut page = load_page(snapshot)?;
    let text = fs::read_to_string(bubbles).with_context(|| format!("reading {}", bubbles.display()))?;
    let doc = koma_core::import::parse_import(&text).with_context(|| format!("parsing {}", bubbles.display()))?;
    let report = page.import_bubbles(&doc);
    for skipped in &report.skipped {
        match skipped {
            Some(index) => eprintln!("skipped bubbles for panel {index}: no such panel"),
            None => eprintln!("skipped an entry without a panel id"),
        }
    }

    let json = Snapshot::capture(&page).to_json()?;
    let target = output.unwrap_or(snapshot);
    fs::write(target, json).with_context(|| format!("writing {}", target.display()))?;
    println!("imported {} bubble(s) into {}", report.imported, target.display());
    Ok(())
}
