//! CLI binary for dds-thumbnail.
//!
//! A thin shim over the library crate: each input file is fed to a fresh
//! `ThumbnailProvider` and the bitmap is written next to it (or into `-o`) as
//! `<stem>.thumb.png`.

use anyhow::{Context, Result};
use clap::Parser;
use dds_thumbnail::decode::dds;
use dds_thumbnail::{ProviderConfig, ThumbnailProvider};
use futures::stream::{self, StreamExt};
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Thumbnail a single texture (writes diffuse.thumb.png next to it)
  ddsthumb diffuse.dds

  # A whole folder at 128 px into ./thumbs
  ddsthumb textures/*.dds --size 128 -o thumbs

  # Header summary only, no decoding
  ddsthumb --inspect-only diffuse.dds

  # Machine-readable results
  ddsthumb --json textures/*.dds > thumbs.json

SUPPORTED FORMATS:
  DDS    BC1/DXT1, BC2/DXT3, BC3/DXT5, 32-bit and 24-bit RGB(A),
         DX10 headers with the matching DXGI formats, mipmapped or not
  PNG, JPEG, BMP

ENVIRONMENT VARIABLES:
  RUST_LOG                Override the log filter (e.g. dds_thumbnail=debug)
"#;

/// Generate PNG thumbnails for DDS textures and common raster images.
#[derive(Parser, Debug)]
#[command(
    name = "ddsthumb",
    version,
    about = "Generate PNG thumbnails for DDS textures",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Input files.
    #[arg(required = true)]
    inputs: Vec<PathBuf>,

    /// Directory for the generated thumbnails (default: next to each input).
    #[arg(short, long, env = "DDSTHUMB_OUTPUT")]
    output: Option<PathBuf>,

    /// Requested thumbnail edge in pixels (a hint to the decoder).
    #[arg(long, env = "DDSTHUMB_SIZE", default_value_t = 256,
          value_parser = clap::value_parser!(u32).range(16..=4096))]
    size: u32,

    /// Number of files decoded concurrently.
    #[arg(short, long, env = "DDSTHUMB_CONCURRENCY", default_value_t = 4)]
    concurrency: usize,

    /// Refuse inputs larger than this many MiB (max 100).
    #[arg(long, env = "DDSTHUMB_MAX_MIB", default_value_t = 100)]
    max_mib: u64,

    /// Output a JSON summary instead of text.
    #[arg(long, env = "DDSTHUMB_JSON")]
    json: bool,

    /// Disable progress bar.
    #[arg(long, env = "DDSTHUMB_NO_PROGRESS")]
    no_progress: bool,

    /// Print DDS header information only, no decoding.
    #[arg(long)]
    inspect_only: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "DDSTHUMB_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "DDSTHUMB_QUIET")]
    quiet: bool,
}

/// Outcome for one input file.
#[derive(Debug, Serialize)]
struct FileResult {
    input: PathBuf,
    output: Option<PathBuf>,
    width: u32,
    height: u32,
    duration_ms: u64,
    error: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json && !cli.inspect_only;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    // ── Inspect-only mode ────────────────────────────────────────────────
    if cli.inspect_only {
        return inspect_files(&cli.inputs, cli.json);
    }

    // ── Build config ─────────────────────────────────────────────────────
    let config = ProviderConfig::builder()
        .max_source_bytes(cli.max_mib.saturating_mul(1024 * 1024))
        .build()
        .context("Invalid configuration")?;

    if let Some(ref dir) = cli.output {
        tokio::fs::create_dir_all(dir)
            .await
            .with_context(|| format!("Failed to create output directory {:?}", dir))?;
    }

    let bar = if show_progress {
        let bar = ProgressBar::new(cli.inputs.len() as u64);
        bar.set_style(
            ProgressStyle::with_template(
                "{spinner:.cyan} {prefix:.bold}  \
                 [{bar:42.green/238}] {pos:>3}/{len} files  \
                 ⏱ {elapsed_precise}",
            )
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("█▉▊▋▌▍▎▏  ")
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]),
        );
        bar.set_prefix("Thumbnailing");
        bar.enable_steady_tick(Duration::from_millis(80));
        Some(bar)
    } else {
        None
    };

    // ── Run ──────────────────────────────────────────────────────────────
    let started = Instant::now();
    let results: Vec<FileResult> = stream::iter(cli.inputs.iter().cloned().map(|input| {
        let config = config.clone();
        let out_dir = cli.output.clone();
        let size = cli.size;
        let bar = bar.clone();
        async move {
            let fallback = input.clone();
            let result = tokio::task::spawn_blocking(move || {
                thumbnail_file(&input, out_dir.as_deref(), size, config)
            })
            .await
            .unwrap_or_else(|e| FileResult {
                input: fallback,
                output: None,
                width: 0,
                height: 0,
                duration_ms: 0,
                error: Some(format!("worker panicked: {e}")),
            });
            if let Some(ref bar) = bar {
                report_line(bar, &result);
                bar.inc(1);
            }
            result
        }
    }))
    .buffer_unordered(cli.concurrency.max(1))
    .collect()
    .await;

    if let Some(bar) = bar {
        bar.finish_and_clear();
    }

    let failed = results.iter().filter(|r| r.error.is_some()).count();

    if cli.json {
        let json = serde_json::to_string_pretty(&results).context("Failed to serialise output")?;
        println!("{json}");
    } else if !cli.quiet {
        if !show_progress {
            for r in &results {
                match (&r.error, &r.output) {
                    (Some(e), _) => eprintln!("{}: {}", r.input.display(), e),
                    (None, Some(out)) => eprintln!(
                        "{} -> {} ({}x{})",
                        r.input.display(),
                        out.display(),
                        r.width,
                        r.height
                    ),
                    (None, None) => {}
                }
            }
        }
        eprintln!(
            "{}  {}/{} files  {}ms",
            if failed == 0 { green("✔") } else { red("✘") },
            bold(&(results.len() - failed).to_string()),
            results.len(),
            started.elapsed().as_millis(),
        );
    }

    if failed > 0 {
        anyhow::bail!("{failed} of {} files failed", results.len());
    }
    Ok(())
}

/// Print one per-file line above the progress bar.
fn report_line(bar: &ProgressBar, r: &FileResult) {
    let name = r.input.display().to_string();
    match r.error {
        None => bar.println(format!(
            "  {} {}  {}  {}",
            green("✓"),
            name,
            dim(&format!("{}x{}", r.width, r.height)),
            dim(&format!("{}ms", r.duration_ms)),
        )),
        Some(ref e) => bar.println(format!("  {} {}  {}", red("✗"), name, red(e))),
    }
}

/// Decode one file and write its thumbnail. Never fails; errors are recorded
/// in the result.
fn thumbnail_file(
    input: &Path,
    out_dir: Option<&Path>,
    size: u32,
    config: ProviderConfig,
) -> FileResult {
    let started = Instant::now();
    let mut result = FileResult {
        input: input.to_path_buf(),
        output: None,
        width: 0,
        height: 0,
        duration_ms: 0,
        error: None,
    };

    match write_thumbnail(input, out_dir, size, config) {
        Ok((path, width, height)) => {
            debug!("Wrote {:?} ({}x{})", path, width, height);
            result.output = Some(path);
            result.width = width;
            result.height = height;
        }
        Err(e) => {
            warn!("{:?}: {:#}", input, e);
            result.error = Some(format!("{e:#}"));
        }
    }
    result.duration_ms = started.elapsed().as_millis() as u64;
    result
}

fn write_thumbnail(
    input: &Path,
    out_dir: Option<&Path>,
    size: u32,
    config: ProviderConfig,
) -> Result<(PathBuf, u32, u32)> {
    let label = input
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| config.source_label.clone());
    let config = ProviderConfig {
        source_label: label,
        ..config
    };

    let mut file = File::open(input).with_context(|| format!("Failed to open {:?}", input))?;
    let mut provider = ThumbnailProvider::with_config(config);
    provider.initialize(&mut file)?;
    let bitmap = provider.get_thumbnail(size)?;

    let path = output_path(input, out_dir);
    bitmap
        .to_rgba_image()?
        .save_with_format(&path, image::ImageFormat::Png)
        .with_context(|| format!("Failed to write {:?}", path))?;

    Ok((path, bitmap.width(), bitmap.height()))
}

/// `<dir>/<stem>.thumb.png`, where `<dir>` defaults to the input's directory.
fn output_path(input: &Path, out_dir: Option<&Path>) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "thumbnail".to_string());
    let dir = out_dir
        .map(Path::to_path_buf)
        .or_else(|| input.parent().map(Path::to_path_buf))
        .unwrap_or_default();
    dir.join(format!("{stem}.thumb.png"))
}

fn inspect_files(inputs: &[PathBuf], json: bool) -> Result<()> {
    let mut infos = Vec::with_capacity(inputs.len());
    for input in inputs {
        let bytes = std::fs::read(input).with_context(|| format!("Failed to read {:?}", input))?;
        let info = dds::inspect(&bytes).with_context(|| format!("Failed to inspect {:?}", input))?;
        infos.push((input, info));
    }

    if json {
        let map: Vec<_> = infos
            .iter()
            .map(|(path, info)| serde_json::json!({ "file": path, "info": info }))
            .collect();
        println!(
            "{}",
            serde_json::to_string_pretty(&map).context("Failed to serialize metadata")?
        );
        return Ok(());
    }

    for (path, info) in infos {
        println!("File:         {}", path.display());
        println!("Dimensions:   {}x{}", info.width, info.height);
        if info.is_volume {
            println!("Depth:        {}", info.depth);
        }
        println!("Mip levels:   {}", info.mip_count);
        println!("Array size:   {}", info.array_size);
        println!("Cubemap:      {}", info.is_cubemap);
        println!("DX10 header:  {}", info.has_dx10_header);
        println!("Format:       {}", info.format_label);
        println!();
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn output_path_defaults_next_to_input() {
        let p = output_path(Path::new("assets/rock.dds"), None);
        assert_eq!(p, PathBuf::from("assets/rock.thumb.png"));
    }

    #[test]
    fn output_path_uses_out_dir() {
        let p = output_path(Path::new("assets/rock.dds"), Some(Path::new("thumbs")));
        assert_eq!(p, PathBuf::from("thumbs/rock.thumb.png"));
    }
}
