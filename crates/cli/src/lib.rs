use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use docview_render::Size;
use docview_viewer::{DocumentViewer, ViewerConfig, ViewerEvent, ViewerStatus};
use serde::Serialize;
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub mod compose;

/// Upper bound on opening a document and rendering one frame
const RENDER_TIMEOUT: Duration = Duration::from_secs(120);

#[derive(Debug, Parser)]
#[command(name = "docview")]
#[command(about = "Tiled document viewport engine")]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Print page sizes and the tile layout as JSON.
    Inspect {
        #[arg(value_name = "IMAGE")]
        file: PathBuf,
        /// View size the layout is computed for.
        #[arg(long, value_name = "WxH", value_parser = parse_size, default_value = "1024x768")]
        viewport: Size,
        #[arg(long, value_name = "FILE")]
        config: Option<PathBuf>,
    },
    /// Render one viewport of a document to a PNG.
    Render {
        #[arg(value_name = "IMAGE")]
        file: PathBuf,
        #[arg(long, value_name = "WxH", value_parser = parse_size)]
        viewport: Size,
        /// Offset in scaled document pixels, applied after the zoom.
        #[arg(long, value_name = "X,Y", value_parser = parse_point)]
        scroll: Option<(i32, i32)>,
        /// Zoom factor relative to the initial scale.
        #[arg(long, value_name = "F")]
        zoom: Option<f32>,
        #[arg(long, value_name = "FILE")]
        config: Option<PathBuf>,
        #[arg(long)]
        output: PathBuf,
    },
    /// Print CLI version.
    Version,
}

#[derive(Debug, Serialize)]
struct InspectOutput {
    path: String,
    viewport: SizeOutput,
    tile: SizeOutput,
    document: SizeOutput,
    scale: ScaleOutput,
    page_margin: i32,
    rows: i32,
    pages: Vec<PageOutput>,
}

#[derive(Debug, Serialize)]
struct SizeOutput {
    width: i32,
    height: i32,
}

impl From<Size> for SizeOutput {
    fn from(size: Size) -> Self {
        Self {
            width: size.width,
            height: size.height,
        }
    }
}

#[derive(Debug, Serialize)]
struct ScaleOutput {
    initial: f32,
    min: f32,
    mid: f32,
    max: f32,
}

#[derive(Debug, Serialize)]
struct PageOutput {
    index: usize,
    original: SizeOutput,
    scaled: SizeOutput,
    top: i32,
    start_row: i32,
    end_row: i32,
    columns: i32,
}

pub fn run<I, T>(args: I) -> Result<()>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let cli = Cli::parse_from(args);

    match cli.command {
        Commands::Inspect {
            file,
            viewport,
            config,
        } => run_inspect(&file, viewport, config.as_deref()),
        Commands::Render {
            file,
            viewport,
            scroll,
            zoom,
            config,
            output,
        } => run_render(&file, viewport, scroll, zoom, config.as_deref(), &output),
        Commands::Version => {
            println!("{}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

fn run_inspect(file: &Path, viewport: Size, config: Option<&Path>) -> Result<()> {
    let viewer = open_viewer(file, viewport, config)?;
    let layout = viewer.layout().context("document has no layout")?;
    let limits = viewer.scale_limits().unwrap_or_default();

    let pages = layout
        .original_sizes()
        .iter()
        .enumerate()
        .filter_map(|(index, original)| {
            let page = layout.page(index)?;
            Some(PageOutput {
                index,
                original: (*original).into(),
                scaled: Size::new(page.width, page.height).into(),
                top: page.top,
                start_row: page.start_row,
                end_row: page.end_row,
                columns: page.columns,
            })
        })
        .collect();

    let payload = InspectOutput {
        path: file.display().to_string(),
        viewport: viewport.into(),
        tile: layout.tile_size().into(),
        document: layout.document_size().into(),
        scale: ScaleOutput {
            initial: limits.initial,
            min: limits.min,
            mid: limits.mid,
            max: limits.max,
        },
        page_margin: layout.margin(),
        rows: layout.row_count(),
        pages,
    };

    let json = serde_json::to_string_pretty(&payload)?;
    println!("{json}");
    Ok(())
}

fn run_render(
    file: &Path,
    viewport: Size,
    scroll: Option<(i32, i32)>,
    zoom: Option<f32>,
    config: Option<&Path>,
    output: &Path,
) -> Result<()> {
    let mut viewer = open_viewer(file, viewport, config)?;

    if let Some(factor) = zoom {
        if !(factor.is_finite() && factor > 0.0) {
            anyhow::bail!("--zoom must be a positive number");
        }
        viewer.zoom_start();
        viewer.zoom_to(factor, 0.0, 0.0);
        viewer.zoom_end();
    }
    if let Some((x, y)) = scroll {
        viewer.move_to(x, y);
    }
    if !viewer.pump_until_idle(RENDER_TIMEOUT) {
        anyhow::bail!("timed out rendering tiles");
    }
    for event in viewer.drain_events() {
        if let ViewerEvent::PageRenderFailed { page, error } = event {
            tracing::warn!(page, %error, "page left blank");
        }
    }

    let (x, y) = viewer.offset();
    tracing::info!(x, y, scale = viewer.raw_scale(), "composing frame");
    let image = compose::compose(&viewer.draw_list());

    if let Some(parent) = output.parent() {
        fs::create_dir_all(parent)?;
    }
    image
        .save(output)
        .with_context(|| format!("failed to write image to {}", output.display()))?;

    println!("{}", output.display());
    Ok(())
}

/// Open `file` in a headless viewer of size `viewport` and wait for the first frame
fn open_viewer(file: &Path, viewport: Size, config: Option<&Path>) -> Result<DocumentViewer> {
    ensure_file_exists(file)?;
    if viewport.is_empty() {
        anyhow::bail!("viewport must be at least 1x1");
    }

    let config = ViewerConfig::load(config).context("failed to load configuration")?;
    let mut viewer = DocumentViewer::new(config)?;
    viewer.resize(viewport.width, viewport.height);
    viewer.open_source(file.to_path_buf());

    if !viewer.pump_until_idle(RENDER_TIMEOUT) {
        anyhow::bail!("timed out opening {}", file.display());
    }
    if viewer.status() == ViewerStatus::Failed {
        let error = viewer.drain_events().into_iter().find_map(|event| match event {
            ViewerEvent::LoadFailed { error } => Some(error),
            _ => None,
        });
        return match error {
            Some(error) => Err(error).context("failed to open document"),
            None => Err(anyhow::anyhow!("failed to open document")),
        };
    }
    Ok(viewer)
}

fn ensure_file_exists(path: &Path) -> Result<()> {
    if !path.exists() {
        anyhow::bail!("file does not exist: {}", path.display());
    }

    if !path.is_file() {
        anyhow::bail!("path is not a file: {}", path.display());
    }

    Ok(())
}

fn parse_size(value: &str) -> Result<Size, String> {
    let (width, height) = value
        .split_once(['x', 'X'])
        .ok_or_else(|| format!("invalid size `{value}`, expected WxH"))?;
    let width: i32 = width
        .trim()
        .parse()
        .map_err(|_| format!("invalid width in `{value}`"))?;
    let height: i32 = height
        .trim()
        .parse()
        .map_err(|_| format!("invalid height in `{value}`"))?;
    if width <= 0 || height <= 0 {
        return Err(format!("invalid size `{value}`, both sides must be positive"));
    }
    Ok(Size::new(width, height))
}

fn parse_point(value: &str) -> Result<(i32, i32), String> {
    let (x, y) = value
        .split_once(',')
        .ok_or_else(|| format!("invalid offset `{value}`, expected X,Y"))?;
    let x = x
        .trim()
        .parse()
        .map_err(|_| format!("invalid x in `{value}`"))?;
    let y = y
        .trim()
        .parse()
        .map_err(|_| format!("invalid y in `{value}`"))?;
    Ok((x, y))
}
