use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use ratatui::DefaultTerminal;
use ratatui::crossterm::event::{self, Event, KeyEventKind};
use ratatui::crossterm::terminal;
use ratatui::layout::Size;
use std::path::PathBuf;
use std::sync::mpsc;
use std::time::Duration;

use tuimg::app::App;
use tuimg::geometry::{CellDimension, ImageSize, TerminalCellMetrics};
use tuimg::image::{ImageProtocol, ImageSource, PixelMeta, RendererKind, create_renderable};
use tuimg::logging;
use tuimg::storage::{self, Config};
use tuimg::terminal::{CellMetricsProvider, FixedMetrics, WindowMetrics};

/// Container used when the terminal size can't be read
const FALLBACK_CONTAINER: Size = Size {
    width: 80,
    height: 24,
};

#[derive(Parser)]
#[command(name = "tuimg")]
#[command(about = "Terminal image viewer and cell-size calculator", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the number of cells an image would occupy
    Size {
        /// Image file
        path: PathBuf,

        /// Requested width: "auto" or a cell count
        #[arg(long)]
        width: Option<CellDimension>,

        /// Requested height: "auto" or a cell count
        #[arg(long)]
        height: Option<CellDimension>,

        /// Available space in cells, e.g. 120x40 (default: terminal size)
        #[arg(long, value_parser = parse_container)]
        container: Option<Size>,

        /// Cell size in pixels, e.g. 10x20 (default: ask the terminal)
        #[arg(long, value_parser = parse_cell)]
        cell: Option<TerminalCellMetrics>,
    },

    /// Show the detected terminal cell size in pixels
    Metrics,

    /// Open images in the terminal viewer
    View {
        /// Image files
        #[arg(required = true)]
        paths: Vec<PathBuf>,

        /// Requested width: "auto" or a cell count
        #[arg(long)]
        width: Option<CellDimension>,

        /// Requested height: "auto" or a cell count
        #[arg(long)]
        height: Option<CellDimension>,

        /// Reload images when their files change
        #[arg(long)]
        watch: bool,

        /// Draw with unicode halfblocks instead of a graphics protocol
        #[arg(long)]
        halfblocks: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Size {
            path,
            width,
            height,
            container,
            cell,
        } => {
            env_logger::init();
            cmd_size(path, width, height, container, cell)
        }
        Commands::Metrics => {
            env_logger::init();
            cmd_metrics()
        }
        Commands::View {
            paths,
            width,
            height,
            watch,
            halfblocks,
        } => cmd_view(paths, width, height, watch, halfblocks),
    }
}

fn parse_pair(s: &str) -> Option<(&str, &str)> {
    s.split_once(['x', 'X'])
}

fn parse_container(s: &str) -> Result<Size, String> {
    let (w, h) = parse_pair(s).ok_or_else(|| format!("expected WIDTHxHEIGHT, got '{}'", s))?;
    let width = w.trim().parse().map_err(|_| format!("invalid width '{}'", w))?;
    let height = h.trim().parse().map_err(|_| format!("invalid height '{}'", h))?;
    Ok(Size::new(width, height))
}

fn parse_cell(s: &str) -> Result<TerminalCellMetrics, String> {
    let (w, h) = parse_pair(s).ok_or_else(|| format!("expected WIDTHxHEIGHT, got '{}'", s))?;
    let width = w.trim().parse().map_err(|_| format!("invalid width '{}'", w))?;
    let height = h.trim().parse().map_err(|_| format!("invalid height '{}'", h))?;
    Ok(TerminalCellMetrics::new(width, height))
}

/// Metrics provider as configured
fn metrics_provider(config: &Config) -> Box<dyn CellMetricsProvider> {
    let fallback = config.terminal.fallback_metrics();
    if config.terminal.query_cell_size {
        Box::new(WindowMetrics::with_fallback(fallback))
    } else {
        Box::new(FixedMetrics(fallback))
    }
}

/// Resolve and print an image's cell size
fn cmd_size(
    path: PathBuf,
    width: Option<CellDimension>,
    height: Option<CellDimension>,
    container: Option<Size>,
    cell: Option<TerminalCellMetrics>,
) -> Result<()> {
    let config = storage::load_config()?;

    let meta = PixelMeta::read(&ImageSource::file(&path))?;
    log::debug!("{:?}: {}x{} pixels", path, meta.width, meta.height);

    let metrics = match cell {
        Some(metrics) => metrics,
        None => metrics_provider(&config).cell_pixel_metrics(),
    };

    let container = container.unwrap_or_else(|| match terminal::size() {
        Ok((columns, rows)) => Size::new(columns, rows),
        Err(e) => {
            log::debug!("Failed to read terminal size: {}", e);
            FALLBACK_CONTAINER
        }
    });

    let size = ImageSize::new(meta.width, meta.height, width, height)
        .cell_size(container, metrics)
        .with_context(|| format!("Failed to size {:?}", path))?;

    println!("{}x{}", size.width, size.height);

    Ok(())
}

/// Print the terminal's cell size and where it came from
fn cmd_metrics() -> Result<()> {
    let config = storage::load_config()?;
    let provider = WindowMetrics::with_fallback(config.terminal.fallback_metrics());
    let (metrics, source) = provider.detect();

    println!(
        "Cell size: {}x{} pixels ({})",
        metrics.cell_pixel_width, metrics.cell_pixel_height, source
    );

    Ok(())
}

/// Launch the TUI viewer
fn cmd_view(
    paths: Vec<PathBuf>,
    width: Option<CellDimension>,
    height: Option<CellDimension>,
    watch: bool,
    halfblocks: bool,
) -> Result<()> {
    let (config_dir, state_dir) = storage::ensure_directories()?;

    // Logging goes to a file so it doesn't fight with the UI for the terminal
    let (flash_tx, flash_rx) = mpsc::channel();
    let mut config = storage::load_config()?;
    logging::init_logger(
        &state_dir,
        Some(flash_tx),
        &config.logging.file_level,
        &config.logging.flash_level,
    )?;
    log::info!("Starting viewer with {} image(s), config in {:?}", paths.len(), config_dir);

    // Command line flags override the config file
    if width.is_some() {
        config.viewer.width = width;
    }
    if height.is_some() {
        config.viewer.height = height;
    }
    config.viewer.watch |= watch;
    if halfblocks {
        config.viewer.renderer = RendererKind::Halfblocks;
    }

    let mut terminal = ratatui::try_init().context("Failed to initialize terminal")?;
    let result = run_viewer(&mut terminal, paths, config, flash_rx);
    ratatui::restore();

    result
}

fn run_viewer(
    terminal: &mut DefaultTerminal,
    paths: Vec<PathBuf>,
    config: Config,
    flash_rx: mpsc::Receiver<logging::FlashMessage>,
) -> Result<()> {
    let fallback_font = (
        config.terminal.fallback_cell_width,
        config.terminal.fallback_cell_height,
    );
    let protocol = if config.terminal.query_cell_size {
        ImageProtocol::new(fallback_font)
    } else {
        ImageProtocol::from_fontsize(fallback_font)
    };
    // The protocol encodes with the picker's font size, so the widget sizes with it too
    let picker_metrics = (config.viewer.renderer == RendererKind::Protocol)
        .then(|| protocol.cell_pixel_metrics());
    let renderable = create_renderable(config.viewer.renderer, protocol);

    let mut app = App::new(paths, config, renderable, picker_metrics, Some(flash_rx))?;

    while !app.should_quit {
        app.tick();
        terminal
            .draw(|frame| app.render(frame))
            .context("Failed to draw frame")?;

        if event::poll(Duration::from_millis(100)).context("Failed to poll events")? {
            match event::read().context("Failed to read event")? {
                Event::Key(key) if key.kind == KeyEventKind::Press => app.handle_key(key),
                Event::Resize(_, _) => app.on_resize(),
                _ => {}
            }
        }
    }

    log::info!("Viewer exiting");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_container() {
        assert_eq!(parse_container("120x40"), Ok(Size::new(120, 40)));
        assert_eq!(parse_container("10X5"), Ok(Size::new(10, 5)));
        assert!(parse_container("120").is_err());
        assert!(parse_container("ax5").is_err());
    }

    #[test]
    fn test_parse_cell() {
        assert_eq!(parse_cell("8x16"), Ok(TerminalCellMetrics::new(8.0, 16.0)));
        assert_eq!(parse_cell("7.5x15"), Ok(TerminalCellMetrics::new(7.5, 15.0)));
        assert!(parse_cell("8").is_err());
    }

    #[test]
    fn test_cli_parses() {
        let cli = Cli::try_parse_from([
            "tuimg", "size", "cat.png", "--width", "40", "--height", "auto", "--cell", "10x20",
        ])
        .unwrap();
        match cli.command {
            Commands::Size {
                width, height, cell, ..
            } => {
                assert_eq!(width, Some(CellDimension::Fixed(40)));
                assert_eq!(height, Some(CellDimension::Auto));
                assert_eq!(cell, Some(TerminalCellMetrics::new(10.0, 20.0)));
            }
            _ => panic!("expected size command"),
        }

        assert!(Cli::try_parse_from(["tuimg", "size", "cat.png", "--width", "big"]).is_err());
        assert!(Cli::try_parse_from(["tuimg", "view"]).is_err());
    }
}
