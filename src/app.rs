use anyhow::{Context, Result};
use image::DynamicImage;
use lru::LruCache;
use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use ratatui::Frame;
use ratatui::crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use std::collections::BTreeSet;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, Sender};
use std::time::Duration;

use crate::geometry::TerminalCellMetrics;
use crate::image::{ImageLoadError, ImageRenderable, ImageSource};
use crate::logging::FlashMessage;
use crate::storage::{Config, TerminalConfig};
use crate::terminal::{CellMetricsProvider, FixedMetrics, WindowMetrics};
use crate::ui;
use crate::widget::ImageWidget;

/// Request to decode an image in the background
struct ImageLoadRequest {
    path: PathBuf,
}

/// Result of decoding an image in the background
struct ImageLoadResult {
    path: PathBuf,
    image: Result<Arc<DynamicImage>, ImageLoadError>,
}

/// What the image pane is currently showing
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaneState {
    /// Waiting for the loader thread
    Loading,
    /// Image is set on the widget
    Ready,
    /// Decoding failed
    Failed(String),
}

/// Viewer application state
pub struct App {
    /// Images given on the command line
    pub paths: Vec<PathBuf>,

    /// Index into `paths` of the image on screen
    pub selected_index: usize,

    /// State of the image pane
    pub pane: PaneState,

    /// Widget showing the selected image
    widget: ImageWidget,

    /// Window-size metrics, refreshed when the terminal is resized
    window_metrics: Option<Arc<WindowMetrics>>,

    /// Application configuration
    pub config: Config,

    /// LRU cache of decoded images
    image_cache: LruCache<PathBuf, Arc<DynamicImage>>,

    /// Channel for requesting background image loads
    image_load_tx: Sender<ImageLoadRequest>,

    /// Channel for receiving completed image loads
    image_load_rx: Receiver<ImageLoadResult>,

    /// File watcher for reload-on-change (only present when watching)
    /// Kept alive to maintain the watch
    _file_watcher: Option<RecommendedWatcher>,

    /// Channel for receiving file change notifications
    file_watch_rx: Option<Receiver<notify::Result<notify::Event>>>,

    /// Flash messages displayed in the status line
    pub flash_messages: Vec<FlashMessage>,

    /// Receiver for flash messages from logger
    flash_rx: Option<Receiver<FlashMessage>>,

    /// Flag to request application exit
    pub should_quit: bool,
}

impl App {
    /// Create the viewer and start loading the first image
    pub fn new(
        paths: Vec<PathBuf>,
        config: Config,
        renderable: Box<dyn ImageRenderable>,
        picker_metrics: Option<TerminalCellMetrics>,
        flash_rx: Option<Receiver<FlashMessage>>,
    ) -> Result<Self> {
        let (window_metrics, metrics) = viewer_metrics(&config.terminal, picker_metrics);

        let widget = ImageWidget::new(renderable, metrics).with_style(config.viewer.style());

        let (load_tx, load_rx) = mpsc::channel::<ImageLoadRequest>();
        let (result_tx, result_rx) = mpsc::channel::<ImageLoadResult>();

        std::thread::spawn(move || {
            log::debug!("Image loader thread started");
            while let Ok(request) = load_rx.recv() {
                log::debug!("Decoding {:?}", request.path);
                let image = ImageSource::file(&request.path).decode();

                if result_tx
                    .send(ImageLoadResult {
                        path: request.path,
                        image,
                    })
                    .is_err()
                {
                    log::debug!("Image loader: main thread disconnected, exiting");
                    break;
                }
            }
            log::debug!("Image loader thread exiting");
        });

        let (file_watcher, file_watch_rx) = if config.viewer.watch {
            let (watcher, rx) = watch_parents(&paths)?;
            (Some(watcher), Some(rx))
        } else {
            (None, None)
        };

        let cache_size =
            NonZeroUsize::new(config.viewer.image_cache_size).unwrap_or(NonZeroUsize::MIN);

        let mut app = App {
            paths,
            selected_index: 0,
            pane: PaneState::Loading,
            widget,
            window_metrics,
            config,
            image_cache: LruCache::new(cache_size),
            image_load_tx: load_tx,
            image_load_rx: result_rx,
            _file_watcher: file_watcher,
            file_watch_rx,
            flash_messages: Vec::new(),
            flash_rx,
            should_quit: false,
        };

        app.request_image_load();

        Ok(app)
    }

    /// Path of the image on screen
    pub fn current_path(&self) -> Option<&Path> {
        self.paths.get(self.selected_index).map(PathBuf::as_path)
    }

    /// Pixel size of the image on screen, `(0, 0)` while none is loaded
    pub fn image_pixel_size(&self) -> (u32, u32) {
        self.widget.pixel_size()
    }

    /// Show the cached image for the selection, or ask the loader for it
    pub fn request_image_load(&mut self) {
        let Some(path) = self.current_path().map(Path::to_path_buf) else {
            self.pane = PaneState::Failed("No images".to_string());
            return;
        };

        if let Some(img) = self.image_cache.get(&path).cloned() {
            log::debug!("Image {:?} already cached", path);
            self.show(img);
            return;
        }

        // Drop the previous image so its protocol state isn't drawn meanwhile
        if let Err(e) = self.widget.set_image(None) {
            log::debug!("Failed to clear image: {}", e);
        }
        self.pane = PaneState::Loading;
        log::debug!("Requesting async load for {:?}", path);
        if self.image_load_tx.send(ImageLoadRequest { path }).is_err() {
            log::error!("Image loader thread is gone");
            self.pane = PaneState::Failed("Image loader stopped".to_string());
        }
    }

    fn show(&mut self, img: Arc<DynamicImage>) {
        match self.widget.set_image(Some(ImageSource::Decoded(img))) {
            Ok(()) => self.pane = PaneState::Ready,
            Err(e) => self.pane = PaneState::Failed(e.to_string()),
        }
    }

    /// Poll for completed image loads and update cache
    /// Should be called in the event loop before rendering
    pub fn update_image_cache(&mut self) {
        while let Ok(result) = self.image_load_rx.try_recv() {
            let is_current = self.current_path() == Some(result.path.as_path());
            match result.image {
                Ok(img) => {
                    log::debug!("Caching decoded image {:?}", result.path);
                    self.image_cache.put(result.path, Arc::clone(&img));
                    if is_current {
                        self.show(img);
                    }
                }
                Err(e) => {
                    log::warn!("{}", e);
                    if is_current {
                        self.pane = PaneState::Failed(e.to_string());
                    }
                }
            }
        }
    }

    /// Drop cached images whose files changed on disk
    pub fn check_file_changes(&mut self) {
        let Some(rx) = &self.file_watch_rx else {
            return;
        };

        let mut changed = BTreeSet::new();
        while let Ok(res) = rx.try_recv() {
            match res {
                Ok(event) if event.kind.is_modify() || event.kind.is_create() => {
                    for path in event.paths {
                        if self.paths.iter().any(|p| same_file(p, &path)) {
                            changed.insert(path);
                        }
                    }
                }
                Ok(_) => {}
                Err(e) => log::warn!("File watch error: {}", e),
            }
        }

        let mut reload_current = false;
        for path in &changed {
            let cached: Vec<PathBuf> = self
                .image_cache
                .iter()
                .filter(|(p, _)| same_file(p, path))
                .map(|(p, _)| p.clone())
                .collect();
            for p in cached {
                self.image_cache.pop(&p);
            }
            if self
                .current_path()
                .is_some_and(|current| same_file(current, path))
            {
                reload_current = true;
            }
        }

        if reload_current {
            log::info!("Image changed on disk, reloading");
            self.request_image_load();
        }
    }

    /// Decode the current image again
    pub fn reload(&mut self) {
        if let Some(path) = self.current_path().map(Path::to_path_buf) {
            self.image_cache.pop(&path);
            self.request_image_load();
        }
    }

    pub fn next_image(&mut self) {
        if self.selected_index + 1 < self.paths.len() {
            self.selected_index += 1;
            self.request_image_load();
        }
    }

    pub fn previous_image(&mut self) {
        if self.selected_index > 0 {
            self.selected_index -= 1;
            self.request_image_load();
        }
    }

    /// Terminal was resized; cell metrics may have changed with it
    pub fn on_resize(&mut self) {
        if let Some(metrics) = &self.window_metrics {
            metrics.refresh();
        }
    }

    /// Poll flash message receiver and add to queue
    pub fn poll_flash_messages(&mut self) {
        if let Some(rx) = &self.flash_rx {
            while let Ok(msg) = rx.try_recv() {
                self.flash_messages.push(msg);
            }
        }
    }

    /// Remove expired flash messages (based on config duration)
    pub fn prune_flash_messages(&mut self) {
        let ttl = Duration::from_millis(self.config.logging.flash_message_duration_ms);
        self.flash_messages.retain(|msg| !msg.is_expired(ttl));
    }

    pub fn handle_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Char('q') | KeyCode::Esc => self.should_quit = true,
            KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                self.should_quit = true
            }
            KeyCode::Char('n') | KeyCode::Char('j') | KeyCode::Right | KeyCode::Down => {
                self.next_image()
            }
            KeyCode::Char('p') | KeyCode::Char('k') | KeyCode::Left | KeyCode::Up => {
                self.previous_image()
            }
            KeyCode::Char('r') => self.reload(),
            _ => {}
        }
    }

    /// Run the background bookkeeping for one tick of the event loop
    pub fn tick(&mut self) {
        self.update_image_cache();
        self.check_file_changes();
        self.poll_flash_messages();
        self.prune_flash_messages();
    }

    pub fn render(&mut self, frame: &mut Frame) {
        let [title_area, image_area, status_area] = ui::create_main_layout(frame.area());

        ui::render_title(frame, title_area, self);

        match &self.pane {
            PaneState::Ready => {
                let size = self.widget.desired_size(image_area.as_size());
                let target = ui::center_in(image_area, size);
                frame.render_widget(&mut self.widget, target);
            }
            PaneState::Loading => ui::render_notice(frame, image_area, "Loading image..."),
            PaneState::Failed(msg) => ui::render_notice(frame, image_area, msg),
        }

        ui::render_status(frame, status_area, &self.flash_messages);
    }
}

/// Watch the directories containing `paths`
///
/// Directories rather than files, so editors that save by rename still
/// trigger a reload.
/// Pick the cell metrics the widget sizes images with
///
/// A graphics protocol encodes against the picker's font size, so when one
/// is in use the widget must resolve with the same numbers. Otherwise the
/// window is queried (and re-queried on resize) or the fallback is used.
fn viewer_metrics(
    terminal: &TerminalConfig,
    picker_metrics: Option<TerminalCellMetrics>,
) -> (Option<Arc<WindowMetrics>>, Box<dyn CellMetricsProvider>) {
    if let Some(metrics) = picker_metrics {
        log::debug!("Sizing images with picker font size {:?}", metrics);
        return (None, Box::new(FixedMetrics(metrics)));
    }
    if terminal.query_cell_size {
        let shared = Arc::new(WindowMetrics::with_fallback(terminal.fallback_metrics()));
        let provider: Box<dyn CellMetricsProvider> = Box::new(Arc::clone(&shared));
        return (Some(shared), provider);
    }
    (None, Box::new(FixedMetrics(terminal.fallback_metrics())))
}

fn watch_parents(
    paths: &[PathBuf],
) -> Result<(RecommendedWatcher, Receiver<notify::Result<notify::Event>>)> {
    let (tx, rx) = mpsc::channel();

    let mut watcher = notify::recommended_watcher(move |res: notify::Result<notify::Event>| {
        let _ = tx.send(res);
    })
    .context("Failed to create image file watcher")?;

    let dirs: BTreeSet<PathBuf> = paths
        .iter()
        .filter_map(|p| p.canonicalize().ok())
        .filter_map(|p| p.parent().map(Path::to_path_buf))
        .collect();

    for dir in dirs {
        if let Err(e) = watcher.watch(&dir, RecursiveMode::NonRecursive) {
            log::warn!("Failed to watch directory {:?}: {}", dir, e);
        } else {
            log::info!("Watching directory: {:?}", dir);
        }
    }

    Ok((watcher, rx))
}

/// Compare paths the way the watcher reports them (absolute)
fn same_file(a: &Path, b: &Path) -> bool {
    if a == b {
        return true;
    }
    match (a.canonicalize(), b.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image::HalfblockRenderable;
    use std::time::Instant;

    fn app(paths: Vec<PathBuf>) -> App {
        let mut config = Config::default();
        config.terminal.query_cell_size = false;
        App::new(paths, config, Box::new(HalfblockRenderable::new()), None, None).unwrap()
    }

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn wait_for_load(app: &mut App) {
        let deadline = Instant::now() + Duration::from_secs(10);
        while app.pane == PaneState::Loading && Instant::now() < deadline {
            app.update_image_cache();
            std::thread::sleep(Duration::from_millis(10));
        }
    }

    #[test]
    fn test_navigation_bounds() {
        let mut app = app(vec![
            PathBuf::from("/nonexistent/a.png"),
            PathBuf::from("/nonexistent/b.png"),
        ]);
        assert_eq!(app.selected_index, 0);

        app.handle_key(key(KeyCode::Char('k')));
        assert_eq!(app.selected_index, 0);

        app.handle_key(key(KeyCode::Char('n')));
        assert_eq!(app.selected_index, 1);
        assert_eq!(app.current_path(), Some(Path::new("/nonexistent/b.png")));

        app.handle_key(key(KeyCode::Char('j')));
        assert_eq!(app.selected_index, 1);

        app.handle_key(key(KeyCode::Char('q')));
        assert!(app.should_quit);
    }

    #[test]
    fn test_failed_load_reported() {
        let mut app = app(vec![PathBuf::from("/nonexistent/a.png")]);
        wait_for_load(&mut app);
        assert!(matches!(app.pane, PaneState::Failed(_)));
    }

    #[test]
    fn test_load_and_cache() {
        let name = format!("tuimg-app-{}.png", std::process::id());
        let path = std::env::temp_dir().join(name);
        image::RgbImage::new(20, 40).save(&path).unwrap();

        let mut app = app(vec![path.clone()]);
        wait_for_load(&mut app);
        assert_eq!(app.pane, PaneState::Ready);
        assert_eq!(app.widget.pixel_size(), (20, 40));

        // Fallback metrics are 10x20 pixels per cell
        assert_eq!(
            app.widget.desired_size(ratatui::layout::Size::new(80, 24)),
            ratatui::layout::Size::new(2, 2)
        );

        // Cached: shown immediately, no loader round trip
        app.request_image_load();
        assert_eq!(app.pane, PaneState::Ready);

        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_picker_metrics_take_priority() {
        let mut terminal = TerminalConfig::default();
        terminal.query_cell_size = true;

        let picker = TerminalCellMetrics::new(8.0, 16.0);
        let (window, provider) = viewer_metrics(&terminal, Some(picker));
        assert!(window.is_none());
        assert_eq!(provider.cell_pixel_metrics(), picker);

        let (window, _) = viewer_metrics(&terminal, None);
        assert!(window.is_some());

        terminal.query_cell_size = false;
        let (window, provider) = viewer_metrics(&terminal, None);
        assert!(window.is_none());
        assert_eq!(provider.cell_pixel_metrics(), terminal.fallback_metrics());
    }

    #[test]
    fn test_widget_sized_with_picker_metrics() {
        let name = format!("tuimg-picker-{}.png", std::process::id());
        let path = std::env::temp_dir().join(name);
        image::RgbImage::new(20, 40).save(&path).unwrap();

        let mut app = App::new(
            vec![path.clone()],
            Config::default(),
            Box::new(HalfblockRenderable::new()),
            Some(TerminalCellMetrics::new(5.0, 10.0)),
            None,
        )
        .unwrap();
        wait_for_load(&mut app);
        assert_eq!(app.pane, PaneState::Ready);
        assert_eq!(
            app.widget.desired_size(ratatui::layout::Size::new(80, 24)),
            ratatui::layout::Size::new(4, 4)
        );

        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_stopped_loader_reported() {
        let mut app = app(vec![PathBuf::from("/nonexistent/a.png")]);
        let (tx, rx) = mpsc::channel();
        drop(rx);
        app.image_load_tx = tx;

        app.request_image_load();
        assert_eq!(app.pane, PaneState::Failed("Image loader stopped".to_string()));
    }

    #[test]
    fn test_no_images() {
        let app = app(Vec::new());
        assert!(matches!(app.pane, PaneState::Failed(_)));
        assert!(app.current_path().is_none());
    }
}
