//! Desktop shell and eframe integration.
//!
//! Drives element-set acquisition, the telemetry tick, the 2D tracker
//! raster and the tile map from the egui update loop. Network and disk
//! work happens on background threads and reports back over channels.

use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::{mpsc, Arc, Mutex};
use std::time::Instant;

use chrono::Utc;
use eframe::egui;

use iss_tracker::assets::{load_sprite, AssetSet, MAP_MARKER_ICON};
use iss_tracker::cache::{AcquisitionHandle, ElementSetCache};
use iss_tracker::compositor::{Compositor, FrameOutcome};
use iss_tracker::config::{dirs_cache, TrackerConfig};
use iss_tracker::geodetic::Telemetry;
use iss_tracker::map_view::{MapViewport, TileCoord, TILE_SIZE};
use iss_tracker::raster::{PixmapSurface, Sprite};
use iss_tracker::readout::{element_summary, Readout};
use iss_tracker::scheduler::TelemetryScheduler;
use iss_tracker::tle::ElementSet;

const TILE_WORKERS: usize = 4;
const MAP_MARKER_SIZE: f32 = 40.0;

fn color_image(sprite: &Sprite) -> egui::ColorImage {
    egui::ColorImage::from_rgba_premultiplied(
        [sprite.width() as usize, sprite.height() as usize],
        sprite.data(),
    )
}

fn decode_tile(bytes: &[u8]) -> Option<egui::ColorImage> {
    let img = image::load_from_memory(bytes).ok()?.to_rgba8();
    let size = [img.width() as usize, img.height() as usize];
    Some(egui::ColorImage::from_rgba_unmultiplied(size, img.as_raw()))
}

fn fetch_tile(agent: &ureq::Agent, url: &str, cache_path: &Path) -> Option<egui::ColorImage> {
    if let Some(image) = std::fs::read(cache_path).ok().and_then(|b| decode_tile(&b)) {
        return Some(image);
    }
    let resp = match agent.get(url).call() {
        Ok(resp) => resp,
        Err(e) => {
            log::warn!("Tile fetch failed for {}: {}", url, e);
            return None;
        }
    };
    let mut bytes = Vec::new();
    std::io::Read::read_to_end(&mut resp.into_reader(), &mut bytes).ok()?;
    let image = decode_tile(&bytes)?;
    if let Some(parent) = cache_path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }
    let _ = std::fs::write(cache_path, &bytes);
    Some(image)
}

/// Background tile loader with a disk cache, feeding egui textures.
struct TileFetcher {
    fetch_tx: mpsc::Sender<TileCoord>,
    result_rx: mpsc::Receiver<(TileCoord, Option<egui::ColorImage>)>,
    textures: HashMap<TileCoord, egui::TextureHandle>,
    pending: HashSet<TileCoord>,
    failed: HashSet<TileCoord>,
}

impl TileFetcher {
    fn spawn(config: &TrackerConfig) -> Self {
        let (fetch_tx, fetch_rx) = mpsc::channel::<TileCoord>();
        let (result_tx, result_rx) = mpsc::channel();
        let fetch_rx = Arc::new(Mutex::new(fetch_rx));
        let cache_dir = dirs_cache().join("iss-tracker").join("tiles");
        let agent = ureq::AgentBuilder::new().timeout(config.http_timeout()).build();

        for _ in 0..TILE_WORKERS {
            let rx = fetch_rx.clone();
            let tx = result_tx.clone();
            let agent = agent.clone();
            let template = config.tile_url.clone();
            let cache_dir = cache_dir.clone();
            std::thread::spawn(move || loop {
                let msg = match rx.lock() {
                    Ok(lock) => lock.recv(),
                    Err(_) => break,
                };
                let Ok(coord) = msg else { break };
                let cache_path = cache_dir
                    .join(coord.z.to_string())
                    .join(coord.y.to_string())
                    .join(format!("{}.jpg", coord.x));
                let image = fetch_tile(&agent, &coord.url(&template), &cache_path);
                if tx.send((coord, image)).is_err() {
                    break;
                }
            });
        }

        Self {
            fetch_tx,
            result_rx,
            textures: HashMap::new(),
            pending: HashSet::new(),
            failed: HashSet::new(),
        }
    }

    fn receive(&mut self, ctx: &egui::Context) {
        while let Ok((coord, image)) = self.result_rx.try_recv() {
            self.pending.remove(&coord);
            match image {
                Some(image) => {
                    let handle = ctx.load_texture(
                        format!("tile_{}_{}_{}", coord.z, coord.x, coord.y),
                        image,
                        egui::TextureOptions::LINEAR,
                    );
                    self.textures.insert(coord, handle);
                }
                None => {
                    self.failed.insert(coord);
                }
            }
        }
    }

    fn texture(&mut self, coord: TileCoord) -> Option<&egui::TextureHandle> {
        if !self.textures.contains_key(&coord)
            && !self.failed.contains(&coord)
            && self.pending.insert(coord)
            && self.fetch_tx.send(coord).is_err()
        {
            self.pending.remove(&coord);
        }
        self.textures.get(&coord)
    }
}

pub(crate) struct TrackerApp {
    acquisition: Option<AcquisitionHandle>,
    status: String,
    scheduler: TelemetryScheduler,
    readout_rx: mpsc::Receiver<Telemetry>,
    readout: Option<Readout>,
    map_rx: mpsc::Receiver<Telemetry>,
    map: MapViewport,
    tiles: TileFetcher,
    marker: Option<Sprite>,
    marker_texture: Option<egui::TextureHandle>,
    compositor: Compositor,
    assets_rx: Option<mpsc::Receiver<iss_tracker::Result<AssetSet>>>,
    asset_error: Option<String>,
    surface: Option<PixmapSurface>,
    tracker_texture: Option<egui::TextureHandle>,
}

impl TrackerApp {
    pub(crate) fn new(config: TrackerConfig) -> Self {
        let acquisition = ElementSetCache::from_config(&config).spawn();

        let mut scheduler = TelemetryScheduler::new(config.tick_interval());
        let readout_rx = scheduler.subscribe();
        let map_rx = scheduler.subscribe();

        let (assets_tx, assets_rx) = mpsc::channel();
        let asset_dir = config.asset_dir.clone();
        std::thread::spawn(move || {
            let _ = assets_tx.send(AssetSet::load(&asset_dir));
        });

        let marker = match load_sprite(&config.asset_dir.join(MAP_MARKER_ICON)) {
            Ok(sprite) => Some(sprite),
            Err(e) => {
                log::info!("Map marker icon unavailable, drawing a dot: {}", e);
                None
            }
        };

        let compositor = Compositor::new()
            .with_horizon_radius(config.horizon_radius_deg)
            .with_path_window(config.path_window_minutes);

        Self {
            acquisition: Some(acquisition),
            status: String::new(),
            scheduler,
            readout_rx,
            readout: None,
            map_rx,
            map: MapViewport::new(config.map_zoom, config.pan_duration()),
            tiles: TileFetcher::spawn(&config),
            marker,
            marker_texture: None,
            compositor,
            assets_rx: Some(assets_rx),
            asset_error: None,
            surface: None,
            tracker_texture: None,
        }
    }

    fn poll_acquisition(&mut self) {
        let Some(handle) = &self.acquisition else {
            return;
        };
        while let Ok(status) = handle.status.try_recv() {
            self.status = status.to_string();
        }
        match handle.result.try_recv() {
            Ok(acquisition) => {
                log::info!("Element set resolved from {:?}", acquisition.origin);
                let now = Utc::now();
                if let Err(e) = self.scheduler.install(acquisition.element_set, now) {
                    log::error!("Resolved element set is unusable, using embedded set: {}", e);
                    if let Err(e) = self.scheduler.install(ElementSet::embedded(), now) {
                        log::error!("Embedded element set is unusable: {}", e);
                    }
                }
                while let Ok(status) = handle.status.try_recv() {
                    self.status = status.to_string();
                }
                self.acquisition = None;
            }
            Err(mpsc::TryRecvError::Empty) => {}
            Err(mpsc::TryRecvError::Disconnected) => {
                log::error!("Acquisition thread exited without a result");
                self.acquisition = None;
            }
        }
    }

    fn poll_assets(&mut self) {
        let Some(rx) = &self.assets_rx else {
            return;
        };
        match rx.try_recv() {
            Ok(Ok(assets)) => {
                self.compositor.set_assets(assets);
                self.assets_rx = None;
            }
            Ok(Err(e)) => {
                log::error!("{}", e);
                self.asset_error = Some(e.to_string());
                self.assets_rx = None;
            }
            Err(mpsc::TryRecvError::Empty) => {}
            Err(mpsc::TryRecvError::Disconnected) => self.assets_rx = None,
        }
    }

    fn drain_subscriptions(&mut self) {
        if let Some(latest) = self.readout_rx.try_iter().last() {
            self.readout = Some(Readout::from_telemetry(&latest));
        }
        for telemetry in self.map_rx.try_iter() {
            self.map.recenter(telemetry.lat, telemetry.lng, Instant::now());
        }
    }

    fn paint_tracker(&mut self, ctx: &egui::Context) {
        let (Some(track), Some(telemetry)) = (self.scheduler.propagator(), self.scheduler.latest()) else {
            return;
        };
        let surface = match self.surface.as_mut() {
            Some(surface) => surface,
            None => match PixmapSurface::new(1, 1) {
                Ok(surface) => self.surface.insert(surface),
                Err(e) => {
                    log::error!("{}", e);
                    return;
                }
            },
        };
        match self.compositor.paint(surface, track, telemetry, Utc::now()) {
            Ok(FrameOutcome::Painted(_)) => {
                let image = color_image(surface.pixmap());
                match &mut self.tracker_texture {
                    Some(handle) => handle.set(image, egui::TextureOptions::LINEAR),
                    None => {
                        self.tracker_texture =
                            Some(ctx.load_texture("tracker", image, egui::TextureOptions::LINEAR));
                    }
                }
            }
            Ok(FrameOutcome::NotReady | FrameOutcome::Skipped) => {}
            Err(e) => log::error!("Tracker frame failed: {}", e),
        }
    }

    fn tracker_ui(&mut self, ui: &mut egui::Ui) {
        let width = ui.available_width();
        self.compositor.observe_container(width);
        let (w, h) = self.compositor.raster_size();
        let (rect, _) = ui.allocate_exact_size(egui::vec2(w as f32, h as f32), egui::Sense::hover());
        let painter = ui.painter_at(rect);

        if let Some(texture) = &self.tracker_texture {
            painter.image(
                texture.id(),
                rect,
                egui::Rect::from_min_max(egui::pos2(0.0, 0.0), egui::pos2(1.0, 1.0)),
                egui::Color32::WHITE,
            );
        } else {
            painter.rect_filled(rect, 0.0, egui::Color32::BLACK);
        }

        if let Some(err) = &self.asset_error {
            painter.text(
                rect.center(),
                egui::Align2::CENTER_CENTER,
                err,
                egui::FontId::proportional(16.0),
                egui::Color32::RED,
            );
        }
        if !self.status.is_empty() {
            painter.text(
                rect.left_top() + egui::vec2(10.0, 10.0),
                egui::Align2::LEFT_TOP,
                &self.status,
                egui::FontId::proportional(16.0),
                egui::Color32::YELLOW,
            );
        }
    }

    fn footer_ui(&self, ui: &mut egui::Ui) {
        let Some(readout) = &self.readout else {
            ui.label("Waiting for telemetry...");
            return;
        };
        ui.horizontal(|ui| {
            for (label, value) in readout.fields() {
                ui.vertical(|ui| {
                    ui.weak(label);
                    ui.strong(value);
                });
                ui.add_space(24.0);
            }
            ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                ui.vertical(|ui| {
                    ui.weak("Time (GMT)");
                    ui.strong(&readout.time);
                });
            });
        });
        if let Some(propagator) = self.scheduler.propagator() {
            ui.weak(element_summary(propagator, Utc::now()));
        }
    }

    fn map_ui(&mut self, ui: &mut egui::Ui, ctx: &egui::Context) {
        let width = ui.available_width();
        let (rect, _) = ui.allocate_exact_size(egui::vec2(width, width / 2.0), egui::Sense::hover());
        let painter = ui.painter_at(rect);
        painter.rect_filled(rect, 8.0, egui::Color32::from_gray(20));

        let now = Instant::now();
        self.tiles.receive(ctx);
        let uv = egui::Rect::from_min_max(egui::pos2(0.0, 0.0), egui::pos2(1.0, 1.0));
        let tile = TILE_SIZE as f32;
        for placed in self.map.visible_tiles(now, rect.width() as f64, rect.height() as f64) {
            if let Some(texture) = self.tiles.texture(placed.coord) {
                let min = rect.min + egui::vec2(placed.screen_x as f32, placed.screen_y as f32);
                let tile_rect = egui::Rect::from_min_size(min, egui::vec2(tile, tile));
                painter.image(texture.id(), tile_rect, uv, egui::Color32::WHITE);
            }
        }

        if let Some((x, y)) = self.map.marker_position(now, rect.width() as f64, rect.height() as f64) {
            let tip = rect.min + egui::vec2(x as f32, y as f32);
            if self.marker_texture.is_none() {
                if let Some(marker) = &self.marker {
                    self.marker_texture =
                        Some(ctx.load_texture("map_marker", color_image(marker), egui::TextureOptions::LINEAR));
                }
            }
            match &self.marker_texture {
                Some(texture) => {
                    // pin anchored at its bottom centre
                    let marker_rect = egui::Rect::from_center_size(
                        tip - egui::vec2(0.0, MAP_MARKER_SIZE / 2.0),
                        egui::vec2(MAP_MARKER_SIZE, MAP_MARKER_SIZE),
                    );
                    painter.image(texture.id(), marker_rect, uv, egui::Color32::WHITE);
                }
                None => {
                    painter.circle_filled(tip, 6.0, egui::Color32::RED);
                }
            }
        }
    }
}

impl eframe::App for TrackerApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.poll_acquisition();
        self.poll_assets();
        self.scheduler.poll(Utc::now());
        self.drain_subscriptions();
        self.paint_tracker(ctx);

        egui::TopBottomPanel::bottom("readout").show(ctx, |ui| {
            self.footer_ui(ui);
        });

        egui::CentralPanel::default().show(ctx, |ui| {
            egui::ScrollArea::vertical().show(ui, |ui| {
                self.tracker_ui(ui);
                ui.add_space(12.0);
                self.map_ui(ui, ctx);
            });
        });

        ctx.request_repaint();
    }
}
