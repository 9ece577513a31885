// src/visualization/window.rs

use super::frames::{Movie, MovieFrame, SpatialGrid};
use super::MovieConfig;
use eframe::egui;
use egui_plot::{Line, Plot, PlotPoints, Points, VLine};

/// Colour levels used to draw the posterior.
const COLOR_LEVELS: usize = 16;

pub struct MoviePlayer {
    movie: Movie<MovieFrame>,
    grid: SpatialGrid,
    frame_ind: usize,
    playing: bool,
    elapsed: f64,
}

impl MoviePlayer {
    pub fn new(movie: Movie<MovieFrame>, grid: SpatialGrid) -> Self {
        Self {
            movie,
            grid,
            frame_ind: 0,
            playing: true,
            elapsed: 0.0,
        }
    }

    pub fn run(
        movie: Movie<MovieFrame>,
        grid: SpatialGrid,
        config: MovieConfig,
    ) -> Result<(), eframe::Error> {
        let options = eframe::NativeOptions {
            viewport: egui::ViewportBuilder::default()
                .with_inner_size([config.window_width as f32, config.window_height as f32])
                .with_title("ripple-lfp - Decoded Position"),
            ..Default::default()
        };

        eframe::run_native(
            "ripple-lfp movie",
            options,
            Box::new(|_cc| Ok(Box::new(MoviePlayer::new(movie, grid)))),
        )
    }

    fn advance(&mut self, dt: f64) {
        if !self.playing || self.movie.frames.is_empty() {
            return;
        }
        self.elapsed += dt;
        let frame_period = 1.0 / self.movie.fps.max(1) as f64;
        while self.elapsed >= frame_period {
            self.elapsed -= frame_period;
            self.frame_ind = (self.frame_ind + 1) % self.movie.frames.len();
        }
    }
}

impl eframe::App for MoviePlayer {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        ctx.request_repaint();
        let dt = ctx.input(|i| i.stable_dt) as f64;
        self.advance(dt);

        egui::CentralPanel::default().show(ctx, |ui| {
            let Some(frame) = self.movie.frames.get(self.frame_ind) else {
                ui.label("No frames to show");
                return;
            };

            ui.horizontal(|ui| {
                let label = if self.playing { "Pause" } else { "Play" };
                if ui.button(label).clicked() {
                    self.playing = !self.playing;
                }
                let last = self.movie.frames.len() - 1;
                ui.add(egui::Slider::new(&mut self.frame_ind, 0..=last).text("frame"));
                ui.label(format!("time = {:0.2}", frame.time));
            });
            ui.separator();

            let limits = self.movie.axis_limits[0];
            let posterior_height = ui.available_height() * 5.0 / 6.0;
            Plot::new("posterior")
                .height(posterior_height)
                .data_aspect(1.0)
                .include_x(limits.x.0)
                .include_x(limits.x.1)
                .include_y(limits.y.0)
                .include_y(limits.y.1)
                .show_grid([false, false])
                .show(ui, |plot_ui| {
                    for (level, points) in posterior_levels(&self.grid, &frame.posterior, self.movie.vmax)
                        .into_iter()
                        .enumerate()
                    {
                        if points.is_empty() {
                            continue;
                        }
                        plot_ui.points(
                            Points::new(PlotPoints::from(points))
                                .radius(4.0)
                                .color(level_color(level)),
                        );
                    }

                    // Decoded position and its recent trail
                    if !frame.map_trail.is_empty() {
                        plot_ui.line(
                            Line::new(PlotPoints::from(frame.map_trail.clone()))
                                .color(egui::Color32::GREEN)
                                .width(3.0),
                        );
                    }
                    if let Some(map_position) = frame.map_position {
                        plot_ui.points(
                            Points::new(PlotPoints::from(vec![map_position]))
                                .radius(6.0)
                                .color(egui::Color32::GREEN)
                                .name("decoded position"),
                        );
                    }

                    // Actual position and heading
                    plot_ui.line(
                        Line::new(PlotPoints::from(frame.heading.to_vec()))
                            .color(egui::Color32::from_rgb(255, 0, 255))
                            .width(5.0),
                    );
                    plot_ui.points(
                        Points::new(PlotPoints::from(vec![frame.position]))
                            .radius(6.0)
                            .color(egui::Color32::from_rgb(255, 0, 255))
                            .name("actual position"),
                    );
                });

            let rate: PlotPoints = self
                .movie
                .window_times
                .iter()
                .zip(frame.rate_window.iter())
                .filter(|(_, r)| !r.is_nan())
                .map(|(t, r)| [*t, *r])
                .collect();
            Plot::new("multiunit")
                .height(ui.available_height())
                .include_y(0.0)
                .include_y(self.movie.rate_limit)
                .x_axis_label("Time [s]")
                .y_axis_label("Multiunit [spikes/s]")
                .show(ui, |plot_ui| {
                    plot_ui.line(Line::new(rate).color(egui::Color32::WHITE).width(2.0));
                    plot_ui.vline(VLine::new(0.0).color(egui::Color32::GRAY));
                });
        });
    }
}

/// Bin centres grouped by colour level on the `[0, vmax]` scale. Missing bins
/// are not drawn.
fn posterior_levels(grid: &SpatialGrid, posterior: &[f64], vmax: f64) -> Vec<Vec<[f64; 2]>> {
    let mut levels = vec![Vec::new(); COLOR_LEVELS];
    for (bin, &p) in posterior.iter().enumerate() {
        if p.is_nan() {
            continue;
        }
        let scaled = (p / vmax).clamp(0.0, 1.0);
        let level = ((scaled * (COLOR_LEVELS - 1) as f64).round() as usize).min(COLOR_LEVELS - 1);
        levels[level].push(grid.bin_center(bin));
    }
    levels
}

fn level_color(level: usize) -> egui::Color32 {
    let v = (level as f64 / (COLOR_LEVELS - 1) as f64 * 255.0) as u8;
    // dark purple to yellow, in the manner of viridis
    egui::Color32::from_rgb(v, (v as f32 * 0.85) as u8 + 20, 80u8.saturating_sub(v / 4) + 40)
}
