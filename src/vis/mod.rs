//! 損失曲線の描画
//!
//! 6.4 x 4.8インチ、100 DPIの単一軸の折れ線グラフを出力します。
//! 軸の枠は図の端から内側に置き、両軸に目盛り、軸ラベル、中央揃えのタイトルを描きます。

use std::fs::{self, File};
use std::io::BufWriter;
use std::path::Path;

use image::{Rgb, RgbImage};

use crate::error::Result;

pub mod canvas;
pub mod font;

use canvas::Canvas;
use font::{GLYPH_HEIGHT, text_width};

pub const FIG_WIDTH_IN: f32 = 6.4;
pub const FIG_HEIGHT_IN: f32 = 4.8;
pub const DPI: u32 = 100;
const METERS_PER_INCH: f64 = 0.0254;

pub const TITLE: &str = "1D quadratic GD (autodiff)";
pub const X_LABEL: &str = "Step";
pub const Y_LABEL: &str = "Loss";

pub const BACKGROUND: Rgb<u8> = Rgb([255, 255, 255]);
pub const FOREGROUND: Rgb<u8> = Rgb([0, 0, 0]);
/// "tab:blue"
pub const LINE_COLOR: Rgb<u8> = Rgb([0x1f, 0x77, 0xb4]);

const LINE_WIDTH: u32 = 2;
const TEXT_SCALE: u32 = 2;
const TICK_LENGTH: i64 = 5;
const PAD: i64 = 4;
const MAX_TICKS: usize = 8;
// 軸の範囲に加える余白（データ幅に対する割合）
const MARGIN: f64 = 0.05;

// 軸の枠の位置（図の左下からの割合）
const AXES_LEFT: f32 = 0.125;
const AXES_RIGHT: f32 = 0.9;
const AXES_BOTTOM: f32 = 0.11;
const AXES_TOP: f32 = 0.88;

/// インチ単位の図の大きさを`dpi`でピクセルに換算します。
pub fn canvas_size(width_in: f32, height_in: f32, dpi: u32) -> (u32, u32) {
    (
        (width_in * dpi as f32).round() as u32,
        (height_in * dpi as f32).round() as u32,
    )
}

fn pixel_dims(dpi: u32) -> png::PixelDimensions {
    let ppm = (dpi as f64 / METERS_PER_INCH).round() as u32;
    png::PixelDimensions {
        xppu: ppm,
        yppu: ppm,
        unit: png::Unit::Meter,
    }
}

/// 1系列の折れ線グラフ。x軸はサンプルのインデックス
#[derive(Debug, Clone)]
pub struct LinePlot<'a> {
    values: &'a [f32],
    title: &'a str,
    x_label: &'a str,
    y_label: &'a str,
    dpi: u32,
}

impl<'a> LinePlot<'a> {
    pub fn new(values: &'a [f32]) -> Self {
        Self {
            values,
            title: "",
            x_label: "",
            y_label: "",
            dpi: DPI,
        }
    }

    pub fn title(mut self, title: &'a str) -> Self {
        self.title = title;
        self
    }

    pub fn x_label(mut self, label: &'a str) -> Self {
        self.x_label = label;
        self
    }

    pub fn y_label(mut self, label: &'a str) -> Self {
        self.y_label = label;
        self
    }

    pub fn dpi(mut self, dpi: u32) -> Self {
        self.dpi = dpi;
        self
    }

    pub fn render(&self) -> RgbImage {
        let (width, height) = canvas_size(FIG_WIDTH_IN, FIG_HEIGHT_IN, self.dpi);
        let mut canvas = Canvas::new(width, height, BACKGROUND);

        let frame = Frame::new(width, height);
        let x_range = padded_range(
            (0..self.values.len()).map(|i| i as f64),
            self.values.len() > 1,
        );
        let y_range = padded_range(self.values.iter().map(|&v| v as f64), true);
        let x_ticks = nice_ticks(x_range.0, x_range.1, MAX_TICKS);
        let y_ticks = nice_ticks(y_range.0, y_range.1, MAX_TICKS);

        // データ系列
        let points: Vec<Option<(i64, i64)>> = self
            .values
            .iter()
            .enumerate()
            .map(|(i, &v)| {
                let v = v as f64;
                v.is_finite()
                    .then(|| (frame.map_x(i as f64, x_range), frame.map_y(v, y_range)))
            })
            .collect();
        for pair in points.windows(2) {
            if let [Some(a), Some(b)] = pair {
                canvas.line(*a, *b, LINE_WIDTH, LINE_COLOR);
            }
        }
        if let [Some(only)] = points.as_slice() {
            canvas.line(*only, *only, LINE_WIDTH, LINE_COLOR);
        }

        canvas.rect_outline(frame.left, frame.top, frame.right, frame.bottom, FOREGROUND);

        let glyph_h = (GLYPH_HEIGHT * TEXT_SCALE) as i64;

        // x軸の目盛り
        for tick in &x_ticks.values {
            let px = frame.map_x(*tick, x_range);
            canvas.line(
                (px, frame.bottom),
                (px, frame.bottom + TICK_LENGTH),
                1,
                FOREGROUND,
            );
            let label = format_tick(*tick, x_ticks.decimals);
            let w = (text_width(&label) * TEXT_SCALE) as i64;
            canvas.text(
                px - w / 2,
                frame.bottom + TICK_LENGTH + PAD,
                &label,
                TEXT_SCALE,
                FOREGROUND,
            );
        }

        // y軸の目盛り
        let mut widest_y_label = 0;
        for tick in &y_ticks.values {
            let py = frame.map_y(*tick, y_range);
            canvas.line((frame.left - TICK_LENGTH, py), (frame.left, py), 1, FOREGROUND);
            let label = format_tick(*tick, y_ticks.decimals);
            let w = (text_width(&label) * TEXT_SCALE) as i64;
            widest_y_label = widest_y_label.max(w);
            canvas.text(
                frame.left - TICK_LENGTH - PAD - w,
                py - glyph_h / 2,
                &label,
                TEXT_SCALE,
                FOREGROUND,
            );
        }

        let x_label_w = (text_width(self.x_label) * TEXT_SCALE) as i64;
        canvas.text(
            (frame.left + frame.right) / 2 - x_label_w / 2,
            frame.bottom + TICK_LENGTH + 3 * PAD + glyph_h,
            self.x_label,
            TEXT_SCALE,
            FOREGROUND,
        );

        let y_label_h = (text_width(self.y_label) * TEXT_SCALE) as i64;
        canvas.text_vertical(
            frame.left - TICK_LENGTH - 3 * PAD - widest_y_label - glyph_h,
            (frame.top + frame.bottom) / 2 - y_label_h / 2,
            self.y_label,
            TEXT_SCALE,
            FOREGROUND,
        );

        let title_w = (text_width(self.title) * TEXT_SCALE) as i64;
        canvas.text(
            width as i64 / 2 - title_w / 2,
            frame.top - 2 * PAD - glyph_h,
            self.title,
            TEXT_SCALE,
            FOREGROUND,
        );

        canvas.into_image()
    }

    /// 描画して`path`にPNGとして書き出します。
    /// 親ディレクトリがなければ作成し、既存のファイルは上書きします。
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let image = self.render();

        let file = BufWriter::new(File::create(path)?);
        let mut encoder = png::Encoder::new(file, image.width(), image.height());
        encoder.set_color(png::ColorType::Rgb);
        encoder.set_depth(png::BitDepth::Eight);
        // 解像度をpHYsチャンクに記録する（PNGの単位はピクセル毎メートル）
        encoder.set_pixel_dims(Some(pixel_dims(self.dpi)));
        let mut writer = encoder.write_header()?;
        writer.write_image_data(image.as_raw())?;
        writer.finish()?;
        Ok(())
    }
}

/// ステップごとの損失の診断図を`path`に出力します。
pub fn save_loss_plot(history: &[f32], path: &Path) -> Result<()> {
    log::debug!(points = history.len(); "rendering loss plot");
    LinePlot::new(history)
        .title(TITLE)
        .x_label(X_LABEL)
        .y_label(Y_LABEL)
        .save(path)
}

/// ピクセル座標での軸の枠
#[derive(Debug, Clone, Copy)]
struct Frame {
    left: i64,
    right: i64,
    top: i64,
    bottom: i64,
}

impl Frame {
    fn new(width: u32, height: u32) -> Self {
        let w = width as f32;
        let h = height as f32;
        Self {
            left: (AXES_LEFT * w).round() as i64,
            right: (AXES_RIGHT * w).round() as i64,
            top: ((1.0 - AXES_TOP) * h).round() as i64,
            bottom: ((1.0 - AXES_BOTTOM) * h).round() as i64,
        }
    }

    fn map_x(&self, x: f64, (lo, hi): (f64, f64)) -> i64 {
        let t = (x - lo) / (hi - lo);
        self.left + (t * (self.right - self.left) as f64).round() as i64
    }

    fn map_y(&self, y: f64, (lo, hi): (f64, f64)) -> i64 {
        let t = (y - lo) / (hi - lo);
        self.bottom - (t * (self.bottom - self.top) as f64).round() as i64
    }
}

/// 有限なサンプルの最小値と最大値。`with_margin`なら両側に`MARGIN`を加えます。
/// 空の入力は`(0, 1)`になり、幅0の範囲は描画できるように広げます。
fn padded_range(values: impl Iterator<Item = f64>, with_margin: bool) -> (f64, f64) {
    let (lo, hi) = values
        .filter(|v| v.is_finite())
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
            (lo.min(v), hi.max(v))
        });
    if lo > hi {
        return (0.0, 1.0);
    }
    let span = hi - lo;
    if span <= f64::EPSILON * lo.abs().max(1.0) {
        let pad = if lo == 0.0 { 0.5 } else { lo.abs() * MARGIN };
        return (lo - pad, hi + pad);
    }
    if with_margin {
        (lo - span * MARGIN, hi + span * MARGIN)
    } else {
        (lo, hi)
    }
}

#[derive(Debug, Clone, PartialEq)]
struct Ticks {
    values: Vec<f64>,
    decimals: usize,
}

/// `[lo, hi]`内に1/2/5 x 10^k間隔で並ぶ目盛り。個数は`max_ticks`以下
fn nice_ticks(lo: f64, hi: f64, max_ticks: usize) -> Ticks {
    let span = hi - lo;
    let raw = span / max_ticks.max(1) as f64;
    let magnitude = 10f64.powf(raw.log10().floor());
    let step = [1.0, 2.0, 5.0, 10.0]
        .iter()
        .map(|m| m * magnitude)
        .find(|step| (span / step).floor() as usize + 1 <= max_ticks)
        .unwrap_or(10.0 * magnitude);

    let first = (lo / step).ceil() as i64;
    let last = (hi / step).floor() as i64;
    let values = (first..=last)
        .map(|k| {
            let v = k as f64 * step;
            // -0.0 を避ける
            if v.abs() < step * 1e-9 { 0.0 } else { v }
        })
        .collect();

    let decimals = if step >= 1.0 {
        0
    } else {
        (-step.log10()).ceil().max(0.0) as usize
    };
    Ticks { values, decimals }
}

fn format_tick(value: f64, decimals: usize) -> String {
    format!("{:.*}", decimals, value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn figure_is_640_by_480_at_100_dpi() {
        assert_eq!(canvas_size(FIG_WIDTH_IN, FIG_HEIGHT_IN, DPI), (640, 480));
    }

    #[test]
    fn dpi_is_stored_as_pixels_per_meter() {
        let dims = pixel_dims(DPI);
        assert_eq!((dims.xppu, dims.yppu), (3937, 3937));
        assert_eq!(dims.unit, png::Unit::Meter);
    }

    #[test]
    fn step_axis_ticks_are_multiples_of_ten() {
        let (lo, hi) = padded_range((0..50).map(|i| i as f64), true);
        let ticks = nice_ticks(lo, hi, MAX_TICKS);
        assert_eq!(ticks.values, vec![0.0, 10.0, 20.0, 30.0, 40.0, 50.0]);
        assert_eq!(ticks.decimals, 0);
    }

    #[test]
    fn fractional_ticks_get_decimals() {
        let ticks = nice_ticks(-0.2, 4.2, MAX_TICKS);
        assert_eq!(ticks.values, vec![0.0, 1.0, 2.0, 3.0, 4.0]);
        let ticks = nice_ticks(0.0, 0.9, MAX_TICKS);
        assert_eq!(ticks.decimals, 1);
        assert_eq!(format_tick(0.2 * 3.0, ticks.decimals), "0.6");
    }

    #[test]
    fn tick_count_is_bounded() {
        for (lo, hi) in [(0.0, 1.0), (-3.0, 7.5), (1e-9, 4.2), (0.0, 49.0), (100.0, 100.5)] {
            let ticks = nice_ticks(lo, hi, MAX_TICKS);
            assert!(!ticks.values.is_empty(), "no ticks for {lo}..{hi}");
            assert!(ticks.values.len() <= MAX_TICKS, "too many ticks for {lo}..{hi}");
        }
    }

    #[test]
    fn degenerate_ranges_are_widened() {
        assert_eq!(padded_range(std::iter::empty(), true), (0.0, 1.0));
        assert_eq!(padded_range([0.0].into_iter(), true), (-0.5, 0.5));
        let (lo, hi) = padded_range([4.0, f64::NAN, 4.0].into_iter(), true);
        assert!(lo < 4.0 && hi > 4.0);
    }

    #[test]
    fn frame_maps_range_ends_to_box_edges() {
        let frame = Frame::new(640, 480);
        assert_eq!(frame.map_x(0.0, (0.0, 1.0)), frame.left);
        assert_eq!(frame.map_x(1.0, (0.0, 1.0)), frame.right);
        assert_eq!(frame.map_y(0.0, (0.0, 1.0)), frame.bottom);
        assert_eq!(frame.map_y(1.0, (0.0, 1.0)), frame.top);
    }
}
