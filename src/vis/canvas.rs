use image::{Rgb, RgbImage};

use super::font::{ADVANCE, GLYPH_HEIGHT, GLYPH_WIDTH, glyph, text_width};

/// `RgbImage`に対する薄い描画レイヤー。画像外への書き込みは無視されます。
pub struct Canvas {
    image: RgbImage,
}

impl Canvas {
    pub fn new(width: u32, height: u32, background: Rgb<u8>) -> Self {
        Self {
            image: RgbImage::from_pixel(width, height, background),
        }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn into_image(self) -> RgbImage {
        self.image
    }

    pub fn put(&mut self, x: i64, y: i64, color: Rgb<u8>) {
        if x < 0 || y < 0 || x >= self.width() as i64 || y >= self.height() as i64 {
            return;
        }
        self.image.put_pixel(x as u32, y as u32, color);
    }

    fn stamp(&mut self, x: i64, y: i64, size: u32, color: Rgb<u8>) {
        let size = size.max(1) as i64;
        let offset = (size - 1) / 2;
        for dy in 0..size {
            for dx in 0..size {
                self.put(x - offset + dx, y - offset + dy, color);
            }
        }
    }

    /// 2点間をBresenhamのアルゴリズムで結びます。ペンは一辺`width`ピクセルの正方形です。
    pub fn line(&mut self, from: (i64, i64), to: (i64, i64), width: u32, color: Rgb<u8>) {
        let (mut x0, mut y0) = from;
        let (x1, y1) = to;
        let dx = (x1 - x0).abs();
        let dy = -(y1 - y0).abs();
        let sx = if x0 < x1 { 1 } else { -1 };
        let sy = if y0 < y1 { 1 } else { -1 };
        let mut err = dx + dy;

        loop {
            self.stamp(x0, y0, width, color);
            if x0 == x1 && y0 == y1 {
                break;
            }
            let e2 = 2 * err;
            if e2 >= dy {
                err += dy;
                x0 += sx;
            }
            if e2 <= dx {
                err += dx;
                y0 += sy;
            }
        }
    }

    pub fn rect_outline(&mut self, left: i64, top: i64, right: i64, bottom: i64, color: Rgb<u8>) {
        self.line((left, top), (right, top), 1, color);
        self.line((right, top), (right, bottom), 1, color);
        self.line((right, bottom), (left, bottom), 1, color);
        self.line((left, bottom), (left, top), 1, color);
    }

    /// 左上を`(x, y)`として`text`を描きます。
    /// グリフの1ピクセルは`scale` x `scale`のブロックに拡大されます。
    pub fn text(&mut self, x: i64, y: i64, text: &str, scale: u32, color: Rgb<u8>) {
        for_each_text_pixel(text, |u, v| {
            for sy in 0..scale {
                for sx in 0..scale {
                    let px = x + (u * scale + sx) as i64;
                    let py = y + (v * scale + sy) as i64;
                    self.put(px, py, color);
                }
            }
        });
    }

    /// `text`を反時計回りに90度回転して描きます（下から上に読む）。
    /// `(x, y)`は回転後の外接矩形の左上です。
    pub fn text_vertical(&mut self, x: i64, y: i64, text: &str, scale: u32, color: Rgb<u8>) {
        let extent = text_width(text) * scale;
        for_each_text_pixel(text, |u, v| {
            for sy in 0..scale {
                for sx in 0..scale {
                    let along = (u * scale + sx) as i64;
                    let across = (v * scale + sy) as i64;
                    self.put(x + across, y + extent as i64 - 1 - along, color);
                }
            }
        });
    }
}

fn for_each_text_pixel(text: &str, mut f: impl FnMut(u32, u32)) {
    for (i, c) in text.chars().enumerate() {
        let Some(rows) = glyph(c) else {
            continue;
        };
        let origin = i as u32 * ADVANCE;
        for (v, row) in rows.iter().enumerate().take(GLYPH_HEIGHT as usize) {
            for u in 0..GLYPH_WIDTH {
                if row & (1 << (GLYPH_WIDTH - 1 - u)) != 0 {
                    f(origin + u, v as u32);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WHITE: Rgb<u8> = Rgb([255, 255, 255]);
    const BLACK: Rgb<u8> = Rgb([0, 0, 0]);

    fn count(canvas: Canvas, color: Rgb<u8>) -> usize {
        canvas.into_image().pixels().filter(|p| **p == color).count()
    }

    #[test]
    fn horizontal_line_covers_both_endpoints() {
        let mut canvas = Canvas::new(10, 10, WHITE);
        canvas.line((1, 5), (8, 5), 1, BLACK);
        let image = canvas.into_image();
        assert_eq!(*image.get_pixel(1, 5), BLACK);
        assert_eq!(*image.get_pixel(8, 5), BLACK);
        assert_eq!(*image.get_pixel(0, 5), WHITE);
    }

    #[test]
    fn out_of_bounds_writes_are_dropped() {
        let mut canvas = Canvas::new(4, 4, WHITE);
        canvas.line((-10, -10), (20, 20), 3, BLACK);
        canvas.text(100, 100, "Loss", 2, BLACK);
        assert!(count(canvas, BLACK) > 0);
    }

    #[test]
    fn vertical_text_swaps_extent() {
        let mut canvas = Canvas::new(40, 40, WHITE);
        canvas.text_vertical(0, 0, "L", 1, BLACK);
        let image = canvas.into_image();
        // 'L' の縦棒は回転後に最下行へ来る
        for x in 0..GLYPH_HEIGHT {
            assert_eq!(*image.get_pixel(x, GLYPH_WIDTH - 1), BLACK);
        }
        assert_eq!(*image.get_pixel(0, GLYPH_WIDTH), WHITE);
    }

    #[test]
    fn scaled_text_fills_blocks() {
        let mut horizontal = Canvas::new(30, 30, WHITE);
        horizontal.text(0, 0, ".", 1, BLACK);
        let mut scaled = Canvas::new(30, 30, WHITE);
        scaled.text(0, 0, ".", 3, BLACK);
        assert_eq!(count(horizontal, BLACK) * 9, count(scaled, BLACK));
    }
}
