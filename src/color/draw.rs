use image::{DynamicImage, ImageBuffer, RgbaImage};
use raqote::{DrawOptions, DrawTarget, LineJoin, PathBuilder, SolidSource, Source, StrokeStyle};

use crate::color::bounds::{PixelBox, Point3};

const MARKER_RADIUS: f32 = 4.0;
const GLYPH_SCALE: f32 = 2.0;
const RED: SolidSource = SolidSource { r: 0xFF, g: 0x00, b: 0x00, a: 0xFF };

/// 3x5点阵字形，每行低3位从左到右
fn glyph(c: char) -> Option<[u8; 5]> {
    let rows = match c {
        '0' => [0b111, 0b101, 0b101, 0b101, 0b111],
        '1' => [0b010, 0b110, 0b010, 0b010, 0b111],
        '2' => [0b111, 0b001, 0b111, 0b100, 0b111],
        '3' => [0b111, 0b001, 0b111, 0b001, 0b111],
        '4' => [0b101, 0b101, 0b111, 0b001, 0b001],
        '5' => [0b111, 0b100, 0b111, 0b001, 0b111],
        '6' => [0b111, 0b100, 0b111, 0b101, 0b111],
        '7' => [0b111, 0b001, 0b010, 0b010, 0b010],
        '8' => [0b111, 0b101, 0b111, 0b101, 0b111],
        '9' => [0b111, 0b101, 0b111, 0b001, 0b111],
        '.' => [0b000, 0b000, 0b000, 0b000, 0b010],
        ',' => [0b000, 0b000, 0b000, 0b010, 0b100],
        '-' => [0b000, 0b000, 0b111, 0b000, 0b000],
        '(' => [0b001, 0b010, 0b010, 0b010, 0b001],
        ')' => [0b100, 0b010, 0b010, 0b010, 0b100],
        _ => return None,
    };
    Some(rows)
}

/// 位置标签文本，保留两位小数
pub fn position_label(position: &Point3) -> String {
    format!("({:.2},{:.2},{:.2})", position.x, position.y, position.z)
}

/// 检测结果标注器
///
/// 把帧图像放进raqote的DrawTarget，依次绘制检测框、位置标记和坐标标签，最后再转回图像。
pub struct Annotator {
    dt: DrawTarget,
    width: u32,
    height: u32,
}

impl Annotator {
    /// 以给定图像为底图创建标注器
    pub fn new(image: &DynamicImage) -> Self {
        let rgba_image = image.to_rgba8();
        let (width, height) = rgba_image.dimensions();
        let mut dt = DrawTarget::new(width as i32, height as i32);

        let image_data: Vec<u32> = rgba_image.chunks(4).map(|pixel| {
            let b = pixel[2];
            let g = pixel[1];
            let r = pixel[0];
            let a = pixel[3];
            u32::from_le_bytes([b, g, r, a])
        }).collect();

        let img = raqote::Image {
            width: width as i32,
            height: height as i32,
            data: &image_data,
        };
        dt.draw_image_at(0.0, 0.0, &img, &DrawOptions::new());

        Self { dt, width, height }
    }

    fn stroke_style() -> StrokeStyle {
        StrokeStyle {
            join: LineJoin::Round,
            width: 2.0,
            ..StrokeStyle::default()
        }
    }

    /// 绘制检测框，按类别ID区分颜色
    pub fn draw_box(&mut self, pixels: &PixelBox, class_id: usize) {
        let mut pb = PathBuilder::new();
        pb.rect(
            pixels.xmin as f32,
            pixels.ymin as f32,
            pixels.width() as f32,
            pixels.height() as f32,
        );
        let path = pb.finish();

        let color = match class_id % 3 {
            0 => SolidSource { r: 0x00, g: 0xFF, b: 0xFF, a: 0xFF }, // 青色
            1 => SolidSource { r: 0xFF, g: 0xC0, b: 0x00, a: 0xFF },
            _ => SolidSource { r: 0x40, g: 0xFF, b: 0x40, a: 0xFF },
        };
        self.dt.stroke(&path, &Source::Solid(color), &Self::stroke_style(), &DrawOptions::default());
    }

    /// 在采样点画圆形标记，并在旁边写出三维坐标
    pub fn mark_position(&mut self, center: (i32, i32), position: &Point3) {
        let (cx, cy) = (center.0 as f32, center.1 as f32);
        let mut pb = PathBuilder::new();
        pb.arc(cx, cy, MARKER_RADIUS, 0.0, 2.0 * std::f32::consts::PI);
        let path = pb.finish();
        self.dt.stroke(&path, &Source::Solid(RED), &StrokeStyle { width: 1.5, ..StrokeStyle::default() }, &DrawOptions::default());

        self.draw_text(&position_label(position), cx, cy);
    }

    /// 用点阵字形绘制文本，不支持的字符跳过
    fn draw_text(&mut self, text: &str, x: f32, y: f32) {
        let advance = 4.0 * GLYPH_SCALE;
        for (i, c) in text.chars().enumerate() {
            let Some(rows) = glyph(c) else { continue };
            let origin_x = x + i as f32 * advance;
            for (row, bits) in rows.iter().enumerate() {
                for col in 0..3 {
                    if bits & (0b100 >> col) != 0 {
                        self.dt.fill_rect(
                            origin_x + col as f32 * GLYPH_SCALE,
                            y + row as f32 * GLYPH_SCALE,
                            GLYPH_SCALE,
                            GLYPH_SCALE,
                            &Source::Solid(RED),
                            &DrawOptions::new(),
                        );
                    }
                }
            }
        }
    }

    /// 结束绘制，转回RGBA图像
    pub fn finish(self) -> DynamicImage {
        let pixels: Vec<u8> = self.dt.get_data().iter().flat_map(|&pixel| {
            let bytes = pixel.to_le_bytes();
            [bytes[2], bytes[1], bytes[0], bytes[3]] // BGRA to RGBA
        }).collect();

        let buffer: Option<RgbaImage> = ImageBuffer::from_raw(self.width, self.height, pixels);
        match buffer {
            Some(buffer) => DynamicImage::ImageRgba8(buffer),
            None => DynamicImage::new_rgba8(self.width, self.height),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::GenericImageView;

    #[test]
    fn label_has_two_decimals() {
        assert_eq!(position_label(&Point3::new(2.1, -0.087, 0.36)), "(2.10,-0.09,0.36)");
    }

    #[test]
    fn every_label_character_has_a_glyph() {
        assert!(position_label(&Point3::new(-1.5, 0.25, 10.0)).chars().all(|c| glyph(c).is_some()));
    }

    #[test]
    fn marker_changes_pixels_near_center() {
        let base = DynamicImage::new_rgb8(64, 64);
        let mut annotator = Annotator::new(&base);
        annotator.mark_position((20, 20), &Point3::new(1.0, 2.0, 3.0));
        let out = annotator.finish();
        assert_eq!(out.dimensions(), (64, 64));
        // 标签第一个字符 '(' 的右上角像素
        let p = out.get_pixel(20 + 4, 20);
        assert!(p.0[0] > 0x80);
    }
}
