use image::{imageops::FilterType, DynamicImage, GenericImageView, RgbImage};
use ndarray::{Array, Array4};

use crate::color::bounds::NormBox;

/// 填充区域的像素值（归一化后）
const LETTERBOX_PAD: f32 = 0.5;

/// 传感器图像的像素编码
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PixelEncoding {
    #[default]
    Rgb8,
    Bgr8,
}

/// 把图像统一转换成RGB
///
/// BGR8编码的图像交换R、B通道。
pub fn to_rgb(img: &DynamicImage, encoding: PixelEncoding) -> RgbImage {
    let mut rgb = img.to_rgb8();
    if encoding == PixelEncoding::Bgr8 {
        for pixel in rgb.pixels_mut() {
            pixel.0.swap(0, 2);
        }
    }
    rgb
}

/// 保持宽高比缩放时的几何信息
///
/// 记录缩放后图像在网络输入中的尺寸，用于把解码框映射回原始帧。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Letterbox {
    pub input_width: usize,
    pub input_height: usize,
    pub scaled_width: usize,
    pub scaled_height: usize,
}

impl Letterbox {
    /// 计算原始图像放入网络输入时的缩放尺寸
    pub fn fit(img_width: u32, img_height: u32, input_width: usize, input_height: usize) -> Self {
        let (iw, ih) = (img_width.max(1) as f32, img_height.max(1) as f32);
        let scale = (input_width as f32 / iw).min(input_height as f32 / ih);
        Self {
            input_width,
            input_height,
            scaled_width: ((iw * scale) as usize).clamp(1, input_width),
            scaled_height: ((ih * scale) as usize).clamp(1, input_height),
        }
    }

    fn offset_x(&self) -> usize {
        (self.input_width - self.scaled_width) / 2
    }

    fn offset_y(&self) -> usize {
        (self.input_height - self.scaled_height) / 2
    }

    /// 把相对网络输入归一化的框映射成相对原始帧归一化的框
    pub fn correct(&self, bbox: &NormBox) -> NormBox {
        let (nw, nh) = (self.input_width as f32, self.input_height as f32);
        let (sw, sh) = (self.scaled_width as f32, self.scaled_height as f32);
        let ox = (nw - sw) / 2.0 / nw;
        let oy = (nh - sh) / 2.0 / nh;
        NormBox {
            x: (bbox.x - ox) * nw / sw,
            y: (bbox.y - oy) * nh / sh,
            w: bbox.w * nw / sw,
            h: bbox.h * nh / sh,
        }
    }
}

/// 把RGB图像按比例缩放并居中填充到网络输入尺寸
///
/// # 参数
/// * `img` - RGB图像
/// * `input_width` - 网络输入宽度
/// * `input_height` - 网络输入高度
///
/// # 返回值
/// 返回形状为(1, 3, height, width)的张量和对应的缩放几何，填充区域为0.5
pub fn letterbox_tensor(img: &RgbImage, input_width: usize, input_height: usize) -> (Array4<f32>, Letterbox) {
    let letterbox = Letterbox::fit(img.width(), img.height(), input_width, input_height);
    let resized = DynamicImage::ImageRgb8(img.clone()).resize_exact(
        letterbox.scaled_width as u32,
        letterbox.scaled_height as u32,
        FilterType::Triangle,
    );

    let mut tensor = Array::from_elem((1, 3, input_height, input_width), LETTERBOX_PAD);
    let (ox, oy) = (letterbox.offset_x(), letterbox.offset_y());
    for pixel in resized.pixels() {
        let x = pixel.0 as usize + ox;
        let y = pixel.1 as usize + oy;
        let [r, g, b, _] = pixel.2.0;

        tensor[[0, 0, y, x]] = (r as f32) / 255.0;  // R通道
        tensor[[0, 1, y, x]] = (g as f32) / 255.0;  // G通道
        tensor[[0, 2, y, x]] = (b as f32) / 255.0;  // B通道
    }
    (tensor, letterbox)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn bgr_is_swapped() {
        let mut img = RgbImage::new(1, 1);
        img.put_pixel(0, 0, Rgb([10, 20, 30]));
        let rgb = to_rgb(&DynamicImage::ImageRgb8(img), PixelEncoding::Bgr8);
        assert_eq!(rgb.get_pixel(0, 0).0, [30, 20, 10]);
    }

    #[test]
    fn wide_image_is_padded_vertically() {
        let img = RgbImage::from_pixel(64, 32, Rgb([255, 255, 255]));
        let (tensor, lb) = letterbox_tensor(&img, 32, 32);
        assert_eq!(lb.scaled_width, 32);
        assert_eq!(lb.scaled_height, 16);
        assert_eq!(tensor[[0, 0, 0, 0]], LETTERBOX_PAD);
        assert!(tensor[[0, 0, 16, 16]] > 0.99);
        assert_eq!(tensor[[0, 2, 31, 31]], LETTERBOX_PAD);
    }

    #[test]
    fn correct_undoes_padding() {
        let lb = Letterbox::fit(64, 32, 32, 32);
        // 网络输入中的中心框，对应原图中心
        let out = lb.correct(&NormBox::new(0.5, 0.5, 0.5, 0.25));
        assert!((out.x - 0.5).abs() < 1e-6);
        assert!((out.y - 0.5).abs() < 1e-6);
        assert!((out.w - 0.5).abs() < 1e-6);
        assert!((out.h - 0.5).abs() < 1e-6);
    }
}
