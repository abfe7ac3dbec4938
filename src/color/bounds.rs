use crate::config::{DETECTIONS_CAPACITY, NONE_CLASS_LABEL};

/// 归一化边界框
///
/// 以中心点和宽高表示，所有分量都相对于帧尺寸归一化到[0, 1]。
#[derive(Debug, Clone, Default, Copy, PartialEq)]
pub struct NormBox {
    /// 中心x坐标
    pub x: f32,
    /// 中心y坐标
    pub y: f32,
    /// 宽度
    pub w: f32,
    /// 高度
    pub h: f32,
}

impl NormBox {
    /// 创建一个新的归一化边界框
    pub fn new(x: f32, y: f32, w: f32, h: f32) -> Self {
        Self { x, y, w, h }
    }

    pub fn left(&self) -> f32 {
        self.x - self.w / 2.0
    }

    pub fn right(&self) -> f32 {
        self.x + self.w / 2.0
    }

    pub fn top(&self) -> f32 {
        self.y - self.h / 2.0
    }

    pub fn bottom(&self) -> f32 {
        self.y + self.h / 2.0
    }

    /// 计算边界框的面积
    pub fn area(&self) -> f32 {
        self.w * self.h
    }

    /// 计算两个框的交并比
    pub fn iou(&self, other: &NormBox) -> f32 {
        let iw = self.right().min(other.right()) - self.left().max(other.left());
        let ih = self.bottom().min(other.bottom()) - self.top().max(other.top());
        if iw <= 0.0 || ih <= 0.0 {
            return 0.0;
        }
        let inter = iw * ih;
        let union = self.area() + other.area() - inter;
        if union <= 0.0 { 0.0 } else { inter / union }
    }

    /// 按帧尺寸换算成像素框
    ///
    /// 与整型截断一致：坐标向零取整。
    pub fn to_pixels(&self, frame_width: u32, frame_height: u32) -> PixelBox {
        let (fw, fh) = (frame_width as f32, frame_height as f32);
        PixelBox {
            xmin: (self.left() * fw) as i32,
            ymin: (self.top() * fh) as i32,
            xmax: (self.right() * fw) as i32,
            ymax: (self.bottom() * fh) as i32,
        }
    }
}

/// 像素坐标边界框
#[derive(Debug, Clone, Default, Copy, PartialEq, Eq)]
pub struct PixelBox {
    pub xmin: i32,
    pub ymin: i32,
    pub xmax: i32,
    pub ymax: i32,
}

impl PixelBox {
    pub fn new(xmin: i32, ymin: i32, xmax: i32, ymax: i32) -> Self {
        Self { xmin, ymin, xmax, ymax }
    }

    pub fn width(&self) -> i32 {
        self.xmax - self.xmin
    }

    pub fn height(&self) -> i32 {
        self.ymax - self.ymin
    }

    /// 框中心（整数除法）
    pub fn center(&self) -> (i32, i32) {
        (self.width() / 2 + self.xmin, self.height() / 2 + self.ymin)
    }
}

/// 检测结果结构
///
/// 一个类别对应一条记录：同一个框在多个类别上都超过阈值时会产生多条。
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Detection {
    /// 目标的边界框（帧归一化）
    pub bbox: NormBox,
    /// 类别ID
    pub class_id: usize,
    /// 置信度
    pub probability: f32,
}

impl Detection {
    /// 创建一个新的检测结果
    pub fn new(bbox: NormBox, class_id: usize, probability: f32) -> Self {
        Self { bbox, class_id, probability }
    }
}

/// 三维坐标点（输出坐标系：x向前，y向左，z向上）
#[derive(Debug, Clone, Default, Copy, PartialEq)]
pub struct Point3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Point3 {
    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }
}

/// 带三维位置的发布记录
#[derive(Debug, Clone, PartialEq)]
pub struct BoundingBox3D {
    /// 类别名称
    pub class: String,
    /// 类别ID
    pub id: usize,
    pub probability: f32,
    /// 像素坐标框
    pub pixels: PixelBox,
    /// 融合得到的三维位置，(0,0,0) 表示没有可用深度
    pub position: Point3,
}

impl BoundingBox3D {
    /// 没有检测结果时发布的占位记录
    pub fn placeholder() -> Self {
        Self {
            class: NONE_CLASS_LABEL.to_string(),
            id: 0,
            probability: 0.0,
            pixels: PixelBox::default(),
            position: Point3::default(),
        }
    }

    pub fn is_placeholder(&self) -> bool {
        self.class == NONE_CLASS_LABEL
    }
}

/// 固定容量的检测结果容器
///
/// 容量即每个周期允许转发给发布阶段的最大检测数，超出部分直接丢弃。
#[derive(Clone)]
pub struct Bounds {
    bounds: [Detection; DETECTIONS_CAPACITY],
    len: usize,
}

impl Bounds {
    /// 创建一个新的空Bounds容器
    pub fn new() -> Self {
        Self {
            bounds: std::array::from_fn(|_| Detection::default()),
            len: 0,
        }
    }

    /// 向容器中添加一个新的检测结果
    ///
    /// 容器已满时返回false，不会添加新元素
    pub fn push(&mut self, detection: Detection) -> bool {
        if self.len < DETECTIONS_CAPACITY {
            self.bounds[self.len] = detection;
            self.len += 1;
            true
        } else {
            false
        }
    }

    /// 清空容器中的所有检测结果
    pub fn clear(&mut self) {
        self.len = 0;
    }

    /// 返回容器中检测结果的数量
    pub fn len(&self) -> usize {
        self.len
    }

    /// 检查容器是否为空
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn is_full(&self) -> bool {
        self.len == DETECTIONS_CAPACITY
    }

    /// 获取容器中所有检测结果的切片引用
    pub fn as_slice(&self) -> &[Detection] {
        &self.bounds[..self.len]
    }

    /// 提供只读迭代器
    pub fn iter(&self) -> std::slice::Iter<'_, Detection> {
        self.as_slice().iter()
    }
}

impl<'a> IntoIterator for &'a Bounds {
    type Item = &'a Detection;
    type IntoIter = std::slice::Iter<'a, Detection>;

    fn into_iter(self) -> Self::IntoIter {
        self.as_slice().iter()
    }
}

impl Default for Bounds {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Bounds {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bounds")
            .field("len", &self.len)
            .field("bounds", &self.as_slice())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_stops_at_capacity() {
        let mut bounds = Bounds::new();
        for i in 0..DETECTIONS_CAPACITY {
            assert!(bounds.push(Detection::new(NormBox::default(), i, 0.5)));
        }
        assert!(bounds.is_full());
        assert!(!bounds.push(Detection::new(NormBox::default(), 0, 0.9)));
        assert_eq!(bounds.len(), DETECTIONS_CAPACITY);
    }

    #[test]
    fn pixel_conversion_truncates() {
        let b = NormBox::new(0.5, 0.5, 0.25, 0.5);
        let px = b.to_pixels(640, 480);
        assert_eq!(px, PixelBox::new(240, 120, 400, 360));
        assert_eq!(px.center(), (320, 240));
    }

    #[test]
    fn iou_of_identical_boxes_is_one() {
        let b = NormBox::new(0.4, 0.4, 0.2, 0.2);
        assert!((b.iou(&b) - 1.0).abs() < 1e-6);
        assert_eq!(b.iou(&NormBox::new(0.9, 0.9, 0.1, 0.1)), 0.0);
    }
}
