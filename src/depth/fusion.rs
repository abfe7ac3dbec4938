//! 几何融合模块
//!
//! 把二维像素框和对齐的有序点云融合成一个三维位置：
//! 在框内取三个候选采样点，各自对3x3邻域求和，按累加和选水平面上最近的候选，
//! 对选中的候选求平均后从光学坐标系换算到输出坐标系并叠加标定偏移。

use crate::color::bounds::{PixelBox, Point3};
use crate::config::CalibrationOffsets;
use crate::depth::cloud::DepthSnapshot;

/// 候选采样点
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Candidate {
    /// 对角线1/4处
    Left,
    /// 对角线3/4处
    Right,
    /// 框中心
    Center,
}

/// 一个候选点3x3邻域的累加结果
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct NeighborhoodSum {
    pub x: f32,
    pub y: f32,
    pub z: f32,
    /// 有效采样计数
    pub count: u32,
}

impl NeighborhoodSum {
    /// 对(u, v)的3x3邻域累加
    ///
    /// 遇到z为NaN或无穷大（或越界）的采样时，三个累加和整体清零且计数不增加；
    /// 计数器本身不回退，因此邻域结束时的和只包含最后一个无效采样之后的有效点。
    pub fn sample(cloud: &DepthSnapshot, u: i32, v: i32) -> Self {
        let mut acc = Self::default();
        for i in (u - 1)..=(u + 1) {
            for j in (v - 1)..=(v + 1) {
                match cloud.at(i, j) {
                    Some([x, y, z]) if z.is_finite() => {
                        acc.x += x;
                        acc.y += y;
                        acc.z += z;
                        acc.count += 1;
                    }
                    _ => {
                        acc.x = 0.0;
                        acc.y = 0.0;
                        acc.z = 0.0;
                    }
                }
            }
        }
        acc
    }

    /// 均值，没有有效采样时为None
    pub fn mean(&self) -> Option<[f32; 3]> {
        if self.count == 0 {
            return None;
        }
        let n = self.count as f32;
        Some([self.x / n, self.y / n, self.z / n])
    }
}

/// 融合结果
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FusedPosition {
    /// 输出坐标系下的位置；没有可用深度时为(0,0,0)
    pub position: Point3,
    /// 被选中的候选点，全部无效时为None
    pub candidate: Option<Candidate>,
    /// 框中心像素，用于绘制标记
    pub center: (i32, i32),
}

/// 框内三个候选采样点，整数运算
pub fn candidate_points(pixels: &PixelBox) -> [(Candidate, (i32, i32)); 3] {
    let (w, h) = (pixels.width(), pixels.height());
    [
        (Candidate::Left, (w / 4 + pixels.xmin, h / 4 + pixels.ymin)),
        (Candidate::Right, (3 * w / 4 + pixels.xmin, 3 * h / 4 + pixels.ymin)),
        (Candidate::Center, pixels.center()),
    ]
}

/// 光学坐标系（x右，y下，z前）换算到输出坐标系（x前，y左，z上），再叠加偏移
pub fn optical_to_output(mean: [f32; 3], offsets: &CalibrationOffsets) -> Point3 {
    let [x, y, z] = mean;
    Point3::new(z + offsets.x, -x + offsets.y, -y + offsets.z)
}

/// 由像素框和点云计算三维位置
///
/// 距离按邻域累加和的 x²+y² 比较，不先求平均。
/// 没有有效采样的候选不参与比较；距离相同时按左、右、中心的顺序取前者。
/// 三个候选都没有有效采样时返回哨兵位置(0,0,0)。
///
/// # 参数
/// * `pixels` - 像素坐标框
/// * `cloud` - 与帧对齐的有序点云
/// * `offsets` - 标定偏移
pub fn locate(pixels: &PixelBox, cloud: &DepthSnapshot, offsets: &CalibrationOffsets) -> FusedPosition {
    let mut best: Option<(Candidate, [f32; 3], f32)> = None;
    for (candidate, (u, v)) in candidate_points(pixels) {
        let acc = NeighborhoodSum::sample(cloud, u, v);
        let Some(mean) = acc.mean() else {
            continue;
        };
        let dist = acc.x * acc.x + acc.y * acc.y;
        if best.is_none_or(|(_, _, best_dist)| dist < best_dist) {
            best = Some((candidate, mean, dist));
        }
    }

    match best {
        Some((candidate, mean, _)) => FusedPosition {
            position: optical_to_output(mean, offsets),
            candidate: Some(candidate),
            center: pixels.center(),
        },
        None => FusedPosition {
            position: Point3::default(),
            candidate: None,
            center: pixels.center(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trailing_invalid_sample_zeroes_sums_but_keeps_count() {
        let mut cloud = DepthSnapshot::filled(5, 5, [1.0, 1.0, 1.0]);
        // 邻域遍历顺序为先列后行，(3, 3) 是最后一个采样
        cloud.set(3, 3, [0.0, 0.0, f32::NAN]);
        let acc = NeighborhoodSum::sample(&cloud, 2, 2);
        assert_eq!(acc.count, 8);
        assert_eq!((acc.x, acc.y, acc.z), (0.0, 0.0, 0.0));
    }

    #[test]
    fn leading_invalid_sample_only_drops_itself() {
        let mut cloud = DepthSnapshot::filled(5, 5, [1.0, 1.0, 1.0]);
        cloud.set(1, 1, [0.0, 0.0, f32::INFINITY]);
        let acc = NeighborhoodSum::sample(&cloud, 2, 2);
        assert_eq!(acc.count, 8);
        assert_eq!(acc.z, 8.0);
    }

    #[test]
    fn border_neighborhood_counts_out_of_range_as_invalid() {
        let cloud = DepthSnapshot::filled(4, 4, [0.5, 0.5, 2.0]);
        let acc = NeighborhoodSum::sample(&cloud, 0, 0);
        assert_eq!(acc.count, 4);
    }

    #[test]
    fn candidates_follow_box_diagonal() {
        let points = candidate_points(&PixelBox::new(100, 100, 200, 200));
        assert_eq!(points[0].1, (125, 125));
        assert_eq!(points[1].1, (175, 175));
        assert_eq!(points[2].1, (150, 150));
    }
}
