use std::path::Path;

use pcd_rs::DynReader;

use crate::error::{PerceptionError, Result};

/// 与彩色帧逐像素对齐的有序点云
///
/// 每个像素对应一个光学坐标系下的点（x向右，y向下，z向前），按行优先存储。
/// 无效测量以NaN或无穷大的z表示。
#[derive(Debug, Clone, PartialEq)]
pub struct DepthSnapshot {
    width: usize,
    height: usize,
    points: Vec<[f32; 3]>,
}

impl DepthSnapshot {
    /// 由行优先的点数组创建点云
    ///
    /// # 错误处理
    /// 点数与 `width * height` 不一致时返回Err
    pub fn from_points(width: usize, height: usize, points: Vec<[f32; 3]>) -> Result<Self> {
        if points.len() != width * height {
            return Err(PerceptionError::PointCloud(format!(
                "点数 {} 与尺寸 {}x{} 不符",
                points.len(),
                width,
                height
            )));
        }
        Ok(Self { width, height, points })
    }

    /// 所有像素都取同一个点
    pub fn filled(width: usize, height: usize, point: [f32; 3]) -> Self {
        Self { width, height, points: vec![point; width * height] }
    }

    /// 全部无效的点云
    pub fn invalid(width: usize, height: usize) -> Self {
        Self::filled(width, height, [f32::NAN; 3])
    }

    /// 从PCD文件读取有序点云
    ///
    /// 文件头的WIDTH/HEIGHT必须描述有序点云（HEIGHT > 1 或与图像同宽）。
    pub fn from_pcd(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let reader = DynReader::open(path)
            .map_err(|e| PerceptionError::PointCloud(format!("{}: {}", path.display(), e)))?;
        let (width, height) = {
            let meta = reader.meta();
            (meta.width as usize, meta.height as usize)
        };

        let mut points = Vec::with_capacity(width * height);
        for record in reader {
            let record = record.map_err(|e| PerceptionError::PointCloud(e.to_string()))?;
            let xyz: [f32; 3] = record
                .to_xyz()
                .ok_or_else(|| PerceptionError::PointCloud("记录缺少 x/y/z 字段".into()))?;
            points.push(xyz);
        }
        Self::from_points(width, height, points)
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    /// 读取像素(u, v)处的点，越界返回None
    pub fn at(&self, u: i32, v: i32) -> Option<[f32; 3]> {
        if u < 0 || v < 0 || u as usize >= self.width || v as usize >= self.height {
            return None;
        }
        self.points.get(v as usize * self.width + u as usize).copied()
    }

    /// 写入像素(u, v)处的点，越界时忽略
    pub fn set(&mut self, u: usize, v: usize, point: [f32; 3]) {
        if u < self.width && v < self.height {
            self.points[v * self.width + u] = point;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_size_mismatch() {
        assert!(DepthSnapshot::from_points(2, 2, vec![[0.0; 3]; 3]).is_err());
    }

    #[test]
    fn out_of_bounds_is_none() {
        let cloud = DepthSnapshot::filled(4, 3, [1.0, 2.0, 3.0]);
        assert_eq!(cloud.at(3, 2), Some([1.0, 2.0, 3.0]));
        assert_eq!(cloud.at(4, 0), None);
        assert_eq!(cloud.at(0, -1), None);
    }
}
