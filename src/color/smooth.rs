use log::warn;
use ndarray::ArrayD;

use crate::color::infer::RawOutput;

/// 原始输出张量的时间平滑器
///
/// 保存最近N次推理输出的环形历史，每次写入后对N项逐元素求平均。
/// 历史在第一次写入时按输出形状清零初始化，未写满时零值条目同样计入平均。
#[derive(Debug, Clone)]
pub struct TemporalSmoother {
    history: Vec<RawOutput>,
    average: RawOutput,
    cursor: usize,
    window: usize,
}

impl TemporalSmoother {
    /// 创建窗口长度为 `window` 的平滑器
    pub fn new(window: usize) -> Self {
        let window = window.max(1);
        Self {
            history: Vec::with_capacity(window),
            average: ArrayD::zeros(vec![0]),
            cursor: 0,
            window,
        }
    }

    pub fn window(&self) -> usize {
        self.window
    }

    /// 写入本周期的原始输出，返回平均后的张量
    ///
    /// 写入当前游标位置，计算N项逐元素均值，然后游标前进一位（模N）。
    pub fn push(&mut self, raw: &RawOutput) -> &RawOutput {
        if self.history.is_empty() || self.average.shape() != raw.shape() {
            if !self.history.is_empty() {
                warn!("输出张量形状从 {:?} 变为 {:?}，重置平滑历史", self.average.shape(), raw.shape());
            }
            self.history = vec![ArrayD::zeros(raw.raw_dim()); self.window];
            self.average = ArrayD::zeros(raw.raw_dim());
            self.cursor = 0;
        }

        self.history[self.cursor].assign(raw);

        let weight = 1.0 / self.window as f32;
        self.average.fill(0.0);
        for entry in &self.history {
            self.average.scaled_add(weight, entry);
        }

        self.cursor = (self.cursor + 1) % self.window;
        &self.average
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::IxDyn;

    fn tensor(values: &[f32]) -> RawOutput {
        ArrayD::from_shape_vec(IxDyn(&[values.len()]), values.to_vec()).unwrap()
    }

    #[test]
    fn partial_history_counts_zero_entries() {
        let mut smoother = TemporalSmoother::new(3);
        let avg = smoother.push(&tensor(&[3.0, 6.0]));
        let avg = avg.as_slice().unwrap();
        assert!((avg[0] - 1.0).abs() < 1e-6);
        assert!((avg[1] - 2.0).abs() < 1e-6);
    }

    #[test]
    fn window_of_one_passes_through() {
        let mut smoother = TemporalSmoother::new(1);
        smoother.push(&tensor(&[5.0]));
        let avg = smoother.push(&tensor(&[7.0]));
        assert_eq!(avg.as_slice().unwrap(), &[7.0]);
    }
}
