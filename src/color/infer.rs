//! 推理后端接口
//!
//! 神经网络本身是黑盒：流水线只通过 [`InferenceBackend`] 调用它，
//! 先 `infer` 得到原始输出张量，经时间平滑后再交给 `decode` 解码成候选框。

use ndarray::{Array4, ArrayD};

use crate::color::bounds::NormBox;
use crate::error::Result;

/// 一次推理得到的原始输出张量
pub type RawOutput = ArrayD<f32>;

/// 解码后的候选框
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedBox {
    /// 相对网络输入归一化的框
    pub bbox: NormBox,
    /// 目标性得分，用于NMS
    pub objectness: f32,
    /// 每个类别的概率，低于阈值的类别为0
    pub prob: Vec<f32>,
}

/// 推理后端
///
/// 后端被移动到流水线线程上独占使用，推理阶段在并行任务中借用它，因此要求 `Send`。
pub trait InferenceBackend: Send {
    /// 对预处理后的NCHW张量运行一次推理
    ///
    /// # 错误处理
    /// 返回Err时流水线线程终止，不做重试
    fn infer(&mut self, input: &Array4<f32>) -> Result<RawOutput>;

    /// 把（平滑后的）输出张量解码成候选框
    ///
    /// # 参数
    /// * `output` - 平滑后的输出张量，形状与 `infer` 的返回一致
    /// * `prob_threshold` - 类别概率阈值
    /// * `hier_threshold` - 目标性准入阈值
    fn decode(&self, output: &RawOutput, prob_threshold: f32, hier_threshold: f32) -> Vec<DecodedBox>;
}

impl<B: InferenceBackend + ?Sized> InferenceBackend for Box<B> {
    fn infer(&mut self, input: &Array4<f32>) -> Result<RawOutput> {
        (**self).infer(input)
    }

    fn decode(&self, output: &RawOutput, prob_threshold: f32, hier_threshold: f32) -> Vec<DecodedBox> {
        (**self).decode(output, prob_threshold, hier_threshold)
    }
}
