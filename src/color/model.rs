use std::path::Path;

use log::warn;
use ndarray::{Array4, ArrayD, Axis, IxDyn};
use ort::{inputs, session::{builder::GraphOptimizationLevel, Session}, value::Tensor};

use crate::color::bounds::NormBox;
use crate::color::infer::{DecodedBox, InferenceBackend, RawOutput};
use crate::error::{PerceptionError, Result};

/// 加载YOLO模型
///
/// 加载ONNX格式的YOLO模型，并应用优化配置。
///
/// # 参数
/// * `model_path` - 模型文件路径
///
/// # 返回值
/// 返回加载的Session对象
pub fn load_model(model_path: &Path) -> std::result::Result<Session, ort::Error> {
    let model = Session::builder()?
        .with_optimization_level(GraphOptimizationLevel::Level3)?
        .with_intra_threads(4)?
        .commit_from_file(model_path)?;
    Ok(model)
}

/// 基于ONNX Runtime的推理后端
///
/// 期望YOLOv5风格的输出 `[1, num_boxes, 5 + num_classes]`，
/// 每行为 `[cx, cy, w, h, objectness, class_scores...]`，坐标以网络输入像素为单位。
pub struct OnnxBackend {
    /// ONNX模型会话
    model: Session,
    /// 模型输入宽度
    input_width: usize,
    /// 模型输入高度
    input_height: usize,
    num_classes: usize,
}

impl OnnxBackend {
    /// 从模型文件创建后端
    pub fn load(model_path: &Path, input_width: usize, input_height: usize, num_classes: usize) -> Result<Self> {
        let model = load_model(model_path)?;
        Ok(Self::new(model, input_width, input_height, num_classes))
    }

    pub fn new(model: Session, input_width: usize, input_height: usize, num_classes: usize) -> Self {
        Self { model, input_width, input_height, num_classes }
    }
}

impl InferenceBackend for OnnxBackend {
    fn infer(&mut self, input: &Array4<f32>) -> Result<RawOutput> {
        let shape: Vec<usize> = input.shape().to_vec();
        let (data, _offset) = input.clone().into_raw_vec_and_offset();
        let input_tensor = Tensor::from_array((
            [shape[0], shape[1], shape[2], shape[3]],
            data
        ))?;
        let outputs = self.model.run(inputs!["images" => input_tensor])?;

        let output = outputs[0].try_extract_tensor::<f32>()?;
        let dims: Vec<usize> = output.0.iter().map(|&d| d as usize).collect();
        if dims.len() != 3 || dims[0] != 1 {
            return Err(PerceptionError::Backend(format!("模型输出形状不符合预期: {:?}", dims)));
        }
        Ok(ArrayD::from_shape_vec(IxDyn(&dims), output.1.to_vec())?)
    }

    fn decode(&self, output: &RawOutput, prob_threshold: f32, hier_threshold: f32) -> Vec<DecodedBox> {
        let shape = output.shape();
        if shape.len() != 3 || shape[2] != 5 + self.num_classes {
            warn!("输出张量形状 {:?} 与类别数 {} 不匹配，跳过解码", shape, self.num_classes);
            return Vec::new();
        }
        let (in_w, in_h) = (self.input_width as f32, self.input_height as f32);

        let rows = output.index_axis(Axis(0), 0);
        let mut boxes = Vec::new();
        for row in rows.axis_iter(Axis(0)) {
            let objectness = row[4];
            if objectness <= hier_threshold {
                continue;
            }
            let prob = (0..self.num_classes)
                .map(|j| {
                    let p = objectness * row[5 + j];
                    if p > prob_threshold { p } else { 0.0 }
                })
                .collect();
            boxes.push(DecodedBox {
                bbox: NormBox::new(row[0] / in_w, row[1] / in_h, row[2] / in_w, row[3] / in_h),
                objectness,
                prob,
            });
        }
        boxes
    }
}
