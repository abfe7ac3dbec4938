use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::error::{PerceptionError, Result};

pub const DETECTIONS_CAPACITY: usize = 100;  // 每个周期最多发布的检测框数量
pub const RING_SLOTS: usize = 3;
pub const NONE_CLASS_LABEL: &str = "None";
pub const DETECTION_FRAME_ID: &str = "detection";

// 目标检测超参数配置
pub const DEFAULT_INPUT_WIDTH: usize = 416;
pub const DEFAULT_INPUT_HEIGHT: usize = 416;
pub const DEFAULT_PROBABILITY_THRESHOLD: f32 = 0.3;
pub const DEFAULT_HIERARCHY_THRESHOLD: f32 = 0.5;
pub const DEFAULT_NMS_THRESHOLD: f32 = 0.4;
pub const DEFAULT_SMOOTHING_WINDOW: usize = 3;
pub const DEFAULT_MIN_BOX_FRACTION: f32 = 0.01;
pub const DEFAULT_WAIT_INTERVAL_MS: u64 = 2000;
pub const DEFAULT_OUTPUT_QUEUE_DEPTH: usize = 1; // 周期数

// 光学坐标系 -> 输出坐标系的安装偏移（米）
pub const DEFAULT_OFFSET_X: f32 = 0.1;
pub const DEFAULT_OFFSET_Y: f32 = 0.0125;
pub const DEFAULT_OFFSET_Z: f32 = 0.46;

/// 深度坐标重映射后叠加的标定偏移
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct CalibrationOffsets {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Default for CalibrationOffsets {
    fn default() -> Self {
        Self { x: DEFAULT_OFFSET_X, y: DEFAULT_OFFSET_Y, z: DEFAULT_OFFSET_Z }
    }
}

/// 可视化输出配置
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct VisualizationConfig {
    /// 是否生成标注图像
    pub enabled: bool,
    /// 设置后标注图像保存为 `<prefix>_<cycle>.png`，不再发布
    pub save_prefix: Option<String>,
}

/// 检测节点配置
///
/// 启动时构造一次，之后以 `Arc<DetectorConfig>` 只读共享给流水线各阶段。
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    /// ONNX模型路径
    pub model_path: PathBuf,
    /// 网络输入宽度
    pub input_width: usize,
    /// 网络输入高度
    pub input_height: usize,
    /// 类别名称，下标即类别ID
    pub class_labels: Vec<String>,
    pub probability_threshold: f32,
    pub hierarchy_threshold: f32,
    pub nms_threshold: f32,
    /// 时间平滑窗口长度N
    pub smoothing_window: usize,
    /// 归一化宽高必须严格大于该值
    pub min_box_fraction: f32,
    pub max_boxes: usize,
    pub calibration: CalibrationOffsets,
    pub visualization: VisualizationConfig,
    pub console_output: bool,
    /// 等待首帧时的重试间隔（毫秒）
    pub wait_interval_ms: u64,
    /// 输出队列深度，以周期为单位
    pub output_queue_depth: usize,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            model_path: PathBuf::from("yolov5s.onnx"),
            input_width: DEFAULT_INPUT_WIDTH,
            input_height: DEFAULT_INPUT_HEIGHT,
            class_labels: vec!["person".to_string()],
            probability_threshold: DEFAULT_PROBABILITY_THRESHOLD,
            hierarchy_threshold: DEFAULT_HIERARCHY_THRESHOLD,
            nms_threshold: DEFAULT_NMS_THRESHOLD,
            smoothing_window: DEFAULT_SMOOTHING_WINDOW,
            min_box_fraction: DEFAULT_MIN_BOX_FRACTION,
            max_boxes: DETECTIONS_CAPACITY,
            calibration: CalibrationOffsets::default(),
            visualization: VisualizationConfig::default(),
            console_output: false,
            wait_interval_ms: DEFAULT_WAIT_INTERVAL_MS,
            output_queue_depth: DEFAULT_OUTPUT_QUEUE_DEPTH,
        }
    }
}

impl DetectorConfig {
    /// 从TOML文本解析配置并校验
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: DetectorConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// 从TOML文件加载配置
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    /// 检查配置取值是否合法
    pub fn validate(&self) -> Result<()> {
        if self.input_width == 0 || self.input_height == 0 {
            return Err(PerceptionError::Config("网络输入尺寸必须大于0".into()));
        }
        if self.smoothing_window == 0 {
            return Err(PerceptionError::Config("smoothing_window 必须至少为1".into()));
        }
        if self.max_boxes == 0 || self.max_boxes > DETECTIONS_CAPACITY {
            return Err(PerceptionError::Config(format!(
                "max_boxes 必须在 1..={} 之间",
                DETECTIONS_CAPACITY
            )));
        }
        if self.output_queue_depth == 0 {
            return Err(PerceptionError::Config("output_queue_depth 必须至少为1".into()));
        }
        for (name, value) in [
            ("probability_threshold", self.probability_threshold),
            ("hierarchy_threshold", self.hierarchy_threshold),
            ("nms_threshold", self.nms_threshold),
            ("min_box_fraction", self.min_box_fraction),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(PerceptionError::Config(format!("{} 超出 [0, 1]: {}", name, value)));
            }
        }
        Ok(())
    }

    pub fn num_classes(&self) -> usize {
        self.class_labels.len()
    }

    pub fn wait_interval(&self) -> Duration {
        Duration::from_millis(self.wait_interval_ms)
    }
}
