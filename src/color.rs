//! Color模块 - 彩色图像上的目标检测
//!
//! 该模块提供检测流程中与彩色图像相关的全部环节：
//! - 预处理：颜色转换、保持宽高比的缩放填充
//! - 推理后端接口与ONNX Runtime实现
//! - 原始输出的时间平滑
//! - 后处理：NMS、尺寸和概率过滤
//! - 可视化绘制
//!
//! # 工作流程
//!
//! 1. `prevs::to_rgb` + `prevs::letterbox_tensor` 得到网络输入
//! 2. `InferenceBackend::infer` 得到原始输出
//! 3. `TemporalSmoother::push` 得到平滑后的输出
//! 4. `InferenceBackend::decode` 解码候选框
//! 5. `posts::process_detections` 过滤得到本周期的检测

pub mod bounds;
pub mod draw;
pub mod infer;
pub mod model;
pub mod posts;
pub mod prevs;
pub mod smooth;

// 重新导出常用类型和函数
pub use bounds::{BoundingBox3D, Bounds, Detection, NormBox, PixelBox, Point3};
pub use draw::Annotator;
pub use infer::{DecodedBox, InferenceBackend, RawOutput};
pub use model::{load_model, OnnxBackend};
pub use posts::{accept_detection, process_detections, FilterParams};
pub use prevs::{letterbox_tensor, to_rgb, Letterbox, PixelEncoding};
pub use smooth::TemporalSmoother;
