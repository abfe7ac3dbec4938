pub mod color;
pub mod config;
pub mod depth;
pub mod error;
pub mod pipeline;
pub mod utils;
pub mod yolo3d;

// 重新导出常用类型
pub use color::{BoundingBox3D, Detection, InferenceBackend, OnnxBackend, PixelEncoding, Point3};
pub use config::DetectorConfig;
pub use depth::DepthSnapshot;
pub use error::{PerceptionError, Result};
pub use pipeline::{BoundingBoxes, ChannelSink, CheckResult, DetectionSink, FrameHeader, ObjectCount, Published, RequestHandle};
pub use yolo3d::Yolo3d;
