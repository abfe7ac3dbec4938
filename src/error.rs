//! 错误类型模块
//!
//! 整个感知流水线共用一个错误枚举，推理后端、帧摄取、点云读取和配置加载的失败都归到这里。

use thiserror::Error;

/// 感知流水线错误
#[derive(Debug, Error)]
pub enum PerceptionError {
    /// 推理后端返回的失败（对流水线线程是致命的）
    #[error("推理后端失败: {0}")]
    Backend(String),
    #[error(transparent)]
    Ort(#[from] ort::Error),
    #[error(transparent)]
    Shape(#[from] ndarray::ShapeError),
    /// 传感器帧无法解码或尺寸不一致
    #[error("帧数据无效: {0}")]
    MalformedFrame(String),
    #[error("点云读取失败: {0}")]
    PointCloud(String),
    #[error("配置无效: {0}")]
    Config(String),
    #[error(transparent)]
    Toml(#[from] toml::de::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Image(#[from] image::ImageError),
    #[error("流水线已在运行")]
    AlreadyRunning,
    #[error("流水线线程异常退出")]
    ThreadPanicked,
}

pub type Result<T> = std::result::Result<T, PerceptionError>;
