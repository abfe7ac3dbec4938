use std::sync::Arc;
use std::time::SystemTime;

use image::DynamicImage;

use crate::color::prevs::PixelEncoding;
use crate::depth::cloud::DepthSnapshot;

/// 一次性请求的标识
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RequestId(pub u64);

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// 帧头：序号、采集时间和坐标系名称
#[derive(Debug, Clone, PartialEq)]
pub struct FrameHeader {
    pub seq: u64,
    pub stamp: SystemTime,
    pub frame_id: String,
}

impl FrameHeader {
    pub fn new(seq: u64, stamp: SystemTime, frame_id: impl Into<String>) -> Self {
        Self { seq, stamp, frame_id: frame_id.into() }
    }
}

impl Default for FrameHeader {
    fn default() -> Self {
        Self { seq: 0, stamp: SystemTime::UNIX_EPOCH, frame_id: String::new() }
    }
}

/// 暂存区中的一帧：图像、对齐点云、帧头和请求标签
///
/// 图像和点云用 `Arc` 共享，拷贝一帧只复制指针；写入方每次整体替换，不会原地修改。
#[derive(Debug, Clone)]
pub struct Frame {
    pub image: Arc<DynamicImage>,
    pub encoding: PixelEncoding,
    pub depth: Arc<DepthSnapshot>,
    pub header: FrameHeader,
    /// 流式输入为None，一次性请求为对应的请求ID
    pub tag: Option<RequestId>,
}

impl Frame {
    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }
}
