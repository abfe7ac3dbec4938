use std::sync::{Arc, PoisonError, RwLock};
use std::thread;
use std::time::Duration;

use image::{DynamicImage, RgbImage};
use log::{info, warn};

use crate::color::prevs::PixelEncoding;
use crate::depth::cloud::DepthSnapshot;
use crate::error::{PerceptionError, Result};
use crate::pipeline::frame::{Frame, FrameHeader, RequestId};
use crate::utils::guarded::Guarded;

/// 最新帧暂存区
///
/// 只保存最近一次摄取的（图像，点云，帧头）；写入方整体覆盖，读取方拿到一份拷贝。
/// 摄取快于消费时中间帧被静默丢弃，不会排队。
#[derive(Debug, Default)]
pub struct FrameStager {
    latest: RwLock<Option<Frame>>,
}

impl FrameStager {
    pub fn new() -> Self {
        Self::default()
    }

    fn store(&self, frame: Frame) {
        let mut latest = self.latest.write().unwrap_or_else(PoisonError::into_inner);
        *latest = Some(frame);
    }

    /// 写入一帧流式输入
    ///
    /// # 错误处理
    /// 图像为空或点云尺寸与图像不一致时返回Err，保留之前的帧
    pub fn put_frame(
        &self,
        image: DynamicImage,
        encoding: PixelEncoding,
        depth: DepthSnapshot,
        header: FrameHeader,
    ) -> Result<()> {
        let result = Self::check_frame(&image, &depth);
        if let Err(e) = &result {
            warn!("丢弃无效帧 seq={}: {}", header.seq, e);
            return result;
        }
        self.store(Frame {
            image: Arc::new(image),
            encoding,
            depth: Arc::new(depth),
            header,
            tag: None,
        });
        Ok(())
    }

    /// 写入一帧未解码的打包像素数据
    ///
    /// # 参数
    /// * `data` - 按行打包的3通道像素
    /// * `width` - 图像宽度
    /// * `height` - 图像高度
    /// * `encoding` - 像素编码
    /// * `depth` - 对齐点云
    /// * `header` - 帧头
    pub fn put_raw(
        &self,
        data: Vec<u8>,
        width: u32,
        height: u32,
        encoding: PixelEncoding,
        depth: DepthSnapshot,
        header: FrameHeader,
    ) -> Result<()> {
        let expected = width as usize * height as usize * 3;
        let Some(buffer) = RgbImage::from_raw(width, height, data) else {
            let e = PerceptionError::MalformedFrame(format!(
                "像素数据长度与 {}x{} 不符（需要 {} 字节）",
                width, height, expected
            ));
            warn!("丢弃无效帧 seq={}: {}", header.seq, e);
            return Err(e);
        };
        self.put_frame(DynamicImage::ImageRgb8(buffer), encoding, depth, header)
    }

    /// 写入一次性请求的图像
    ///
    /// 请求只带图像：沿用当前点云（尺寸一致时），否则使用全无效点云。
    pub fn put_request(&self, image: DynamicImage, encoding: PixelEncoding, header: FrameHeader, tag: RequestId) {
        let (width, height) = (image.width() as usize, image.height() as usize);
        let mut latest = self.latest.write().unwrap_or_else(PoisonError::into_inner);
        let depth = match latest.as_ref() {
            Some(frame) if frame.depth.width() == width && frame.depth.height() == height => {
                Arc::clone(&frame.depth)
            }
            _ => Arc::new(DepthSnapshot::invalid(width, height)),
        };
        *latest = Some(Frame {
            image: Arc::new(image),
            encoding,
            depth,
            header,
            tag: Some(tag),
        });
    }

    /// 读取最新帧的拷贝
    pub fn get_frame(&self) -> Option<Frame> {
        let latest = self.latest.read().unwrap_or_else(PoisonError::into_inner);
        latest.clone()
    }

    /// 是否已经收到过图像
    pub fn has_frame(&self) -> bool {
        let latest = self.latest.read().unwrap_or_else(PoisonError::into_inner);
        latest.is_some()
    }

    /// 阻塞等待第一帧
    ///
    /// 每隔 `interval` 检查一次；运行标志被清除时返回false。
    pub fn wait_for_frame(&self, running: &Guarded<bool>, interval: Duration) -> bool {
        loop {
            if !running.get() {
                return false;
            }
            if self.has_frame() {
                return true;
            }
            info!("等待图像...");
            thread::sleep(interval);
        }
    }

    fn check_frame(image: &DynamicImage, depth: &DepthSnapshot) -> Result<()> {
        if image.width() == 0 || image.height() == 0 {
            return Err(PerceptionError::MalformedFrame("图像尺寸为0".into()));
        }
        if depth.width() != image.width() as usize || depth.height() != image.height() as usize {
            return Err(PerceptionError::MalformedFrame(format!(
                "点云尺寸 {}x{} 与图像 {}x{} 不一致",
                depth.width(),
                depth.height(),
                image.width(),
                image.height()
            )));
        }
        Ok(())
    }
}
