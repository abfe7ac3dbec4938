use std::sync::Arc;
use std::thread;

use image::DynamicImage;
use log::{info, warn};

use crate::color::infer::InferenceBackend;
use crate::color::prevs::PixelEncoding;
use crate::config::DetectorConfig;
use crate::depth::cloud::DepthSnapshot;
use crate::error::{PerceptionError, Result};
use crate::pipeline::frame::FrameHeader;
use crate::pipeline::publish::DetectionSink;
use crate::pipeline::request::{RequestHandle, RequestSlot};
use crate::pipeline::stager::FrameStager;
use crate::pipeline::Pipeline;
use crate::utils::guarded::Guarded;

/// 三维目标检测节点
///
/// 对外只暴露摄取、一次性请求和启停；流水线在独立线程上运行，
/// 通过共享的暂存区拿帧，通过输出端发布结果。
pub struct Yolo3d {
    config: Arc<DetectorConfig>,
    stager: Arc<FrameStager>,
    requests: Arc<RequestSlot>,
    running: Arc<Guarded<bool>>,
    pipeline_thread: Option<thread::JoinHandle<Result<()>>>,
}

impl Yolo3d {
    /// 用校验过的配置创建节点，此时不启动流水线
    pub fn new(config: DetectorConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config: Arc::new(config),
            stager: Arc::new(FrameStager::new()),
            requests: Arc::new(RequestSlot::new()),
            running: Arc::new(Guarded::new(false)),
            pipeline_thread: None,
        })
    }

    /// 启动流水线线程
    ///
    /// # 参数
    /// * `backend` - 推理后端，移交给流水线线程独占
    /// * `sink` - 输出端
    ///
    /// # 错误处理
    /// 已在运行时返回 `AlreadyRunning`
    pub fn start<B, S>(&mut self, backend: B, sink: S) -> Result<()>
    where
        B: InferenceBackend + 'static,
        S: DetectionSink + 'static,
    {
        let already = self.running.update(|running| std::mem::replace(running, true));
        if already || self.pipeline_thread.is_some() {
            if !already {
                self.running.set(false);
            }
            return Err(PerceptionError::AlreadyRunning);
        }

        let mut pipeline = Pipeline::new(
            Arc::clone(&self.config),
            Arc::clone(&self.stager),
            Arc::clone(&self.requests),
            Arc::clone(&self.running),
            backend,
            sink,
        );
        let spawned = thread::Builder::new()
            .name("yolo3d-pipeline".into())
            .spawn(move || pipeline.run());
        match spawned {
            Ok(handle) => {
                self.pipeline_thread = Some(handle);
                info!("检测节点已启动");
                Ok(())
            }
            Err(e) => {
                self.running.set(false);
                Err(e.into())
            }
        }
    }

    /// 摄取一帧流式输入
    pub fn put_frame(&self, image: DynamicImage, encoding: PixelEncoding, depth: DepthSnapshot, header: FrameHeader) -> Result<()> {
        self.stager.put_frame(image, encoding, depth, header)
    }

    /// 摄取一帧打包像素数据
    pub fn put_raw(
        &self,
        data: Vec<u8>,
        width: u32,
        height: u32,
        encoding: PixelEncoding,
        depth: DepthSnapshot,
        header: FrameHeader,
    ) -> Result<()> {
        self.stager.put_raw(data, width, height, encoding, depth, header)
    }

    /// 提交一次性检测请求
    ///
    /// 新请求覆盖尚未完成的旧请求。结果在带有该请求标签的帧完成推理并发布时送达，
    /// 即提交后第二个完整周期结束时。
    pub fn check_for_objects(&self, image: DynamicImage, encoding: PixelEncoding) -> RequestHandle {
        let handle = self.requests.register();
        let header = FrameHeader::new(handle.id().0, std::time::SystemTime::now(), "camera");
        self.stager.put_request(image, encoding, header, handle.id());
        handle
    }

    /// 清除运行标志，流水线在当前周期结束后退出
    pub fn stop(&self) {
        self.running.set(false);
    }

    /// 等待流水线线程退出
    ///
    /// # 返回值
    /// 返回流水线的退出结果，推理后端失败时为对应的错误
    pub fn join(&mut self) -> Result<()> {
        let Some(handle) = self.pipeline_thread.take() else {
            return Ok(());
        };
        let result = handle.join().map_err(|_| PerceptionError::ThreadPanicked)?;
        self.running.set(false);
        result
    }

    pub fn is_running(&self) -> bool {
        self.running.get()
    }

    pub fn stager(&self) -> &Arc<FrameStager> {
        &self.stager
    }

    pub fn requests(&self) -> &Arc<RequestSlot> {
        &self.requests
    }

    pub fn config(&self) -> &DetectorConfig {
        &self.config
    }
}

impl Drop for Yolo3d {
    fn drop(&mut self) {
        self.stop();
        if let Err(e) = self.join() {
            warn!("流水线退出时出错: {}", e);
        }
    }
}
