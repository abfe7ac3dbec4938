//! Pipeline模块 - 三槽环形流水线
//!
//! 每个周期游标前进一位，取帧和推理两个阶段并行执行，两者都结束后再同步发布。
//! 发布总是滞后一个周期：周期k（k≥2）发布的是周期k-2取到、周期k-1推理完成的槽位。
//!
//! # 工作流程
//!
//! 1. 等待暂存区收到第一帧
//! 2. 用第一帧填满三个槽位
//! 3. 循环执行 [`Pipeline::run_cycle`]，直到运行标志被清除或推理后端失败

pub mod frame;
pub mod publish;
pub mod request;
pub mod ring;
pub mod stager;

use std::sync::Arc;
use std::thread;
use std::time::Instant;

use log::{debug, error, info};

use crate::color::infer::InferenceBackend;
use crate::color::posts::{process_detections, FilterParams};
use crate::color::prevs::{letterbox_tensor, to_rgb};
use crate::color::smooth::TemporalSmoother;
use crate::config::DetectorConfig;
use crate::error::{PerceptionError, Result};
use crate::utils::guarded::Guarded;

pub use frame::{Frame, FrameHeader, RequestId};
pub use publish::{BoundingBoxes, ChannelSink, CycleReport, DetectionSink, ObjectCount, Published, Publisher};
pub use request::{CheckResult, RequestHandle, RequestSlot};
pub use ring::{Ring, Slot, SlotName, SlotState};
pub use stager::FrameStager;

/// 检测流水线
///
/// 推理后端、平滑器、环形缓冲都归流水线线程独占；
/// 与外部共享的只有暂存区、请求登记处和运行标志。
pub struct Pipeline<B, S> {
    config: Arc<DetectorConfig>,
    stager: Arc<FrameStager>,
    requests: Arc<RequestSlot>,
    running: Arc<Guarded<bool>>,
    backend: B,
    sink: S,
    ring: Ring,
    smoother: TemporalSmoother,
    publisher: Publisher,
    params: FilterParams,
    cycle: u64,
    last_cycle: Option<Instant>,
}

impl<B: InferenceBackend, S: DetectionSink> Pipeline<B, S> {
    pub fn new(
        config: Arc<DetectorConfig>,
        stager: Arc<FrameStager>,
        requests: Arc<RequestSlot>,
        running: Arc<Guarded<bool>>,
        backend: B,
        sink: S,
    ) -> Self {
        let params = FilterParams {
            prob_threshold: config.probability_threshold,
            min_box_fraction: config.min_box_fraction,
            nms_threshold: config.nms_threshold,
            max_boxes: config.max_boxes,
        };
        Self {
            ring: Ring::new(config.input_width, config.input_height),
            smoother: TemporalSmoother::new(config.smoothing_window),
            publisher: Publisher::new(&config),
            params,
            config,
            stager,
            requests,
            running,
            backend,
            sink,
            cycle: 0,
            last_cycle: None,
        }
    }

    /// 已完成的周期数
    pub fn cycle(&self) -> u64 {
        self.cycle
    }

    pub fn ring(&self) -> &Ring {
        &self.ring
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }

    /// 运行到运行标志被清除
    ///
    /// # 错误处理
    /// 推理后端失败或阶段线程panic时返回Err，运行标志同时被清除
    pub fn run(&mut self) -> Result<()> {
        info!("流水线启动，输入 {}x{}", self.config.input_width, self.config.input_height);
        if !self.stager.wait_for_frame(&self.running, self.config.wait_interval()) {
            info!("等待首帧时被停止");
            return Ok(());
        }
        self.prime()?;

        let result = loop {
            if !self.running.get() {
                break Ok(());
            }
            if let Err(e) = self.run_cycle() {
                error!("流水线在周期 {} 终止: {}", self.cycle, e);
                break Err(e);
            }
        };
        self.running.set(false);
        info!("流水线停止，共运行 {} 个周期", self.cycle);
        result
    }

    /// 用暂存区的最新帧填满三个槽位
    ///
    /// # 返回值
    /// 暂存区为空时返回false，槽位保持不变
    pub fn prime(&mut self) -> Result<bool> {
        let Some(frame) = self.stager.get_frame() else {
            return Ok(false);
        };
        let rgb = to_rgb(&frame.image, frame.encoding);
        let (input, letterbox) = letterbox_tensor(&rgb, self.config.input_width, self.config.input_height);
        for slot in self.ring.slots_mut() {
            slot.begin_fetch();
            slot.store(frame.clone(), rgb.clone(), input.clone(), letterbox, None);
        }
        debug!("三个槽位已用帧 seq={} 填充", frame.header.seq);
        Ok(true)
    }

    /// 执行一个周期
    ///
    /// 游标前进，取帧与推理并行，汇合后发布上一周期推理完成的槽位。
    ///
    /// # 返回值
    /// 返回本周期的报告
    pub fn run_cycle(&mut self) -> Result<CycleReport> {
        let cycle = self.cycle;
        self.ring.advance();
        let ring::CycleSlots { fetch, infer, publish } = self.ring.roles();

        let stager = &*self.stager;
        let backend = &mut self.backend;
        let smoother = &mut self.smoother;
        let params = self.params;
        let (input_width, input_height) = (self.config.input_width, self.config.input_height);
        let thresholds = (self.config.probability_threshold, self.config.hierarchy_threshold);

        let (fetched, inferred) = thread::scope(|s| {
            let fetcher = s.spawn(move || fetch_stage(stager, fetch, input_width, input_height, cycle));
            let inferer = s.spawn(move || infer_stage(backend, smoother, infer, &params, thresholds, cycle));
            (fetcher.join(), inferer.join())
        });
        let fetched = fetched.map_err(|_| PerceptionError::ThreadPanicked)?;
        let inferred = inferred.map_err(|_| PerceptionError::ThreadPanicked)??;
        debug!("周期 {}: 取帧={} 推理={}", cycle, fetched, inferred);

        let now = Instant::now();
        let fps = match self.last_cycle {
            Some(last) => {
                let elapsed = now.duration_since(last).as_secs_f32();
                if elapsed > 0.0 { 1.0 / elapsed } else { 0.0 }
            }
            None => 0.0,
        };
        self.last_cycle = Some(now);

        let mut report = CycleReport {
            cycle,
            fetched_in: publish.fetched_in(),
            inferred_in: publish.inferred_in(),
            tag: None,
            count: 0,
            fps,
        };
        let has_result = publish.begin_consume();
        self.publisher.publish(publish, has_result, &self.config, &self.requests, &mut self.sink, &mut report);
        publish.finish_consume();
        self.sink.publish_report(&report);

        self.cycle += 1;
        Ok(report)
    }
}

/// 取帧阶段：读取最新帧，转换颜色并生成网络输入
///
/// # 返回值
/// 暂存区为空时返回false
fn fetch_stage(stager: &FrameStager, slot: &mut ring::Slot, input_width: usize, input_height: usize, cycle: u64) -> bool {
    slot.begin_fetch();
    let Some(frame) = stager.get_frame() else {
        slot.abort_fetch();
        return false;
    };
    let rgb = to_rgb(&frame.image, frame.encoding);
    let (input, letterbox) = letterbox_tensor(&rgb, input_width, input_height);
    slot.store(frame, rgb, input, letterbox, Some(cycle));
    true
}

/// 推理阶段：推理、时间平滑、解码和过滤
///
/// # 返回值
/// 槽位没有待推理的帧时返回false
fn infer_stage<B: InferenceBackend>(
    backend: &mut B,
    smoother: &mut TemporalSmoother,
    slot: &mut ring::Slot,
    params: &FilterParams,
    (prob_threshold, hier_threshold): (f32, f32),
    cycle: u64,
) -> Result<bool> {
    if !slot.begin_infer() {
        return Ok(false);
    }
    let raw = backend.infer(&slot.input)?;
    let smoothed = smoother.push(&raw);
    let boxes = backend.decode(smoothed, prob_threshold, hier_threshold);
    process_detections(boxes, &slot.letterbox, params, &mut slot.detections);
    slot.finish_infer(cycle);
    Ok(true)
}
