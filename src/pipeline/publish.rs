//! 汇总与发布模块
//!
//! 每个周期把已完成推理的槽位按类别分组，逐个检测做几何融合，
//! 固定发出一条计数消息和一条检测框集合消息，并在标签匹配时完成一次性请求。

use std::sync::mpsc::{self, Receiver, SyncSender, TrySendError};
use std::time::SystemTime;

use image::DynamicImage;
use log::{debug, info, warn};

use crate::color::bounds::{BoundingBox3D, Bounds, Detection};
use crate::color::draw::{position_label, Annotator};
use crate::config::{DetectorConfig, DETECTION_FRAME_ID};
use crate::depth::fusion::locate;
use crate::pipeline::frame::{FrameHeader, RequestId};
use crate::pipeline::request::RequestSlot;
use crate::pipeline::ring::Slot;

/// 每周期的目标计数
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectCount {
    pub stamp: SystemTime,
    pub frame_id: String,
    pub count: usize,
}

/// 每周期的检测框集合
#[derive(Debug, Clone, PartialEq)]
pub struct BoundingBoxes {
    pub stamp: SystemTime,
    pub frame_id: String,
    /// 被发布槽位的帧头
    pub image_header: FrameHeader,
    /// 至少一条；没有检测时为一条 "None" 占位记录
    pub boxes: Vec<BoundingBox3D>,
}

impl BoundingBoxes {
    /// 是否只有占位记录
    pub fn is_empty(&self) -> bool {
        self.boxes.iter().all(BoundingBox3D::is_placeholder)
    }
}

/// 周期报告，记录被发布结果的来龙去脉
#[derive(Debug, Clone, PartialEq)]
pub struct CycleReport {
    /// 周期序号，从0开始
    pub cycle: u64,
    /// 被发布槽位开始取帧的周期
    pub fetched_in: Option<u64>,
    /// 被发布槽位完成推理的周期
    pub inferred_in: Option<u64>,
    pub tag: Option<RequestId>,
    pub count: usize,
    pub fps: f32,
}

/// 输出端
///
/// 每个周期 `publish_count` 与 `publish_boxes` 各被调用恰好一次。
pub trait DetectionSink: Send {
    fn publish_count(&mut self, count: ObjectCount);

    fn publish_boxes(&mut self, boxes: BoundingBoxes);

    /// 标注图像，仅在开启可视化时调用
    fn publish_image(&mut self, _image: DynamicImage) {}

    /// 周期报告，每周期最后调用
    fn publish_report(&mut self, _report: &CycleReport) {}
}

/// 通道输出端每周期发出的一条消息
///
/// 计数和检测框总是同在一条消息里，队列满时整周期丢弃。
#[derive(Debug, Clone)]
pub struct Published {
    pub count: ObjectCount,
    pub boxes: BoundingBoxes,
    /// 标注图像，仅在开启可视化且未指定保存前缀时存在
    pub image: Option<DynamicImage>,
    pub report: Option<CycleReport>,
}

/// 写入有界通道的输出端
///
/// 一个周期的各部分先在本地攒齐，收到周期报告时作为一条消息发出。
/// 队列满时丢弃整个周期，不阻塞流水线线程。
pub struct ChannelSink {
    tx: SyncSender<Published>,
    count: Option<ObjectCount>,
    boxes: Option<BoundingBoxes>,
    image: Option<DynamicImage>,
}

impl ChannelSink {
    /// 创建队列深度为 `depth` 个周期的输出端和对应接收端
    pub fn bounded(depth: usize) -> (Self, Receiver<Published>) {
        let (tx, rx) = mpsc::sync_channel(depth);
        (Self { tx, count: None, boxes: None, image: None }, rx)
    }

    fn flush(&mut self, report: Option<CycleReport>) {
        let (Some(count), Some(boxes)) = (self.count.take(), self.boxes.take()) else {
            self.image = None;
            return;
        };
        let message = Published { count, boxes, image: self.image.take(), report };
        match self.tx.try_send(message) {
            Ok(()) => {}
            Err(TrySendError::Full(dropped)) => {
                debug!("输出队列已满，丢弃帧 {} 的结果", dropped.boxes.image_header.seq)
            }
            Err(TrySendError::Disconnected(_)) => debug!("输出接收端已关闭"),
        }
    }
}

impl DetectionSink for ChannelSink {
    fn publish_count(&mut self, count: ObjectCount) {
        // 上一周期没有报告时先把它发出去
        if self.boxes.is_some() {
            self.flush(None);
        }
        self.count = Some(count);
    }

    fn publish_boxes(&mut self, boxes: BoundingBoxes) {
        self.boxes = Some(boxes);
    }

    fn publish_image(&mut self, image: DynamicImage) {
        self.image = Some(image);
    }

    fn publish_report(&mut self, report: &CycleReport) {
        self.flush(Some(report.clone()));
    }
}

/// 按类别分组的本周期检测
#[derive(Debug, Clone, Default)]
pub struct PerClassAccumulator {
    per_class: Vec<Vec<Detection>>,
}

impl PerClassAccumulator {
    pub fn new(num_classes: usize) -> Self {
        Self { per_class: vec![Vec::new(); num_classes] }
    }

    /// 分组，类别ID超出标签表的检测被忽略，返回忽略的数量
    pub fn group(&mut self, detections: &Bounds) -> usize {
        let mut ignored = 0;
        for detection in detections {
            match self.per_class.get_mut(detection.class_id) {
                Some(list) => list.push(detection.clone()),
                None => ignored += 1,
            }
        }
        ignored
    }

    /// 按类别ID顺序遍历
    pub fn iter(&self) -> impl Iterator<Item = (usize, &Detection)> {
        self.per_class
            .iter()
            .enumerate()
            .flat_map(|(class_id, list)| list.iter().map(move |d| (class_id, d)))
    }

    pub fn len(&self) -> usize {
        self.per_class.iter().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&mut self) {
        self.per_class.iter_mut().for_each(Vec::clear);
    }
}

/// 汇总发布器
pub struct Publisher {
    accumulator: PerClassAccumulator,
}

impl Publisher {
    pub fn new(config: &DetectorConfig) -> Self {
        Self { accumulator: PerClassAccumulator::new(config.num_classes()) }
    }

    /// 发布一个槽位的推理结果
    ///
    /// # 参数
    /// * `slot` - 发布角色的槽位
    /// * `has_result` - 槽位是否带有推理结果（预热阶段为false）
    /// * `config` - 检测配置
    /// * `requests` - 一次性请求登记处
    /// * `sink` - 输出端
    /// * `report` - 本周期报告，`count` 在此填写
    ///
    /// # 返回值
    /// 返回发布的检测框集合
    pub fn publish(
        &mut self,
        slot: &Slot,
        has_result: bool,
        config: &DetectorConfig,
        requests: &RequestSlot,
        sink: &mut dyn DetectionSink,
        report: &mut CycleReport,
    ) -> BoundingBoxes {
        let frame = slot.frame();
        let header = frame.map(|f| f.header.clone()).unwrap_or_default();
        // 未推理的槽位不完成请求，标签等到推理结果发布时再匹配
        report.tag = if has_result { frame.and_then(|f| f.tag) } else { None };

        if has_result {
            let ignored = self.accumulator.group(slot.detections());
            if ignored > 0 {
                warn!("{} 个检测的类别ID超出标签表，已忽略", ignored);
            }
        }

        let mut annotator = match frame {
            Some(_) if config.visualization.enabled => Some(Annotator::new(&DynamicImage::ImageRgb8(slot.rgb.clone()))),
            _ => None,
        };

        let mut boxes = Vec::with_capacity(self.accumulator.len());
        if let Some(frame) = frame {
            for (class_id, detection) in self.accumulator.iter() {
                let pixels = detection.bbox.to_pixels(frame.width(), frame.height());
                let fused = locate(&pixels, &frame.depth, &config.calibration);
                if let Some(annotator) = annotator.as_mut() {
                    annotator.draw_box(&pixels, class_id);
                    annotator.mark_position(fused.center, &fused.position);
                }
                boxes.push(BoundingBox3D {
                    class: config.class_labels[class_id].clone(),
                    id: class_id,
                    probability: detection.probability,
                    pixels,
                    position: fused.position,
                });
            }
        }

        let count = boxes.len();
        report.count = count;
        sink.publish_count(ObjectCount {
            stamp: SystemTime::now(),
            frame_id: DETECTION_FRAME_ID.to_string(),
            count,
        });

        if boxes.is_empty() {
            boxes.push(BoundingBox3D::placeholder());
        }
        let result = BoundingBoxes {
            stamp: header.stamp,
            frame_id: DETECTION_FRAME_ID.to_string(),
            image_header: header,
            boxes,
        };
        sink.publish_boxes(result.clone());

        if let Some(annotator) = annotator {
            let image = annotator.finish();
            match &config.visualization.save_prefix {
                Some(prefix) => {
                    let path = format!("{}_{:08}.png", prefix, report.cycle);
                    if let Err(e) = image.save(&path) {
                        warn!("保存标注图像 {} 失败: {}", path, e);
                    }
                }
                None => sink.publish_image(image),
            }
        }

        if requests.complete(report.tag, &result) {
            debug!("一次性请求 {:?} 已完成", report.tag);
        }

        if config.console_output {
            info!("FPS:{:.1} Objects: {}", report.fps, count);
            for b in result.boxes.iter().filter(|b| !b.is_placeholder()) {
                info!("  {}: {:.0}% {}", b.class, b.probability * 100.0, position_label(&b.position));
            }
        } else {
            debug!("周期 {} 发布 {} 个目标", report.cycle, count);
        }

        self.accumulator.clear();
        result
    }
}
