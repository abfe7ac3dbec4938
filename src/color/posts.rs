//! 后处理模块
//!
//! 负责对解码后的候选框做信箱坐标还原、基于目标性的非极大值抑制(NMS)以及尺寸/概率过滤。

use log::debug;

use crate::color::bounds::{Bounds, Detection, NormBox};
use crate::color::infer::DecodedBox;
use crate::color::prevs::Letterbox;

/// 过滤参数
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FilterParams {
    /// 类别概率必须严格大于该值
    pub prob_threshold: f32,
    /// 归一化宽高必须严格大于该值
    pub min_box_fraction: f32,
    /// NMS交并比阈值，0表示不做NMS
    pub nms_threshold: f32,
    /// 最多转发的检测数
    pub max_boxes: usize,
}

/// 按目标性做非极大值抑制
///
/// 候选框按目标性降序排列；与更高目标性框的交并比超过阈值的框，目标性和全部类别概率清零。
///
/// # 参数
/// * `boxes` - 候选框列表（会被排序和修改）
/// * `nms_threshold` - NMS阈值
pub fn nms_by_objectness(boxes: &mut [DecodedBox], nms_threshold: f32) {
    boxes.sort_by(|a, b| b.objectness.total_cmp(&a.objectness));

    for i in 0..boxes.len() {
        if boxes[i].objectness == 0.0 {
            continue;
        }
        let (head, tail) = boxes.split_at_mut(i + 1);
        let kept = &head[i];
        for other in tail.iter_mut() {
            if other.objectness == 0.0 {
                continue;
            }
            if kept.bbox.iou(&other.bbox) > nms_threshold {
                other.objectness = 0.0;
                other.prob.iter_mut().for_each(|p| *p = 0.0);
            }
        }
    }
}

/// 把框裁剪到帧内并检查尺寸
///
/// 裁剪后的宽和高都必须严格大于 `min_fraction`，否则返回None。
pub fn accept_box(bbox: &NormBox, min_fraction: f32) -> Option<NormBox> {
    let (left, right) = (bbox.left(), bbox.right());
    let (top, bottom) = (bbox.top(), bbox.bottom());
    let (xmin, xmax) = (left.max(0.0), right.min(1.0));
    let (ymin, ymax) = (top.max(0.0), bottom.min(1.0));

    // 未被裁剪的一边直接沿用原始宽高，避免边界值上的舍入误差
    let width = if xmin == left && xmax == right { bbox.w } else { xmax - xmin };
    let height = if ymin == top && ymax == bottom { bbox.h } else { ymax - ymin };

    if width > min_fraction && height > min_fraction {
        Some(NormBox::new((xmin + xmax) / 2.0, (ymin + ymax) / 2.0, width, height))
    } else {
        None
    }
}

/// 单条检测的准入判定：尺寸和概率都要通过
pub fn accept_detection(bbox: &NormBox, probability: f32, params: &FilterParams) -> Option<NormBox> {
    if probability <= params.prob_threshold {
        return None;
    }
    accept_box(bbox, params.min_box_fraction)
}

/// 处理解码结果，写入本周期的检测容器
///
/// 依次执行：信箱坐标还原、NMS、逐类别的尺寸和概率过滤。
/// 同一个框在多个类别上通过时各产生一条检测；超过 `max_boxes` 的部分丢弃。
///
/// # 参数
/// * `boxes` - 后端解码出的候选框（相对网络输入）
/// * `letterbox` - 预处理时的缩放几何
/// * `params` - 过滤参数
/// * `output` - 输出容器，调用前会被清空
pub fn process_detections(
    mut boxes: Vec<DecodedBox>,
    letterbox: &Letterbox,
    params: &FilterParams,
    output: &mut Bounds,
) {
    output.clear();
    for candidate in boxes.iter_mut() {
        candidate.bbox = letterbox.correct(&candidate.bbox);
    }

    if params.nms_threshold > 0.0 {
        nms_by_objectness(&mut boxes, params.nms_threshold);
    }

    let limit = params.max_boxes.min(crate::config::DETECTIONS_CAPACITY);
    let mut dropped = 0usize;
    for candidate in &boxes {
        for (class_id, &probability) in candidate.prob.iter().enumerate() {
            if probability == 0.0 {
                continue;
            }
            let Some(bbox) = accept_detection(&candidate.bbox, probability, params) else {
                continue;
            };
            if output.len() < limit {
                output.push(Detection::new(bbox, class_id, probability));
            } else {
                dropped += 1;
            }
        }
    }
    if dropped > 0 {
        debug!("本周期检测数超过上限 {}，丢弃 {} 个", limit, dropped);
    }
}
