//! 三槽环形缓冲
//!
//! 三个具名槽位轮流承担取帧、推理、发布三个角色。每个周期游标前进一位：
//! 取帧写入游标所指槽位，推理消费两周期前取到的槽位，发布消费上一周期完成推理的槽位。
//! 三个角色通过一次解构得到互不重叠的 `&mut`，并行阶段之间不存在共享可变状态。

use image::RgbImage;
use ndarray::Array4;

use crate::color::bounds::Bounds;
use crate::color::prevs::Letterbox;
use crate::config::RING_SLOTS;
use crate::pipeline::frame::Frame;

/// 槽位名称
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotName {
    A,
    B,
    C,
}

/// 槽位状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotState {
    /// 尚未取到帧
    Empty,
    /// 取帧阶段正在写入
    Fetching,
    /// 已预处理，等待推理
    Fetched,
    /// 推理阶段正在使用
    Inferring,
    /// 推理完成，等待发布
    Ready,
    /// 发布阶段正在读取
    Consuming,
}

/// 一个环形槽位：原始帧、预处理结果和推理结果
#[derive(Debug)]
pub struct Slot {
    name: SlotName,
    state: SlotState,
    pub(crate) frame: Option<Frame>,
    pub(crate) rgb: RgbImage,
    pub(crate) input: Array4<f32>,
    pub(crate) letterbox: Letterbox,
    pub(crate) detections: Bounds,
    fetched_in: Option<u64>,
    inferred_in: Option<u64>,
}

impl Slot {
    fn new(name: SlotName, input_width: usize, input_height: usize) -> Self {
        Self {
            name,
            state: SlotState::Empty,
            frame: None,
            rgb: RgbImage::new(0, 0),
            input: Array4::zeros((1, 3, input_height, input_width)),
            letterbox: Letterbox::fit(input_width as u32, input_height as u32, input_width, input_height),
            detections: Bounds::new(),
            fetched_in: None,
            inferred_in: None,
        }
    }

    pub fn name(&self) -> SlotName {
        self.name
    }

    pub fn state(&self) -> SlotState {
        self.state
    }

    pub fn frame(&self) -> Option<&Frame> {
        self.frame.as_ref()
    }

    pub fn detections(&self) -> &Bounds {
        &self.detections
    }

    /// 开始取帧的周期（预热填充的槽位为None）
    pub fn fetched_in(&self) -> Option<u64> {
        self.fetched_in
    }

    /// 完成推理的周期
    pub fn inferred_in(&self) -> Option<u64> {
        self.inferred_in
    }

    pub(crate) fn begin_fetch(&mut self) {
        self.state = SlotState::Fetching;
    }

    /// 写入新帧，旧的推理结果作废
    pub(crate) fn store(&mut self, frame: Frame, rgb: RgbImage, input: Array4<f32>, letterbox: Letterbox, cycle: Option<u64>) {
        self.frame = Some(frame);
        self.rgb = rgb;
        self.input = input;
        self.letterbox = letterbox;
        self.detections.clear();
        self.fetched_in = cycle;
        self.inferred_in = None;
        self.state = SlotState::Fetched;
    }

    /// 取帧未得到新数据时恢复原状态
    pub(crate) fn abort_fetch(&mut self) {
        self.state = if self.frame.is_some() { SlotState::Fetched } else { SlotState::Empty };
    }

    /// 只有已取帧的槽位才进入推理
    pub(crate) fn begin_infer(&mut self) -> bool {
        if self.state == SlotState::Fetched {
            self.state = SlotState::Inferring;
            true
        } else {
            false
        }
    }

    pub(crate) fn finish_infer(&mut self, cycle: u64) {
        self.inferred_in = Some(cycle);
        self.state = SlotState::Ready;
    }

    /// 发布阶段读取槽位；返回该槽位是否有推理结果
    pub(crate) fn begin_consume(&mut self) -> bool {
        let ready = self.state == SlotState::Ready;
        if ready {
            self.state = SlotState::Consuming;
        }
        ready
    }

    /// 发布完成后槽位回到已取帧状态，等待下一次被覆盖
    pub(crate) fn finish_consume(&mut self) {
        if self.state == SlotState::Consuming {
            self.state = SlotState::Fetched;
        }
    }
}

/// 一个周期内三个角色对应的槽位
pub struct CycleSlots<'a> {
    pub fetch: &'a mut Slot,
    pub infer: &'a mut Slot,
    pub publish: &'a mut Slot,
}

/// 三槽环形缓冲
#[derive(Debug)]
pub struct Ring {
    slots: [Slot; RING_SLOTS],
    cursor: SlotName,
}

impl Ring {
    pub fn new(input_width: usize, input_height: usize) -> Self {
        Self {
            slots: [
                Slot::new(SlotName::A, input_width, input_height),
                Slot::new(SlotName::B, input_width, input_height),
                Slot::new(SlotName::C, input_width, input_height),
            ],
            cursor: SlotName::A,
        }
    }

    /// 当前取帧槽位
    pub fn cursor(&self) -> SlotName {
        self.cursor
    }

    /// 游标前进一位
    pub fn advance(&mut self) {
        self.cursor = match self.cursor {
            SlotName::A => SlotName::B,
            SlotName::B => SlotName::C,
            SlotName::C => SlotName::A,
        };
    }

    /// 取出本周期三个角色的槽位
    ///
    /// 取帧 = 游标；发布 = 游标后一位（上一周期推理完成）；推理 = 游标后两位（上一周期取帧完成）。
    pub fn roles(&mut self) -> CycleSlots<'_> {
        let [a, b, c] = &mut self.slots;
        match self.cursor {
            SlotName::A => CycleSlots { fetch: a, publish: b, infer: c },
            SlotName::B => CycleSlots { fetch: b, publish: c, infer: a },
            SlotName::C => CycleSlots { fetch: c, publish: a, infer: b },
        }
    }

    pub fn slots(&self) -> &[Slot; RING_SLOTS] {
        &self.slots
    }

    pub fn slots_mut(&mut self) -> &mut [Slot; RING_SLOTS] {
        &mut self.slots
    }
}
