//! 一次性检测请求
//!
//! 调用方提交一张图像，拿到 [`RequestHandle`]，等待标签匹配的周期完成后取回结果。
//! 同一时刻只跟踪一个未完成请求：新请求覆盖旧请求，被覆盖的请求永远拿不到结果。
//! 丢弃句柄即取消，对应周期照常运行，结果被丢弃。

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use log::debug;
use tokio::sync::oneshot;

use crate::pipeline::frame::RequestId;
use crate::pipeline::publish::BoundingBoxes;
use crate::utils::guarded::Guarded;

/// 一次性请求的结果
#[derive(Debug, Clone)]
pub struct CheckResult {
    pub id: RequestId,
    pub boxes: BoundingBoxes,
}

#[derive(Debug)]
struct Pending {
    id: RequestId,
    responder: oneshot::Sender<CheckResult>,
}

/// 未完成请求的登记处
#[derive(Debug, Default)]
pub struct RequestSlot {
    next_id: AtomicU64,
    pending: Guarded<Option<Pending>>,
}

impl RequestSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// 登记一个新请求，覆盖仍未完成的旧请求
    pub fn register(self: &Arc<Self>) -> RequestHandle {
        let id = RequestId(self.next_id.fetch_add(1, Ordering::Relaxed) + 1);
        let (responder, receiver) = oneshot::channel();
        let previous = self.pending.replace(Some(Pending { id, responder }));
        if let Some(previous) = previous {
            debug!("请求 {} 被请求 {} 覆盖", previous.id, id);
        }
        RequestHandle { id, receiver, slot: Arc::clone(self) }
    }

    /// 当前未完成的请求ID
    pub fn outstanding(&self) -> Option<RequestId> {
        self.pending.read(|pending| pending.as_ref().map(|p| p.id))
    }

    /// 周期结束时尝试完成请求
    ///
    /// 只有当周期标签与未完成请求的ID相同时才完成，返回是否完成。
    pub fn complete(&self, tag: Option<RequestId>, boxes: &BoundingBoxes) -> bool {
        let Some(tag) = tag else { return false };
        let pending = self.pending.update(|pending| {
            if pending.as_ref().is_some_and(|p| p.id == tag) { pending.take() } else { None }
        });
        let Some(pending) = pending else { return false };

        let result = CheckResult { id: pending.id, boxes: boxes.clone() };
        if pending.responder.send(result).is_err() {
            debug!("请求 {} 已被放弃，结果丢弃", pending.id);
            return false;
        }
        true
    }

    /// 取消指定请求（仍是当前请求时）
    pub fn cancel(&self, id: RequestId) -> bool {
        self.pending.update(|pending| {
            pending.as_ref().is_some_and(|p| p.id == id) && pending.take().is_some()
        })
    }
}

/// 一次性请求句柄
#[derive(Debug)]
pub struct RequestHandle {
    id: RequestId,
    receiver: oneshot::Receiver<CheckResult>,
    slot: Arc<RequestSlot>,
}

impl RequestHandle {
    pub fn id(&self) -> RequestId {
        self.id
    }

    /// 阻塞等待结果
    ///
    /// 请求被覆盖或取消时返回None。不能在异步上下文中调用，异步调用方用 [`RequestHandle::recv`]。
    pub fn wait(self) -> Option<CheckResult> {
        self.receiver.blocking_recv().ok()
    }

    /// 异步等待结果，超时由调用方自行包装
    pub async fn recv(self) -> Option<CheckResult> {
        self.receiver.await.ok()
    }

    /// 非阻塞查询结果
    pub fn try_result(&mut self) -> Option<CheckResult> {
        self.receiver.try_recv().ok()
    }

    /// 主动取消请求
    pub fn cancel(self) {
        if self.slot.cancel(self.id) {
            debug!("请求 {} 已取消", self.id);
        }
    }
}
