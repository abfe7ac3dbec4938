use std::sync::Arc;
use std::time::{Duration, SystemTime};

use yolo3d::color::BoundingBox3D;
use yolo3d::pipeline::{BoundingBoxes, FrameHeader, RequestId, RequestSlot};

fn result_set(seq: u64) -> BoundingBoxes {
    let header = FrameHeader::new(seq, SystemTime::now(), "camera");
    BoundingBoxes {
        stamp: header.stamp,
        frame_id: "detection".into(),
        image_header: header,
        boxes: vec![BoundingBox3D::placeholder()],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matching_tag_completes_the_request() {
        let slot = Arc::new(RequestSlot::new());
        let handle = slot.register();
        assert_eq!(slot.outstanding(), Some(handle.id()));

        assert!(!slot.complete(None, &result_set(1)));
        assert!(!slot.complete(Some(RequestId(handle.id().0 + 1)), &result_set(2)));
        assert!(slot.complete(Some(handle.id()), &result_set(3)));
        assert_eq!(slot.outstanding(), None);

        let result = handle.wait().unwrap();
        assert_eq!(result.boxes.image_header.seq, 3);
    }

    #[test]
    fn newer_request_supersedes_older() {
        let slot = Arc::new(RequestSlot::new());
        let first = slot.register();
        let second = slot.register();
        assert_ne!(first.id(), second.id());
        assert_eq!(slot.outstanding(), Some(second.id()));

        assert!(!slot.complete(Some(first.id()), &result_set(1)));
        assert!(first.wait().is_none());

        assert!(slot.complete(Some(second.id()), &result_set(2)));
        assert!(second.wait().is_some());
    }

    #[test]
    fn cancel_clears_only_the_current_request() {
        let slot = Arc::new(RequestSlot::new());
        let stale = slot.register();
        let current = slot.register();
        let current_id = current.id();

        stale.cancel();
        assert_eq!(slot.outstanding(), Some(current_id));

        current.cancel();
        assert_eq!(slot.outstanding(), None);
        assert!(!slot.complete(Some(current_id), &result_set(1)));
    }

    #[test]
    fn dropped_handle_discards_the_result() {
        let slot = Arc::new(RequestSlot::new());
        let id = slot.register().id();
        assert!(!slot.complete(Some(id), &result_set(1)));
        assert_eq!(slot.outstanding(), None);
    }

    #[tokio::test]
    async fn result_can_be_awaited() {
        let slot = Arc::new(RequestSlot::new());
        let handle = slot.register();
        let id = handle.id();

        let completer = Arc::clone(&slot);
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            completer.complete(Some(id), &result_set(4));
        });

        let result = tokio::time::timeout(Duration::from_secs(5), handle.recv())
            .await
            .expect("等待超时")
            .expect("请求应完成");
        assert_eq!(result.id, id);
        assert!(result.boxes.is_empty());
    }
}
