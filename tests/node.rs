use std::sync::mpsc::Receiver;
use std::time::{Duration, SystemTime};

use image::{DynamicImage, Rgb, RgbImage};
use ndarray::{Array4, ArrayD, IxDyn};
use yolo3d::color::{DecodedBox, InferenceBackend, NormBox, PixelEncoding, RawOutput};
use yolo3d::depth::DepthSnapshot;
use yolo3d::{ChannelSink, DetectorConfig, FrameHeader, PerceptionError, Published, Result, Yolo3d};

/// 每次推理都输出同一个框
struct FixedBackend {
    fail: bool,
}

impl InferenceBackend for FixedBackend {
    fn infer(&mut self, _input: &Array4<f32>) -> Result<RawOutput> {
        if self.fail {
            return Err(PerceptionError::Backend("模型不可用".into()));
        }
        Ok(ArrayD::from_shape_vec(IxDyn(&[5]), vec![0.5, 0.5, 0.4, 0.4, 0.8])?)
    }

    fn decode(&self, output: &RawOutput, _prob_threshold: f32, _hier_threshold: f32) -> Vec<DecodedBox> {
        let v: Vec<f32> = output.iter().copied().collect();
        vec![DecodedBox {
            bbox: NormBox::new(v[0], v[1], v[2], v[3]),
            objectness: v[4],
            prob: vec![v[4]],
        }]
    }
}

fn config() -> DetectorConfig {
    DetectorConfig {
        input_width: 16,
        input_height: 16,
        smoothing_window: 1,
        wait_interval_ms: 10,
        ..DetectorConfig::default()
    }
}

fn image() -> DynamicImage {
    DynamicImage::ImageRgb8(RgbImage::from_pixel(16, 16, Rgb([0, 128, 255])))
}

fn next_boxes(rx: &Receiver<Published>) -> Option<yolo3d::BoundingBoxes> {
    for _ in 0..1000 {
        let message = rx.recv_timeout(Duration::from_secs(5)).ok()?;
        if !message.boxes.is_empty() {
            return Some(message.boxes);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn streaming_frames_are_published() {
        let mut node = Yolo3d::new(config()).unwrap();
        let (sink, rx) = ChannelSink::bounded(16);
        node.start(FixedBackend { fail: false }, sink).unwrap();
        assert!(node.is_running());

        let depth = DepthSnapshot::filled(16, 16, [0.0, 0.0, 1.0]);
        node.put_frame(image(), PixelEncoding::Rgb8, depth, FrameHeader::new(7, SystemTime::now(), "camera"))
            .unwrap();

        let boxes = next_boxes(&rx).expect("应收到检测结果");
        assert_eq!(boxes.boxes[0].class, "person");
        assert_eq!(boxes.image_header.seq, 7);
        assert!((boxes.boxes[0].position.x - 1.1).abs() < 1e-5);

        node.stop();
        node.join().unwrap();
        assert!(!node.is_running());
    }

    #[test]
    fn second_start_is_rejected() {
        let mut node = Yolo3d::new(config()).unwrap();
        let (sink, _rx) = ChannelSink::bounded(1);
        node.start(FixedBackend { fail: false }, sink).unwrap();

        let (sink, _rx2) = ChannelSink::bounded(1);
        let err = node.start(FixedBackend { fail: false }, sink).unwrap_err();
        assert!(matches!(err, PerceptionError::AlreadyRunning));
    }

    #[test]
    fn stop_while_waiting_for_first_frame() {
        let mut node = Yolo3d::new(config()).unwrap();
        let (sink, _rx) = ChannelSink::bounded(1);
        node.start(FixedBackend { fail: false }, sink).unwrap();
        node.stop();
        assert!(node.join().is_ok());
    }

    #[test]
    fn one_shot_request_returns_its_own_result() {
        let mut node = Yolo3d::new(config()).unwrap();
        let (sink, _rx) = ChannelSink::bounded(1);
        node.start(FixedBackend { fail: false }, sink).unwrap();

        let handle = node.check_for_objects(image(), PixelEncoding::Bgr8);
        let id = handle.id();
        let result = handle.wait().expect("请求应完成");
        assert_eq!(result.id, id);
        assert_eq!(result.boxes.boxes.len(), 1);
        assert_eq!(result.boxes.boxes[0].class, "person");
        // 请求没有对齐点云，位置为哨兵值
        assert_eq!(result.boxes.boxes[0].position, yolo3d::Point3::default());
    }

    #[test]
    fn backend_failure_is_reported_by_join() {
        let mut node = Yolo3d::new(config()).unwrap();
        let (sink, _rx) = ChannelSink::bounded(1);
        node.start(FixedBackend { fail: true }, sink).unwrap();
        node.put_frame(
            image(),
            PixelEncoding::Rgb8,
            DepthSnapshot::invalid(16, 16),
            FrameHeader::default(),
        )
        .unwrap();

        let err = node.join().unwrap_err();
        assert!(matches!(err, PerceptionError::Backend(_)));
        assert!(!node.is_running());
    }

    #[test]
    fn invalid_config_is_rejected() {
        let config = DetectorConfig { smoothing_window: 0, ..config() };
        assert!(matches!(Yolo3d::new(config), Err(PerceptionError::Config(_))));
    }
}
