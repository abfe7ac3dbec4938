use ndarray::{ArrayD, IxDyn};
use yolo3d::color::{
    accept_detection, process_detections, Bounds, DecodedBox, FilterParams, Letterbox, NormBox, RawOutput,
    TemporalSmoother,
};

fn params() -> FilterParams {
    FilterParams {
        prob_threshold: 0.3,
        min_box_fraction: 0.01,
        nms_threshold: 0.4,
        max_boxes: 100,
    }
}

fn tensor(values: Vec<f32>) -> RawOutput {
    ArrayD::from_shape_vec(IxDyn(&[values.len()]), values).unwrap()
}

fn decoded(x: f32, objectness: f32) -> DecodedBox {
    DecodedBox {
        bbox: NormBox::new(x, 0.5, 0.1, 0.1),
        objectness,
        prob: vec![objectness],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn width_at_min_fraction_is_rejected() {
        let bbox = NormBox::new(0.5, 0.5, 0.01, 0.2);
        assert!(accept_detection(&bbox, 0.9, &params()).is_none());
    }

    #[test]
    fn width_just_above_min_fraction_is_accepted() {
        let bbox = NormBox::new(0.5, 0.5, 0.010001, 0.010001);
        let accepted = accept_detection(&bbox, 0.9, &params()).expect("应通过");
        assert_eq!(accepted.w, 0.010001);
    }

    #[test]
    fn probability_must_exceed_threshold() {
        let bbox = NormBox::new(0.5, 0.5, 0.2, 0.2);
        assert!(accept_detection(&bbox, 0.3, &params()).is_none());
        assert!(accept_detection(&bbox, 0.30001, &params()).is_some());
    }

    #[test]
    fn box_outside_frame_is_clamped() {
        let bbox = NormBox::new(0.95, 0.5, 0.2, 0.2);
        let accepted = accept_detection(&bbox, 0.9, &params()).unwrap();
        assert!((accepted.right() - 1.0).abs() < 1e-6);
        assert!((accepted.w - 0.15).abs() < 1e-6);
    }

    #[test]
    fn overlapping_boxes_keep_the_higher_objectness() {
        let letterbox = Letterbox::fit(100, 100, 100, 100);
        let mut output = Bounds::new();
        process_detections(
            vec![decoded(0.5, 0.6), decoded(0.51, 0.9), decoded(0.2, 0.7)],
            &letterbox,
            &params(),
            &mut output,
        );
        let kept: Vec<f32> = output.iter().map(|d| d.probability).collect();
        assert_eq!(kept, vec![0.9, 0.7]);
    }

    #[test]
    fn accepted_boxes_are_capped() {
        let letterbox = Letterbox::fit(100, 100, 100, 100);
        let boxes: Vec<DecodedBox> = (0..150).map(|_| decoded(0.5, 0.9)).collect();
        let mut output = Bounds::new();
        let params = FilterParams { nms_threshold: 0.0, ..params() };
        process_detections(boxes, &letterbox, &params, &mut output);
        assert_eq!(output.len(), 100);
    }

    #[test]
    fn smoothed_output_is_mean_of_last_window() {
        for window in 1..=5usize {
            let mut smoother = TemporalSmoother::new(window);
            let mut written: Vec<Vec<f32>> = Vec::new();
            for step in 0..(window * 3 + 1) {
                let values = vec![step as f32, (step * step) as f32 * 0.5, -(step as f32)];
                written.push(values.clone());
                let average = smoother.push(&tensor(values)).clone();

                if written.len() >= window {
                    let recent = &written[written.len() - window..];
                    for (i, value) in average.iter().enumerate() {
                        let expected: f32 = recent.iter().map(|v| v[i]).sum::<f32>() / window as f32;
                        assert!(
                            (value - expected).abs() < 1e-3,
                            "window={} step={} i={}: {} != {}",
                            window,
                            step,
                            i,
                            value,
                            expected
                        );
                    }
                }
            }
        }
    }
}
