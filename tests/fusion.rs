use yolo3d::color::{PixelBox, Point3};
use yolo3d::config::CalibrationOffsets;
use yolo3d::depth::{locate, Candidate, DepthSnapshot};

fn fill_window(cloud: &mut DepthSnapshot, u: usize, v: usize, point: [f32; 3]) {
    for i in u - 1..=u + 1 {
        for j in v - 1..=v + 1 {
            cloud.set(i, j, point);
        }
    }
}

fn approx(p: Point3, x: f32, y: f32, z: f32) -> bool {
    (p.x - x).abs() < 1e-5 && (p.y - y).abs() < 1e-5 && (p.z - z).abs() < 1e-5
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_valid_center_is_selected() {
        let mut cloud = DepthSnapshot::invalid(256, 256);
        fill_window(&mut cloud, 150, 150, [0.1, 0.1, 2.0]);

        let fused = locate(&PixelBox::new(100, 100, 200, 200), &cloud, &CalibrationOffsets::default());
        assert_eq!(fused.candidate, Some(Candidate::Center));
        assert!(approx(fused.position, 2.1, -0.0875, 0.36), "{:?}", fused.position);
    }

    #[test]
    fn nearest_candidate_wins_when_all_valid() {
        let mut cloud = DepthSnapshot::filled(256, 256, [1.0, 1.0, 5.0]);
        fill_window(&mut cloud, 150, 150, [0.2, -0.1, 3.0]);

        let fused = locate(&PixelBox::new(100, 100, 200, 200), &cloud, &CalibrationOffsets::default());
        assert_eq!(fused.candidate, Some(Candidate::Center));
        assert!(approx(fused.position, 3.1, -0.1875, 0.56), "{:?}", fused.position);
    }

    #[test]
    fn candidates_are_compared_by_sums_not_means() {
        let mut cloud = DepthSnapshot::invalid(256, 256);
        // 左候选只有邻域最后一个采样有效
        cloud.set(126, 126, [0.5, 0.0, 1.0]);
        fill_window(&mut cloud, 150, 150, [0.1, 0.0, 2.0]);
        fill_window(&mut cloud, 175, 175, [0.3, 0.0, 3.0]);

        // 累加和的距离：左0.25，中心0.81，右7.29；按均值比较则中心最近
        let fused = locate(&PixelBox::new(100, 100, 200, 200), &cloud, &CalibrationOffsets::default());
        assert_eq!(fused.candidate, Some(Candidate::Left));
        assert!(approx(fused.position, 1.1, -0.4875, 0.46), "{:?}", fused.position);
    }

    #[test]
    fn equal_distances_prefer_the_left_candidate() {
        let cloud = DepthSnapshot::filled(256, 256, [0.5, 0.0, 1.0]);
        let fused = locate(&PixelBox::new(100, 100, 200, 200), &cloud, &CalibrationOffsets::default());
        assert_eq!(fused.candidate, Some(Candidate::Left));
    }

    #[test]
    fn no_valid_depth_yields_the_origin() {
        let cloud = DepthSnapshot::invalid(256, 256);
        let fused = locate(&PixelBox::new(100, 100, 200, 200), &cloud, &CalibrationOffsets::default());
        assert_eq!(fused.candidate, None);
        assert_eq!(fused.position, Point3::default());
        assert_eq!(fused.center, (150, 150));
    }

    #[test]
    fn calibration_offsets_are_configurable() {
        let cloud = DepthSnapshot::filled(64, 64, [0.0, 0.0, 1.0]);
        let offsets = CalibrationOffsets { x: 0.0, y: 0.0, z: 0.0 };
        let fused = locate(&PixelBox::new(10, 10, 30, 30), &cloud, &offsets);
        assert!(approx(fused.position, 1.0, 0.0, 0.0));
    }

    #[test]
    fn border_samples_reset_sums_but_keep_count() {
        let cloud = DepthSnapshot::filled(32, 32, [0.0, 0.0, 1.5]);
        // 左候选落在(0, 0)：最后一个越界采样之后只剩两个有效点，但计数为4
        let fused = locate(&PixelBox::new(0, 0, 2, 2), &cloud, &CalibrationOffsets::default());
        assert_eq!(fused.candidate, Some(Candidate::Left));
        assert!((fused.position.x - 0.85).abs() < 1e-5, "{:?}", fused.position);
    }
}
