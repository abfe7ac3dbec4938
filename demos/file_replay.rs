//! file_replay - 从磁盘回放图像和点云，驱动检测节点并打印结果
//!
//! 目录中同名的 `*.png` 与 `*.pcd` 组成一帧，例如 `0001.png` + `0001.pcd`。

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use clap::Parser;
use log::{info, warn};
use yolo3d::color::PixelEncoding;
use yolo3d::{ChannelSink, DepthSnapshot, DetectorConfig, FrameHeader, OnnxBackend, Yolo3d};

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// 存放成对 png/pcd 文件的目录
    #[arg(long)]
    input: PathBuf,
    /// TOML配置文件，不指定时使用默认配置
    #[arg(long)]
    config: Option<PathBuf>,
    /// 覆盖配置中的模型路径
    #[arg(long)]
    model: Option<PathBuf>,
    /// 两帧之间的间隔（毫秒）
    #[arg(long, default_value_t = 100)]
    interval_ms: u64,
    /// 最后一帧之后额外等待的时间（毫秒），让流水线发布完剩余结果
    #[arg(long, default_value_t = 1000)]
    drain_ms: u64,
}

/// 按文件名主干把png和pcd配对
fn pair_files(dir: &Path) -> std::io::Result<Vec<(PathBuf, PathBuf)>> {
    let mut images = BTreeMap::new();
    let mut clouds = BTreeMap::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        let (Some(stem), Some(ext)) = (path.file_stem(), path.extension()) else {
            continue;
        };
        let stem = stem.to_string_lossy().into_owned();
        match ext.to_string_lossy().as_ref() {
            "png" => {
                images.insert(stem, path);
            }
            "pcd" => {
                clouds.insert(stem, path);
            }
            _ => {}
        }
    }
    Ok(images
        .into_iter()
        .filter_map(|(stem, image)| match clouds.remove(&stem) {
            Some(cloud) => Some((image, cloud)),
            None => {
                warn!("{} 没有对应的点云，跳过", image.display());
                None
            }
        })
        .collect())
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => DetectorConfig::from_file(path)?,
        None => DetectorConfig::default(),
    };
    if let Some(model) = args.model {
        config.model_path = model;
    }

    let frames = pair_files(&args.input)?;
    info!("共找到 {} 帧", frames.len());

    let backend = OnnxBackend::load(
        &config.model_path,
        config.input_width,
        config.input_height,
        config.num_classes(),
    )?;
    let (sink, rx) = ChannelSink::bounded(config.output_queue_depth);

    let mut node = Yolo3d::new(config)?;
    node.start(backend, sink)?;

    let printer = std::thread::spawn(move || {
        for message in rx {
            let boxes = message.boxes;
            println!("目标数: {}", message.count.count);
            for b in boxes.boxes.iter().filter(|b| !b.is_placeholder()) {
                println!(
                    "  帧 {} {} {:.2} 位置: ({:.2}, {:.2}, {:.2})",
                    boxes.image_header.seq, b.class, b.probability, b.position.x, b.position.y, b.position.z
                );
            }
        }
    });

    for (seq, (image_path, cloud_path)) in frames.iter().enumerate() {
        let image = image::open(image_path)?;
        let depth = DepthSnapshot::from_pcd(cloud_path)?;
        let header = FrameHeader::new(seq as u64, SystemTime::now(), "camera");
        if let Err(e) = node.put_frame(image, PixelEncoding::Rgb8, depth, header) {
            warn!("{} 无法摄取: {}", image_path.display(), e);
        }
        std::thread::sleep(Duration::from_millis(args.interval_ms));
    }

    std::thread::sleep(Duration::from_millis(args.drain_ms));
    node.stop();
    node.join()?;
    drop(node);
    let _ = printer.join();
    Ok(())
}
