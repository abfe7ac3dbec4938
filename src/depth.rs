//! Depth模块 - 对齐点云与二维检测的几何融合

pub mod cloud;
pub mod fusion;

pub use cloud::DepthSnapshot;
pub use fusion::{locate, Candidate, FusedPosition};
