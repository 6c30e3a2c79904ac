//! 视频帧来源
//!
//! 真实的 RTSP/MJPEG 采集在外部实现 `FrameSource`; 这里内置一个图片目录回放源.

use std::fs;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{bail, Context, Result};
use image::RgbImage;
use tracing::{info, warn};

use crate::config::CameraConfig;

/// 帧来源
pub trait FrameSource: Send {
    /// 读取最新一帧; `Ok(None)` 表示暂时没有帧
    fn read_frame(&mut self) -> Result<Option<RgbImage>>;
}

/// 打开内置帧源: `dir://<path>` 或已存在的目录
pub fn open_source(config: &CameraConfig) -> Result<Box<dyn FrameSource>> {
    let path = config
        .url
        .strip_prefix("dir://")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(&config.url));
    if !path.is_dir() {
        bail!(
            "unsupported camera source `{}` (expected dir://<path>)",
            config.url
        );
    }
    let mut source = ImageDirSource::open(&path)?;
    if config.fps_tweak {
        source = source.with_interval(Duration::from_millis(66));
    }
    Ok(Box::new(source))
}

/// 图片目录回放 (按文件名排序,播放完后不再产出新帧)
pub struct ImageDirSource {
    files: Vec<PathBuf>,
    next: usize,
    interval: Option<Duration>,
    last_read: Option<Instant>,
}

impl ImageDirSource {
    pub fn open(dir: &Path) -> Result<Self> {
        let mut files: Vec<PathBuf> = fs::read_dir(dir)
            .with_context(|| format!("reading frame directory {}", dir.display()))?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| is_image(p))
            .collect();
        files.sort();
        info!("📂 图片目录帧源: {} ({}帧)", dir.display(), files.len());
        Ok(Self {
            files,
            next: 0,
            interval: None,
            last_read: None,
        })
    }

    /// 按固定间隔出帧,模拟实时流
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = Some(interval);
        self
    }

    pub fn remaining(&self) -> usize {
        self.files.len().saturating_sub(self.next)
    }
}

fn is_image(path: &Path) -> bool {
    matches!(
        path.extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .as_deref(),
        Some("png" | "jpg" | "jpeg" | "bmp")
    )
}

impl FrameSource for ImageDirSource {
    fn read_frame(&mut self) -> Result<Option<RgbImage>> {
        if let (Some(interval), Some(last)) = (self.interval, self.last_read) {
            let elapsed = last.elapsed();
            if elapsed < interval {
                thread::sleep(interval - elapsed);
            }
        }
        let Some(path) = self.files.get(self.next) else {
            return Ok(None);
        };
        self.next += 1;
        self.last_read = Some(Instant::now());
        match image::open(path) {
            Ok(img) => Ok(Some(img.to_rgb8())),
            Err(e) => {
                warn!("⚠️ 读取帧失败 {}: {}", path.display(), e);
                Ok(None)
            }
        }
    }
}
