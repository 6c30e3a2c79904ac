/// 帧过滤器: 丢弃空帧/重复帧,统计处理帧率
/// Frame filter: drops null and duplicate frames, measures processing FPS
use image::RgbImage;
use std::time::Instant;

/// 每隔多少帧重新计算一次帧率
const FPS_WINDOW: u32 = 6;

pub struct DecodeFilter {
    previous: Option<RgbImage>,
    count: u32,
    last: Instant,
    pub current_fps: f64,
    pub dropped_frames: usize, // 丢弃的帧数
    pub total_frames: usize,   // 总帧数
}

impl Default for DecodeFilter {
    fn default() -> Self {
        Self::new()
    }
}

impl DecodeFilter {
    pub fn new() -> Self {
        Self {
            previous: None,
            count: 0,
            last: Instant::now(),
            current_fps: 0.0,
            dropped_frames: 0,
            total_frames: 0,
        }
    }

    /// 过滤一帧: 空帧或与上一帧完全相同时返回 None
    pub fn filter_frame(&mut self, frame: Option<RgbImage>) -> Option<RgbImage> {
        self.total_frames += 1;
        let frame = match frame {
            Some(f) if f.width() > 0 && f.height() > 0 => f,
            _ => {
                self.dropped_frames += 1;
                return None;
            }
        };
        if self.previous.as_ref() == Some(&frame) {
            self.dropped_frames += 1;
            return None;
        }
        self.previous = Some(frame.clone());
        self.tick();
        Some(frame)
    }

    fn tick(&mut self) {
        if self.count == FPS_WINDOW {
            let elapsed = self.last.elapsed().as_secs_f64();
            if elapsed > 0.0 {
                self.current_fps = FPS_WINDOW as f64 / elapsed;
            }
            self.last = Instant::now();
            self.count = 0;
        }
        self.count += 1;
    }
}
