//! 在画面上绘制人脸框/运动区域/跟踪器
//!
//! 配置了字体时,跟踪器框上方写 `身份 置信度%`; 没有字体只画框

use std::fs;
use std::path::Path;

use ab_glyph::{FontVec, PxScale};
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_hollow_rect_mut, draw_text_mut};

use crate::detection::{Rect, Tracker, TrackerSet};
use crate::error::{Result, SentinelError};

pub const FACE_COLOR: Rgb<u8> = Rgb([0, 255, 0]);
pub const MOTION_COLOR: Rgb<u8> = Rgb([255, 200, 0]);

const LABEL_SCALE: f32 = 20.0;

/// 读取 TTF/OTF 字体文件
pub fn load_font(path: &Path) -> Result<FontVec> {
    let data = fs::read(path)?;
    FontVec::try_from_vec(data)
        .map_err(|e| SentinelError::Config(format!("字体无效 {}: {}", path.display(), e)))
}

pub fn tracker_label(tracker: &Tracker) -> String {
    let person = tracker.person();
    format!("{} {:.0}%", person.identity(), person.confidence())
}

fn to_imageproc(rect: &Rect) -> Option<imageproc::rect::Rect> {
    if rect.width() == 0 || rect.height() == 0 {
        return None;
    }
    Some(imageproc::rect::Rect::at(rect.x() as i32, rect.y() as i32).of_size(rect.width(), rect.height()))
}

pub fn draw_boxes(frame: &mut RgbImage, rects: &[Rect], color: Rgb<u8>) {
    for rect in rects {
        if let Some(r) = to_imageproc(rect) {
            draw_hollow_rect_mut(frame, r, color);
        }
    }
}

/// 相对于 `origin` 的框 (区域内检测到的人脸)
pub fn draw_boxes_in(frame: &mut RgbImage, origin: &Rect, rects: &[Rect], color: Rgb<u8>) {
    let shifted: Vec<Rect> = rects.iter().map(|r| r.offset_by(origin)).collect();
    draw_boxes(frame, &shifted, color);
}

/// 每个跟踪器用其ID对应的颜色画两层框,有字体时加标签
pub fn draw_trackers(frame: &mut RgbImage, trackers: &TrackerSet, font: Option<&FontVec>) {
    for tracker in trackers.iter() {
        let (r, g, b) = tracker.color();
        let region = tracker.region();
        if let Some(font) = font {
            let y = (region.y() as i32 - LABEL_SCALE as i32 - 5).max(0);
            draw_text_mut(
                frame,
                Rgb([r, g, b]),
                region.x() as i32,
                y,
                PxScale::from(LABEL_SCALE),
                font,
                &tracker_label(tracker),
            );
        }
        if let Some(outer) = to_imageproc(&region) {
            draw_hollow_rect_mut(frame, outer, Rgb([r, g, b]));
        }
        if region.width() > 2 && region.height() > 2 {
            let inner = Rect::new(region.x() + 1, region.y() + 1, region.width() - 2, region.height() - 2);
            if let Some(inner) = to_imageproc(&inner) {
                draw_hollow_rect_mut(frame, inner, Rgb([r, g, b]));
            }
        }
    }
}
