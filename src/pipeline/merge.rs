//! 各处理模式共用的检测/识别/合并步骤
//!
//! 所有函数都在档案锁之外调用检测器,识别结果再单独加锁合并.

use image::{imageops, RgbImage};
use tracing::{debug, warn};

use super::FrameContext;
use crate::config::EngineSettings;
use crate::detection::{MotionProvider, MotionResult, Person, PersonId, PersonRegistry, Prediction, Rect};

/// 运动检测,失败时视为无运动
pub fn detect_motion(motion: &mut dyn MotionProvider, frame: &RgbImage, with_regions: bool) -> MotionResult {
    match motion.detect_motion(frame, with_regions) {
        Ok(result) => result,
        Err(e) => {
            warn!("⚠️ 运动检测失败: {}", e);
            MotionResult::still()
        }
    }
}

/// 截取区域 (区域会先裁剪到画面内)
pub fn crop(frame: &RgbImage, region: &Rect) -> Option<(Rect, RgbImage)> {
    let region = region.clamp_to(frame.width(), frame.height())?;
    let image = imageops::crop_imm(frame, region.x(), region.y(), region.width(), region.height()).to_image();
    Some((region, image))
}

/// 人脸检测; 非精确模式下每个候选框再做一次确认
pub fn detect_faces(ctx: &FrameContext<'_>, image: &RgbImage) -> Vec<Rect> {
    let precise = ctx.camera.precise_detection();
    let faces = match ctx.providers.faces.detect_faces(image, precise) {
        Ok(faces) => faces,
        Err(e) => {
            warn!("⚠️ 人脸检测失败: {}", e);
            return Vec::new();
        }
    };
    if precise {
        return faces;
    }
    faces
        .into_iter()
        .filter(|face| {
            let Some((_, patch)) = crop(image, face) else {
                return false;
            };
            match ctx.providers.faces.confirm(&patch) {
                Ok(confirmed) => confirmed,
                Err(e) => {
                    debug!("人脸确认失败: {}", e);
                    false
                }
            }
        })
        .collect()
}

/// 识别一张脸,失败时记录并跳过
pub fn recognise(ctx: &FrameContext<'_>, image: &RgbImage, face: &Rect) -> Option<Prediction> {
    match ctx.providers.recognizer.predict(image, face) {
        Ok(prediction) => Some(prediction),
        Err(e) => {
            warn!("⚠️ 人脸识别失败 ({:?}): {}", face, e);
            None
        }
    }
}

/// 按识别名合并进档案 (模式2~4)
///
/// 已有记录只在置信度提升时追加缩略图; 否则新建记录
pub fn merge_by_name(registry: &mut PersonRegistry, prediction: Prediction, settings: &EngineSettings) {
    let threshold = settings.confidence_threshold;
    let key = PersonId::new(prediction.identity.clone());
    match registry.get_mut(&key) {
        Some(person) => {
            if person.raise_confidence(prediction.confidence, &prediction.identity, threshold) {
                person.add_thumbnail(prediction.aligned_face, settings.max_thumbnails);
                person.touch();
            }
        }
        None => {
            let person = Person::from_prediction(&prediction, threshold);
            debug!("➕ 新人员 {} ({:.1})", person.identity(), person.confidence());
            registry.upsert(key, person);
        }
    }
}

/// 检测+识别+合并,返回检测到的人脸框 (相对 `image`)
pub fn recognise_and_merge(ctx: &FrameContext<'_>, image: &RgbImage) -> Vec<Rect> {
    let faces = detect_faces(ctx, image);
    for face in &faces {
        if let Some(prediction) = recognise(ctx, image, face) {
            ctx.camera
                .with_registry(|reg| merge_by_name(reg, prediction, ctx.settings));
        }
    }
    faces
}
