/// 检测系统 (Detection System)
///
/// - Provider: 外部运动/人脸检测/识别接口
/// - Person:   人员档案
/// - Tracker:  区域跟踪
pub mod motion;
pub mod person;
pub mod provider;
pub mod tracker;
pub mod types;

pub use motion::FrameDiffMotion;
pub use person::{find_candidate, MatchCandidate, Person, PersonId, PersonRegistry, PersonSnapshot, UNKNOWN};
pub use provider::{FaceDetector, MotionProvider, NoFaces, Recognizer};
pub use tracker::{Tracker, TrackerSet};
pub use types::{Embedding, MotionResult, Prediction, Rect};
