/// 视频输入系统 (Video Input System)
///
/// - Source: 帧来源接口 + 图片目录回放
/// - Filter: 空帧/重复帧过滤与帧率统计
pub mod decode_filter;
pub mod source;

pub use decode_filter::DecodeFilter;
pub use source::{open_source, FrameSource, ImageDirSource};
