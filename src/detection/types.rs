use image::RgbImage;
use ndarray::Array1;

/// 区域框 (像素坐标,左上角 + 宽高)
/// An axis-aligned region in frame pixel coordinates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub struct Rect {
    x: u32,
    y: u32,
    width: u32,
    height: u32,
}

impl Rect {
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn from_corners(x1: u32, y1: u32, x2: u32, y2: u32) -> Self {
        Self::new(x1.min(x2), y1.min(y2), x1.abs_diff(x2), y1.abs_diff(y2))
    }

    pub fn x(&self) -> u32 {
        self.x
    }

    pub fn y(&self) -> u32 {
        self.y
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn xmax(&self) -> u32 {
        self.x + self.width
    }

    pub fn ymax(&self) -> u32 {
        self.y + self.height
    }

    pub fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }

    pub fn intersection_area(&self, another: &Rect) -> u64 {
        let l = self.x.max(another.x);
        let r = self.xmax().min(another.xmax());
        let t = self.y.max(another.y);
        let b = self.ymax().min(another.ymax());
        if r <= l || b <= t {
            return 0;
        }
        (r - l) as u64 * (b - t) as u64
    }

    /// 交集面积占本框面积的比例 (不是IOU)
    pub fn overlap_ratio(&self, another: &Rect) -> f32 {
        let area = self.area();
        if area == 0 {
            return 0.0;
        }
        self.intersection_area(another) as f32 / area as f32
    }

    /// 裁剪到图像范围内,完全越界时返回 None
    pub fn clamp_to(&self, width: u32, height: u32) -> Option<Rect> {
        if self.x >= width || self.y >= height {
            return None;
        }
        let w = self.width.min(width - self.x);
        let h = self.height.min(height - self.y);
        if w == 0 || h == 0 {
            return None;
        }
        Some(Rect::new(self.x, self.y, w, h))
    }

    /// 把局部坐标 (相对于 `origin`) 平移到整帧坐标
    pub fn offset_by(&self, origin: &Rect) -> Rect {
        Rect::new(origin.x + self.x, origin.y + self.y, self.width, self.height)
    }
}

/// 人脸特征向量 (固定长度,平方欧氏距离比较)
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Embedding {
    data: Array1<f32>,
}

impl Embedding {
    pub fn new(data: Array1<f32>) -> Self {
        Self { data }
    }

    pub fn from_vec(values: Vec<f32>) -> Self {
        Self {
            data: Array1::from_vec(values),
        }
    }

    pub fn data(&self) -> &Array1<f32> {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// 平方L2距离,长度不一致时视为无穷远
    pub fn squared_distance(&self, another: &Embedding) -> f32 {
        if self.data.len() != another.data.len() {
            return f32::INFINITY;
        }
        let diff = &self.data - &another.data;
        diff.mapv(|x| x * x).sum()
    }
}

/// 识别结果 (识别器 → 引擎)
#[derive(Debug, Clone)]
pub struct Prediction {
    pub identity: String,
    /// 0..100
    pub confidence: f32,
    pub embedding: Embedding,
    pub aligned_face: RgbImage,
}

/// 运动检测结果
#[derive(Debug, Clone, Default)]
pub struct MotionResult {
    pub motion: bool,
    pub regions: Vec<Rect>,
}

impl MotionResult {
    pub fn still() -> Self {
        Self::default()
    }
}
