//! 人员档案 (Person Registry)
//! Per-camera registry of every distinct individual the camera has seen

use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, Local};
use image::RgbImage;
use rand::Rng;

use super::types::{Embedding, Prediction};
use crate::gen_time_string;

/// 未识别人员的保留标签,永远不会与具名身份合并
pub const UNKNOWN: &str = "unknown";

/// 人员ID (摄像头内唯一)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PersonId(String);

impl PersonId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// 时间戳 + 随机盐,避免多摄像头同一秒内冲突
    pub fn generate() -> Self {
        let salt: u32 = rand::thread_rng().gen_range(1..1000);
        Self(format!("person{}{}", gen_time_string(""), salt))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PersonId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// 数据库里的 `unknown-N` 之类标签统一视为 unknown
pub fn normalize_identity(name: &str) -> &str {
    if name.contains(UNKNOWN) {
        UNKNOWN
    } else {
        name
    }
}

/// 置信度未超过阈值的识别结果记为 unknown
pub fn label_for(prediction: &Prediction, threshold: f32) -> &str {
    if prediction.confidence > threshold {
        normalize_identity(&prediction.identity)
    } else {
        UNKNOWN
    }
}

/// 人员记录
#[derive(Debug, Clone)]
pub struct Person {
    identity: String,
    confidence: f32,
    embedding: Embedding,
    thumbnails: Vec<RgbImage>,
    last_seen: DateTime<Local>,
}

impl Person {
    pub fn new(embedding: Embedding, confidence: f32, face: RgbImage, name: &str) -> Self {
        Self {
            identity: normalize_identity(name).to_string(),
            confidence,
            embedding,
            thumbnails: vec![face],
            last_seen: Local::now(),
        }
    }

    pub fn from_prediction(prediction: &Prediction, threshold: f32) -> Self {
        Self::new(
            prediction.embedding.clone(),
            prediction.confidence,
            prediction.aligned_face.clone(),
            label_for(prediction, threshold),
        )
    }

    pub fn identity(&self) -> &str {
        &self.identity
    }

    pub fn is_unknown(&self) -> bool {
        self.identity == UNKNOWN
    }

    pub fn confidence(&self) -> f32 {
        self.confidence
    }

    pub fn embedding(&self) -> &Embedding {
        &self.embedding
    }

    pub fn thumbnails(&self) -> &[RgbImage] {
        &self.thumbnails
    }

    /// 最新的缩略图
    pub fn thumbnail(&self) -> Option<&RgbImage> {
        self.thumbnails.last()
    }

    pub fn last_seen(&self) -> DateTime<Local> {
        self.last_seen
    }

    /// 置信度只升不降; 超过阈值后才切换为具名身份,且不会回退为 unknown
    ///
    /// 返回是否发生了提升
    pub fn raise_confidence(&mut self, confidence: f32, name: &str, threshold: f32) -> bool {
        if confidence <= self.confidence {
            return false;
        }
        self.confidence = confidence;
        let name = normalize_identity(name);
        if self.confidence > threshold && name != UNKNOWN {
            self.identity = name.to_string();
        }
        true
    }

    pub fn add_thumbnail(&mut self, face: RgbImage, cap: Option<usize>) {
        self.thumbnails.push(face);
        if let Some(cap) = cap {
            let cap = cap.max(1);
            if self.thumbnails.len() > cap {
                let excess = self.thumbnails.len() - cap;
                self.thumbnails.drain(..excess);
            }
        }
    }

    pub fn set_embedding(&mut self, embedding: Embedding) {
        self.embedding = embedding;
    }

    pub fn touch(&mut self) {
        self.last_seen = Local::now();
    }

    /// 合入一次检测: 置信度只升不降,按需追加缩略图,特征和时间取最新
    pub fn merge_detection(&mut self, prediction: &Prediction, add_face: bool, threshold: f32, cap: Option<usize>) {
        self.raise_confidence(prediction.confidence, &prediction.identity, threshold);
        if add_face {
            self.add_thumbnail(prediction.aligned_face.clone(), cap);
        }
        self.set_embedding(prediction.embedding.clone());
        self.touch();
    }
}

/// 外部查询用的快照
#[derive(Debug, Clone)]
pub struct PersonSnapshot {
    pub id: PersonId,
    pub identity: String,
    pub confidence: f32,
    pub last_seen: DateTime<Local>,
    pub thumbnail: Option<RgbImage>,
}

/// 重识别候选 (档案条目的副本)
#[derive(Debug, Clone)]
pub struct MatchCandidate {
    pub id: PersonId,
    pub identity: String,
    pub embedding: Embedding,
}

/// 查找已出现过的人: 同名 (unknown 不参与) 或特征距离小于 `max_distance`
///
/// 按档案插入顺序返回第一个命中
pub fn find_candidate<F>(
    candidates: &[MatchCandidate],
    name: &str,
    embedding: &Embedding,
    max_distance: f32,
    distance: F,
) -> Option<PersonId>
where
    F: Fn(&Embedding, &Embedding) -> f32,
{
    let name = normalize_identity(name);
    candidates
        .iter()
        .find(|c| (name != UNKNOWN && c.identity == name) || distance(&c.embedding, embedding) < max_distance)
        .map(|c| c.id.clone())
}

/// 人员档案表,按插入顺序遍历
#[derive(Debug, Default, Clone)]
pub struct PersonRegistry {
    people: HashMap<PersonId, Person>,
    order: Vec<PersonId>,
}

impl PersonRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.people.len()
    }

    pub fn is_empty(&self) -> bool {
        self.people.is_empty()
    }

    pub fn contains(&self, id: &PersonId) -> bool {
        self.people.contains_key(id)
    }

    pub fn get(&self, id: &PersonId) -> Option<&Person> {
        self.people.get(id)
    }

    pub fn get_mut(&mut self, id: &PersonId) -> Option<&mut Person> {
        self.people.get_mut(id)
    }

    /// 插入或覆盖,覆盖时保持原有顺序
    pub fn upsert(&mut self, id: PersonId, person: Person) {
        if self.people.insert(id.clone(), person).is_none() {
            self.order.push(id);
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&PersonId, &Person)> {
        self.order
            .iter()
            .filter_map(move |id| self.people.get(id).map(|p| (id, p)))
    }

    pub fn values(&self) -> impl Iterator<Item = &Person> {
        self.iter().map(|(_, p)| p)
    }

    /// 生成一个表内未使用的新ID
    pub fn fresh_id(&self) -> PersonId {
        loop {
            let id = PersonId::generate();
            if !self.contains(&id) {
                return id;
            }
        }
    }

    /// 复制出重识别所需的字段,距离计算在锁外进行
    pub fn candidates(&self) -> Vec<MatchCandidate> {
        self.iter()
            .map(|(id, p)| MatchCandidate {
                id: id.clone(),
                identity: p.identity.clone(),
                embedding: p.embedding.clone(),
            })
            .collect()
    }

    pub fn snapshot(&self) -> Vec<PersonSnapshot> {
        self.iter()
            .map(|(id, p)| PersonSnapshot {
                id: id.clone(),
                identity: p.identity.clone(),
                confidence: p.confidence,
                last_seen: p.last_seen,
                thumbnail: p.thumbnail().cloned(),
            })
            .collect()
    }
}
