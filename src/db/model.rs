use log::warn;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

use crate::descriptor::DescriptorVector;
use crate::ranker::Candidate;

/// 新图片的元信息
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewImage {
    /// 原始文件名
    pub filename: String,
    /// 存储路径
    pub path: String,
    /// 分类
    pub category: String,
}

/// 图片记录
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ImageRecord {
    /// 图片 ID
    pub id: i64,
    pub filename: String,
    pub path: String,
    pub category: String,
    /// 图片描述符
    pub descriptors: DescriptorVector,
    /// 相似图片 ID，按不相似度升序，`None` 表示尚未计算
    pub similar_images: Option<Vec<i64>>,
    /// 创建时间，UNIX 时间戳
    pub created_at: i64,
}

/// 图片摘要，不包含描述符
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow, ToSchema)]
pub struct ImageSummary {
    pub id: i64,
    pub filename: String,
    pub path: String,
    pub category: String,
}

/// 分类及其图片数量
#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
pub struct CategoryCount {
    pub category: String,
    pub count: i64,
}

/// 排序扫描时需要读取的描述符分量
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Projection {
    pub color_histogram: bool,
    pub dominant_colors: bool,
    pub texture_descriptors: bool,
    pub hu_moments: bool,
}

impl Projection {
    pub fn all() -> Self {
        Self { color_histogram: true, dominant_colors: true, texture_descriptors: true, hu_moments: true }
    }
}

/// image 表中的一行，描述符各分量以 JSON 文本存储
#[derive(Debug, FromRow)]
pub(crate) struct ImageRow {
    pub id: i64,
    pub filename: String,
    pub path: String,
    pub category: String,
    pub color_histogram: Option<String>,
    pub dominant_colors: Option<String>,
    pub texture_descriptors: Option<String>,
    pub hu_moments: Option<String>,
    pub glcm_features: Option<String>,
    pub edge_histogram: Option<String>,
    pub similar_images: Option<String>,
    pub created_at: i64,
}

impl From<ImageRow> for ImageRecord {
    fn from(row: ImageRow) -> Self {
        let id = row.id;
        Self {
            id,
            filename: row.filename,
            path: row.path,
            category: row.category,
            descriptors: DescriptorVector {
                color_histogram: parse_json(id, "color_histogram", row.color_histogram),
                dominant_colors: parse_json(id, "dominant_colors", row.dominant_colors),
                texture_descriptors: parse_json(id, "texture_descriptors", row.texture_descriptors),
                hu_moments: parse_json(id, "hu_moments", row.hu_moments),
                glcm_features: parse_json(id, "glcm_features", row.glcm_features),
                edge_histogram: parse_json(id, "edge_histogram", row.edge_histogram),
            },
            similar_images: parse_json(id, "similar_images", row.similar_images),
            created_at: row.created_at,
        }
    }
}

/// 排序扫描读取的一行，未投影的列为 NULL
#[derive(Debug, FromRow)]
pub(crate) struct CandidateRow {
    pub id: i64,
    pub color_histogram: Option<String>,
    pub dominant_colors: Option<String>,
    pub texture_descriptors: Option<String>,
    pub hu_moments: Option<String>,
}

impl From<CandidateRow> for Candidate {
    fn from(row: CandidateRow) -> Self {
        let id = row.id;
        Self {
            id,
            descriptors: DescriptorVector {
                color_histogram: parse_json(id, "color_histogram", row.color_histogram),
                dominant_colors: parse_json(id, "dominant_colors", row.dominant_colors),
                texture_descriptors: parse_json(id, "texture_descriptors", row.texture_descriptors),
                hu_moments: parse_json(id, "hu_moments", row.hu_moments),
                ..Default::default()
            },
        }
    }
}

/// 解析 JSON 列，损坏的数据按缺失处理
fn parse_json<T: DeserializeOwned>(id: i64, column: &str, value: Option<String>) -> Option<T> {
    let value = value?;
    match serde_json::from_str(&value) {
        Ok(v) => Some(v),
        Err(e) => {
            warn!("图片 {id} 的 {column} 列无法解析，按缺失处理: {e}");
            None
        }
    }
}

/// 将可选分量序列化为 JSON 列
pub(crate) fn to_json<T: Serialize>(value: &Option<T>) -> serde_json::Result<Option<String>> {
    value.as_ref().map(serde_json::to_string).transpose()
}
