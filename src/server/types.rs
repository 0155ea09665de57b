use axum::body::Bytes;
use axum_typed_multipart::{FieldData, TryFromMultipart};
use log::warn;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::db::ImageSummary;
use crate::descriptor::DescriptorVector;
use crate::imdb::AddedImage;

/// 上传请求参数
#[derive(TryFromMultipart)]
pub struct UploadRequest {
    #[form_data(limit = "unlimited")]
    pub images: Vec<FieldData<Bytes>>,
    pub category: String,
}

/// 上传表单（用于API文档）
#[derive(Debug, ToSchema)]
#[allow(unused)]
pub struct UploadForm {
    /// 上传的图片文件，可以是多张图片
    #[schema(format = Binary, content_media_type = "application/octet-stream")]
    pub images: String,
    /// 图片分类
    pub category: String,
}

/// 上传的单张图片
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UploadedImage {
    pub id: i64,
    pub filename: String,
    pub path: String,
    /// 相似图片是否计算成功
    pub ranked: bool,
    /// 相似图片 ID，按不相似度升序
    pub similar_images: Vec<i64>,
}

impl UploadedImage {
    /// 排序失败时图片记录仍然保留，只把 `ranked` 标记为 false
    pub fn new(added: AddedImage, filename: String, path: String) -> Self {
        let (ranked, similar_images) = match added.ranking {
            Ok(ranking) => (true, ranking.ids()),
            Err(e) => {
                warn!("图片 {} 排序失败: {}", added.id, e);
                (false, vec![])
            }
        };
        Self { id: added.id, filename, path, ranked, similar_images }
    }
}

/// 上传响应
#[derive(Debug, Serialize, ToSchema)]
pub struct UploadResponse {
    pub images: Vec<UploadedImage>,
}

/// 排序参数
#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct RankQuery {
    /// 保存的相似图片数量
    pub k: Option<usize>,
}

/// 排序响应
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RankResponse {
    pub id: i64,
    pub similar_images: Vec<i64>,
    /// 扫描的候选图片数量
    pub scanned: usize,
}

/// 相似图片响应
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SimilarResponse {
    pub id: i64,
    /// 尚未计算时为 `null`
    pub similar_images: Option<Vec<ImageSummary>>,
}

/// 按描述符查询的参数
#[derive(Debug, Deserialize, ToSchema)]
pub struct SimilarRequest {
    pub query: DescriptorVector,
    pub k: Option<usize>,
    pub exclude: Option<i64>,
}
