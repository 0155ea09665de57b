use std::path::Path;
use std::sync::Arc;

use axum::Json;
use axum::extract::{Path as UrlPath, Query, State};
use axum_auth::AuthBearer;
use axum_typed_multipart::TypedMultipart;
use log::{debug, info, warn};

use super::error::{RequestError, Result};
use super::state::AppState;
use super::types::*;
use crate::db::{CategoryCount, ImageRecord, ImageSummary, NewImage};
use crate::descriptor::DescriptorVector;
use crate::IMDB;
use crate::imdb::{FeedbackRequest, FeedbackResult, ScoredImage};

/// 删除由服务保存的图片文件
///
/// 相同内容的图片共用一个文件，仍被其他记录引用时不会删除。
async fn remove_upload(db: &IMDB, uploads: &Path, path: &str) -> crate::Result<bool> {
    let file = Path::new(path);
    if !file.starts_with(uploads) || db.path_in_use(path).await? {
        return Ok(false);
    }
    tokio::fs::remove_file(file).await?;
    Ok(true)
}

fn check_token(state: &AppState, token: &str) -> Result<()> {
    match token == state.token {
        true => Ok(()),
        false => Err(RequestError::Unauthorized.into()),
    }
}

/// 上传图片，计算描述符和相似图片
#[utoipa::path(
    post,
    path = "/upload",
    request_body(content = UploadForm, content_type = "multipart/form-data"),
    responses(
        (status = 200, body = UploadResponse),
    ),
    security(("bearer" = []))
)]
pub async fn upload_handler(
    State(state): State<Arc<AppState>>,
    AuthBearer(token): AuthBearer,
    data: TypedMultipart<UploadRequest>,
) -> Result<Json<UploadResponse>> {
    check_token(&state, &token)?;
    if data.images.is_empty() {
        return Err(RequestError::BadRequest("没有上传图片".into()).into());
    }

    tokio::fs::create_dir_all(&state.uploads).await?;

    let mut images = Vec::with_capacity(data.images.len());
    for file in &data.images {
        let filename = match &file.metadata.file_name {
            Some(file_name) => file_name.clone(),
            None => return Err(RequestError::BadRequest("文件名不能为空".into()).into()),
        };
        let ext = Path::new(&filename)
            .extension()
            .map(|s| s.to_string_lossy().to_lowercase())
            .unwrap_or_else(|| "jpg".to_string());

        let hash = blake3::hash(&file.contents);
        let path = state.uploads.join(format!("{}.{}", hash.to_hex(), ext));
        tokio::fs::write(&path, &file.contents).await?;

        let image = NewImage {
            filename: filename.clone(),
            path: path.to_string_lossy().into_owned(),
            category: data.category.clone(),
        };
        info!("添加上传图片: {}", filename);

        // 客户端断开时整个请求被丢弃，这里不需要额外的取消信号
        let added = state.db.add_image(&state.extractor, image, state.k, std::future::pending()).await?;
        images.push(UploadedImage::new(added, filename, path.to_string_lossy().into_owned()));
    }

    Ok(Json(UploadResponse { images }))
}

/// 获取分类下的所有图片
#[utoipa::path(
    get,
    path = "/images/category/{category}",
    params(("category" = String, Path, description = "图片分类")),
    responses(
        (status = 200, body = Vec<ImageSummary>),
    )
)]
pub async fn category_handler(
    State(state): State<Arc<AppState>>,
    UrlPath(category): UrlPath<String>,
) -> Result<Json<Vec<ImageSummary>>> {
    Ok(Json(state.db.images_by_category(&category).await?))
}

/// 获取所有分类
#[utoipa::path(
    get,
    path = "/categories",
    responses(
        (status = 200, body = Vec<CategoryCount>),
    )
)]
pub async fn categories_handler(State(state): State<Arc<AppState>>) -> Result<Json<Vec<CategoryCount>>> {
    Ok(Json(state.db.categories().await?))
}

/// 获取图片的描述符
#[utoipa::path(
    get,
    path = "/images/{id}/descriptors",
    params(("id" = i64, Path, description = "图片 ID")),
    responses(
        (status = 200, body = DescriptorVector),
        (status = 404),
    )
)]
pub async fn descriptors_handler(
    State(state): State<Arc<AppState>>,
    UrlPath(id): UrlPath<i64>,
) -> Result<Json<DescriptorVector>> {
    Ok(Json(state.db.descriptors(id).await?))
}

/// 删除图片
#[utoipa::path(
    delete,
    path = "/images/{id}",
    params(("id" = i64, Path, description = "图片 ID")),
    responses(
        (status = 200, body = ImageRecord),
        (status = 404),
    ),
    security(("bearer" = []))
)]
pub async fn delete_handler(
    State(state): State<Arc<AppState>>,
    AuthBearer(token): AuthBearer,
    UrlPath(id): UrlPath<i64>,
) -> Result<Json<ImageRecord>> {
    check_token(&state, &token)?;
    let record = state.db.delete_image(id).await?;

    match remove_upload(&state.db, &state.uploads, &record.path).await {
        Ok(true) => debug!("删除图片文件: {}", record.path),
        Ok(false) => {}
        Err(e) => warn!("删除图片文件失败: {}: {}", record.path, e),
    }

    Ok(Json(record))
}

/// 重新计算图片的相似图片
#[utoipa::path(
    post,
    path = "/images/{id}/rank",
    params(("id" = i64, Path, description = "图片 ID"), RankQuery),
    responses(
        (status = 200, body = RankResponse),
        (status = 404),
    ),
    security(("bearer" = []))
)]
pub async fn rank_handler(
    State(state): State<Arc<AppState>>,
    AuthBearer(token): AuthBearer,
    UrlPath(id): UrlPath<i64>,
    Query(query): Query<RankQuery>,
) -> Result<Json<RankResponse>> {
    check_token(&state, &token)?;
    let ranking = state.db.rank(id, query.k.unwrap_or(state.k)).await?;
    Ok(Json(RankResponse { id, similar_images: ranking.ids(), scanned: ranking.scanned }))
}

/// 获取保存的相似图片
#[utoipa::path(
    get,
    path = "/images/{id}/similar",
    params(("id" = i64, Path, description = "图片 ID")),
    responses(
        (status = 200, body = SimilarResponse),
        (status = 404),
    )
)]
pub async fn similar_handler(
    State(state): State<Arc<AppState>>,
    UrlPath(id): UrlPath<i64>,
) -> Result<Json<SimilarResponse>> {
    let similar_images = state.db.get_similar(id).await?;
    Ok(Json(SimilarResponse { id, similar_images }))
}

/// 按描述符查询相似图片
#[utoipa::path(
    post,
    path = "/similar",
    request_body = SimilarRequest,
    responses(
        (status = 200, body = Vec<ScoredImage>),
    )
)]
pub async fn query_handler(
    State(state): State<Arc<AppState>>,
    Json(data): Json<SimilarRequest>,
) -> Result<Json<Vec<ScoredImage>>> {
    let k = data.k.unwrap_or(state.k);
    Ok(Json(state.db.similar_by_descriptors(&data.query, k, data.exclude).await?))
}

/// 提交相关反馈并重新排序
#[utoipa::path(
    post,
    path = "/feedback",
    request_body = FeedbackRequest,
    responses(
        (status = 200, body = FeedbackResult),
        (status = 404),
    )
)]
pub async fn feedback_handler(
    State(state): State<Arc<AppState>>,
    Json(data): Json<FeedbackRequest>,
) -> Result<Json<FeedbackResult>> {
    let result = state
        .db
        .feedback(
            &data.query,
            &data.relevant_ids,
            &data.non_relevant_ids,
            data.rocchio(state.rocchio),
            data.k.unwrap_or(state.k),
            data.exclude,
        )
        .await?;
    Ok(Json(result))
}

#[cfg(test)]
mod tests {
    use sqlx::sqlite::SqliteConnectOptions;
    use sqlx::{ConnectOptions, Connection};

    use super::*;
    use crate::IMDBBuilder;
    use crate::extractor::{DescriptorExtractor, ExtractError};

    struct Fixed;

    impl DescriptorExtractor for Fixed {
        async fn calculate(&self, _image_path: &str) -> std::result::Result<DescriptorVector, ExtractError> {
            Ok(DescriptorVector { dominant_colors: Some(vec![vec![1., 2., 3.]]), ..Default::default() })
        }
    }

    #[tokio::test]
    async fn test_upload_unranked_when_persist_fails() {
        let dir = tempfile::tempdir().unwrap();
        let db = IMDBBuilder::new(dir.path().to_path_buf().into()).open().await.unwrap();

        let mut conn = SqliteConnectOptions::new().filename(db.conf_dir().database()).connect().await.unwrap();
        sqlx::query(
            r#"
            CREATE TRIGGER fail_similar BEFORE UPDATE OF similar_images ON image
            BEGIN SELECT RAISE(ABORT, 'disk full'); END
            "#,
        )
        .execute(&mut conn)
        .await
        .unwrap();
        conn.close().await.unwrap();

        let image = NewImage { filename: "a.jpg".into(), path: "/data/a.jpg".into(), category: "Forest".into() };
        let added = db.add_image(&Fixed, image, 5, std::future::pending()).await.unwrap();
        let id = added.id;
        assert!(matches!(added.ranking, Err(crate::Error::Persistence(_))));

        let uploaded = UploadedImage::new(added, "a.jpg".into(), "/data/a.jpg".into());
        assert!(!uploaded.ranked);
        assert!(uploaded.similar_images.is_empty());
        assert_eq!(db.record(id).await.unwrap().similar_images, None);
    }

    #[tokio::test]
    async fn test_shared_upload_kept_until_last_delete() {
        let dir = tempfile::tempdir().unwrap();
        let db = IMDBBuilder::new(dir.path().to_path_buf().into()).open().await.unwrap();
        let uploads = db.conf_dir().uploads();
        tokio::fs::create_dir_all(&uploads).await.unwrap();

        let file = uploads.join("same.jpg");
        tokio::fs::write(&file, b"image").await.unwrap();
        let image = NewImage {
            filename: "same.jpg".into(),
            path: file.to_string_lossy().into_owned(),
            category: "Forest".into(),
        };
        let first = db.import_image(&image, &DescriptorVector::empty()).await.unwrap();
        let second = db.import_image(&image, &DescriptorVector::empty()).await.unwrap();

        let record = db.delete_image(first).await.unwrap();
        assert!(!remove_upload(&db, &uploads, &record.path).await.unwrap());
        assert!(file.exists());

        let record = db.delete_image(second).await.unwrap();
        assert!(remove_upload(&db, &uploads, &record.path).await.unwrap());
        assert!(!file.exists());
    }

    #[tokio::test]
    async fn test_external_file_never_removed() {
        let dir = tempfile::tempdir().unwrap();
        let db = IMDBBuilder::new(dir.path().join("conf").into()).open().await.unwrap();
        let file = dir.path().join("outside.jpg");
        tokio::fs::write(&file, b"image").await.unwrap();

        let removed = remove_upload(&db, &db.conf_dir().uploads(), &file.to_string_lossy()).await.unwrap();
        assert!(!removed);
        assert!(file.exists());
    }
}
