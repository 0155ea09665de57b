use std::collections::HashMap;

use futures::stream::BoxStream;
use futures::{StreamExt, TryStreamExt};
use sqlx::{Executor, Sqlite, SqlitePool};

use super::model::{CandidateRow, ImageRow, to_json};
use super::{CategoryCount, ImageRecord, ImageSummary, NewImage, Projection};
use crate::descriptor::DescriptorVector;
use crate::ranker::Candidate;
use crate::Result;

/// 添加图片记录，返回图片 ID
pub async fn add_image<'c, E>(executor: E, image: &NewImage, descriptors: &DescriptorVector) -> Result<i64>
where
    E: Executor<'c, Database = Sqlite>,
{
    let id = sqlx::query_scalar(
        r#"
        INSERT INTO image (
            filename, path, category,
            color_histogram, dominant_colors, texture_descriptors,
            hu_moments, glcm_features, edge_histogram
        )
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
        RETURNING id
        "#,
    )
    .bind(&image.filename)
    .bind(&image.path)
    .bind(&image.category)
    .bind(to_json(&descriptors.color_histogram)?)
    .bind(to_json(&descriptors.dominant_colors)?)
    .bind(to_json(&descriptors.texture_descriptors)?)
    .bind(to_json(&descriptors.hu_moments)?)
    .bind(to_json(&descriptors.glcm_features)?)
    .bind(to_json(&descriptors.edge_histogram)?)
    .fetch_one(executor)
    .await?;

    Ok(id)
}

/// 根据 ID 获取完整的图片记录
pub async fn get_image(executor: &SqlitePool, id: i64) -> Result<Option<ImageRecord>> {
    let row = sqlx::query_as::<_, ImageRow>(
        r#"
        SELECT * FROM image WHERE id = ?
        "#,
    )
    .bind(id)
    .fetch_optional(executor)
    .await?;

    Ok(row.map(ImageRecord::from))
}

/// 获取图片的描述符
pub async fn get_descriptors(executor: &SqlitePool, id: i64) -> Result<Option<DescriptorVector>> {
    Ok(get_image(executor, id).await?.map(|record| record.descriptors))
}

/// 批量获取图片描述符，不存在的 ID 不会出现在结果中
pub async fn get_descriptors_batch(executor: &SqlitePool, ids: &[i64]) -> Result<HashMap<i64, DescriptorVector>> {
    let ids = serde_json::to_string(ids)?;
    let rows = sqlx::query_as::<_, ImageRow>(
        r#"
        SELECT * FROM image WHERE id IN (SELECT value FROM json_each(?))
        "#,
    )
    .bind(ids)
    .fetch_all(executor)
    .await?;

    Ok(rows.into_iter().map(ImageRecord::from).map(|r| (r.id, r.descriptors)).collect())
}

/// 流式遍历除 `exclude` 以外的所有图片
///
/// 未被 `projection` 选中的列直接返回 NULL，避免读取和解析用不到的描述符。
/// 结果按 ID 升序，也就是插入顺序。
pub fn stream_candidates(
    executor: &SqlitePool,
    exclude: Option<i64>,
    projection: Projection,
) -> BoxStream<'_, Result<Candidate>> {
    sqlx::query_as::<_, CandidateRow>(
        r#"
        SELECT
            id,
            CASE WHEN ?2 THEN color_histogram END AS color_histogram,
            CASE WHEN ?3 THEN dominant_colors END AS dominant_colors,
            CASE WHEN ?4 THEN texture_descriptors END AS texture_descriptors,
            CASE WHEN ?5 THEN hu_moments END AS hu_moments
        FROM image
        WHERE ?1 IS NULL OR id != ?1
        ORDER BY id ASC
        "#,
    )
    .bind(exclude)
    .bind(projection.color_histogram)
    .bind(projection.dominant_colors)
    .bind(projection.texture_descriptors)
    .bind(projection.hu_moments)
    .fetch(executor)
    .map_ok(Candidate::from)
    .map_err(crate::Error::from)
    .boxed()
}

/// 更新相似图片列表，图片不存在时返回 false
pub async fn set_similar_images(executor: &SqlitePool, id: i64, similar: &[i64]) -> Result<bool> {
    let similar = serde_json::to_string(similar)?;
    let result = sqlx::query(
        r#"
        UPDATE image SET similar_images = ? WHERE id = ?
        "#,
    )
    .bind(similar)
    .bind(id)
    .execute(executor)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// 根据 ID 列表获取图片摘要，保持输入顺序，不存在的 ID 会被跳过
pub async fn get_summaries(executor: &SqlitePool, ids: &[i64]) -> Result<Vec<ImageSummary>> {
    let rows = sqlx::query_as::<_, ImageSummary>(
        r#"
        SELECT id, filename, path, category FROM image WHERE id IN (SELECT value FROM json_each(?))
        "#,
    )
    .bind(serde_json::to_string(ids)?)
    .fetch_all(executor)
    .await?;

    let mut rows = rows.into_iter().map(|row| (row.id, row)).collect::<HashMap<_, _>>();
    Ok(ids.iter().filter_map(|id| rows.remove(id)).collect())
}

/// 获取某个分类下的所有图片
pub async fn list_by_category(executor: &SqlitePool, category: &str) -> Result<Vec<ImageSummary>> {
    let rows = sqlx::query_as::<_, ImageSummary>(
        r#"
        SELECT id, filename, path, category FROM image WHERE category = ? ORDER BY id ASC
        "#,
    )
    .bind(category)
    .fetch_all(executor)
    .await?;

    Ok(rows)
}

/// 获取所有分类及其图片数量
pub async fn list_categories(executor: &SqlitePool) -> Result<Vec<CategoryCount>> {
    let rows = sqlx::query_as::<_, CategoryCount>(
        r#"
        SELECT category, COUNT(*) AS count FROM image GROUP BY category ORDER BY category ASC
        "#,
    )
    .fetch_all(executor)
    .await?;

    Ok(rows)
}

/// 获取所有图片 ID
pub async fn list_ids(executor: &SqlitePool) -> Result<Vec<i64>> {
    let ids = sqlx::query_scalar(
        r#"
        SELECT id FROM image ORDER BY id ASC
        "#,
    )
    .fetch_all(executor)
    .await?;

    Ok(ids)
}

/// 删除图片记录，图片不存在时返回 false
///
/// NOTE: 其他图片的 similar_images 中可能仍然引用该 ID，读取时会被跳过
pub async fn delete_image(executor: &SqlitePool, id: i64) -> Result<bool> {
    let result = sqlx::query(
        r#"
        DELETE FROM image WHERE id = ?
        "#,
    )
    .bind(id)
    .execute(executor)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// 引用同一文件路径的图片数量
pub async fn count_by_path(executor: &SqlitePool, path: &str) -> Result<i64> {
    let count = sqlx::query_scalar(
        r#"
        SELECT COUNT(*) FROM image WHERE path = ?
        "#,
    )
    .bind(path)
    .fetch_one(executor)
    .await?;

    Ok(count)
}

/// 图片总数
pub async fn count_images(executor: &SqlitePool) -> Result<i64> {
    let count = sqlx::query_scalar(
        r#"
        SELECT COUNT(*) FROM image
        "#,
    )
    .fetch_one(executor)
    .await?;

    Ok(count)
}
