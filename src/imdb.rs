use std::collections::HashMap;
use std::future::Future;
use std::time::Instant;

use log::{debug, error, info, warn};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::config::ConfDir;
use crate::db::*;
use crate::descriptor::DescriptorVector;
use crate::extractor::{DescriptorExtractor, Extraction, extract_or_empty};
use crate::feedback::Rocchio;
use crate::ranker::{self, Ranking, serialize_dissimilarity};
use crate::weights::{Mode, Scorer, Weights};
use crate::{Error, Result, metrics};

pub struct IMDBBuilder {
    conf_dir: ConfDir,
    weights: Weights,
    wal: bool,
}

impl IMDBBuilder {
    pub fn new(conf_dir: ConfDir) -> Self {
        Self { conf_dir, weights: Weights::default(), wal: true }
    }

    /// 打分使用的权重
    pub fn weights(mut self, weights: Weights) -> Self {
        self.weights = weights;
        self
    }

    /// 是否启用 WAL 模式
    pub fn wal(mut self, wal: bool) -> Self {
        self.wal = wal;
        self
    }

    pub async fn open(self) -> Result<IMDB> {
        tokio::fs::create_dir_all(self.conf_dir.path()).await?;
        let db = init_db(self.conf_dir.database(), self.wal).await?;
        Ok(IMDB { conf_dir: self.conf_dir, db, weights: self.weights })
    }
}

pub struct IMDB {
    conf_dir: ConfDir,
    db: Database,
    weights: Weights,
}

/// 新添加的图片
#[derive(Debug)]
pub struct AddedImage {
    pub id: i64,
    /// 排序结果，失败时图片记录本身仍然保留
    pub ranking: Result<Ranking>,
}

/// 带不相似度的图片摘要
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct ScoredImage {
    #[serde(flatten)]
    pub image: ImageSummary,
    /// 不相似度，无法比较时为 `null`
    #[serde(serialize_with = "serialize_dissimilarity")]
    #[schema(value_type = Option<f64>)]
    pub dissimilarity: f64,
}

/// 一次相关反馈请求
#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct FeedbackRequest {
    /// 当前查询向量
    pub query: DescriptorVector,
    /// 标记为相关的图片
    #[serde(default)]
    pub relevant_ids: Vec<i64>,
    /// 标记为不相关的图片
    #[serde(default)]
    pub non_relevant_ids: Vec<i64>,
    pub alpha: Option<f64>,
    pub beta: Option<f64>,
    /// 返回的结果数量
    pub k: Option<usize>,
    /// 从结果中排除的图片，通常是查询图片自身
    pub exclude: Option<i64>,
}

impl FeedbackRequest {
    /// 未指定的参数使用 `default` 中的值
    pub fn rocchio(&self, default: Rocchio) -> Rocchio {
        Rocchio::new(self.alpha.unwrap_or(default.alpha), self.beta.unwrap_or(default.beta))
    }
}

/// 相关反馈的结果，不会被保存
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct FeedbackResult {
    /// 更新后的查询向量
    pub new_query: DescriptorVector,
    /// 使用新查询向量重新排序的结果
    pub results: Vec<ScoredImage>,
}

impl IMDB {
    pub fn conf_dir(&self) -> &ConfDir {
        &self.conf_dir
    }

    pub fn weights(&self) -> &Weights {
        &self.weights
    }

    /// 添加一张图片并计算相似图片
    ///
    /// 依次执行：提取描述符、写入记录、排序、保存排序结果。
    /// 提取完成前 `cancel` 触发时返回 [`Error::Cancelled`]，不写入任何数据。
    /// 写入记录后排序失败不会回滚，失败原因保存在 [`AddedImage::ranking`] 中。
    pub async fn add_image<E, C>(
        &self,
        extractor: &E,
        image: NewImage,
        k: usize,
        cancel: C,
    ) -> Result<AddedImage>
    where
        E: DescriptorExtractor + ?Sized,
        C: Future<Output = ()>,
    {
        let descriptors = match extract_or_empty(extractor, &image.path, cancel).await {
            Extraction::Ready(descriptors) => descriptors,
            Extraction::Cancelled => return Err(Error::Cancelled),
        };
        if descriptors.is_empty() {
            warn!("图片没有可用的描述符: {}", image.path);
        }

        let id = self.import_image(&image, &descriptors).await?;
        let ranking = self.rank(id, k).await;
        Ok(AddedImage { id, ranking })
    }

    /// 写入已计算好描述符的图片，不计算相似图片
    pub async fn import_image(&self, image: &NewImage, descriptors: &DescriptorVector) -> Result<i64> {
        let id = crud::add_image(&self.db, image, descriptors).await?;
        debug!("添加图片 {}: {}", id, image.path);
        Ok(id)
    }

    /// 重新计算图片的相似图片列表并保存
    pub async fn rank(&self, id: i64, k: usize) -> Result<Ranking> {
        let descriptors = crud::get_descriptors(&self.db, id).await?.ok_or(Error::NotFound(id))?;
        let ranking = self.scan(&descriptors, Mode::Bulk, Some(id), k).await?;

        match crud::set_similar_images(&self.db, id, &ranking.ids()).await {
            Ok(true) => {}
            // 扫描期间图片被删除
            Ok(false) => return Err(Error::NotFound(id)),
            Err(e) => {
                error!("保存图片 {id} 的相似图片失败: {e}");
                return Err(e);
            }
        }

        info!("图片 {} 排序完成: 扫描 {} 张，保留 {} 张", id, ranking.scanned, ranking.neighbors.len());
        Ok(ranking)
    }

    /// 重新计算所有图片的相似图片列表，返回处理的图片数量
    pub async fn rank_all(&self, k: usize) -> Result<usize> {
        let ids = crud::list_ids(&self.db).await?;
        let total = ids.len();
        for (i, id) in ids.into_iter().enumerate() {
            match self.rank(id, k).await {
                Ok(_) => {}
                // 遍历期间被删除
                Err(Error::NotFound(_)) => continue,
                Err(e) => return Err(e),
            }
            if (i + 1) % 100 == 0 {
                info!("排序进度: {}/{}", i + 1, total);
            }
        }
        Ok(total)
    }

    /// 读取保存的相似图片列表，`None` 表示尚未计算
    ///
    /// 已被删除的图片会被跳过。
    pub async fn get_similar(&self, id: i64) -> Result<Option<Vec<ImageSummary>>> {
        let record = crud::get_image(&self.db, id).await?.ok_or(Error::NotFound(id))?;
        let Some(similar) = record.similar_images else {
            return Ok(None);
        };
        let summaries = crud::get_summaries(&self.db, &similar).await?;
        if summaries.len() != similar.len() {
            warn!("图片 {} 的相似图片中有 {} 张已不存在", id, similar.len() - summaries.len());
        }
        Ok(Some(summaries))
    }

    /// 使用完整模型查询与 `query` 最相似的 k 张图片
    pub async fn similar_by_descriptors(
        &self,
        query: &DescriptorVector,
        k: usize,
        exclude: Option<i64>,
    ) -> Result<Vec<ScoredImage>> {
        let ranking = self.scan(query, Mode::Full, exclude, k).await?;
        self.scored(&ranking).await
    }

    /// 应用相关反馈并使用新的查询向量重新排序
    ///
    /// 结果只返回给调用方，不会保存到任何记录中。
    pub async fn feedback(
        &self,
        query: &DescriptorVector,
        relevant_ids: &[i64],
        non_relevant_ids: &[i64],
        rocchio: Rocchio,
        k: usize,
        exclude: Option<i64>,
    ) -> Result<FeedbackResult> {
        let ids = relevant_ids.iter().chain(non_relevant_ids).copied().collect::<Vec<_>>();
        let found = crud::get_descriptors_batch(&self.db, &ids).await?;
        let take = |ids: &[i64]| -> Result<Vec<DescriptorVector>> {
            ids.iter()
                .map(|id| match found.get(id) {
                    Some(d) => Ok(d.clone()),
                    None => Err(Error::NotFound(*id)),
                })
                .collect()
        };
        let relevant = take(relevant_ids)?;
        let non_relevant = take(non_relevant_ids)?;

        let new_query = rocchio.apply_descriptors(query, &relevant, &non_relevant);
        metrics::inc_feedback(!relevant.is_empty() || !non_relevant.is_empty());
        debug!(
            "相关反馈: {} 个相关样本, {} 个不相关样本, alpha={}, beta={}",
            relevant.len(),
            non_relevant.len(),
            rocchio.alpha,
            rocchio.beta
        );

        let ranking = self.scan(&new_query, Mode::Bulk, exclude, k).await?;
        let results = self.scored(&ranking).await?;
        Ok(FeedbackResult { new_query, results })
    }

    /// 获取完整的图片记录
    pub async fn record(&self, id: i64) -> Result<ImageRecord> {
        crud::get_image(&self.db, id).await?.ok_or(Error::NotFound(id))
    }

    pub async fn descriptors(&self, id: i64) -> Result<DescriptorVector> {
        crud::get_descriptors(&self.db, id).await?.ok_or(Error::NotFound(id))
    }

    pub async fn images_by_category(&self, category: &str) -> Result<Vec<ImageSummary>> {
        crud::list_by_category(&self.db, category).await
    }

    pub async fn categories(&self) -> Result<Vec<CategoryCount>> {
        crud::list_categories(&self.db).await
    }

    pub async fn count(&self) -> Result<i64> {
        crud::count_images(&self.db).await
    }

    /// 删除图片记录并返回被删除的记录
    ///
    /// 其他图片保存的相似图片列表不会被更新，读取时会跳过该图片。
    pub async fn delete_image(&self, id: i64) -> Result<ImageRecord> {
        let record = self.record(id).await?;
        if !crud::delete_image(&self.db, id).await? {
            return Err(Error::NotFound(id));
        }
        info!("删除图片 {}: {}", id, record.path);
        Ok(record)
    }

    /// 是否还有图片记录引用该文件
    pub async fn path_in_use(&self, path: &str) -> Result<bool> {
        Ok(crud::count_by_path(&self.db, path).await? > 0)
    }

    async fn scan(
        &self,
        query: &DescriptorVector,
        mode: Mode,
        exclude: Option<i64>,
        k: usize,
    ) -> Result<Ranking> {
        let start = Instant::now();
        let scorer = Scorer::new(self.weights, mode, query);
        let ranking = ranker::rank(&scorer, &self.db, exclude, k).await?;
        let elapsed = start.elapsed();
        metrics::observe_rank(mode.as_str(), elapsed, ranking.scanned);
        debug!("{} 扫描 {} 张图片，耗时 {:.2}ms", mode.as_str(), ranking.scanned, elapsed.as_secs_f64() * 1000.);
        Ok(ranking)
    }

    /// 为排序结果附上图片摘要，扫描后被删除的图片会被跳过
    async fn scored(&self, ranking: &Ranking) -> Result<Vec<ScoredImage>> {
        let mut summaries = crud::get_summaries(&self.db, &ranking.ids())
            .await?
            .into_iter()
            .map(|s| (s.id, s))
            .collect::<HashMap<_, _>>();
        Ok(ranking
            .neighbors
            .iter()
            .filter_map(|n| {
                summaries
                    .remove(&n.id)
                    .map(|image| ScoredImage { image, dissimilarity: n.dissimilarity })
            })
            .collect())
    }
}
