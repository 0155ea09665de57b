use std::borrow::Cow;

use serde::{Deserialize, Serialize};

use crate::db::Projection;
use crate::descriptor::{DescriptorVector, HistogramChannel};
use crate::distance::{euclidean_opt, euclidean_prefix, INCOMPARABLE};

/// 单次相似度查询使用的完整四分量权重
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FullWeights {
    pub dominant_colors: f64,
    pub histogram: f64,
    pub histogram_channel: HistogramChannel,
    pub texture: f64,
    pub hu_moments: f64,
}

impl Default for FullWeights {
    fn default() -> Self {
        Self {
            dominant_colors: 0.4,
            histogram: 0.3,
            histogram_channel: HistogramChannel::Blue,
            texture: 0.2,
            hu_moments: 0.1,
        }
    }
}

/// 批量排序使用的低开销权重
///
/// 纹理只比较前 `texture_prefix` 个元素，直方图默认不参与。
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BulkWeights {
    pub dominant_colors: f64,
    pub texture: f64,
    pub texture_prefix: usize,
    pub histogram: f64,
    pub histogram_channel: HistogramChannel,
}

impl Default for BulkWeights {
    fn default() -> Self {
        Self {
            dominant_colors: 0.6,
            texture: 0.4,
            texture_prefix: 1000,
            histogram: 0.0,
            histogram_channel: HistogramChannel::Blue,
        }
    }
}

/// 权重配置，显式传入每一次打分
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Weights {
    pub full: FullWeights,
    pub bulk: BulkWeights,
}

/// 打分模式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// 四分量完整模型
    Full,
    /// 主色调 + 截断纹理
    Bulk,
}

impl Mode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::Full => "full",
            Mode::Bulk => "bulk",
        }
    }
}

/// 各分量的距离
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ComponentDistances {
    pub dominant_colors: f64,
    pub histogram: f64,
    pub texture: f64,
    pub hu_moments: f64,
}

impl ComponentDistances {
    pub fn scale(&self, c: f64) -> Self {
        Self {
            dominant_colors: self.dominant_colors * c,
            histogram: self.histogram * c,
            texture: self.texture * c,
            hu_moments: self.hu_moments * c,
        }
    }
}

/// 线性加权求和
///
/// 权重为 0 的分量直接跳过，避免 `0 * inf` 得到 NaN。
fn weighted_sum(terms: &[(f64, f64)]) -> f64 {
    terms.iter().filter(|(w, _)| *w != 0.).map(|(w, d)| w * d).sum()
}

impl Weights {
    /// 按指定模式组合各分量距离
    pub fn combine(&self, mode: Mode, d: &ComponentDistances) -> f64 {
        match mode {
            Mode::Full => weighted_sum(&[
                (self.full.dominant_colors, d.dominant_colors),
                (self.full.histogram, d.histogram),
                (self.full.texture, d.texture),
                (self.full.hu_moments, d.hu_moments),
            ]),
            Mode::Bulk => weighted_sum(&[
                (self.bulk.dominant_colors, d.dominant_colors),
                (self.bulk.texture, d.texture),
                (self.bulk.histogram, d.histogram),
            ]),
        }
    }

    /// 完整模型下 query 与 candidate 的不相似度
    pub fn combined_dissimilarity(&self, query: &DescriptorVector, candidate: &DescriptorVector) -> f64 {
        Scorer::new(*self, Mode::Full, query).score(candidate)
    }

    /// 批量模型下 query 与 candidate 的不相似度
    pub fn bulk_dissimilarity(&self, query: &DescriptorVector, candidate: &DescriptorVector) -> f64 {
        Scorer::new(*self, Mode::Bulk, query).score(candidate)
    }

    fn histogram_channel(&self, mode: Mode) -> HistogramChannel {
        match mode {
            Mode::Full => self.full.histogram_channel,
            Mode::Bulk => self.bulk.histogram_channel,
        }
    }

    fn histogram_weight(&self, mode: Mode) -> f64 {
        match mode {
            Mode::Full => self.full.histogram,
            Mode::Bulk => self.bulk.histogram,
        }
    }
}

/// 预处理过的查询描述符，在一次扫描中重复使用
pub struct Scorer<'a> {
    weights: Weights,
    mode: Mode,
    query: &'a DescriptorVector,
    dominant_colors: Option<Vec<f64>>,
    histogram: Option<Cow<'a, [f64]>>,
}

impl<'a> Scorer<'a> {
    pub fn new(weights: Weights, mode: Mode, query: &'a DescriptorVector) -> Self {
        let histogram = match weights.histogram_weight(mode) != 0. {
            true => query.histogram(weights.histogram_channel(mode)),
            false => None,
        };
        Self { weights, mode, query, dominant_colors: query.flat_dominant_colors(), histogram }
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// 当前模式下需要从候选图片读取的分量，权重为 0 的分量不读取
    pub fn projection(&self) -> Projection {
        let (dominant_colors, texture, hu_moments) = match self.mode {
            Mode::Full => {
                let w = &self.weights.full;
                (w.dominant_colors, w.texture, w.hu_moments)
            }
            Mode::Bulk => (self.weights.bulk.dominant_colors, self.weights.bulk.texture, 0.),
        };
        Projection {
            color_histogram: self.histogram.is_some(),
            dominant_colors: dominant_colors != 0.,
            texture_descriptors: texture != 0.,
            hu_moments: hu_moments != 0.,
        }
    }

    /// 计算各分量距离，不参与当前模式的分量记为 [`INCOMPARABLE`]
    pub fn distances(&self, candidate: &DescriptorVector) -> ComponentDistances {
        let dominant_colors =
            euclidean_opt(self.dominant_colors.as_deref(), candidate.flat_dominant_colors().as_deref());

        let histogram = match &self.histogram {
            Some(query) => {
                let channel = self.weights.histogram_channel(self.mode);
                euclidean_opt(Some(&**query), candidate.histogram(channel).as_deref())
            }
            None => INCOMPARABLE,
        };

        let texture = match (self.mode, &self.query.texture_descriptors, &candidate.texture_descriptors) {
            (Mode::Bulk, Some(a), Some(b)) => euclidean_prefix(a, b, self.weights.bulk.texture_prefix),
            (Mode::Full, a, b) => euclidean_opt(a.as_deref(), b.as_deref()),
            _ => INCOMPARABLE,
        };

        let hu_moments = match self.mode {
            Mode::Full => {
                euclidean_opt(self.query.hu_moments.as_deref(), candidate.hu_moments.as_deref())
            }
            Mode::Bulk => INCOMPARABLE,
        };

        ComponentDistances { dominant_colors, histogram, texture, hu_moments }
    }

    /// 计算 candidate 的不相似度，越小越相似
    pub fn score(&self, candidate: &DescriptorVector) -> f64 {
        self.weights.combine(self.mode, &self.distances(candidate))
    }
}
