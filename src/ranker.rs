use std::cmp::Ordering;
use std::collections::BinaryHeap;

use futures::stream::{self, BoxStream};
use futures::{Stream, StreamExt, TryStreamExt};
use serde::Serialize;
use utoipa::ToSchema;

use crate::db::Projection;
use crate::descriptor::DescriptorVector;
use crate::weights::Scorer;

/// 参与排序的候选图片，只包含投影出来的描述符分量
#[derive(Debug, Clone)]
pub struct Candidate {
    pub id: i64,
    pub descriptors: DescriptorVector,
}

/// 排序结果中的一项
#[derive(Debug, Clone, Copy, PartialEq, Serialize, ToSchema)]
pub struct Neighbor {
    /// 图片 ID
    pub id: i64,
    /// 不相似度，越小越相似，无法比较时为 `null`
    #[serde(serialize_with = "serialize_dissimilarity")]
    #[schema(value_type = Option<f64>)]
    pub dissimilarity: f64,
}

// JSON 不能表示无穷大
pub(crate) fn serialize_dissimilarity<S: serde::Serializer>(v: &f64, s: S) -> Result<S::Ok, S::Error> {
    match v.is_finite() {
        true => s.serialize_some(v),
        false => s.serialize_none(),
    }
}

/// 一次扫描的结果
#[derive(Debug, Clone, Default)]
pub struct Ranking {
    /// 按不相似度升序排列的最近邻
    pub neighbors: Vec<Neighbor>,
    /// 扫描过的候选数量
    pub scanned: usize,
}

impl Ranking {
    pub fn ids(&self) -> Vec<i64> {
        self.neighbors.iter().map(|n| n.id).collect()
    }
}

/// 候选图片来源
///
/// 返回的流只能遍历一次，不保证是某个时间点的一致快照，
/// 扫描期间并发插入的图片可能出现也可能不出现在结果中。
pub trait CandidateSource {
    type Error;

    /// 流式遍历除 `exclude` 以外的全部图片，只读取 `projection` 指定的分量
    fn candidates(
        &self,
        exclude: Option<i64>,
        projection: Projection,
    ) -> BoxStream<'_, Result<Candidate, Self::Error>>;
}

impl CandidateSource for [Candidate] {
    type Error = std::convert::Infallible;

    fn candidates(
        &self,
        exclude: Option<i64>,
        _projection: Projection,
    ) -> BoxStream<'_, Result<Candidate, Self::Error>> {
        stream::iter(self.iter().filter(move |c| Some(c.id) != exclude).cloned().map(Ok)).boxed()
    }
}

#[derive(Debug)]
struct Entry {
    dissimilarity: f64,
    seq: usize,
    id: i64,
}

// 不相似度相同的情况下，先出现的排在前面
impl Ord for Entry {
    fn cmp(&self, other: &Self) -> Ordering {
        self.dissimilarity.total_cmp(&other.dissimilarity).then(self.seq.cmp(&other.seq))
    }
}

impl PartialOrd for Entry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Entry {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Entry {}

/// 保留不相似度最小的 K 个元素
///
/// 内部是一个大小为 K 的大顶堆，堆顶是当前最差的结果。
#[derive(Debug)]
pub struct TopK {
    k: usize,
    seq: usize,
    heap: BinaryHeap<Entry>,
}

impl TopK {
    pub fn new(k: usize) -> Self {
        Self { k, seq: 0, heap: BinaryHeap::with_capacity(k + 1) }
    }

    pub fn push(&mut self, id: i64, dissimilarity: f64) {
        let entry = Entry { dissimilarity, seq: self.seq, id };
        self.seq += 1;
        if self.k == 0 {
            return;
        }
        if self.heap.len() < self.k {
            self.heap.push(entry);
        } else if let Some(mut top) = self.heap.peek_mut() {
            // 相同距离的后来者不会替换已有结果
            if entry < *top {
                *top = entry;
            }
        }
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    /// 按不相似度升序输出
    pub fn into_sorted_vec(self) -> Vec<Neighbor> {
        self.heap
            .into_sorted_vec()
            .into_iter()
            .map(|e| Neighbor { id: e.id, dissimilarity: e.dissimilarity })
            .collect()
    }
}

/// 对候选流做一次线性扫描，返回最相似的 k 张图片
///
/// 缺失分量的候选不会被跳过，而是以无穷大的不相似度沉到末尾。
pub async fn rank_stream<S, E>(
    scorer: &Scorer<'_>,
    candidates: S,
    exclude: Option<i64>,
    k: usize,
) -> Result<Ranking, E>
where
    S: Stream<Item = Result<Candidate, E>>,
{
    let mut topk = TopK::new(k);
    let mut scanned = 0;

    let mut candidates = std::pin::pin!(candidates);
    while let Some(candidate) = candidates.try_next().await? {
        if Some(candidate.id) == exclude {
            continue;
        }
        topk.push(candidate.id, scorer.score(&candidate.descriptors));
        scanned += 1;
    }

    Ok(Ranking { neighbors: topk.into_sorted_vec(), scanned })
}

/// 从 `source` 中找出与 `query` 最相似的 k 张图片
pub async fn rank<C>(
    scorer: &Scorer<'_>,
    source: &C,
    exclude: Option<i64>,
    k: usize,
) -> Result<Ranking, C::Error>
where
    C: CandidateSource + ?Sized,
{
    let stream = source.candidates(exclude, scorer.projection());
    rank_stream(scorer, stream, exclude, k).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::weights::{Mode, Weights};

    fn colors(id: i64, rgb: [f64; 3]) -> Candidate {
        Candidate {
            id,
            descriptors: DescriptorVector {
                dominant_colors: Some(vec![rgb.to_vec()]),
                texture_descriptors: Some(vec![0.; 4]),
                ..Default::default()
            },
        }
    }

    async fn run(query: &DescriptorVector, source: &[Candidate], exclude: Option<i64>, k: usize) -> Ranking {
        let scorer = Scorer::new(Weights::default(), Mode::Bulk, query);
        rank(&scorer, source, exclude, k).await.unwrap()
    }

    #[test]
    fn test_topk_keeps_smallest() {
        let mut topk = TopK::new(3);
        for (id, d) in [(1, 5.), (2, 1.), (3, 4.), (4, 0.5), (5, 9.)] {
            topk.push(id, d);
        }
        let ids: Vec<_> = topk.into_sorted_vec().iter().map(|n| n.id).collect();
        assert_eq!(ids, [4, 2, 3]);
    }

    #[test]
    fn test_topk_tie_first_seen_wins() {
        let mut topk = TopK::new(2);
        for id in 1..=5 {
            topk.push(id, 1.);
        }
        let ids: Vec<_> = topk.into_sorted_vec().iter().map(|n| n.id).collect();
        assert_eq!(ids, [1, 2]);
    }

    #[test]
    fn test_topk_infinity_sinks() {
        let mut topk = TopK::new(3);
        topk.push(1, f64::INFINITY);
        topk.push(2, 3.);
        topk.push(3, f64::INFINITY);
        topk.push(4, 1.);
        let ids: Vec<_> = topk.into_sorted_vec().iter().map(|n| n.id).collect();
        assert_eq!(ids, [4, 2, 1]);
    }

    #[test]
    fn test_topk_zero() {
        let mut topk = TopK::new(0);
        topk.push(1, 0.);
        assert!(topk.is_empty());
    }

    #[tokio::test]
    async fn test_rank_closest_color_first() {
        let a = colors(1, [10., 10., 10.]);
        let source = [colors(2, [12., 11., 9.]), colors(3, [250., 250., 250.])];
        let ranking = run(&a.descriptors, &source, Some(1), 2).await;
        assert_eq!(ranking.ids(), [2, 3]);
        assert_eq!(ranking.scanned, 2);
    }

    #[tokio::test]
    async fn test_rank_excludes_target() {
        let a = colors(1, [10., 10., 10.]);
        let source = [a.clone(), colors(2, [12., 11., 9.]), colors(3, [250., 250., 250.])];
        let ranking = run(&a.descriptors, &source, Some(1), 10).await;
        assert!(!ranking.ids().contains(&1));
        assert_eq!(ranking.neighbors.len(), 2);
    }

    #[tokio::test]
    async fn test_rank_length_and_order() {
        let query = colors(0, [0., 0., 0.]);
        let source: Vec<_> = (1..=20).map(|i| colors(i, [(i * 7 % 13) as f64, 0., 0.])).collect();
        for k in [0, 1, 5, 20, 50] {
            let ranking = run(&query.descriptors, &source, None, k).await;
            assert_eq!(ranking.neighbors.len(), k.min(source.len()));
            assert!(ranking.neighbors.windows(2).all(|w| w[0].dissimilarity <= w[1].dissimilarity));
        }
    }

    #[tokio::test]
    async fn test_rank_missing_texture_ranked_last() {
        let query = colors(0, [10., 10., 10.]);
        let mut missing = colors(1, [10., 10., 10.]);
        missing.descriptors.texture_descriptors = None;
        let source = [missing, colors(2, [100., 100., 100.]), colors(3, [200., 200., 200.])];
        let ranking = run(&query.descriptors, &source, None, 3).await;
        assert_eq!(ranking.ids(), [2, 3, 1]);
        assert!(ranking.neighbors[2].dissimilarity.is_infinite());
    }

    #[test]
    fn test_neighbor_infinity_serializes_as_null() {
        let n = Neighbor { id: 3, dissimilarity: f64::INFINITY };
        assert_eq!(serde_json::to_string(&n).unwrap(), r#"{"id":3,"dissimilarity":null}"#);
    }
}
