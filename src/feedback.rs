use log::debug;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::descriptor::{ColorHistogram, DescriptorVector, GlcmFeatures, flatten};

/// Rocchio 反馈参数
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Rocchio {
    /// 原查询向量的权重
    pub alpha: f64,
    /// 相关与不相关样本均值的权重
    pub beta: f64,
}

impl Default for Rocchio {
    fn default() -> Self {
        Self { alpha: 1.0, beta: 0.5 }
    }
}

impl Rocchio {
    pub fn new(alpha: f64, beta: f64) -> Self {
        Self { alpha, beta }
    }

    /// 对单个数值序列应用反馈：
    /// `alpha * query + beta * mean(relevant) - beta * mean(non_relevant)`
    ///
    /// 维度取自 query，query 为空时取第一个样本的维度（query 视为零向量）。
    /// 长度与该维度不一致的样本不参与均值计算。
    pub fn apply(&self, query: &[f64], relevant: &[&[f64]], non_relevant: &[&[f64]]) -> Vec<f64> {
        let dim = match query.is_empty() {
            false => query.len(),
            true => match relevant.iter().chain(non_relevant).find(|v| !v.is_empty()) {
                Some(v) if self.beta != 0. => v.len(),
                _ => return Vec::new(),
            },
        };

        let mut result = match query.is_empty() {
            false => query.iter().map(|x| self.alpha * x).collect(),
            true => vec![0.; dim],
        };

        // beta 为 0 时完全忽略样本
        if self.beta == 0. {
            return result;
        }

        if let Some(mean) = mean(relevant, dim) {
            result.iter_mut().zip(mean).for_each(|(r, m)| *r += self.beta * m);
        }
        if let Some(mean) = mean(non_relevant, dim) {
            result.iter_mut().zip(mean).for_each(|(r, m)| *r -= self.beta * m);
        }
        result
    }

    /// 对描述符的每个分量分别应用反馈
    pub fn apply_descriptors(
        &self,
        query: &DescriptorVector,
        relevant: &[DescriptorVector],
        non_relevant: &[DescriptorVector],
    ) -> DescriptorVector {
        let color_histogram = {
            let blue = self.component(query, relevant, non_relevant, |d| {
                d.color_histogram.as_ref().map(|h| h.blue.as_slice())
            });
            let green = self.component(query, relevant, non_relevant, |d| {
                d.color_histogram.as_ref().map(|h| h.green.as_slice())
            });
            let red = self.component(query, relevant, non_relevant, |d| {
                d.color_histogram.as_ref().map(|h| h.red.as_slice())
            });
            let joint = self.component(query, relevant, non_relevant, |d| {
                d.color_histogram.as_ref().map(|h| h.joint.as_slice())
            });
            match (blue, green, red, joint) {
                (None, None, None, None) => None,
                (blue, green, red, joint) => Some(ColorHistogram {
                    blue: blue.unwrap_or_default(),
                    green: green.unwrap_or_default(),
                    red: red.unwrap_or_default(),
                    joint: joint.unwrap_or_default(),
                }),
            }
        };

        // 主色调按展开后的一维序列计算，再按原元组宽度切回
        let width = query
            .dominant_colors
            .iter()
            .chain(relevant.iter().filter_map(|d| d.dominant_colors.as_ref()))
            .find_map(|c| c.first().map(|t| t.len()))
            .unwrap_or(3);
        let flat = |d: &DescriptorVector| d.dominant_colors.as_ref().map(|c| flatten(c));
        let q_flat = flat(query);
        let rel_flat = relevant.iter().filter_map(flat).collect::<Vec<_>>();
        let non_flat = non_relevant.iter().filter_map(flat).collect::<Vec<_>>();
        let rel_refs = rel_flat.iter().map(Vec::as_slice).collect::<Vec<_>>();
        let non_refs = non_flat.iter().map(Vec::as_slice).collect::<Vec<_>>();
        let dominant_colors = match &q_flat {
            Some(q) => Some(self.apply(q, &rel_refs, &non_refs)),
            None if self.beta != 0. && !rel_refs.is_empty() => Some(self.apply(&[], &rel_refs, &non_refs)),
            None => None,
        }
        .map(|v| v.chunks(width.max(1)).map(<[f64]>::to_vec).collect());

        let glcm_features = match query.glcm_features.is_some()
            || (self.beta != 0. && relevant.iter().any(|d| d.glcm_features.is_some()))
        {
            true => {
                let mut glcm = GlcmFeatures::default();
                for (i, slot) in glcm.fields_mut().into_iter().enumerate() {
                    *slot = self.component(query, relevant, non_relevant, |d| {
                        d.glcm_features.as_ref().and_then(|g| g.fields()[i].1)
                    });
                }
                Some(glcm)
            }
            false => None,
        };

        DescriptorVector {
            color_histogram,
            dominant_colors,
            texture_descriptors: self.component(query, relevant, non_relevant, |d| {
                d.texture_descriptors.as_deref()
            }),
            hu_moments: self.component(query, relevant, non_relevant, |d| d.hu_moments.as_deref()),
            glcm_features,
            edge_histogram: self.component(query, relevant, non_relevant, |d| {
                d.edge_histogram.as_deref()
            }),
        }
    }

    /// 对 `get` 取出的分量应用反馈，query 与相关样本都没有该分量时返回 None
    fn component<F>(
        &self,
        query: &DescriptorVector,
        relevant: &[DescriptorVector],
        non_relevant: &[DescriptorVector],
        get: F,
    ) -> Option<Vec<f64>>
    where
        F: Fn(&DescriptorVector) -> Option<&[f64]>,
    {
        let rel = relevant.iter().filter_map(&get).collect::<Vec<_>>();
        let non = non_relevant.iter().filter_map(&get).collect::<Vec<_>>();
        match get(query) {
            Some(q) => Some(self.apply(q, &rel, &non)),
            None if self.beta != 0. && !rel.is_empty() => Some(self.apply(&[], &rel, &non)),
            None => None,
        }
    }
}

/// 计算长度为 dim 的向量的均值，没有可用样本时返回 None
fn mean(vectors: &[&[f64]], dim: usize) -> Option<Vec<f64>> {
    let mut sum = vec![0.; dim];
    let mut n = 0;
    for v in vectors {
        if v.len() != dim {
            debug!("跳过维度不一致的反馈样本: {} != {}", v.len(), dim);
            continue;
        }
        sum.iter_mut().zip(v.iter()).for_each(|(s, x)| *s += x);
        n += 1;
    }
    match n {
        0 => None,
        n => Some(sum.into_iter().map(|s| s / n as f64).collect()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_relevant_mean() {
        let r = Rocchio::new(1., 0.5);
        let out = r.apply(&[0., 0., 0.], &[&[10., 10., 10.], &[20., 20., 20.]], &[]);
        assert_eq!(out, vec![7.5, 7.5, 7.5]);
    }

    #[test]
    fn test_no_feedback_scales_query() {
        for (alpha, beta) in [(1., 0.5), (0.3, 2.), (0., 1.), (-1., 0.)] {
            let r = Rocchio::new(alpha, beta);
            let q = [1., -2., 4.];
            let expected: Vec<_> = q.iter().map(|x| alpha * x).collect();
            assert_eq!(r.apply(&q, &[], &[]), expected);
        }
    }

    #[test]
    fn test_beta_zero_ignores_samples() {
        let r = Rocchio::new(2., 0.);
        let out = r.apply(&[1., 1.], &[&[100., 100.]], &[&[-50., 3.], &[1.]]);
        assert_eq!(out, vec![2., 2.]);
    }

    #[test]
    fn test_non_relevant_pushes_away() {
        let r = Rocchio::new(1., 0.5);
        let out = r.apply(&[10., 10.], &[&[12., 12.]], &[&[4., 0.]]);
        assert_eq!(out, vec![14., 16.]);
    }

    #[test]
    fn test_mismatched_samples_skipped() {
        let r = Rocchio::default();
        let out = r.apply(&[0., 0.], &[&[2., 2.], &[1., 2., 3.]], &[&[]]);
        assert_eq!(out, vec![1., 1.]);
    }

    #[test]
    fn test_empty_query_uses_sample_dim() {
        let r = Rocchio::new(1., 1.);
        assert_eq!(r.apply(&[], &[&[2., 4.]], &[]), vec![2., 4.]);
        assert!(r.apply(&[], &[], &[]).is_empty());
    }

    #[test]
    fn test_apply_descriptors_per_component() {
        let r = Rocchio::new(1., 0.5);
        let query = DescriptorVector {
            dominant_colors: Some(vec![vec![0., 0., 0.], vec![4., 4., 4.]]),
            hu_moments: Some(vec![1.; 7]),
            ..Default::default()
        };
        let rel = [
            DescriptorVector {
                dominant_colors: Some(vec![vec![10., 10., 10.], vec![0., 0., 0.]]),
                hu_moments: Some(vec![3.; 7]),
                ..Default::default()
            },
            DescriptorVector {
                dominant_colors: Some(vec![vec![20., 20., 20.], vec![0., 0., 0.]]),
                ..Default::default()
            },
        ];
        let out = r.apply_descriptors(&query, &rel, &[]);
        assert_eq!(out.dominant_colors, Some(vec![vec![7.5, 7.5, 7.5], vec![4., 4., 4.]]));
        assert_eq!(out.hu_moments, Some(vec![2.5; 7]));
        assert!(out.texture_descriptors.is_none());
        assert!(out.glcm_features.is_none());
    }

    #[test]
    fn test_apply_descriptors_no_feedback() {
        let r = Rocchio::new(2., 0.5);
        let query = DescriptorVector {
            texture_descriptors: Some(vec![1., 2.]),
            glcm_features: Some(GlcmFeatures { energy: Some(vec![0.5]), ..Default::default() }),
            ..Default::default()
        };
        let out = r.apply_descriptors(&query, &[], &[]);
        assert_eq!(out.texture_descriptors, Some(vec![2., 4.]));
        assert_eq!(out.glcm_features.unwrap().energy, Some(vec![1.]));
    }
}
