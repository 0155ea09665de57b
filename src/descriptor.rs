use std::borrow::Cow;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// 单张图片的全部描述符
///
/// 历史记录中各个分量是否存在并不一致，因此所有分量都是可选的，
/// 使用方在读取时必须显式检查是否存在。
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DescriptorVector {
    /// 颜色直方图，每个通道一组频率分布
    #[serde(default, alias = "color_histogram", alias = "histogram", skip_serializing_if = "Option::is_none")]
    pub color_histogram: Option<ColorHistogram>,
    /// 主色调，形如 `[[r, g, b], ...]`
    #[serde(default, alias = "dominant_colors", skip_serializing_if = "Option::is_none")]
    pub dominant_colors: Option<Vec<Vec<f64>>>,
    /// Gabor 纹理响应
    #[serde(default, alias = "texture_descriptors", skip_serializing_if = "Option::is_none")]
    pub texture_descriptors: Option<Vec<f64>>,
    /// 7 个 Hu 不变矩
    #[serde(default, alias = "hu_moments", skip_serializing_if = "Option::is_none")]
    pub hu_moments: Option<Vec<f64>>,
    #[serde(default, alias = "glcm_features", skip_serializing_if = "Option::is_none")]
    pub glcm_features: Option<GlcmFeatures>,
    /// 边缘方向直方图
    #[serde(default, alias = "edge_histogram", skip_serializing_if = "Option::is_none")]
    pub edge_histogram: Option<Vec<f64>>,
}

/// 颜色直方图
///
/// 支持三种输入形式：
/// - 对象形式 `{"blue": [...], "green": [...], "red": [...]}`
/// - `[[b...], [g...], [r...]]` 这种 OpenCV 通道顺序的数组形式
/// - 一维数组，即描述符服务返回的展开后的 8x8x8 三维联合直方图，保存在 `joint` 中
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(from = "HistogramRepr")]
pub struct ColorHistogram {
    pub blue: Vec<f64>,
    pub green: Vec<f64>,
    pub red: Vec<f64>,
    /// 三通道联合直方图，无法按通道拆分
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub joint: Vec<f64>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum HistogramRepr {
    Channels {
        #[serde(default)]
        blue: Vec<f64>,
        #[serde(default)]
        green: Vec<f64>,
        #[serde(default)]
        red: Vec<f64>,
        #[serde(default)]
        joint: Vec<f64>,
    },
    Stacked(Vec<Vec<f64>>),
    Flat(Vec<f64>),
}

impl From<HistogramRepr> for ColorHistogram {
    fn from(repr: HistogramRepr) -> Self {
        match repr {
            HistogramRepr::Channels { blue, green, red, joint } => Self { blue, green, red, joint },
            HistogramRepr::Stacked(channels) => {
                let mut channels = channels.into_iter();
                Self {
                    blue: channels.next().unwrap_or_default(),
                    green: channels.next().unwrap_or_default(),
                    red: channels.next().unwrap_or_default(),
                    joint: vec![],
                }
            }
            HistogramRepr::Flat(joint) => Self { joint, ..Default::default() },
        }
    }
}

impl ColorHistogram {
    /// 联合直方图
    pub fn joint(joint: Vec<f64>) -> Self {
        Self { joint, ..Default::default() }
    }

    pub fn is_empty(&self) -> bool {
        self.blue.is_empty() && self.green.is_empty() && self.red.is_empty() && self.joint.is_empty()
    }

    /// 按通道取出直方图，`All` 会把三个通道依次拼接
    ///
    /// 存在联合直方图时，无论选择哪个通道都返回联合直方图。
    pub fn channel(&self, channel: HistogramChannel) -> Cow<'_, [f64]> {
        if !self.joint.is_empty() {
            return Cow::Borrowed(&self.joint);
        }
        match channel {
            HistogramChannel::Blue => Cow::Borrowed(&self.blue),
            HistogramChannel::Green => Cow::Borrowed(&self.green),
            HistogramChannel::Red => Cow::Borrowed(&self.red),
            HistogramChannel::All => {
                let mut all = Vec::with_capacity(self.blue.len() + self.green.len() + self.red.len());
                all.extend_from_slice(&self.blue);
                all.extend_from_slice(&self.green);
                all.extend_from_slice(&self.red);
                Cow::Owned(all)
            }
        }
    }
}

/// 参与加权的直方图通道
#[derive(clap::ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HistogramChannel {
    #[default]
    Blue,
    Green,
    Red,
    All,
}

/// GLCM 纹理特征，每一项都可能缺失
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct GlcmFeatures {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contrast: Option<Vec<f64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dissimilarity: Option<Vec<f64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub homogeneity: Option<Vec<f64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub energy: Option<Vec<f64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correlation: Option<Vec<f64>>,
}

impl GlcmFeatures {
    /// 以固定顺序遍历各项特征
    pub fn fields(&self) -> [(&'static str, Option<&[f64]>); 5] {
        [
            ("contrast", self.contrast.as_deref()),
            ("dissimilarity", self.dissimilarity.as_deref()),
            ("homogeneity", self.homogeneity.as_deref()),
            ("energy", self.energy.as_deref()),
            ("correlation", self.correlation.as_deref()),
        ]
    }

    pub fn fields_mut(&mut self) -> [&mut Option<Vec<f64>>; 5] {
        [
            &mut self.contrast,
            &mut self.dissimilarity,
            &mut self.homogeneity,
            &mut self.energy,
            &mut self.correlation,
        ]
    }
}

impl DescriptorVector {
    /// 描述符服务不可用时使用的空描述符
    pub fn empty() -> Self {
        Self::default()
    }

    /// 所有分量都缺失或为空
    pub fn is_empty(&self) -> bool {
        let empty = |v: &Option<Vec<f64>>| v.as_ref().is_none_or(|v| v.is_empty());
        self.color_histogram.as_ref().is_none_or(|h| h.is_empty())
            && self.dominant_colors.as_ref().is_none_or(|c| c.iter().all(|t| t.is_empty()))
            && empty(&self.texture_descriptors)
            && empty(&self.hu_moments)
            && self
                .glcm_features
                .as_ref()
                .is_none_or(|g| g.fields().iter().all(|(_, v)| v.is_none_or(|v| v.is_empty())))
            && empty(&self.edge_histogram)
    }

    /// 将主色调展开为一维序列，缺失时返回 None
    pub fn flat_dominant_colors(&self) -> Option<Vec<f64>> {
        self.dominant_colors.as_ref().map(|colors| flatten(colors))
    }

    /// 直方图的指定通道，缺失时返回 None
    pub fn histogram(&self, channel: HistogramChannel) -> Option<Cow<'_, [f64]>> {
        self.color_histogram.as_ref().map(|h| h.channel(channel))
    }
}

/// 将元组序列展开为一维序列
pub fn flatten(tuples: &[Vec<f64>]) -> Vec<f64> {
    tuples.iter().flatten().copied().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_partial_record() {
        let v: DescriptorVector =
            serde_json::from_str(r#"{"dominantColors": [[1, 2, 3], [4, 5, 6]], "huMoments": [0.1]}"#)
                .unwrap();
        assert_eq!(v.flat_dominant_colors(), Some(vec![1., 2., 3., 4., 5., 6.]));
        assert_eq!(v.hu_moments, Some(vec![0.1]));
        assert!(v.texture_descriptors.is_none());
        assert!(v.glcm_features.is_none());
    }

    #[test]
    fn test_deserialize_snake_case_alias() {
        let v: DescriptorVector =
            serde_json::from_str(r#"{"dominant_colors": [[10, 10, 10]]}"#).unwrap();
        assert_eq!(v.dominant_colors, Some(vec![vec![10., 10., 10.]]));
    }

    #[test]
    fn test_histogram_stacked_form() {
        let v: DescriptorVector =
            serde_json::from_str(r#"{"colorHistogram": [[1, 2], [3, 4], [5, 6]]}"#).unwrap();
        let h = v.color_histogram.unwrap();
        assert_eq!(h.blue, vec![1., 2.]);
        assert_eq!(h.red, vec![5., 6.]);
        assert_eq!(&*h.channel(HistogramChannel::All), &[1., 2., 3., 4., 5., 6.]);
    }

    #[test]
    fn test_histogram_object_form() {
        let v: DescriptorVector =
            serde_json::from_str(r#"{"colorHistogram": {"blue": [1], "green": [2]}}"#).unwrap();
        let h = v.color_histogram.unwrap();
        assert_eq!(h.green, vec![2.]);
        assert!(h.red.is_empty());
    }

    #[test]
    fn test_histogram_flat_form() {
        let v: DescriptorVector =
            serde_json::from_str(r#"{"histogram": [0.1, 0.2, 0.3, 0.4], "dominant_colors": [[10, 10, 10]]}"#)
                .unwrap();
        let h = v.color_histogram.as_ref().unwrap();
        assert_eq!(h.joint, vec![0.1, 0.2, 0.3, 0.4]);
        assert!(h.blue.is_empty());
        for channel in [HistogramChannel::Blue, HistogramChannel::Red, HistogramChannel::All] {
            assert_eq!(v.histogram(channel).as_deref(), Some(&[0.1, 0.2, 0.3, 0.4][..]));
        }
        assert!(!v.is_empty());

        // 写入数据库再读出后保持不变
        let json = serde_json::to_string(&v).unwrap();
        assert_eq!(serde_json::from_str::<DescriptorVector>(&json).unwrap(), v);
    }

    #[test]
    fn test_empty() {
        assert!(DescriptorVector::empty().is_empty());
        let v = DescriptorVector { texture_descriptors: Some(vec![]), ..Default::default() };
        assert!(v.is_empty());
        let v = DescriptorVector { hu_moments: Some(vec![1.]), ..Default::default() };
        assert!(!v.is_empty());
    }
}
