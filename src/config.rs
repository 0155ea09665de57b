use std::convert::Infallible;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::LazyLock;
use std::time::Duration;

use clap::{Parser, Subcommand};
use directories::ProjectDirs;

use crate::cli::*;
use crate::descriptor::HistogramChannel;
use crate::feedback::Rocchio;
use crate::weights::{BulkWeights, FullWeights, Weights};

static CONF_DIR: LazyLock<ConfDir> = LazyLock::new(|| {
    let proj_dirs = ProjectDirs::from("", "imrank", "imrank").expect("failed to get project dir");
    ConfDir { path: proj_dirs.config_dir().to_path_buf() }
});

fn default_config_dir() -> &'static str {
    CONF_DIR.path().to_str().unwrap()
}

#[derive(Parser, Debug, Clone)]
pub struct RankOptions {
    /// 每张图片保存的相似图片数量
    #[arg(short, value_name = "K", default_value_t = 10)]
    pub k: usize,
    /// 完整模型中主色调的权重
    #[arg(long, value_name = "W", default_value_t = 0.4)]
    pub w_dominant_colors: f64,
    /// 完整模型中颜色直方图的权重
    #[arg(long, value_name = "W", default_value_t = 0.3)]
    pub w_histogram: f64,
    /// 完整模型中纹理的权重
    #[arg(long, value_name = "W", default_value_t = 0.2)]
    pub w_texture: f64,
    /// 完整模型中 Hu 矩的权重
    #[arg(long, value_name = "W", default_value_t = 0.1)]
    pub w_hu_moments: f64,
    /// 参与比较的直方图通道
    #[arg(long, value_enum, default_value_t = HistogramChannel::Blue)]
    pub histogram_channel: HistogramChannel,
    /// 批量排序中主色调的权重
    #[arg(long, value_name = "W", default_value_t = 0.6)]
    pub bulk_w_dominant_colors: f64,
    /// 批量排序中纹理的权重
    #[arg(long, value_name = "W", default_value_t = 0.4)]
    pub bulk_w_texture: f64,
    /// 批量排序中颜色直方图的权重，默认不参与
    #[arg(long, value_name = "W", default_value_t = 0.0)]
    pub bulk_w_histogram: f64,
    /// 批量排序时只比较纹理的前 N 个元素
    #[arg(long, value_name = "N", default_value_t = 1000)]
    pub bulk_texture_prefix: usize,
}

impl RankOptions {
    pub fn weights(&self) -> Weights {
        Weights {
            full: FullWeights {
                dominant_colors: self.w_dominant_colors,
                histogram: self.w_histogram,
                histogram_channel: self.histogram_channel,
                texture: self.w_texture,
                hu_moments: self.w_hu_moments,
            },
            bulk: BulkWeights {
                dominant_colors: self.bulk_w_dominant_colors,
                texture: self.bulk_w_texture,
                texture_prefix: self.bulk_texture_prefix,
                histogram: self.bulk_w_histogram,
                histogram_channel: self.histogram_channel,
            },
        }
    }
}

#[derive(Parser, Debug, Clone, Copy)]
pub struct FeedbackOptions {
    /// 原查询向量的权重
    #[arg(long, default_value_t = 1.0)]
    pub alpha: f64,
    /// 相关/不相关样本均值的权重
    #[arg(long, default_value_t = 0.5)]
    pub beta: f64,
}

impl FeedbackOptions {
    pub fn rocchio(&self) -> Rocchio {
        Rocchio::new(self.alpha, self.beta)
    }
}

#[derive(Parser, Debug, Clone)]
pub struct ExtractorOptions {
    /// 描述符服务地址
    #[arg(long, value_name = "URL", default_value = "http://127.0.0.1:5001/api")]
    pub descriptor_service: String,
    /// 描述符服务超时时间，单位为秒
    #[arg(long, value_name = "SECS", default_value_t = 30)]
    pub extract_timeout: u64,
}

impl ExtractorOptions {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.extract_timeout)
    }
}

#[derive(Parser, Debug, Clone)]
#[command(name = "imrank", version)]
pub struct Opts {
    #[command(subcommand)]
    pub subcmd: SubCommand,
    /// imrank 配置文件目录
    #[arg(short, long, default_value = default_config_dir())]
    pub conf_dir: ConfDir,
}

#[derive(Subcommand, Debug, Clone)]
pub enum SubCommand {
    /// 导入已计算好描述符的图片
    Import(ImportCommand),
    /// 添加目录中的图片，描述符由外部服务计算
    Add(AddCommand),
    /// 重新计算图片的相似图片列表
    Rank(RankCommand),
    /// 查看图片的相似图片列表
    Similar(SimilarCommand),
    /// 使用描述符查询相似图片
    Query(QueryCommand),
    /// 根据相关反馈更新查询向量并重新排序
    Feedback(FeedbackCommand),
    /// 启动 HTTP 服务
    Server(ServerCommand),
}

#[derive(Debug, Clone)]
pub struct ConfDir {
    path: PathBuf,
}

impl ConfDir {
    pub fn path(&self) -> &Path {
        self.path.as_path()
    }

    /// 返回数据库文件的路径
    pub fn database(&self) -> PathBuf {
        self.path.join("imrank.db")
    }

    /// 返回上传图片的保存目录
    pub fn uploads(&self) -> PathBuf {
        self.path.join("uploads")
    }
}

impl FromStr for ConfDir {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self { path: PathBuf::from(s) })
    }
}

impl From<PathBuf> for ConfDir {
    fn from(path: PathBuf) -> Self {
        Self { path }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_weights_match_table() {
        let opts = RankOptions::parse_from(["rank"]);
        assert_eq!(opts.weights(), Weights::default());
        assert_eq!(opts.k, 10);
    }

    #[test]
    fn test_weights_override() {
        let opts = RankOptions::parse_from(["rank", "--w-texture", "0.5", "--histogram-channel", "all"]);
        let w = opts.weights();
        assert_eq!(w.full.texture, 0.5);
        assert_eq!(w.full.histogram_channel, HistogramChannel::All);
    }

    #[test]
    fn test_feedback_defaults() {
        let opts = FeedbackOptions::parse_from(["feedback"]);
        assert_eq!(opts.rocchio(), Rocchio::default());
    }
}
