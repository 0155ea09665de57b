use std::path::PathBuf;

use clap::Parser;

use crate::cli::SubCommandExtend;
use crate::config::{Opts, RankOptions};
use crate::descriptor::DescriptorVector;
use crate::utils::{OutputFormat, read_json};
use crate::IMDBBuilder;

#[derive(Parser, Debug, Clone)]
pub struct QueryCommand {
    #[command(flatten)]
    pub rank: RankOptions,
    /// 包含查询描述符的 JSON 文件
    pub file: PathBuf,
    /// 从结果中排除的图片 ID
    #[arg(long)]
    pub exclude: Option<i64>,
    /// 输出格式
    #[arg(long, value_name = "FORMAT", default_value = "table")]
    pub output_format: OutputFormat,
}

impl SubCommandExtend for QueryCommand {
    async fn run(&self, opts: &Opts) -> anyhow::Result<()> {
        let query: DescriptorVector = read_json(&self.file)?;
        let db = IMDBBuilder::new(opts.conf_dir.clone()).weights(self.rank.weights()).open().await?;
        let result = db.similar_by_descriptors(&query, self.rank.k, self.exclude).await?;
        self.output_format.print_scored(&result)
    }
}
