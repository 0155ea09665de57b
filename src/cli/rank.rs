use anyhow::bail;
use clap::Parser;
use log::info;

use crate::cli::SubCommandExtend;
use crate::config::{Opts, RankOptions};
use crate::utils::OutputFormat;
use crate::IMDBBuilder;

#[derive(Parser, Debug, Clone)]
pub struct RankCommand {
    #[command(flatten)]
    pub rank: RankOptions,
    /// 图片 ID
    #[arg(required_unless_present = "all")]
    pub id: Option<i64>,
    /// 重新计算所有图片
    #[arg(long, conflicts_with = "id")]
    pub all: bool,
    /// 输出格式
    #[arg(long, value_name = "FORMAT", default_value = "table")]
    pub output_format: OutputFormat,
}

impl SubCommandExtend for RankCommand {
    async fn run(&self, opts: &Opts) -> anyhow::Result<()> {
        let db = IMDBBuilder::new(opts.conf_dir.clone()).weights(self.rank.weights()).open().await?;

        if self.all {
            let total = db.rank_all(self.rank.k).await?;
            info!("已重新计算 {} 张图片", total);
            return Ok(());
        }

        let Some(id) = self.id else {
            bail!("需要指定图片 ID 或 --all");
        };
        let ranking = db.rank(id, self.rank.k).await?;
        match self.output_format {
            OutputFormat::Json => OutputFormat::print_json(&ranking.neighbors),
            OutputFormat::Table => {
                for n in &ranking.neighbors {
                    println!("{:.4}\t{}", n.dissimilarity, n.id);
                }
                Ok(())
            }
        }
    }
}
