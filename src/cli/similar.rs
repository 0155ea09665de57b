use clap::Parser;

use crate::cli::SubCommandExtend;
use crate::config::Opts;
use crate::utils::OutputFormat;
use crate::IMDBBuilder;

#[derive(Parser, Debug, Clone)]
pub struct SimilarCommand {
    /// 图片 ID
    pub id: i64,
    /// 输出格式
    #[arg(long, value_name = "FORMAT", default_value = "table")]
    pub output_format: OutputFormat,
}

impl SubCommandExtend for SimilarCommand {
    async fn run(&self, opts: &Opts) -> anyhow::Result<()> {
        let db = IMDBBuilder::new(opts.conf_dir.clone()).open().await?;
        match db.get_similar(self.id).await? {
            Some(similar) => self.output_format.print_summaries(&similar),
            None => {
                eprintln!("图片 {} 尚未计算相似图片", self.id);
                Ok(())
            }
        }
    }
}
