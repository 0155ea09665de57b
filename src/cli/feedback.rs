use std::path::PathBuf;

use clap::Parser;

use crate::cli::SubCommandExtend;
use crate::config::{FeedbackOptions, Opts, RankOptions};
use crate::imdb::FeedbackRequest;
use crate::utils::{OutputFormat, read_json};
use crate::IMDBBuilder;

#[derive(Parser, Debug, Clone)]
pub struct FeedbackCommand {
    #[command(flatten)]
    pub rank: RankOptions,
    #[command(flatten)]
    pub feedback: FeedbackOptions,
    /// 反馈请求 JSON 文件，包含 query、relevantIds 和 nonRelevantIds
    pub file: PathBuf,
    /// 输出格式，json 格式同时输出新的查询向量
    #[arg(long, value_name = "FORMAT", default_value = "json")]
    pub output_format: OutputFormat,
}

impl SubCommandExtend for FeedbackCommand {
    async fn run(&self, opts: &Opts) -> anyhow::Result<()> {
        let request: FeedbackRequest = read_json(&self.file)?;
        let db = IMDBBuilder::new(opts.conf_dir.clone()).weights(self.rank.weights()).open().await?;
        let result = db
            .feedback(
                &request.query,
                &request.relevant_ids,
                &request.non_relevant_ids,
                request.rocchio(self.feedback.rocchio()),
                request.k.unwrap_or(self.rank.k),
                request.exclude,
            )
            .await?;
        match self.output_format {
            OutputFormat::Json => OutputFormat::print_json(&result),
            OutputFormat::Table => self.output_format.print_scored(&result.results),
        }
    }
}
