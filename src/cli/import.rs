use std::path::{Path, PathBuf};

use clap::Parser;
use indicatif::{ProgressBar, ProgressIterator};
use log::info;
use serde::Deserialize;

use crate::cli::SubCommandExtend;
use crate::config::{Opts, RankOptions};
use crate::db::NewImage;
use crate::descriptor::DescriptorVector;
use crate::utils::{pb_style, read_json};
use crate::IMDBBuilder;

#[derive(Parser, Debug, Clone)]
pub struct ImportCommand {
    #[command(flatten)]
    pub rank: RankOptions,
    /// 包含图片描述符的 JSON 文件
    pub file: PathBuf,
    /// 只导入，不计算相似图片
    #[arg(long)]
    pub no_rank: bool,
}

/// 导入文件中的一条记录
#[derive(Debug, Deserialize)]
pub struct ImportRecord {
    #[serde(default)]
    pub filename: Option<String>,
    pub path: String,
    pub category: String,
    #[serde(default)]
    pub descriptors: DescriptorVector,
}

impl ImportRecord {
    fn into_parts(self) -> (NewImage, DescriptorVector) {
        let filename = self.filename.unwrap_or_else(|| {
            Path::new(&self.path)
                .file_name()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_else(|| self.path.clone())
        });
        (NewImage { filename, path: self.path, category: self.category }, self.descriptors)
    }
}

impl SubCommandExtend for ImportCommand {
    async fn run(&self, opts: &Opts) -> anyhow::Result<()> {
        let records: Vec<ImportRecord> = read_json(&self.file)?;
        let db = IMDBBuilder::new(opts.conf_dir.clone()).weights(self.rank.weights()).open().await?;

        let pb = ProgressBar::new(records.len() as u64).with_style(pb_style());
        pb.set_message("导入");
        let mut ids = Vec::with_capacity(records.len());
        for record in records.into_iter().progress_with(pb.clone()) {
            let (image, descriptors) = record.into_parts();
            ids.push(db.import_image(&image, &descriptors).await?);
        }

        // 全部导入后再排序，使每张图片都能看到完整的集合
        if !self.no_rank {
            pb.reset();
            pb.set_length(ids.len() as u64);
            pb.set_message("排序");
            for &id in ids.iter().progress_with(pb.clone()) {
                db.rank(id, self.rank.k).await?;
            }
        }

        pb.finish_with_message("导入完成");
        info!("导入 {} 张图片", ids.len());
        for id in ids {
            println!("{id}");
        }
        Ok(())
    }
}
