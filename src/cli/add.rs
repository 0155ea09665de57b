use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

use clap::Parser;
use futures::{StreamExt, stream};
use indicatif::ProgressBar;
use log::{info, warn};
use regex::Regex;
use tokio::sync::watch;
use tokio::task::block_in_place;
use walkdir::WalkDir;

use crate::cli::SubCommandExtend;
use crate::config::{ExtractorOptions, Opts, RankOptions};
use crate::db::NewImage;
use crate::extractor::HttpExtractor;
use crate::utils::pb_style;
use crate::{Error, IMDBBuilder};

#[derive(Parser, Debug, Clone)]
pub struct AddCommand {
    #[command(flatten)]
    pub rank: RankOptions,
    #[command(flatten)]
    pub extractor: ExtractorOptions,
    /// 图片所在目录
    pub path: PathBuf,
    /// 图片分类
    #[arg(long)]
    pub category: String,
    /// 扫描的文件后缀名，多个后缀用逗号分隔
    #[arg(short, long, default_value = "jpg,jpeg,png")]
    pub suffix: String,
    /// 同时请求描述符服务的数量，默认为 CPU 核心数
    #[arg(short, long)]
    pub jobs: Option<usize>,
}

fn scan_directory(path: &Path, re_suf: &Regex) -> Vec<PathBuf> {
    WalkDir::new(path)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.into_path())
        .filter(|path| path.extension().map(|s| re_suf.is_match(&s.to_string_lossy())) == Some(true))
        .collect()
}

impl SubCommandExtend for AddCommand {
    async fn run(&self, opts: &Opts) -> anyhow::Result<()> {
        let re_suf = format!("(?i)^({})$", self.suffix.replace(',', "|"));
        let re_suf = Regex::new(&re_suf).expect("failed to build regex");

        let db = IMDBBuilder::new(opts.conf_dir.clone()).weights(self.rank.weights()).open().await?;
        let extractor =
            HttpExtractor::new(self.extractor.descriptor_service.clone(), self.extractor.timeout())?;

        let paths = block_in_place(|| scan_directory(&self.path, &re_suf));
        info!("扫描到 {} 张图片", paths.len());

        // Ctrl-C 后放弃所有尚未完成的提取，已经写入的图片不受影响
        let (cancel_tx, cancel_rx) = watch::channel(false);
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                let _ = cancel_tx.send(true);
            }
            // 发送端存活到进程结束
            std::future::pending::<()>().await;
        });

        let pb = ProgressBar::new(paths.len() as u64).with_style(pb_style());
        let (added, cancelled, failed) = (AtomicUsize::new(0), AtomicUsize::new(0), AtomicUsize::new(0));

        stream::iter(paths)
            .map(|path| {
                let mut cancel_rx = cancel_rx.clone();
                let (db, extractor, pb) = (&db, &extractor, &pb);
                let (added, cancelled, failed) = (&added, &cancelled, &failed);
                async move {
                    let image = NewImage {
                        filename: path
                            .file_name()
                            .map(|s| s.to_string_lossy().into_owned())
                            .unwrap_or_default(),
                        path: path.to_string_lossy().into_owned(),
                        category: self.category.clone(),
                    };
                    let cancel = async move {
                        let _ = cancel_rx.wait_for(|c| *c).await;
                    };
                    match db.add_image(extractor, image, self.rank.k, cancel).await {
                        Ok(result) => {
                            added.fetch_add(1, Ordering::Relaxed);
                            match result.ranking {
                                Ok(_) => pb.println(format!("[OK] {} {}", result.id, path.display())),
                                Err(e) => {
                                    warn!("图片 {} 排序失败: {}", result.id, e);
                                    pb.println(format!("[OK] {} {} (未排序)", result.id, path.display()))
                                }
                            }
                        }
                        Err(Error::Cancelled) => {
                            cancelled.fetch_add(1, Ordering::Relaxed);
                        }
                        Err(e) => {
                            failed.fetch_add(1, Ordering::Relaxed);
                            pb.println(format!("[ERR] {}: {}", path.display(), e));
                        }
                    }
                    pb.inc(1);
                }
            })
            .buffer_unordered(self.jobs.unwrap_or_else(num_cpus::get).max(1))
            .collect::<()>()
            .await;

        pb.finish_with_message("图片添加完成");
        info!(
            "添加 {} 张，取消 {} 张，失败 {} 张",
            added.load(Ordering::Relaxed),
            cancelled.load(Ordering::Relaxed),
            failed.load(Ordering::Relaxed)
        );

        Ok(())
    }
}
