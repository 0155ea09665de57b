use std::convert::Infallible;
use std::path::Path;
use std::str::FromStr;

use anyhow::{Context, Result};
use clap::ValueEnum;
use indicatif::ProgressStyle;
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::db::ImageSummary;
use crate::imdb::ScoredImage;

pub fn pb_style() -> ProgressStyle {
    ProgressStyle::default_bar()
        .template("[{elapsed_precise}] {bar:40.cyan/blue} {pos:>7}/{len:7} {msg}")
        .expect("invalid progress bar template")
}

/// 读取 JSON 文件
pub fn read_json<T: DeserializeOwned>(path: impl AsRef<Path>) -> Result<T> {
    let path = path.as_ref();
    let data = std::fs::read(path).with_context(|| format!("无法读取 {}", path.display()))?;
    serde_json::from_slice(&data).with_context(|| format!("无法解析 {}", path.display()))
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Json,
    Table,
}

impl FromStr for OutputFormat {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "json" => Ok(Self::Json),
            _ => Ok(Self::Table),
        }
    }
}

impl OutputFormat {
    pub fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
        println!("{}", serde_json::to_string_pretty(value)?);
        Ok(())
    }

    pub fn print_summaries(&self, result: &[ImageSummary]) -> Result<()> {
        match self {
            OutputFormat::Json => Self::print_json(result),
            OutputFormat::Table => {
                for image in result {
                    println!("{}\t{}\t{}", image.id, image.category, image.path);
                }
                Ok(())
            }
        }
    }

    pub fn print_scored(&self, result: &[ScoredImage]) -> Result<()> {
        match self {
            OutputFormat::Json => Self::print_json(result),
            OutputFormat::Table => {
                for scored in result {
                    let d = match scored.dissimilarity.is_finite() {
                        true => format!("{:.4}", scored.dissimilarity),
                        false => "inf".to_string(),
                    };
                    println!("{}\t{}\t{}\t{}", d, scored.image.id, scored.image.category, scored.image.path);
                }
                Ok(())
            }
        }
    }
}
