use std::future::Future;
use std::time::Duration;

use log::{debug, warn};
use reqwest::{Client, StatusCode};
use serde::Serialize;
use thiserror::Error;

use crate::descriptor::DescriptorVector;
use crate::metrics;

/// 描述符服务调用失败
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("请求描述符服务失败: {0}")]
    Request(#[from] reqwest::Error),
    #[error("描述符服务返回错误 {0}: {1}")]
    Status(StatusCode, String),
}

/// 外部描述符提取服务
pub trait DescriptorExtractor {
    /// 计算 `image_path` 处图片的描述符
    fn calculate(
        &self,
        image_path: &str,
    ) -> impl Future<Output = Result<DescriptorVector, ExtractError>> + Send;
}

/// 通过 HTTP 调用的描述符服务
///
/// `POST <endpoint>/calculate_descriptors {"image_path": ...}`
#[derive(Debug, Clone)]
pub struct HttpExtractor {
    client: Client,
    endpoint: String,
}

#[derive(Serialize)]
struct CalculateRequest<'a> {
    image_path: &'a str,
}

impl HttpExtractor {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self, ExtractError> {
        let client = Client::builder().timeout(timeout).build()?;
        let endpoint = endpoint.into().trim_end_matches('/').to_string();
        Ok(Self { client, endpoint })
    }
}

impl DescriptorExtractor for HttpExtractor {
    async fn calculate(&self, image_path: &str) -> Result<DescriptorVector, ExtractError> {
        let url = format!("{}/calculate_descriptors", self.endpoint);
        debug!("请求描述符服务: {} {}", url, image_path);

        let response = self.client.post(&url).json(&CalculateRequest { image_path }).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ExtractError::Status(status, body));
        }

        Ok(response.json().await?)
    }
}

/// 描述符提取结果
#[derive(Debug, Clone, PartialEq)]
pub enum Extraction {
    /// 提取完成，服务不可用时为空描述符
    Ready(DescriptorVector),
    /// 调用方已取消
    Cancelled,
}

/// 提取描述符，失败时退化为空描述符
///
/// `cancel` 先于服务返回完成时放弃本次请求，此时调用方不应写入任何数据，
/// 以免旧请求覆盖更新的结果。
pub async fn extract_or_empty<E, C>(extractor: &E, image_path: &str, cancel: C) -> Extraction
where
    E: DescriptorExtractor + ?Sized,
    C: Future<Output = ()>,
{
    tokio::select! {
        biased;
        _ = cancel => {
            debug!("描述符提取已取消: {}", image_path);
            Extraction::Cancelled
        }
        result = extractor.calculate(image_path) => match result {
            Ok(descriptors) => Extraction::Ready(descriptors),
            Err(e) => {
                warn!("描述符提取失败，使用空描述符: {}: {}", image_path, e);
                metrics::inc_extract_failure();
                Extraction::Ready(DescriptorVector::empty())
            }
        },
    }
}
