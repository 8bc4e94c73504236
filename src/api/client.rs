use std::time::Duration;

use async_trait::async_trait;
use reqwest::{
    Client, ClientBuilder,
    header::{CONNECTION, USER_AGENT},
};
use tracing::debug;
use url::Url;

use crate::common::PCS_UA;

use super::error::ApiError;
use super::models::{ApiResponse, LinkData, RemoteEntry};
use super::RemoteFs;

/// 网盘接口的轻量客户端
#[derive(Debug, Clone)]
pub struct PcsClient {
    inner: Client,
    base_url: Url,
    bduss: Option<String>,
}

impl PcsClient {
    pub fn new(base_url: &str, bduss: Option<String>) -> Result<Self, ApiError> {
        let mut base_url =
            Url::parse(base_url).map_err(|e| ApiError::InvalidUrl(e.to_string()))?;
        // Url::join 会吃掉不带斜杠结尾的最后一段
        if !base_url.path().ends_with('/') {
            base_url.set_path(&format!("{}/", base_url.path()));
        }

        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(USER_AGENT, reqwest::header::HeaderValue::from_static(PCS_UA));
        headers.insert(CONNECTION, reqwest::header::HeaderValue::from_static("Keep-Alive"));

        let inner = ClientBuilder::new()
            .timeout(Duration::from_secs(10))
            .default_headers(headers)
            .build()?;

        Ok(Self { inner, base_url, bduss })
    }

    async fn call<T: serde::de::DeserializeOwned>(
        &self,
        method: &str,
        remotepath: &str,
    ) -> Result<T, ApiError> {
        let mut url = self
            .base_url
            .join(method)
            .map_err(|e| ApiError::InvalidUrl(e.to_string()))?;
        url.query_pairs_mut().append_pair("path", remotepath);

        debug!("请求接口: {} {}", method, remotepath);

        let mut req = self.inner.get(url);
        if let Some(bduss) = &self.bduss {
            req = req.header(reqwest::header::COOKIE, format!("BDUSS={};", bduss));
        }

        let resp: ApiResponse<T> = req.send().await?.json().await?;
        if resp.errno != 0 {
            return Err(ApiError::Errno(resp.errno, resp.errmsg));
        }
        resp.data
            .ok_or_else(|| ApiError::InvalidResponse("响应缺少 data 字段".to_string()))
    }
}

#[async_trait]
impl RemoteFs for PcsClient {
    async fn exists(&self, remotepath: &str) -> Result<bool, ApiError> {
        match self.meta(remotepath).await {
            Ok(_) => Ok(true),
            Err(ApiError::NotFound(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }

    async fn meta(&self, remotepath: &str) -> Result<RemoteEntry, ApiError> {
        match self.call::<RemoteEntry>("meta", remotepath).await {
            // 约定: errno 为 -9 表示路径不存在
            Err(ApiError::Errno(-9, _)) => Err(ApiError::NotFound(remotepath.to_string())),
            other => other,
        }
    }

    async fn list(&self, remotedir: &str) -> Result<Vec<RemoteEntry>, ApiError> {
        self.call("list", remotedir).await
    }

    async fn download_link(&self, remotepath: &str) -> Result<Option<String>, ApiError> {
        let data: LinkData = self.call("link", remotepath).await?;
        Ok(data.dlink)
    }

    fn auth_token(&self) -> Option<&str> {
        self.bduss.as_deref()
    }
}
