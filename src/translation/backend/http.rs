//! HTTP 翻译能力
//!
//! 对接 DeepLX 风格的 JSON 接口：`POST {text, source_lang, target_lang}`，
//! 返回 `{code, data}`。接口本身无状态，会话只记录语言对。

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::{Availability, ProgressSender, TranslatorCapability, TranslatorSession};
use crate::translation::config::constants;
use crate::translation::error::{TranslationError, TranslationResult};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// 翻译请求
#[derive(Debug, Serialize)]
struct TranslateRequest<'a> {
    text: &'a str,
    source_lang: String,
    target_lang: String,
}

/// 翻译响应
#[derive(Debug, Deserialize)]
struct TranslateResponse {
    code: u16,
    #[serde(default)]
    data: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

/// 把 BCP-47 标签转换为接口使用的语言代码
pub fn api_language_code(tag: &str) -> String {
    match tag {
        "" | constants::AUTO_LANG | constants::UNDETERMINED_LANG => "auto".to_string(),
        "zh-Hans" | "zh-CN" | "zh" => "ZH".to_string(),
        "zh-Hant" | "zh-TW" => "ZH-HANT".to_string(),
        other => other
            .split(['-', '_'])
            .next()
            .unwrap_or(other)
            .to_ascii_uppercase(),
    }
}

#[derive(Clone)]
pub struct HttpCapability {
    client: Client,
    api_url: String,
}

impl HttpCapability {
    pub fn new(api_url: &str) -> TranslationResult<Self> {
        let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            client,
            api_url: api_url.to_string(),
        })
    }

    pub fn api_url(&self) -> &str {
        &self.api_url
    }
}

#[async_trait]
impl TranslatorCapability for HttpCapability {
    async fn availability(&self, _source: &str, target: &str) -> TranslationResult<Availability> {
        if target.is_empty() || target == constants::AUTO_LANG {
            return Ok(Availability::Unavailable);
        }
        Ok(Availability::Available)
    }

    async fn create(
        &self,
        source: &str,
        target: &str,
        progress: Option<ProgressSender>,
    ) -> TranslationResult<Arc<dyn TranslatorSession>> {
        if let Some(progress) = progress {
            let _ = progress.send(1.0);
        }
        Ok(Arc::new(HttpSession {
            client: self.client.clone(),
            api_url: self.api_url.clone(),
            source: source.to_string(),
            target: target.to_string(),
        }))
    }
}

pub struct HttpSession {
    client: Client,
    api_url: String,
    source: String,
    target: String,
}

impl HttpSession {
    async fn request(
        client: Client,
        api_url: String,
        text: String,
        source: String,
        target: String,
    ) -> TranslationResult<String> {
        let body = TranslateRequest {
            text: &text,
            source_lang: api_language_code(&source),
            target_lang: api_language_code(&target),
        };

        let response = client.post(&api_url).json(&body).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(TranslationError::Backend(format!("HTTP {}", status)));
        }

        let parsed: TranslateResponse = response.json().await?;
        if parsed.code != 200 {
            return Err(TranslationError::Backend(format!(
                "API错误 {}: {}",
                parsed.code,
                parsed.message.unwrap_or_default()
            )));
        }
        parsed
            .data
            .ok_or_else(|| TranslationError::Backend("响应缺少译文".to_string()))
    }
}

#[async_trait]
impl TranslatorSession for HttpSession {
    fn source_language(&self) -> &str {
        &self.source
    }

    fn target_language(&self) -> &str {
        &self.target
    }

    async fn measure_input_usage(&self, text: &str) -> TranslationResult<usize> {
        Ok(text.chars().count())
    }

    fn translate_streaming(&self, text: &str) -> BoxStream<'static, TranslationResult<String>> {
        let request = Self::request(
            self.client.clone(),
            self.api_url.clone(),
            text.to_string(),
            self.source.clone(),
            self.target.clone(),
        );
        stream::once(request).boxed()
    }

    fn destroy(&self) {}
}
