//! Bot API transport (reqwest).
//!
//! This crate implements the `tglog-core` ApiTransport port over HTTPS.
//! `sendMessage` goes out as an urlencoded form, `sendDocument` as multipart
//! with the file in the `document` field.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use tracing::debug;

use tglog_core::{
    config::Config,
    errors::Error,
    transport::{
        port::ApiTransport,
        types::{ApiMethod, ApiRequest, ApiResponse},
    },
    Result,
};

#[derive(Clone, Debug)]
pub struct HttpTransport {
    http: reqwest::Client,
    /// `{api_base}{token}`; kept out of logs and errors.
    endpoint: String,
}

impl HttpTransport {
    pub fn new(api_base: &str, token: &str, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Config(format!("http client build failed: {e}")))?;
        Ok(Self {
            http,
            endpoint: format!("{api_base}{token}"),
        })
    }

    pub fn from_config(cfg: &Config) -> Result<Self> {
        Self::new(&cfg.api_base, &cfg.telegram_bot_token, cfg.http_timeout)
    }

    fn url(&self, method: ApiMethod) -> String {
        format!("{}/{}", self.endpoint, method.as_str())
    }

    fn map_err(method: ApiMethod, e: reqwest::Error) -> Error {
        // The URL embeds the bot token.
        Error::Transport(format!("{} failed: {}", method.as_str(), e.without_url()))
    }
}

#[async_trait]
impl ApiTransport for HttpTransport {
    async fn call(&self, req: ApiRequest) -> Result<ApiResponse> {
        let ApiRequest {
            method,
            fields,
            document,
        } = req;

        let builder = self.http.post(self.url(method));
        let builder = match document {
            None => builder.form(&fields),
            Some(doc) => {
                let mut form = Form::new();
                for (k, v) in fields {
                    form = form.text(k, v);
                }
                form = form.part("document", Part::bytes(doc.bytes).file_name(doc.file_name));
                builder.multipart(form)
            }
        };

        let resp = builder
            .send()
            .await
            .map_err(|e| Self::map_err(method, e))?;
        let status = resp.status();
        let body = resp.text().await.map_err(|e| Self::map_err(method, e))?;
        debug!(method = method.as_str(), %status, "telegram response");

        Ok(ApiResponse::from_body(status.is_success(), body))
    }
}
