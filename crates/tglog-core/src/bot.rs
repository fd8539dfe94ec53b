//! Bot API client: message chunking, document upload and response checks.

use std::{path::PathBuf, sync::Arc};

use tracing::{debug, warn};

use crate::{
    chunking::{split_message, MAX_MESSAGE_LENGTH, MAX_TOTAL_LENGTH},
    domain::{Destination, ParseMode},
    errors::Error,
    formatting::strip_markup,
    routing::RoutingTable,
    transport::{
        port::ApiTransport,
        types::{ApiMethod, ApiRequest, ApiResponse, DocumentPart, ExtraPayload},
    },
    Result,
};

const DEFAULT_DOCUMENT_NAME: &str = "document.txt";

/// Per-call options for [`BotClient::send_message_with`].
#[derive(Clone, Debug)]
pub struct SendOptions {
    pub parse_mode: ParseMode,
    pub extra: ExtraPayload,
    /// Split text longer than one message into several calls.
    pub auto_split: bool,
}

impl Default for SendOptions {
    fn default() -> Self {
        Self {
            parse_mode: ParseMode::Html,
            extra: ExtraPayload::new(),
            auto_split: true,
        }
    }
}

/// Arguments of a `sendDocument` call. Exactly one of `content` / `file`
/// must be set.
#[derive(Clone, Debug, Default)]
pub struct DocumentRequest {
    pub destination: Option<Destination>,
    pub content: Option<Vec<u8>>,
    pub file: Option<PathBuf>,
    pub filename: Option<String>,
    pub caption: Option<String>,
    pub extra: ExtraPayload,
}

impl DocumentRequest {
    pub fn from_content(content: impl Into<Vec<u8>>) -> Self {
        Self {
            content: Some(content.into()),
            ..Default::default()
        }
    }

    pub fn from_file(path: impl Into<PathBuf>) -> Self {
        Self {
            file: Some(path.into()),
            ..Default::default()
        }
    }

    pub fn to(mut self, dest: Destination) -> Self {
        self.destination = Some(dest);
        self
    }

    pub fn filename(mut self, name: impl Into<String>) -> Self {
        self.filename = Some(name.into());
        self
    }

    pub fn caption(mut self, caption: impl Into<String>) -> Self {
        self.caption = Some(caption.into());
        self
    }
}

#[derive(Clone)]
pub struct BotClient {
    transport: Arc<dyn ApiTransport>,
    routing: RoutingTable,
    max_chunk: usize,
    max_total: usize,
}

impl BotClient {
    pub fn new(transport: Arc<dyn ApiTransport>, routing: RoutingTable) -> Self {
        Self {
            transport,
            routing,
            max_chunk: MAX_MESSAGE_LENGTH,
            max_total: MAX_TOTAL_LENGTH,
        }
    }

    pub fn routing(&self) -> &RoutingTable {
        &self.routing
    }

    /// Destination for a log category.
    pub fn target(&self, category: &str) -> &Destination {
        self.routing.resolve(category)
    }

    /// Send HTML text with auto-splitting. See [`Self::send_message_with`].
    pub async fn send_message(&self, dest: &Destination, text: &str) -> Result<Vec<serde_json::Value>> {
        self.send_message_with(dest, text, &SendOptions::default())
            .await
    }

    /// Send a message, returning the decoded body of every call made.
    ///
    /// Markup outside the allow-list is stripped first. With `auto_split`,
    /// long text is posted as consecutive chunks; the first failing chunk
    /// aborts the rest. Without it, exactly one call is made whatever the
    /// length. Text that is empty after stripping is not sent.
    pub async fn send_message_with(
        &self,
        dest: &Destination,
        text: &str,
        opts: &SendOptions,
    ) -> Result<Vec<serde_json::Value>> {
        let text = strip_markup(text);
        if text.trim().is_empty() {
            debug!(chat = %dest, "skipping empty message");
            return Ok(Vec::new());
        }

        let mut base = ApiRequest::new(ApiMethod::SendMessage);
        base.set("chat_id", dest.as_str());
        base.set("parse_mode", opts.parse_mode.as_api_str());
        base.merge(&opts.extra);

        let chunks = if opts.auto_split {
            split_message(&text, self.max_chunk, self.max_total)
        } else {
            vec![text]
        };

        let total = chunks.len();
        let mut out = Vec::with_capacity(total);
        for (idx, chunk) in chunks.into_iter().enumerate() {
            let mut req = base.clone();
            req.set("text", chunk);
            debug!(chat = %dest, chunk = idx + 1, total, "sendMessage");
            let resp = self.transport.call(req).await?;
            out.push(validate(resp)?);
        }
        Ok(out)
    }

    /// Upload a document. Without a destination the default one is used.
    pub async fn send_document(&self, req: DocumentRequest) -> Result<serde_json::Value> {
        let DocumentRequest {
            destination,
            content,
            file,
            filename,
            caption,
            extra,
        } = req;

        let (bytes, file_name) = match (content, file) {
            (Some(bytes), None) => (
                bytes,
                filename.unwrap_or_else(|| DEFAULT_DOCUMENT_NAME.to_string()),
            ),
            (None, Some(path)) => {
                let bytes = tokio::fs::read(&path).await?;
                let name = filename.unwrap_or_else(|| {
                    path.file_name()
                        .and_then(|s| s.to_str())
                        .unwrap_or(DEFAULT_DOCUMENT_NAME)
                        .to_string()
                });
                (bytes, name)
            }
            (None, None) => {
                return Err(Error::Argument(
                    "sendDocument requires `content` or `file`".to_string(),
                ))
            }
            (Some(_), Some(_)) => {
                return Err(Error::Argument(
                    "sendDocument takes either `content` or `file`, not both".to_string(),
                ))
            }
        };

        let dest = destination.unwrap_or_else(|| self.routing.default_destination().clone());

        let mut api = ApiRequest::new(ApiMethod::SendDocument);
        api.set("chat_id", dest.as_str());
        api.merge(&extra);
        if let Some(caption) = caption {
            api.set("caption", strip_markup(&caption));
            api.set("parse_mode", ParseMode::Html.as_api_str());
        }
        api.document = Some(DocumentPart {
            file_name,
            bytes,
        });

        debug!(chat = %dest, "sendDocument");
        let resp = self.transport.call(api).await?;
        validate(resp)
    }
}

fn is_set(v: &serde_json::Value) -> bool {
    match v {
        serde_json::Value::Null => false,
        serde_json::Value::Bool(b) => *b,
        serde_json::Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(true),
        serde_json::Value::String(s) => !s.is_empty() && s != "0",
        serde_json::Value::Array(xs) => !xs.is_empty(),
        serde_json::Value::Object(m) => !m.is_empty(),
    }
}

/// Turn a response carrying a non-empty `error_code` into `Error::Api`.
pub fn validate(resp: ApiResponse) -> Result<serde_json::Value> {
    let failed = resp.decoded.get("error_code").map(is_set).unwrap_or(false);
    if !failed {
        return Ok(resp.decoded);
    }

    let description = resp
        .decoded
        .get("description")
        .and_then(|d| d.as_str())
        .filter(|d| !d.is_empty())
        .map(|d| d.to_string())
        .unwrap_or(resp.raw_body);
    warn!(error = %description, "telegram api rejected request");
    Err(Error::Api(description))
}
