use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use tglog_core::{
    bot::{BotClient, DocumentRequest},
    domain::{Destination, Level},
    record::LogRecord,
    routing::RoutingTable,
    target::LogTarget,
    transport::{
        port::ApiTransport,
        types::{ApiRequest, ApiResponse},
    },
    Error, Result,
};

#[derive(Default)]
struct FakeTelegram {
    calls: Mutex<Vec<ApiRequest>>,
    reply: Option<&'static str>,
}

impl FakeTelegram {
    fn calls(&self) -> Vec<ApiRequest> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ApiTransport for FakeTelegram {
    async fn call(&self, req: ApiRequest) -> Result<ApiResponse> {
        self.calls.lock().unwrap().push(req);
        let body = self.reply.unwrap_or(r#"{"ok":true,"result":{"message_id":1}}"#);
        Ok(ApiResponse::from_body(true, body))
    }
}

fn dest(s: &str) -> Destination {
    Destination::new(s).unwrap()
}

fn bot(t: Arc<FakeTelegram>) -> BotClient {
    let routing = RoutingTable::new(dest("000")).with_override("orders", dest("111"));
    BotClient::new(t, routing)
}

#[tokio::test]
async fn small_group_is_sent_as_one_combined_message() {
    let t = Arc::new(FakeTelegram::default());
    let target = LogTarget::new(bot(t.clone()));
    let records = vec![
        LogRecord::new(Level::Info, "orders", "order #1 created").at(0.0),
        LogRecord::new(Level::Error, "orders", "order #2 failed").at(60.0),
    ];

    target.export(&records).await.unwrap();

    let calls = t.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].field("chat_id"), Some("111"));
    assert_eq!(
        calls[0].field("text"),
        Some(
            "<code>1970-01-01 00:00:00 [INFO][orders]</code>\norder #1 created\n\
<code>1970-01-01 00:01:00 [ERROR][orders]</code>\norder #2 failed"
        )
    );
}

#[tokio::test]
async fn large_group_is_sent_record_by_record() {
    let t = Arc::new(FakeTelegram::default());
    let target = LogTarget::new(bot(t.clone()));
    let records: Vec<_> = (0..5)
        .map(|i| LogRecord::new(Level::Warning, "alerts", format!("alert {i}")).at(0.0))
        .collect();

    target.export(&records).await.unwrap();

    let calls = t.calls();
    assert_eq!(calls.len(), 5);
    for (i, call) in calls.iter().enumerate() {
        assert_eq!(call.field("chat_id"), Some("000"));
        let text = call.field("text").unwrap();
        assert!(text.ends_with(&format!("\nalert {i}")), "{text}");
        assert_eq!(text.matches("[WARNING][alerts]").count(), 1);
    }
}

#[tokio::test]
async fn long_message_is_split_into_three_calls() {
    let t = Arc::new(FakeTelegram::default());
    let bot = bot(t.clone());
    let text = "m".repeat(9000);

    let responses = bot.send_message(&dest("111"), &text).await.unwrap();

    assert_eq!(responses.len(), 3);
    let texts: Vec<String> = t
        .calls()
        .iter()
        .map(|c| c.field("text").unwrap().to_string())
        .collect();
    assert_eq!(
        texts.iter().map(|s| s.chars().count()).collect::<Vec<_>>(),
        vec![4096, 4096, 808]
    );
    assert_eq!(texts.concat(), text);
}

#[tokio::test]
async fn document_without_payload_fails_before_any_call() {
    let t = Arc::new(FakeTelegram::default());
    let bot = bot(t.clone());

    let err = bot.send_document(DocumentRequest::default()).await.unwrap_err();

    assert!(matches!(err, Error::Argument(_)));
    assert!(t.calls().is_empty());
}

#[tokio::test]
async fn api_error_surfaces_description() {
    let t = Arc::new(FakeTelegram {
        reply: Some(r#"{"error_code": 400, "description": "Bad Request: chat not found"}"#),
        ..Default::default()
    });
    let target = LogTarget::new(bot(t.clone()));

    let err = target
        .export(&[LogRecord::new(Level::Error, "orders", "x")])
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Api(_)));
    assert!(err.to_string().contains("Bad Request: chat not found"));
}
