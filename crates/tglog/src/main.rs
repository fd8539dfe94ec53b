use std::{path::PathBuf, sync::Arc};

use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, BufReader};

use tglog_core::{
    bot::{BotClient, DocumentRequest, SendOptions},
    config::Config,
    domain::{Destination, Level, ParseMode},
    formatting::FormatOptions,
    logger::{LogContext, RequestInfo},
    record::LogRecord,
    target::LogTarget,
};
use tglog_telegram::HttpTransport;

/// Forward messages and logs to Telegram.
#[derive(Parser, Debug)]
#[command(name = "tglog", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Send one message.
    Send {
        text: String,
        /// Chat id or @channel; defaults to TELEGRAM_DEFAULT_CHAT_ID.
        #[arg(long)]
        to: Option<String>,
        #[arg(long)]
        markdown: bool,
        /// Send as a single call even if the text is too long.
        #[arg(long)]
        no_split: bool,
        /// Append process details (host, user, command line). Stored as a
        /// trace file when TELEGRAM_TRACE_DIR/TELEGRAM_TRACE_URL are set.
        #[arg(long)]
        process_info: bool,
    },
    /// Upload a file as a document.
    Document {
        path: PathBuf,
        #[arg(long)]
        to: Option<String>,
        #[arg(long)]
        caption: Option<String>,
        #[arg(long)]
        filename: Option<String>,
    },
    /// Read lines from stdin and export them as log records.
    Pipe {
        #[arg(long, default_value = "app")]
        category: String,
        #[arg(long, default_value = "info")]
        level: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tglog_core::logging::init("tglog")?;
    let cli = Cli::parse();

    let cfg = Config::load()?;
    let transport = Arc::new(HttpTransport::from_config(&cfg)?);
    let bot = BotClient::new(transport, cfg.routing());

    match cli.command {
        Command::Send {
            text,
            to,
            markdown,
            no_split,
            process_info,
        } => {
            let dest = resolve(&bot, to)?;
            let mut ctx = LogContext::new();
            if process_info {
                ctx.with_request_data(&RequestInfo::from_process(), cfg.trace_sink().as_ref())?;
            }
            let text = format!("{text}{}", ctx.take_lines());
            let opts = SendOptions {
                parse_mode: if markdown {
                    ParseMode::Markdown
                } else {
                    ParseMode::Html
                },
                auto_split: !no_split,
                ..Default::default()
            };
            let sent = bot.send_message_with(&dest, &text, &opts).await?;
            tracing::info!(chat = %dest, calls = sent.len(), "message sent");
        }
        Command::Document {
            path,
            to,
            caption,
            filename,
        } => {
            let mut req = DocumentRequest::from_file(path);
            req.destination = to.map(Destination::new).transpose()?;
            req.caption = caption;
            req.filename = filename;
            bot.send_document(req).await?;
            tracing::info!("document sent");
        }
        Command::Pipe { category, level } => {
            let level = Level::parse(&level)
                .ok_or_else(|| anyhow::anyhow!("unknown level `{level}`"))?;
            let target = LogTarget::new(bot)
                .with_group_threshold(cfg.group_threshold)
                .with_format(FormatOptions {
                    prefix: cfg.message_prefix.clone(),
                    ..Default::default()
                });

            let mut records = Vec::new();
            let mut lines = BufReader::new(tokio::io::stdin()).lines();
            while let Some(line) = lines.next_line().await? {
                if line.trim().is_empty() {
                    continue;
                }
                records.push(LogRecord::new(level, category.clone(), line));
            }
            target.export(&records).await?;
            tracing::info!(records = records.len(), "exported");
        }
    }

    Ok(())
}

fn resolve(bot: &BotClient, to: Option<String>) -> anyhow::Result<Destination> {
    Ok(match to {
        Some(id) => Destination::new(id)?,
        None => bot.routing().default_destination().clone(),
    })
}
