use std::{env, fs, path::Path, path::PathBuf, time::Duration};

use crate::{
    domain::Destination, errors::Error, routing::RoutingTable, target::DEFAULT_GROUP_THRESHOLD,
    trace_file::TraceFileSink, Result,
};

pub const DEFAULT_API_BASE: &str = "https://api.telegram.org/bot";

/// Typed configuration, read from the environment (and `.env`).
#[derive(Clone, Debug)]
pub struct Config {
    // Credentials / routing
    pub telegram_bot_token: String,
    pub default_chat_id: Destination,
    pub category_targets: Vec<(String, Destination)>,

    // Transport
    pub api_base: String,
    pub http_timeout: Duration,

    // Export behavior
    pub group_threshold: usize,
    pub message_prefix: Option<String>,

    // Trace files
    pub trace_dir: Option<PathBuf>,
    pub trace_url: Option<String>,
}

impl Config {
    pub fn load() -> Result<Self> {
        load_dotenv_if_present(Path::new(".env"));
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build a config from any key lookup (env, map in tests, ...).
    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let telegram_bot_token = get("TELEGRAM_BOT_TOKEN")
            .and_then(non_empty)
            .ok_or_else(|| {
                Error::Config("TELEGRAM_BOT_TOKEN environment variable is required".to_string())
            })?;

        let default_chat_id = get("TELEGRAM_DEFAULT_CHAT_ID")
            .and_then(non_empty)
            .ok_or_else(|| {
                Error::Config(
                    "TELEGRAM_DEFAULT_CHAT_ID environment variable is required".to_string(),
                )
            })
            .and_then(Destination::new)?;

        let category_targets = parse_targets(get("TELEGRAM_CATEGORY_TARGETS"))?;

        let api_base = get("TELEGRAM_API_BASE")
            .and_then(non_empty)
            .unwrap_or_else(|| DEFAULT_API_BASE.to_string());
        let http_timeout = Duration::from_millis(
            parse_num(&get, "TELEGRAM_HTTP_TIMEOUT_MS")?.unwrap_or(10_000),
        );

        let group_threshold = parse_num(&get, "TELEGRAM_GROUP_THRESHOLD")?
            .map(|n| n as usize)
            .unwrap_or(DEFAULT_GROUP_THRESHOLD);
        let message_prefix = get("TELEGRAM_MESSAGE_PREFIX").and_then(non_empty);

        let trace_dir = get("TELEGRAM_TRACE_DIR").and_then(non_empty).map(PathBuf::from);
        let trace_url = get("TELEGRAM_TRACE_URL").and_then(non_empty);
        if trace_dir.is_some() != trace_url.is_some() {
            return Err(Error::Config(
                "TELEGRAM_TRACE_DIR and TELEGRAM_TRACE_URL must be set together".to_string(),
            ));
        }

        Ok(Self {
            telegram_bot_token,
            default_chat_id,
            category_targets,
            api_base,
            http_timeout,
            group_threshold,
            message_prefix,
            trace_dir,
            trace_url,
        })
    }

    pub fn routing(&self) -> RoutingTable {
        self.category_targets
            .iter()
            .fold(RoutingTable::new(self.default_chat_id.clone()), |t, (c, d)| {
                t.with_override(c.clone(), d.clone())
            })
    }

    /// Where large attachments go; `None` keeps them inline.
    pub fn trace_sink(&self) -> Option<TraceFileSink> {
        match (&self.trace_dir, &self.trace_url) {
            (Some(dir), Some(url)) => Some(TraceFileSink::new(dir.clone(), url.as_str())),
            _ => None,
        }
    }
}

/// `orders=111,alerts=@ops` → [(orders, 111), (alerts, @ops)].
fn parse_targets(v: Option<String>) -> Result<Vec<(String, Destination)>> {
    let v = v.unwrap_or_default();
    let mut out = Vec::new();
    for item in v.split(',').map(|s| s.trim()).filter(|s| !s.is_empty()) {
        let Some((category, dest)) = item.split_once('=') else {
            return Err(Error::Config(format!(
                "TELEGRAM_CATEGORY_TARGETS entry `{item}` is not `category=chat`"
            )));
        };
        out.push((category.trim().to_string(), Destination::new(dest)?));
    }
    Ok(out)
}

fn parse_num(get: &impl Fn(&str) -> Option<String>, key: &str) -> Result<Option<u64>> {
    match get(key).and_then(non_empty) {
        None => Ok(None),
        Some(s) => s
            .trim()
            .parse::<u64>()
            .map(Some)
            .map_err(|_| Error::Config(format!("{key} must be a non-negative integer, got `{s}`"))),
    }
}

fn load_dotenv_if_present(path: &Path) {
    let Ok(contents) = fs::read_to_string(path) else {
        return;
    };
    for (key, val) in dotenv_entries(&contents, |k| env::var_os(k).is_some()) {
        env::set_var(key, val);
    }
}

/// `KEY=value` pairs from a `.env` body, skipping keys `is_set` already has.
/// Blank lines and `#` comments are ignored; one pair of matching quotes is
/// stripped from the value.
fn dotenv_entries(contents: &str, is_set: impl Fn(&str) -> bool) -> Vec<(String, String)> {
    contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(|line| line.split_once('='))
        .map(|(k, v)| (k.trim(), v.trim()))
        .filter(|(k, _)| !k.is_empty() && !is_set(k))
        .map(|(k, v)| (k.to_string(), unquote(v).to_string()))
        .collect()
}

fn unquote(v: &str) -> &str {
    for q in ['"', '\''] {
        if let Some(inner) = v.strip_prefix(q).and_then(|rest| rest.strip_suffix(q)) {
            return inner;
        }
    }
    v
}

fn non_empty(s: String) -> Option<String> {
    if s.trim().is_empty() {
        None
    } else {
        Some(s)
    }
}
