//! Export cycle: group records per destination and hand them to the bot.

use std::{collections::HashMap, sync::Arc};

use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::debug;

use crate::{
    bot::BotClient,
    domain::Destination,
    formatting::{format_record, FormatOptions},
    pipeline::RecordBuffer,
    record::LogRecord,
    Result,
};

/// Groups of at most this many records go out as one combined message.
pub const DEFAULT_GROUP_THRESHOLD: usize = 3;

/// One async lock per destination, so concurrent exports keep per-chat order.
#[derive(Default)]
pub struct DestinationLocks {
    inner: Mutex<HashMap<Destination, Arc<Mutex<()>>>>,
}

impl DestinationLocks {
    pub async fn lock(&self, dest: &Destination) -> OwnedMutexGuard<()> {
        let lock = {
            let mut map = self.inner.lock().await;
            map.entry(dest.clone())
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .clone()
        };
        lock.lock_owned().await
    }
}

pub struct LogTarget {
    bot: BotClient,
    format: FormatOptions,
    group_threshold: usize,
    locks: DestinationLocks,
    buffer: Option<RecordBuffer>,
}

impl LogTarget {
    pub fn new(bot: BotClient) -> Self {
        Self {
            bot,
            format: FormatOptions::default(),
            group_threshold: DEFAULT_GROUP_THRESHOLD,
            locks: DestinationLocks::default(),
            buffer: None,
        }
    }

    pub fn with_format(mut self, format: FormatOptions) -> Self {
        self.format = format;
        self
    }

    pub fn with_group_threshold(mut self, threshold: usize) -> Self {
        self.group_threshold = threshold;
        self
    }

    /// Attach the buffer filled by the host pipeline; see [`Self::flush`].
    pub fn with_buffer(mut self, buffer: RecordBuffer) -> Self {
        self.buffer = Some(buffer);
        self
    }

    pub fn bot(&self) -> &BotClient {
        &self.bot
    }

    /// Forward a batch of records.
    ///
    /// Records are grouped by destination (groups ordered by first
    /// appearance, records by arrival). A group no larger than the threshold
    /// is joined with `\n` into one message, a bigger one is sent record by
    /// record. The first failure is returned; what was already sent stays sent.
    pub async fn export(&self, records: &[LogRecord]) -> Result<()> {
        let mut groups: Vec<(Destination, Vec<&LogRecord>)> = Vec::new();
        let mut index: HashMap<&str, usize> = HashMap::new();

        for rec in records {
            let dest = self.bot.target(&rec.category);
            match index.get(dest.as_str()) {
                Some(&i) => groups[i].1.push(rec),
                None => {
                    index.insert(dest.as_str(), groups.len());
                    groups.push((dest.clone(), vec![rec]));
                }
            }
        }

        for (dest, recs) in groups {
            let messages = recs
                .iter()
                .map(|r| format_record(r, &self.format))
                .collect::<Vec<_>>();

            let _guard = self.locks.lock(&dest).await;
            if messages.len() <= self.group_threshold {
                debug!(chat = %dest, records = messages.len(), "exporting combined message");
                self.bot.send_message(&dest, &messages.join("\n")).await?;
            } else {
                debug!(chat = %dest, records = messages.len(), "exporting messages one by one");
                for message in &messages {
                    self.bot.send_message(&dest, message).await?;
                }
            }
        }
        Ok(())
    }

    /// Drain the attached buffer and export it. Returns the record count.
    pub async fn flush(&self) -> Result<usize> {
        let Some(buffer) = &self.buffer else {
            return Ok(0);
        };
        let records = buffer.drain();
        if records.is_empty() {
            return Ok(0);
        }
        self.export(&records).await?;
        Ok(records.len())
    }
}
