//! Splitting long messages into Bot API sized pieces.

/// Telegram's limit for one `sendMessage` text, in characters.
pub const MAX_MESSAGE_LENGTH: usize = 4096;

/// Longer messages are cut to this many characters before splitting.
pub const MAX_TOTAL_LENGTH: usize = MAX_MESSAGE_LENGTH * 5;

/// Split `text` into chunks of at most `max_chunk` characters.
///
/// Text longer than `max_chunk` is first cut to `max_total` characters; the
/// dropped tail is not reported. Lengths are counted in Unicode scalar
/// values, so a multi-byte character is never split. Always returns at least
/// one chunk (an empty input yields `[""]`).
pub fn split_message(text: &str, max_chunk: usize, max_total: usize) -> Vec<String> {
    let max_chunk = max_chunk.max(1);
    let size = text.chars().count();
    if size <= max_chunk {
        return vec![text.to_string()];
    }

    let mut out = Vec::with_capacity(size.min(max_total).div_ceil(max_chunk));
    let mut cur = String::new();
    let mut cur_len = 0usize;

    for ch in text.chars().take(max_total) {
        if cur_len == max_chunk {
            out.push(std::mem::take(&mut cur));
            cur_len = 0;
        }
        cur.push(ch);
        cur_len += 1;
    }
    if !cur.is_empty() {
        out.push(cur);
    }
    out
}

/// [`split_message`] with the Bot API limits.
pub fn split_for_telegram(text: &str) -> Vec<String> {
    split_message(text, MAX_MESSAGE_LENGTH, MAX_TOTAL_LENGTH)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_message_is_single_chunk() {
        assert_eq!(split_for_telegram("hello"), vec!["hello".to_string()]);
        let exact = "a".repeat(MAX_MESSAGE_LENGTH);
        assert_eq!(split_for_telegram(&exact), vec![exact]);
    }

    #[test]
    fn empty_message_is_one_empty_chunk() {
        assert_eq!(split_for_telegram(""), vec![String::new()]);
    }

    #[test]
    fn long_message_splits_exactly() {
        let text = "b".repeat(9000);
        let chunks = split_for_telegram(&text);
        let lens: Vec<usize> = chunks.iter().map(|c| c.chars().count()).collect();
        assert_eq!(lens, vec![4096, 4096, 808]);
        assert_eq!(chunks.concat(), text);
    }

    #[test]
    fn chunk_count_is_ceiling_for_all_lengths_in_range() {
        for len in [4097, 8192, 8193, 12_288, 20_479, 20_480] {
            let text = "z".repeat(len);
            let chunks = split_for_telegram(&text);
            assert_eq!(chunks.len(), len.div_ceil(MAX_MESSAGE_LENGTH), "len {len}");
            assert!(chunks.iter().all(|c| c.chars().count() <= MAX_MESSAGE_LENGTH));
            assert_eq!(chunks.concat(), text);
        }
    }

    #[test]
    fn multibyte_characters_are_never_split() {
        // 3 bytes, 2 bytes and 4 bytes per character.
        let text = "€ж😀".repeat(3000);
        let chunks = split_for_telegram(&text);
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0].chars().count(), 4096);
        assert_eq!(chunks[1].chars().count(), 4096);
        assert_eq!(chunks[2].chars().count(), 808);
        assert_eq!(chunks.concat(), text);
    }

    #[test]
    fn oversized_message_is_truncated_first() {
        let text = "q".repeat(30_000);
        let chunks = split_for_telegram(&text);
        assert_eq!(chunks.len(), 5);
        assert!(chunks.iter().all(|c| c.len() == MAX_MESSAGE_LENGTH));
        assert_eq!(chunks.concat().chars().count(), MAX_TOTAL_LENGTH);
    }

    #[test]
    fn custom_limits() {
        assert_eq!(split_message("abcdefg", 3, 6), vec!["abc", "def"]);
    }
}
