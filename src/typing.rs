// src/typing.rs
//! Character-by-character reveal paced by a words-per-minute rate.

use std::time::Duration;

use futures::{Stream, StreamExt};
use tokio_util::sync::CancellationToken;

pub const DEFAULT_WPM: u32 = 120;

/// Five characters per word; 120 wpm is 100 ms per character.
pub fn char_delay(wpm: u32) -> Duration {
    let cpm = u64::from(wpm.max(1)) * 5;
    Duration::from_millis(60_000 / cpm)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Typed {
    Finished,
    Cancelled,
}

/// Lazy, finite sequence of characters: each one is yielded, then the next
/// is held back for one character delay.
pub fn typed_chars(text: &str, wpm: u32) -> impl Stream<Item = char> + Send + 'static {
    let chars: Vec<char> = text.chars().collect();
    let delay = char_delay(wpm);
    async_stream::stream! {
        for c in chars {
            yield c;
            tokio::time::sleep(delay).await;
        }
    }
}

/// Reveal `text`, calling `on_char` per character. Checks `cancel` at every
/// suspension point; nothing is called after cancellation.
pub async fn type_text(
    text: &str,
    wpm: u32,
    cancel: &CancellationToken,
    mut on_char: impl FnMut(char),
) -> Typed {
    let chars = typed_chars(text, wpm);
    futures::pin_mut!(chars);
    loop {
        let next = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Typed::Cancelled,
            c = chars.next() => c,
        };
        match next {
            Some(c) => on_char(c),
            None => return Typed::Finished,
        }
    }
}

/// Accumulating wrapper: `on_update` sees the running string after each
/// character; `on_complete` fires once, only if typing finished.
pub async fn type_command(
    text: &str,
    wpm: u32,
    cancel: &CancellationToken,
    mut on_update: impl FnMut(&str),
    on_complete: impl FnOnce(),
) -> Typed {
    let mut acc = String::with_capacity(text.len());
    let outcome = type_text(text, wpm, cancel, |c| {
        acc.push(c);
        on_update(&acc);
    })
    .await;
    if outcome == Typed::Finished {
        on_complete();
    }
    outcome
}
