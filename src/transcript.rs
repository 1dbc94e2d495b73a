//! Consumer-side chat log.
//!
//! Turns parsed [`InboundMessage`]s into display entries: each gets a
//! stable id and is classified as the user's own line, a reply from the
//! other party, or a system notice. Messages whose digest was already
//! recorded are skipped, so a server re-broadcast after reconnect does
//! not duplicate lines. Links to YouTube videos are picked out so a
//! front end can embed them.

// ============================================================================
// Imports
// ============================================================================

use std::sync::LazyLock;

use regex::Regex;
use rustc_hash::FxHashSet;

use crate::identifiers::Digest;
use crate::protocol::InboundMessage;

// ============================================================================
// Slugs
// ============================================================================

/// Runs of whitespace.
static WHITESPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());

/// Anything that is not a word character or dash.
static NON_WORD: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[^\w\-]+").unwrap());

/// Consecutive dashes.
static DASHES: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"-{2,}").unwrap());

/// Converts text into a lowercase dash-separated slug.
///
/// ```
/// use chat_channel::transcript::slugify;
///
/// assert_eq!(slugify("  Hello, World!  "), "hello-world");
/// ```
#[must_use]
pub fn slugify(text: &str) -> String {
    let lower = text.to_lowercase();
    let dashed = WHITESPACE.replace_all(&lower, "-");
    let cleaned = NON_WORD.replace_all(&dashed, "");
    let collapsed = DASHES.replace_all(&cleaned, "-");
    collapsed.trim_matches('-').to_owned()
}

// ============================================================================
// Video Links
// ============================================================================

/// `https://youtu.be/<id>` share links.
static SHORT_VIDEO: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"https://youtu\.be/(\w+)").unwrap());

/// `https://www.youtube.com/watch?v=<id>` links.
static LONG_VIDEO: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"https://www\.youtube\.com/watch\?v=(\w+)").unwrap());

/// A YouTube video referenced from a chat line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoLink {
    /// Video id, e.g. `fd6clpIvrfg`.
    pub id: String,
    /// The link as it appeared in the text.
    pub link: String,
    /// Embeddable player URL.
    pub embed_url: String,
}

/// Finds the first YouTube link in `text`.
///
/// Short `youtu.be` links win over `watch?v=` links.
///
/// ```
/// use chat_channel::transcript::extract_video;
///
/// let video = extract_video("look https://youtu.be/fd6clpIvrfg").unwrap();
/// assert_eq!(video.embed_url, "https://www.youtube.com/embed/fd6clpIvrfg");
/// ```
#[must_use]
pub fn extract_video(text: &str) -> Option<VideoLink> {
    let captures = SHORT_VIDEO
        .captures(text)
        .or_else(|| LONG_VIDEO.captures(text))?;

    let id = captures[1].to_owned();
    Some(VideoLink {
        link: captures[0].to_owned(),
        embed_url: format!("https://www.youtube.com/embed/{id}"),
        id,
    })
}

// ============================================================================
// Entry
// ============================================================================

/// How an entry relates to the local user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    /// Sent by the local user.
    Own,
    /// Sent by someone else.
    Reply,
    /// Sent by the server.
    Notice,
}

/// One displayed chat line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    /// Slug of the text followed by the receive timestamp.
    pub id: String,
    /// Message body.
    pub text: String,
    /// Display name of the sender.
    pub from: String,
    /// Avatar URL, empty when the sender has none.
    pub avatar: String,
    /// Read-receipt digest, empty for unreceipted messages.
    pub digest: Digest,
    /// Own line, reply or notice.
    pub kind: EntryKind,
    /// First YouTube link in the text.
    pub video: Option<VideoLink>,
}

// ============================================================================
// Transcript
// ============================================================================

/// Ordered log of received chat lines.
///
/// Unbounded by default: entries and the digests used for dedup grow for
/// the life of the transcript. [`with_limit`](Self::with_limit) keeps only
/// the newest entries and forgets the digests of evicted ones.
#[derive(Debug, Clone, Default)]
pub struct Transcript {
    username: String,
    entries: Vec<Entry>,
    seen: FxHashSet<Digest>,
    limit: Option<usize>,
}

impl Transcript {
    /// Creates an empty transcript for `username`.
    #[must_use]
    pub fn new(username: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            ..Self::default()
        }
    }

    /// Creates an empty transcript that keeps at most `limit` entries.
    ///
    /// A `limit` of zero is treated as one.
    #[must_use]
    pub fn with_limit(username: impl Into<String>, limit: usize) -> Self {
        Self {
            limit: Some(limit.max(1)),
            ..Self::new(username)
        }
    }

    /// Appends a received message.
    ///
    /// `received_at_ms` makes the entry id unique for repeated texts.
    /// Returns `None` if a message with the same non-empty digest was
    /// already recorded.
    pub fn push(&mut self, message: InboundMessage, received_at_ms: u64) -> Option<&Entry> {
        if !message.digest.is_empty() && !self.seen.insert(message.digest.clone()) {
            return None;
        }

        let kind = if message.is_system() {
            EntryKind::Notice
        } else if message.from == self.username {
            EntryKind::Own
        } else {
            EntryKind::Reply
        };

        self.entries.push(Entry {
            id: format!("{}{received_at_ms}", slugify(&message.message)),
            video: extract_video(&message.message),
            text: message.message,
            from: message.from,
            avatar: message.avatar,
            digest: message.digest,
            kind,
        });
        self.evict();
        self.entries.last()
    }

    /// Entries in arrival order.
    #[inline]
    #[must_use]
    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn evict(&mut self) {
        let Some(limit) = self.limit else { return };
        let excess = self.entries.len().saturating_sub(limit);

        for entry in self.entries.drain(..excess) {
            self.seen.remove(&entry.digest);
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn message(from: &str, text: &str, digest: &str) -> InboundMessage {
        InboundMessage {
            from_id: None,
            from: from.to_owned(),
            message: text.to_owned(),
            avatar: String::new(),
            digest: Digest::new(digest),
        }
    }

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("Hello World"), "hello-world");
        assert_eq!(slugify("--a  --  b--"), "a-b");
        assert_eq!(slugify("What's up?"), "whats-up");
        assert_eq!(slugify(""), "");
    }

    #[test]
    fn test_classification() {
        let mut transcript = Transcript::new("ada");

        let own = transcript.push(message("ada", "hi", "d1"), 1).unwrap().kind;
        let reply = transcript.push(message("bob", "hey", "d2"), 2).unwrap().kind;
        let notice = transcript
            .push(message(crate::protocol::SYSTEM_SENDER, "bob left", "d3"), 3)
            .unwrap()
            .kind;

        assert_eq!(own, EntryKind::Own);
        assert_eq!(reply, EntryKind::Reply);
        assert_eq!(notice, EntryKind::Notice);
        assert_eq!(transcript.len(), 3);
    }

    #[test]
    fn test_entry_id() {
        let mut transcript = Transcript::new("ada");
        let entry = transcript
            .push(message("bob", "Good Morning!", "d1"), 1_700_000_000_000)
            .unwrap();
        assert_eq!(entry.id, "good-morning1700000000000");
    }

    #[test]
    fn test_duplicate_digest_skipped() {
        let mut transcript = Transcript::new("ada");
        assert!(transcript.push(message("bob", "one", "same"), 1).is_some());
        assert!(transcript.push(message("bob", "one", "same"), 2).is_none());
        assert_eq!(transcript.len(), 1);
    }

    #[test]
    fn test_empty_digest_never_deduped() {
        let mut transcript = Transcript::new("ada");
        assert!(transcript.push(message("bob", "one", ""), 1).is_some());
        assert!(transcript.push(message("bob", "one", ""), 2).is_some());
        assert_eq!(transcript.entries()[1].id, "one2");
    }

    #[test]
    fn test_limit_evicts_oldest_and_forgets_digest() {
        let mut transcript = Transcript::with_limit("ada", 2);
        transcript.push(message("bob", "one", "d1"), 1);
        transcript.push(message("bob", "two", "d2"), 2);
        transcript.push(message("bob", "three", "d3"), 3);

        let texts: Vec<_> = transcript.entries().iter().map(|e| e.text.as_str()).collect();
        assert_eq!(texts, vec!["two", "three"]);

        // d1 was evicted, so it is accepted again; d3 is still known
        assert!(transcript.push(message("bob", "one", "d1"), 4).is_some());
        assert!(transcript.push(message("bob", "three", "d3"), 5).is_none());
        assert_eq!(transcript.len(), 2);
    }

    #[test]
    fn test_extract_video_short_and_long() {
        let short = extract_video("see https://youtu.be/fd6clpIvrfg now").unwrap();
        assert_eq!(short.id, "fd6clpIvrfg");
        assert_eq!(short.link, "https://youtu.be/fd6clpIvrfg");

        let long = extract_video("https://www.youtube.com/watch?v=abc_123&t=5").unwrap();
        assert_eq!(long.id, "abc_123");
        assert_eq!(long.embed_url, "https://www.youtube.com/embed/abc_123");

        assert!(extract_video("https://vimeo.com/123").is_none());
    }

    #[test]
    fn test_entry_carries_video() {
        let mut transcript = Transcript::new("ada");
        let entry = transcript
            .push(message("bob", "https://youtu.be/xyz", "d1"), 1)
            .unwrap();
        assert_eq!(entry.video.as_ref().map(|v| v.id.as_str()), Some("xyz"));
    }
}
