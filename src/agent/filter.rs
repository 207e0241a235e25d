//! Reply post-processing
//!
//! Runs on every final model reply: leaked role prefixes are stripped,
//! sentences quoting prices are dropped unless the customer asked about
//! price, and the reply is capped to a few sentences for speech.

use std::sync::LazyLock;

use regex::Regex;

/// Role labels the model sometimes echoes at the start of a reply
const ROLE_PREFIXES: &[&str] = &["System:", "சிஸ்டம்:", "Assistant:"];

/// Tamil substrings in the customer's utterance that mean "what does it cost"
const PRICE_QUESTION_KEYWORDS: &[&str] = &["எவ்வளவு", "விலை", "ரேட்"];

/// English price questions, matched as whole words so "separate" is not "rate"
static PRICE_QUESTION_WORDS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(prices?|costs?|amounts?|rates?|how\s+much)\b").expect("valid regex")
});

/// Substrings in a reply sentence that quote a price
const PRICE_MARKERS: &[&str] = &["₹", "ரூபாய்", "ரூபா", "தொகை"];

/// Latin currency words, matched as whole words so "first" is not "rs"
static CURRENCY_WORDS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(rs|inr|rupees?)\b").expect("valid regex"));

/// Remove a leaked role label from the start of the reply
#[must_use]
pub fn strip_role_prefix(reply: &str) -> &str {
    let trimmed = reply.trim_start();
    ROLE_PREFIXES
        .iter()
        .find_map(|prefix| trimmed.strip_prefix(*prefix))
        .map_or(trimmed, str::trim_start)
}

/// Whether the customer's utterance asks about price
#[must_use]
pub fn asks_about_price(user_text: &str) -> bool {
    PRICE_QUESTION_KEYWORDS.iter().any(|k| user_text.contains(k))
        || PRICE_QUESTION_WORDS.is_match(user_text)
}

/// Whether a sentence quotes a price
#[must_use]
pub fn mentions_price(sentence: &str) -> bool {
    PRICE_MARKERS.iter().any(|m| sentence.contains(m))
        || CURRENCY_WORDS.is_match(sentence)
}

/// Drop price sentences unless the customer asked about price
#[must_use]
pub fn filter_prices(user_text: &str, reply: &str) -> String {
    if asks_about_price(user_text) {
        return reply.to_string();
    }

    let kept: Vec<&str> = split_sentences(reply)
        .into_iter()
        .filter(|sentence| {
            let quoted = mentions_price(sentence);
            if quoted {
                tracing::debug!(sentence, "dropping unrequested price");
            }
            !quoted
        })
        .collect();
    kept.join(" ")
}

/// Keep at most `max` sentences
#[must_use]
pub fn cap_sentences(reply: &str, max: usize) -> String {
    split_sentences(reply)
        .into_iter()
        .take(max)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Apply the full post-filter to a final model reply
#[must_use]
pub fn clean_reply(user_text: &str, reply: &str, max_sentences: usize) -> String {
    let stripped = strip_role_prefix(reply);
    let filtered = filter_prices(user_text, stripped);
    cap_sentences(&filtered, max_sentences)
}

/// Split text into trimmed sentences, keeping their terminators
///
/// A terminator only ends a sentence when followed by whitespace or the end
/// of the text, so "2.5" stays whole; "Rs." never ends a sentence.
#[must_use]
pub fn split_sentences(text: &str) -> Vec<&str> {
    let mut sentences = Vec::new();
    let mut start = 0;
    let mut chars = text.char_indices().peekable();

    while let Some((i, c)) = chars.next() {
        if !matches!(c, '.' | '?' | '!' | '।') {
            continue;
        }
        let at_boundary = chars.peek().is_none_or(|(_, next)| next.is_whitespace());
        if !at_boundary || (c == '.' && ends_with_abbreviation(&text[start..i])) {
            continue;
        }

        let end = i + c.len_utf8();
        let sentence = text[start..end].trim();
        if !sentence.is_empty() {
            sentences.push(sentence);
        }
        start = end;
    }

    let rest = text[start..].trim();
    if !rest.is_empty() {
        sentences.push(rest);
    }
    sentences
}

fn ends_with_abbreviation(fragment: &str) -> bool {
    fragment
        .rsplit(|c: char| !c.is_alphanumeric())
        .next()
        .is_some_and(|word| word.eq_ignore_ascii_case("rs"))
}
