//! Code-aware tokenizer feeding the BM25F encoder.
//!
//! Two stages: Unicode word extraction (ASCII identifier runs, Hangul, kana,
//! CJK ideograph runs), then identifier splitting for the ASCII runs
//! (snake_case, SCREAMING_SNAKE, kebab-case, camelCase, PascalCase). ASCII
//! output is lowercased; CJK tokens are preserved verbatim. Single-character
//! ASCII tokens are dropped, single-character CJK tokens are kept.
//!
//! The same identifier appears millions of times in a large repository, so
//! identifier splits go through a process-wide bounded cache.

use crate::constants::IDENTIFIER_CACHE_CAPACITY;
use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, OnceLock};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Script {
    Ascii,
    Hangul,
    Kana,
    Cjk,
}

fn classify(c: char) -> Option<Script> {
    match c {
        'a'..='z' | 'A'..='Z' | '0'..='9' | '_' | '-' => Some(Script::Ascii),
        '\u{AC00}'..='\u{D7A3}' | '\u{1100}'..='\u{11FF}' | '\u{3130}'..='\u{318F}' => {
            Some(Script::Hangul)
        }
        '\u{3040}'..='\u{309F}' | '\u{30A0}'..='\u{30FF}' => Some(Script::Kana),
        '\u{4E00}'..='\u{9FFF}' => Some(Script::Cjk),
        _ => None,
    }
}

/// Tokenize text with identifier splitting and multi-script support.
/// Deterministic and pure: equal inputs yield equal outputs in every process.
pub fn tokenize_text(text: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut word = String::new();
    let mut script: Option<Script> = None;

    for c in text.chars() {
        let current = classify(c);
        match current {
            Some(s) if Some(s) == script => word.push(c),
            Some(s) => {
                flush_word(&mut word, script, &mut tokens);
                script = Some(s);
                word.push(c);
            }
            None => {
                flush_word(&mut word, script, &mut tokens);
                script = None;
            }
        }
    }
    flush_word(&mut word, script, &mut tokens);
    tokens
}

fn flush_word(word: &mut String, script: Option<Script>, tokens: &mut Vec<String>) {
    if word.is_empty() {
        return;
    }
    match script {
        Some(Script::Ascii) => {
            for part in split_identifier(word) {
                // Single-character ASCII tokens carry no signal.
                if part.chars().count() > 1 {
                    tokens.push(part);
                }
            }
        }
        Some(_) => tokens.push(std::mem::take(word)),
        None => {}
    }
    word.clear();
}

/// Split a code identifier into lowercase parts, going through the cache.
///
/// Fast paths check for `_` then `-` delimiters before the camel-case walk:
/// `get_user_by_id` → [get, user, by, id]; `user-profile-view` →
/// [user, profile, view]; `HTTPHandler` → [http, handler].
pub fn split_identifier(identifier: &str) -> Vec<String> {
    if identifier.is_empty() {
        return Vec::new();
    }
    if let Some(cached) = cache_get(identifier) {
        return cached;
    }

    let parts: Vec<String> = if identifier.contains('_') {
        identifier
            .split('_')
            .filter(|p| !p.is_empty())
            .map(str::to_lowercase)
            .collect()
    } else if identifier.contains('-') {
        identifier
            .split('-')
            .filter(|p| !p.is_empty())
            .map(str::to_lowercase)
            .collect()
    } else {
        split_camel(identifier)
    };

    cache_insert(identifier, &parts);
    parts
}

/// Camel/Pascal split: a boundary falls between a lowercase-or-digit and an
/// uppercase, and before the last uppercase of an uppercase run followed by
/// lowercase (`HTTPHandler` → HTTP | Handler).
fn split_camel(identifier: &str) -> Vec<String> {
    let chars: Vec<char> = identifier.chars().collect();
    let mut parts = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        if c.is_ascii_lowercase() {
            let start = i;
            while i < chars.len() && chars[i].is_ascii_lowercase() {
                i += 1;
            }
            parts.push(chars[start..i].iter().collect::<String>());
        } else if c.is_ascii_digit() {
            let start = i;
            while i < chars.len() && chars[i].is_ascii_digit() {
                i += 1;
            }
            parts.push(chars[start..i].iter().collect::<String>());
        } else if c.is_ascii_uppercase() {
            let start = i;
            while i < chars.len() && chars[i].is_ascii_uppercase() {
                i += 1;
            }
            // An uppercase run followed by lowercase donates its last
            // character to the next word.
            if i < chars.len() && chars[i].is_ascii_lowercase() && i - start > 1 {
                parts.push(chars[start..i - 1].iter().collect::<String>().to_lowercase());
                i -= 1;
            } else if i < chars.len() && chars[i].is_ascii_lowercase() {
                // Single uppercase starting a word: consume the tail too.
                let word_start = start;
                while i < chars.len() && chars[i].is_ascii_lowercase() {
                    i += 1;
                }
                parts.push(chars[word_start..i].iter().collect::<String>().to_lowercase());
            } else {
                parts.push(chars[start..i].iter().collect::<String>().to_lowercase());
            }
        } else {
            // `_` and `-` are handled by the fast paths; anything else here
            // is a separator.
            i += 1;
        }
    }

    parts.iter().map(|p| p.to_lowercase()).collect()
}

struct IdentifierCache {
    map: HashMap<String, Vec<String>>,
    order: VecDeque<String>,
}

static IDENT_CACHE: OnceLock<Mutex<IdentifierCache>> = OnceLock::new();

fn ident_cache() -> &'static Mutex<IdentifierCache> {
    IDENT_CACHE.get_or_init(|| {
        Mutex::new(IdentifierCache {
            map: HashMap::new(),
            order: VecDeque::new(),
        })
    })
}

fn cache_get(identifier: &str) -> Option<Vec<String>> {
    // Best-effort: a poisoned lock just means a cache miss.
    let cache = ident_cache().lock().ok()?;
    cache.map.get(identifier).cloned()
}

fn cache_insert(identifier: &str, parts: &[String]) {
    let Ok(mut cache) = ident_cache().lock() else {
        return;
    };
    if cache.map.contains_key(identifier) {
        return;
    }
    while cache.map.len() >= IDENTIFIER_CACHE_CAPACITY {
        let Some(evicted) = cache.order.pop_front() else {
            break;
        };
        cache.map.remove(&evicted);
    }
    cache.order.push_back(identifier.to_string());
    cache.map.insert(identifier.to_string(), parts.to_vec());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn camel_case_splits() {
        assert_eq!(split_identifier("getUserById"), ["get", "user", "by", "id"]);
        assert_eq!(split_identifier("HTTPHandler"), ["http", "handler"]);
        assert_eq!(split_identifier("handleHTTPRequest"), ["handle", "http", "request"]);
        assert_eq!(split_identifier("PascalCase"), ["pascal", "case"]);
    }

    #[test]
    fn delimiter_splits() {
        assert_eq!(
            split_identifier("get_user_by_id"),
            ["get", "user", "by", "id"]
        );
        assert_eq!(
            split_identifier("MAX_RETRY_COUNT"),
            ["max", "retry", "count"]
        );
        assert_eq!(
            split_identifier("user-profile-view"),
            ["user", "profile", "view"]
        );
    }

    #[test]
    fn digits_form_their_own_parts() {
        assert_eq!(split_identifier("base64Encode"), ["base", "64", "encode"]);
        assert_eq!(split_identifier("utf8"), ["utf", "8"]);
    }

    #[test]
    fn tokenize_drops_single_char_ascii_but_keeps_cjk() {
        assert_eq!(tokenize_text("getUserById"), ["get", "user", "by", "id"]);
        assert_eq!(tokenize_text("x = y + z"), Vec::<String>::new());
        assert_eq!(tokenize_text("사용자 인증"), ["사용자", "인증"]);
        assert_eq!(tokenize_text("値"), ["値"]);
    }

    #[test]
    fn tokenize_mixes_scripts() {
        assert_eq!(
            tokenize_text("handleHTTPRequest in 인증시스템"),
            ["handle", "http", "request", "in", "인증시스템"]
        );
    }

    #[test]
    fn tokenize_is_deterministic() {
        let input = "OrderService.processOrder(MAX_RETRY_COUNT, user-profile-view)";
        assert_eq!(tokenize_text(input), tokenize_text(input));
    }

    #[test]
    fn punctuation_is_dropped() {
        assert_eq!(
            tokenize_text("fn calculate_tax(amount: f64) -> f64"),
            // `->` survives word extraction as an ASCII run, then splits to
            // nothing; `fn`, `f64` fragments follow the identifier rules.
            ["fn", "calculate", "tax", "amount", "64", "64"]
        );
    }
}
