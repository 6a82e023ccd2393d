use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex};

use lru::LruCache;
use regex::{Regex, RegexBuilder};

use crate::core::{CrudError, Result};

lazy_static::lazy_static! {
    static ref PATTERN_CACHE: Mutex<LruCache<String, Arc<Regex>>> =
        Mutex::new(LruCache::new(NonZeroUsize::new(128).unwrap()));
}

/// Translate a LIKE pattern (`%` any run, `_` any char, `\` escapes) into an
/// anchored regex.
fn like_to_regex(pattern: &str) -> String {
    let mut regex = String::with_capacity(pattern.len() + 2);
    regex.push('^');

    let mut chars = pattern.chars();
    while let Some(c) = chars.next() {
        match c {
            '%' => regex.push_str(".*"),
            '_' => regex.push('.'),
            '\\' => {
                if let Some(escaped) = chars.next() {
                    regex.push_str(&regex::escape(&escaped.to_string()));
                }
            }
            c if ".*+?^${}()|[]\\".contains(c) => {
                regex.push('\\');
                regex.push(c);
            }
            c => regex.push(c),
        }
    }

    regex.push('$');
    regex
}

/// Wildcard-free and prefix patterns short-circuit without regex.
fn fast_path(text: &str, pattern: &str, case_insensitive: bool) -> Option<bool> {
    if pattern.contains('\\') || pattern.contains('_') {
        return None;
    }

    if !pattern.contains('%') {
        return Some(if case_insensitive {
            text.eq_ignore_ascii_case(pattern)
        } else {
            text == pattern
        });
    }

    if pattern.ends_with('%') && !pattern[..pattern.len() - 1].contains('%') {
        let prefix = &pattern[..pattern.len() - 1];
        return Some(if case_insensitive {
            text.to_lowercase().starts_with(&prefix.to_lowercase())
        } else {
            text.starts_with(prefix)
        });
    }

    None
}

fn compiled(pattern: &str, case_insensitive: bool) -> Result<Arc<Regex>> {
    let cache_key = if case_insensitive {
        format!("i:{}", pattern)
    } else {
        format!("s:{}", pattern)
    };

    {
        let mut cache = PATTERN_CACHE.lock()?;
        if let Some(regex) = cache.get(&cache_key) {
            return Ok(Arc::clone(regex));
        }
    }

    let regex = RegexBuilder::new(&like_to_regex(pattern))
        .case_insensitive(case_insensitive)
        .build()
        .map_err(|e| CrudError::TypeMismatch(format!("Invalid LIKE pattern: {e}")))?;
    let regex = Arc::new(regex);

    let mut cache = PATTERN_CACHE.lock()?;
    cache.put(cache_key, Arc::clone(&regex));

    Ok(regex)
}

/// Evaluate `text LIKE pattern`, case-insensitively for ILIKE.
pub fn like_match(text: &str, pattern: &str, case_insensitive: bool) -> Result<bool> {
    if let Some(result) = fast_path(text, pattern, case_insensitive) {
        return Ok(result);
    }
    Ok(compiled(pattern, case_insensitive)?.is_match(text))
}
