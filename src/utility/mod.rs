//! Checks over captured command output.

use regex::Regex;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum ContentCheckError {
    #[error("Can't find in output: {missing:?}")]
    Missing { missing: Vec<String> },

    #[error("Patterns matched more than one line: {repeated:?}")]
    Unexpected { repeated: Vec<String> },

    #[error("Invalid pattern {pattern:?}: {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },
}

pub type Result<T> = std::result::Result<T, ContentCheckError>;

/// Require every pattern in `patterns` to match a line of `buffer`.
///
/// Empty lines and lines containing any of the `escape` substrings are
/// skipped. With `maintain_order` the patterns must match successive lines
/// in the given order, other lines in between being ignored. Without it a
/// pattern listed `n` times must match exactly `n` lines, or at least `n`
/// lines with `match_once_or_more`.
pub fn check_all_required<S: AsRef<str>>(
    buffer: &str,
    patterns: &[S],
    maintain_order: bool,
    match_once_or_more: bool,
    escape: &[S],
) -> Result<()> {
    let lines: Vec<&str> = buffer
        .split('\n')
        .filter(|line| !line.is_empty())
        .filter(|line| !escape.iter().any(|e| line.contains(e.as_ref())))
        .collect();

    let compiled = patterns
        .iter()
        .map(|p| {
            Regex::new(p.as_ref()).map_err(|e| ContentCheckError::InvalidPattern {
                pattern: p.as_ref().to_string(),
                source: e,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    if maintain_order {
        let mut next = 0;
        for line in &lines {
            if next == compiled.len() {
                break;
            }
            if compiled[next].is_match(line) {
                next += 1;
            }
        }

        if next < compiled.len() {
            let missing = patterns[next..].iter().map(|p| p.as_ref().to_string()).collect();
            debug!(searched = patterns.len(), found = next, "Ordered content check failed");
            return Err(ContentCheckError::Missing { missing });
        }
        return Ok(());
    }

    // pattern -> (times listed, compiled regex), in first-listed order
    let mut wanted: Vec<(&str, usize, &Regex)> = Vec::new();
    for (pattern, re) in patterns.iter().zip(&compiled) {
        match wanted.iter_mut().find(|entry| entry.0 == pattern.as_ref()) {
            Some(entry) => entry.1 += 1,
            None => wanted.push((pattern.as_ref(), 1, re)),
        }
    }

    let mut missing = Vec::new();
    let mut repeated = Vec::new();
    for (pattern, listed, re) in wanted {
        let matched = lines.iter().filter(|line| re.is_match(line)).count();
        if matched < listed {
            missing.extend(std::iter::repeat(pattern.to_string()).take(listed - matched));
        } else if matched > listed && !match_once_or_more {
            repeated.push(pattern.to_string());
        }
    }

    if !missing.is_empty() {
        debug!(searched = patterns.len(), missing = missing.len(), "Content check failed");
        return Err(ContentCheckError::Missing { missing });
    }
    if !repeated.is_empty() {
        return Err(ContentCheckError::Unexpected { repeated });
    }
    Ok(())
}
