use std::collections::BTreeMap;

use grep_matcher::{Match, Matcher};
use grep_regex::{RegexMatcher, RegexMatcherBuilder};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::signature::{Patterns, Signature};

/// Longest excerpt of the offending line kept in a finding.
pub const EXCERPT_CHARS: usize = 80;

#[derive(Error, Debug)]
pub enum ScanError {
    #[error("Invalid signature pattern: {0}")]
    InvalidPattern(String),
}

/// Signatures detected on one raw line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntegrityFinding {
    /// 1-based line number in the input.
    pub line_number: usize,
    pub excerpt: String,
    pub signatures: Vec<Signature>,
    pub description: String,
}

/// Per-signature hit counts over a whole scan.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IntegritySummary {
    pub lines_with_findings: usize,
    pub counts: BTreeMap<Signature, usize>,
}

impl IntegritySummary {
    pub fn from_findings(findings: &[IntegrityFinding]) -> Self {
        let mut counts = BTreeMap::new();
        for finding in findings {
            for sig in &finding.signatures {
                *counts.entry(*sig).or_insert(0) += 1;
            }
        }
        Self {
            lines_with_findings: findings.len(),
            counts,
        }
    }

    pub fn is_clean(&self) -> bool {
        self.lines_with_findings == 0
    }

    /// Signatures ordered by descending hit count.
    pub fn ranked(&self) -> Vec<(Signature, usize)> {
        let mut ranked: Vec<_> = self.counts.iter().map(|(s, n)| (*s, *n)).collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
        ranked
    }
}

/// Checks raw log lines for signs of concurrent-writer corruption.
///
/// All patterns are compiled once; scanning never alters the input and
/// never influences decoding.
pub struct IntegrityScanner {
    timestamp: RegexMatcher,
    corrupted_timestamp: RegexMatcher,
    ap_tag: RegexMatcher,
    tag_malformed: RegexMatcher,
    data_tag_mixed: RegexMatcher,
    data_no_separator: RegexMatcher,
    word_pair: RegexMatcher,
    trailing_numeral: RegexMatcher,
    trailing_hex: RegexMatcher,
    register_index: RegexMatcher,
}

fn build(pattern: &str, case_insensitive: bool) -> Result<RegexMatcher, ScanError> {
    RegexMatcherBuilder::new()
        .case_insensitive(case_insensitive)
        .multi_line(false)
        .build(pattern)
        .map_err(|e| ScanError::InvalidPattern(e.to_string()))
}

fn count(matcher: &RegexMatcher, line: &[u8]) -> usize {
    let mut n = 0;
    let _ = matcher.find_iter(line, |_| {
        n += 1;
        true
    });
    n
}

fn first(matcher: &RegexMatcher, line: &[u8]) -> Option<Match> {
    matcher.find(line).ok().flatten()
}

fn text(line: &[u8], m: Match) -> String {
    String::from_utf8_lossy(&line[m]).into_owned()
}

impl IntegrityScanner {
    pub fn new() -> Result<Self, ScanError> {
        Ok(Self {
            timestamp: build(Patterns::TIMESTAMP, false)?,
            corrupted_timestamp: build(Patterns::CORRUPTED_TIMESTAMP, false)?,
            ap_tag: build(Patterns::AP_TAG, true)?,
            tag_malformed: build(Patterns::TAG_MALFORMED, true)?,
            data_tag_mixed: build(Patterns::DATA_TAG_MIXED, false)?,
            data_no_separator: build(Patterns::DATA_NO_SEPARATOR, false)?,
            word_pair: build(Patterns::WORD_PAIR, false)?,
            trailing_numeral: build(Patterns::TRAILING_NUMERAL, false)?,
            trailing_hex: build(Patterns::TRAILING_HEX, false)?,
            register_index: build(Patterns::REGISTER_INDEX, false)?,
        })
    }

    /// Test one raw line. Returns `None` when no signature matched.
    pub fn check_line(&self, line_number: usize, line: &str) -> Option<IntegrityFinding> {
        let bytes = line.as_bytes();
        let mut hits: Vec<(Signature, String)> = Vec::new();

        let timestamps = count(&self.timestamp, bytes);
        if timestamps > 1 {
            hits.push((Signature::DuplicateTimestamp, format!("{} timestamps on one line", timestamps)));
        }

        if let Some(m) = first(&self.corrupted_timestamp, bytes) {
            hits.push((Signature::CorruptedTimestamp, format!("corrupted timestamp: {}", text(bytes, m))));
        }

        let tags = count(&self.ap_tag, bytes);
        if tags > 1 {
            hits.push((Signature::LineMerged, format!("{} [ap] tags, lines merged", tags)));
        }

        if self.tag_malformed.is_match(bytes).unwrap_or(false) {
            hits.push((Signature::TagMalformed, "malformed [ap] tag".to_string()));
        }

        if let Some(m) = self.data_tag_mixed_match(bytes) {
            hits.push((Signature::DataTagMixed, format!("data mixed with tag: {}", text(bytes, m))));
        }

        if let Some(m) = first(&self.data_no_separator, bytes) {
            hits.push((Signature::DataNoSeparator, format!("data without separator: {}", text(bytes, m))));
        }

        let pairs = count(&self.word_pair, bytes);
        if pairs > 1 {
            hits.push((Signature::MultipleCommands, format!("{} command pairs on one line", pairs)));
        }

        if let Some(numeral) = self.truncated_numeral(bytes) {
            hits.push((Signature::DataTruncated, format!("data possibly truncated: '{}'", numeral)));
        }

        if hits.is_empty() {
            return None;
        }

        let (signatures, descriptions): (Vec<_>, Vec<_>) = hits.into_iter().unzip();
        Some(IntegrityFinding {
            line_number,
            excerpt: excerpt(line),
            signatures,
            description: descriptions.join("; "),
        })
    }

    /// Scan every line of `text`, numbering from 1.
    pub fn scan(&self, text: &str) -> Vec<IntegrityFinding> {
        let findings: Vec<_> = text
            .lines()
            .enumerate()
            .filter_map(|(i, line)| self.check_line(i + 1, line))
            .collect();
        tracing::debug!(findings = findings.len(), "Integrity scan complete");
        findings
    }

    /// First `0xXXXXXXXX[` whose bracket does not open a `0x` index.
    fn data_tag_mixed_match(&self, bytes: &[u8]) -> Option<Match> {
        let mut found = None;
        let _ = self.data_tag_mixed.find_iter(bytes, |m| {
            if bytes[m.end()..].starts_with(b"0x") {
                true
            } else {
                found = Some(m);
                false
            }
        });
        found
    }

    fn truncated_numeral(&self, bytes: &[u8]) -> Option<String> {
        let m = first(&self.trailing_numeral, bytes)?;
        if self.trailing_hex.is_match(bytes).unwrap_or(false) {
            return None;
        }
        if self.register_index.is_match(bytes).unwrap_or(false) {
            return None;
        }
        Some(text(bytes, m).trim().to_string())
    }
}

fn excerpt(line: &str) -> String {
    let trimmed = line.trim();
    if trimmed.chars().count() > EXCERPT_CHARS {
        let cut: String = trimmed.chars().take(EXCERPT_CHARS).collect();
        format!("{}...", cut)
    } else {
        trimmed.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scanner() -> IntegrityScanner {
        IntegrityScanner::new().expect("Failed to build scanner")
    }

    fn signatures(line: &str) -> Vec<Signature> {
        scanner()
            .check_line(1, line)
            .map(|f| f.signatures)
            .unwrap_or_default()
    }

    #[test]
    fn test_clean_line_has_no_finding() {
        let line = "[12/24 06:22:56] [51] [ap] 0x30010A00 0x00000100";
        assert!(scanner().check_line(1, line).is_none());
    }

    #[test]
    fn test_merged_lines() {
        let line = "[12/24 06:22:56] [ap] 0x30010A00 0x00000100[12/24 06:22:56] [ap] 0x40000003 0x00000000";
        let sigs = signatures(line);
        assert!(sigs.contains(&Signature::DuplicateTimestamp));
        assert!(sigs.contains(&Signature::LineMerged));
        assert!(sigs.contains(&Signature::DataTagMixed));
        assert!(sigs.contains(&Signature::MultipleCommands));
    }

    #[test]
    fn test_corrupted_timestamp() {
        let sigs = signatures("[12/24 06:22:562/24 06:22:56] [ap] 0x30010A00 0x00000100");
        assert!(sigs.contains(&Signature::CorruptedTimestamp));
    }

    #[test]
    fn test_tag_malformed_case_insensitive() {
        assert_eq!(signatures("[51][AP] 0x30010A00 0x00000100"), vec![Signature::TagMalformed]);
    }

    #[test]
    fn test_data_no_separator() {
        let sigs = signatures("[ap] 0x300100000x30010A02");
        assert!(sigs.contains(&Signature::DataNoSeparator));
    }

    #[test]
    fn test_register_index_not_mixed() {
        // `0x00000450[0x...` is a register dump, not a corrupted tag.
        assert!(signatures("[ap] 0x00000450[0x1] = 0x00000000").is_empty());
    }

    #[test]
    fn test_truncated_numeral() {
        let finding = scanner().check_line(7, "[ap] 0x30010A00 0x000001 12").unwrap();
        assert_eq!(finding.signatures, vec![Signature::DataTruncated]);
        assert_eq!(finding.line_number, 7);
        assert!(finding.description.contains("'12'"));
    }

    #[test]
    fn test_truncated_numeral_excluded_for_register_arrays() {
        assert!(signatures("[ap] 0x450[3] = 7 12").is_empty());
    }

    #[test]
    fn test_excerpt_truncated() {
        let long = format!("[ap] {}", "0x30010A00 0x00000100 ".repeat(6));
        let finding = scanner().check_line(1, &long).unwrap();
        assert!(finding.excerpt.ends_with("..."));
        assert_eq!(finding.excerpt.chars().count(), EXCERPT_CHARS + 3);
    }

    #[test]
    fn test_scan_numbers_lines_and_summarizes() {
        let text = "ok line\n[ap][ap] x\n0x300100000x30010A02\n";
        let findings = scanner().scan(text);
        assert_eq!(findings.len(), 2);
        assert_eq!(findings[0].line_number, 2);
        assert_eq!(findings[1].line_number, 3);

        let summary = IntegritySummary::from_findings(&findings);
        assert_eq!(summary.lines_with_findings, 2);
        assert_eq!(summary.counts.get(&Signature::LineMerged), Some(&1));
        assert!(!summary.is_clean());
    }
}
