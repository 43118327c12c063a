use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::decode::{DecodeSession, ImageDraw, OpcodeClass};
use crate::integrity::{IntegrityFinding, IntegritySummary};
use crate::memory::{LocatedBuffer, RenderTarget};
use crate::regs::RegisterNote;

/// Everything known about one analyzed input.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Report {
    /// Where the input came from: a file path, `<string>`, `<stdin>`.
    pub source: String,
    pub generated_at: DateTime<Utc>,
    pub session: DecodeSession,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub integrity: Option<IntegrityReport>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub registers: Vec<RegisterNote>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub buffer: Option<LocatedBuffer>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub render_target: Option<RenderTarget>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IntegrityReport {
    pub summary: IntegritySummary,
    pub findings: Vec<IntegrityFinding>,
}

/// Per-segment numbers for the summary table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SegmentStats {
    pub name: String,
    pub address: Option<u32>,
    pub size: Option<u32>,
    pub total: usize,
    pub anomalous: usize,
    pub classes: BTreeMap<OpcodeClass, usize>,
}

/// Aggregates over all image draws.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ImageStats {
    pub draws: usize,
    pub by_format: BTreeMap<String, usize>,
    pub by_blend: BTreeMap<String, usize>,
    pub total_bytes: u64,
    /// Source addresses drawn more than once.
    pub repeated_sources: usize,
}

impl ImageStats {
    pub fn collect(draws: &[ImageDraw]) -> Self {
        let mut stats = Self {
            draws: draws.len(),
            ..Default::default()
        };
        let mut sources: BTreeMap<u32, usize> = BTreeMap::new();

        for draw in draws {
            *stats.by_format.entry(draw.src_format.clone()).or_insert(0) += 1;
            *stats.by_blend.entry(draw.blend_mode.clone()).or_insert(0) += 1;
            *sources.entry(draw.src_address).or_insert(0) += 1;
            stats.total_bytes += draw.source_bytes();
        }
        stats.repeated_sources = sources.values().filter(|n| **n > 1).count();
        stats
    }
}

impl Report {
    pub fn new(source: impl Into<String>, session: DecodeSession) -> Self {
        Self {
            source: source.into(),
            generated_at: Utc::now(),
            session,
            ..Default::default()
        }
    }

    pub fn with_integrity(mut self, findings: Vec<IntegrityFinding>) -> Self {
        self.integrity = Some(IntegrityReport {
            summary: IntegritySummary::from_findings(&findings),
            findings,
        });
        self
    }

    pub fn with_registers(mut self, notes: Vec<RegisterNote>) -> Self {
        self.registers = notes;
        self
    }

    pub fn with_buffer(mut self, buffer: LocatedBuffer) -> Self {
        self.buffer = Some(buffer);
        self
    }

    pub fn with_render_target(mut self, target: RenderTarget) -> Self {
        self.render_target = Some(target);
        self
    }

    pub fn segment_stats(&self) -> Vec<SegmentStats> {
        self.session
            .segments
            .iter()
            .map(|segment| {
                let mut classes = BTreeMap::new();
                for instruction in &segment.instructions {
                    *classes.entry(instruction.class).or_insert(0) += 1;
                }
                SegmentStats {
                    name: segment.name.clone(),
                    address: segment.address,
                    size: segment.size,
                    total: segment.instructions.len(),
                    anomalous: segment.anomalous().count(),
                    classes,
                }
            })
            .collect()
    }

    pub fn image_stats(&self) -> ImageStats {
        ImageStats::collect(&self.session.image_draws)
    }

    pub fn anomaly_count(&self) -> usize {
        self.session.anomalous().count()
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decode::{CommandDecoder, CommandWord};

    fn session() -> DecodeSession {
        let bytes: Vec<u8> = [
            (0x3001_0A29, 0x2000_0000),
            (0x3001_0A2B, 0x0000_0100),
            (0x4000_0001, 0),
            (0x0010_0010, 0x0010_0010),
            (0x3001_0A29, 0x2000_0000),
            (0x4000_0001, 0),
            (0x0010_0010, 0x0010_0010),
            (0x5000_0000, 0),
        ]
        .iter()
        .flat_map(|&(c, d)| CommandWord::new(c, d).to_le_bytes())
        .collect();
        CommandDecoder::default().decode_buffer("buf", &bytes, None)
    }

    #[test]
    fn test_segment_stats() {
        let report = Report::new("test", session());
        let stats = report.segment_stats();
        assert_eq!(stats.len(), 1);
        assert_eq!(stats[0].total, 6);
        assert_eq!(stats[0].anomalous, 1);
        assert_eq!(stats[0].classes[&OpcodeClass::Data], 2);
        assert_eq!(report.anomaly_count(), 1);
    }

    #[test]
    fn test_image_stats() {
        let stats = Report::new("test", session()).image_stats();
        assert_eq!(stats.draws, 2);
        assert_eq!(stats.repeated_sources, 1);
        assert_eq!(stats.by_blend["SRC_OVER"], 2);
    }

    #[test]
    fn test_json_omits_empty_sections() {
        let json = Report::new("test", DecodeSession::default()).to_json().unwrap();
        assert!(json.contains("\"source\": \"test\""));
        assert!(!json.contains("integrity"));
        assert!(!json.contains("render_target"));
    }

    #[test]
    fn test_with_integrity_summarizes() {
        let report = Report::new("test", DecodeSession::default()).with_integrity(Vec::new());
        assert!(report.integrity.as_ref().unwrap().summary.is_clean());
    }
}
