//! Spindle speed pass
//!
//! Walks a program in document order, tracking the unit system (G70/G71) and
//! spindle mode (G96/G97), and derives a recommended speed range for every S
//! word from the material's cutting speeds and the tool diameter.

use std::f32::consts::PI;
use std::fmt;

use serde::Serialize;

use crate::parser::{Node, Program, TokenKind, Word};

/// Inches per meter, as applied to converted speeds
const IMPERIAL_FACTOR: f32 = 39.37;

/// Cutting speed bounds of a material plus the active tool diameter
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CuttingData {
    pub cutting_speed_low: f32,
    pub cutting_speed_high: f32,
    pub tool_diameter: f32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Units {
    #[default]
    Metric,
    Imperial,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SpeedMode {
    #[default]
    RevolutionsPerMinute,
    ConstantSurfaceSpeed,
}

/// Modal state that persists across blocks
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SpindleState {
    pub units: Units,
    pub mode: SpeedMode,
}

impl SpindleState {
    /// State after seeing `word`. Only G70, G71, G96 and G97 change anything.
    pub fn apply(self, word: &Word) -> Self {
        if word.kind != TokenKind::G {
            return self;
        }
        match word.value {
            v if v == 70.0 => Self {
                units: Units::Imperial,
                ..self
            },
            v if v == 71.0 => Self {
                units: Units::Metric,
                ..self
            },
            v if v == 96.0 => Self {
                mode: SpeedMode::ConstantSurfaceSpeed,
                ..self
            },
            v if v == 97.0 => Self {
                mode: SpeedMode::RevolutionsPerMinute,
                ..self
            },
            _ => self,
        }
    }
}

/// How a commanded speed compares with the recommendation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SpeedStatus {
    Low,
    Within,
    High,
}

impl fmt::Display for SpeedStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Low => "low",
            Self::Within => "within",
            Self::High => "high",
        })
    }
}

/// One recommendation per S word
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SpeedRecord {
    /// 1-based source line of the block holding the S word
    pub line: u32,
    pub requested_value: f32,
    pub recommended_low: f32,
    pub recommended_high: f32,
}

impl SpeedRecord {
    pub fn status(&self) -> SpeedStatus {
        if self.requested_value < self.recommended_low {
            SpeedStatus::Low
        } else if self.requested_value > self.recommended_high {
            SpeedStatus::High
        } else {
            SpeedStatus::Within
        }
    }

    /// "low–high" with the low bound truncated and the high bound rounded up
    pub fn range_label(&self) -> String {
        format!(
            "{}–{}",
            self.recommended_low.trunc() as i64,
            self.recommended_high.ceil() as i64
        )
    }
}

/// Accumulator threaded through the fold
#[derive(Debug, Default)]
struct Pass {
    line: u32,
    state: SpindleState,
    records: Vec<SpeedRecord>,
}

/// Computes [`SpeedRecord`]s for a program
#[derive(Debug, Clone, Copy)]
pub struct SpeedVisitor {
    data: CuttingData,
}

impl SpeedVisitor {
    pub fn new(data: CuttingData) -> Self {
        Self { data }
    }

    pub fn data(&self) -> CuttingData {
        self.data
    }

    /// Records for every S word, in document order
    pub fn records(&self, program: &Program) -> Vec<SpeedRecord> {
        program
            .nodes()
            .fold(Pass::default(), |mut pass, node| {
                match node {
                    Node::Program(_) | Node::Header(_) | Node::BlockNumber(_) => {}
                    Node::Block(block) => pass.line = block.line,
                    Node::Word(word) if word.kind == TokenKind::S => {
                        let record = self.record(pass.line, pass.state, word);
                        pass.records.push(record);
                    }
                    Node::Word(word) => pass.state = pass.state.apply(word),
                }
                pass
            })
            .records
    }

    fn record(&self, line: u32, state: SpindleState, word: &Word) -> SpeedRecord {
        SpeedRecord {
            line,
            requested_value: word.value,
            recommended_low: self.recommended(state, self.data.cutting_speed_low),
            recommended_high: self.recommended(state, self.data.cutting_speed_high),
        }
    }

    /// Recommended spindle value for cutting speed `cs` under `state`
    pub fn recommended(&self, state: SpindleState, cs: f32) -> f32 {
        let value = match state.mode {
            SpeedMode::ConstantSurfaceSpeed => cs,
            SpeedMode::RevolutionsPerMinute => 1000.0 * cs / (PI * self.data.tool_diameter),
        };
        match state.units {
            Units::Imperial => value / IMPERIAL_FACTOR,
            Units::Metric => value,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;

    const STEEL: CuttingData = CuttingData {
        cutting_speed_low: 15.0,
        cutting_speed_high: 18.0,
        tool_diameter: 1.5,
    };

    fn records(text: &str) -> Vec<SpeedRecord> {
        SpeedVisitor::new(STEEL).records(&parse(text).unwrap())
    }

    #[test]
    fn test_default_state_is_metric_rpm() {
        let r = records("%\nS100\n");
        assert_eq!(r.len(), 1);
        assert_eq!(r[0].line, 2);
        assert_eq!(r[0].requested_value, 100.0);
        assert!((r[0].recommended_low - 3183.099).abs() < 0.01);
        assert!((r[0].recommended_high - 3819.719).abs() < 0.01);
    }

    #[test]
    fn test_constant_surface_speed_passes_through() {
        let r = records("%\nG96\nS100\n");
        assert_eq!(r[0].recommended_low, 15.0);
        assert_eq!(r[0].recommended_high, 18.0);
    }

    #[test]
    fn test_imperial_divides_result() {
        let metric = records("%\nS100\n")[0];
        let imperial = records("%\nG70\nS100\n")[0];
        assert!((imperial.recommended_low - metric.recommended_low / 39.37).abs() < 1e-3);
        assert!((imperial.recommended_high - metric.recommended_high / 39.37).abs() < 1e-3);
    }

    #[test]
    fn test_state_changes_are_not_retroactive() {
        let r = records("%\nS100\nG96\nS200\nG97 G71\nS300\n");
        assert_eq!(r.len(), 3);
        assert!(r[0].recommended_low > 3000.0);
        assert_eq!(r[1].recommended_low, 15.0);
        assert_eq!(r[1].line, 4);
        assert!(r[2].recommended_low > 3000.0);
    }

    #[test]
    fn test_same_block_g_word_applies_before_s() {
        let r = records("%\nG96 S50\n");
        assert_eq!(r[0].recommended_high, 18.0);
    }

    #[test]
    fn test_unmodeled_g_codes_are_ignored() {
        let state = SpindleState::default().apply(&Word::new(TokenKind::G, 54.0));
        assert_eq!(state, SpindleState::default());
        let state = SpindleState::default().apply(&Word::new(TokenKind::M, 96.0));
        assert_eq!(state, SpindleState::default());
    }

    #[test]
    fn test_status_and_label() {
        let record = SpeedRecord {
            line: 2,
            requested_value: 100.0,
            recommended_low: 3183.1,
            recommended_high: 3819.7,
        };
        assert_eq!(record.status(), SpeedStatus::Low);
        assert_eq!(record.range_label(), "3183–3820");

        let within = SpeedRecord {
            requested_value: 3500.0,
            ..record
        };
        assert_eq!(within.status(), SpeedStatus::Within);

        let high = SpeedRecord {
            requested_value: 5000.0,
            ..record
        };
        assert_eq!(high.status(), SpeedStatus::High);
    }

    #[test]
    fn test_no_speed_words_no_records() {
        assert!(records("%\nG1 X1\nM30\n").is_empty());
    }
}
