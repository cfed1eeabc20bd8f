//! Adaptive sampling policy for pronunciation assessment.
//!
//! Pronunciation scoring costs real money per call, so assessments are
//! sampled rather than run on every utterance. The rule chain below is
//! evaluated in strict precedence order; the first rule whose
//! precondition matches decides the verdict. A probabilistic rule that
//! matches but draws "no" returns false rather than falling through.
//!
//! 1. Low recognition confidence forces an assessment.
//! 2. Critical recognition breakdowns (tiny text, "???") force one.
//! 3. Every Nth message gets one, guaranteeing regular feedback.
//! 4. Long gaps since the last assessment re-engage probabilistically.
//! 5. Text with sounds the learner population finds hard samples at an
//!    elevated rate.
//! 6. Otherwise a per-proficiency base rate applies.
//!
//! Randomness and wall-clock reads go through injectable traits so the
//! chain is fully deterministic under test.

use std::sync::OnceLock;
use std::time::{Duration, Instant};

use regex::RegexSet;
use serde::{Deserialize, Serialize};

/// Source of uniform random draws in `[0, 1)`.
pub trait RandomSource: Send {
    fn next_f64(&mut self) -> f64;
}

/// Default randomness, backed by the thread-local generator.
pub struct OsRandom;

impl RandomSource for OsRandom {
    fn next_f64(&mut self) -> f64 {
        rand::random()
    }
}

/// Monotonic time source.
pub trait Clock: Send {
    fn now(&self) -> Instant;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Learner proficiency, driving the base sampling rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserLevel {
    Beginner,
    Intermediate,
    Advanced,
}

/// Tuning knobs for the rule chain. The probabilities were calibrated
/// empirically in production; they are configuration, not constants.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicyConfig {
    /// Rule 1: force assessment below this recognition confidence.
    pub confidence_threshold: f64,
    /// Rule 3: assess every Nth message. 0 disables the rule.
    pub periodic_interval: u64,
    /// Rule 4: gap after the last assessment before re-engagement.
    pub time_decay_after_ms: u64,
    /// Rule 4: probability once the gap has elapsed.
    pub time_decay_probability: f64,
    /// Rule 5: probability for text containing difficult sounds.
    pub difficult_word_probability: f64,
    /// Rule 6: base rates per proficiency level.
    pub beginner_rate: f64,
    pub intermediate_rate: f64,
    pub advanced_rate: f64,
    /// Dollars per 1000 assessments, for the cost estimate in stats.
    pub unit_cost_per_1000: f64,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            confidence_threshold: 0.70,
            periodic_interval: 5,
            time_decay_after_ms: 60_000,
            time_decay_probability: 0.5,
            difficult_word_probability: 0.4,
            beginner_rate: 0.30,
            intermediate_rate: 0.20,
            advanced_rate: 0.10,
            unit_cost_per_1000: 1.0,
        }
    }
}

impl PolicyConfig {
    fn base_rate(&self, level: UserLevel) -> f64 {
        match level {
            UserLevel::Beginner => self.beginner_rate,
            UserLevel::Intermediate => self.intermediate_rate,
            UserLevel::Advanced => self.advanced_rate,
        }
    }
}

/// Cumulative counters for one policy instance.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct AssessmentStats {
    pub total_messages: u64,
    pub assessment_count: u64,
    pub assessment_rate: f64,
    pub estimated_cost: f64,
}

/// The sampling decision engine. One instance per conversation; counters
/// accumulate across sessions until [`reset_stats`](Self::reset_stats).
pub struct SamplingPolicy {
    cfg: PolicyConfig,
    level: UserLevel,
    total_messages: u64,
    assessment_count: u64,
    last_assessment_at: Option<Instant>,
    rng: Box<dyn RandomSource>,
    clock: Box<dyn Clock>,
}

impl SamplingPolicy {
    pub fn new(cfg: PolicyConfig, level: UserLevel) -> Self {
        Self::with_sources(cfg, level, Box::new(OsRandom), Box::new(SystemClock))
    }

    /// Constructor with explicit randomness and clock, for deterministic
    /// tests.
    pub fn with_sources(
        cfg: PolicyConfig,
        level: UserLevel,
        rng: Box<dyn RandomSource>,
        clock: Box<dyn Clock>,
    ) -> Self {
        Self {
            cfg,
            level,
            total_messages: 0,
            assessment_count: 0,
            last_assessment_at: None,
            rng,
            clock,
        }
    }

    pub fn set_user_level(&mut self, level: UserLevel) {
        self.level = level;
    }

    pub fn user_level(&self) -> UserLevel {
        self.level
    }

    /// Decides whether this utterance is worth an assessment call.
    /// Counts the message unconditionally; never suspends.
    pub fn decide(&mut self, text: &str, confidence: f64) -> bool {
        self.total_messages += 1;

        if confidence < self.cfg.confidence_threshold {
            tracing::debug!("Assessment triggered: low confidence {:.2}", confidence);
            return true;
        }

        let trimmed = text.trim();
        if trimmed.chars().count() < 3 || text.contains("???") {
            tracing::debug!("Assessment triggered: critical recognition error");
            return true;
        }

        // An interval of 0 disables the periodic rule rather than
        // dividing by zero; the config file cannot rule it out.
        if self.cfg.periodic_interval > 0 && self.total_messages % self.cfg.periodic_interval == 0 {
            tracing::debug!("Assessment triggered: periodic check");
            return true;
        }

        if let Some(last) = self.last_assessment_at {
            let gap = self.clock.now().saturating_duration_since(last);
            if gap >= Duration::from_millis(self.cfg.time_decay_after_ms) {
                let assess = self.rng.next_f64() < self.cfg.time_decay_probability;
                if assess {
                    tracing::debug!("Assessment triggered: time decay ({:?} gap)", gap);
                }
                return assess;
            }
        }

        if has_difficult_sounds(text) {
            let assess = self.rng.next_f64() < self.cfg.difficult_word_probability;
            if assess {
                tracing::debug!("Assessment triggered: difficult sounds");
            }
            return assess;
        }

        let assess = self.rng.next_f64() < self.cfg.base_rate(self.level);
        if assess {
            tracing::debug!("Assessment triggered: base rate for {:?}", self.level);
        }
        assess
    }

    /// Marks that an assessment actually ran. Callers invoke this only
    /// after the external scoring call succeeded.
    pub fn record_assessment(&mut self) {
        self.assessment_count += 1;
        self.last_assessment_at = Some(self.clock.now());
    }

    pub fn stats(&self) -> AssessmentStats {
        let assessment_rate = if self.total_messages > 0 {
            self.assessment_count as f64 / self.total_messages as f64
        } else {
            0.0
        };
        AssessmentStats {
            total_messages: self.total_messages,
            assessment_count: self.assessment_count,
            assessment_rate,
            estimated_cost: self.assessment_count as f64 / 1000.0 * self.cfg.unit_cost_per_1000,
        }
    }

    pub fn reset_stats(&mut self) {
        self.total_messages = 0;
        self.assessment_count = 0;
        self.last_assessment_at = None;
    }
}

/// Sounds that are hard for the target learner population: the "th"
/// cluster, standalone r/l/v/w, and the sh/ch sibilants.
fn has_difficult_sounds(text: &str) -> bool {
    static PATTERNS: OnceLock<RegexSet> = OnceLock::new();
    let set = PATTERNS.get_or_init(|| {
        RegexSet::new([
            r"(?i)th",
            r"(?i)\br\b",
            r"(?i)\bl\b",
            r"(?i)\bv\b",
            r"(?i)\bw\b",
            r"(?i)sh",
            r"(?i)ch",
        ])
        .expect("difficult-sound patterns should compile")
    });
    set.is_match(text)
}
