//! Adaptive pronunciation assessment: sampling policy, scoring client,
//! and learner-facing reports.

pub mod azure;
pub mod policy;
pub mod report;

pub use azure::{Assessor, AzureScorer, PronunciationScorer};
pub use policy::{
    AssessmentStats, Clock, OsRandom, PolicyConfig, RandomSource, SamplingPolicy, SystemClock,
    UserLevel,
};
pub use report::{PronunciationReport, WordScore};
