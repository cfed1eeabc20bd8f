//! Behavioral tests of the assessment sampling policy across many calls.

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use parla::assessment::{Clock, PolicyConfig, RandomSource, SamplingPolicy, UserLevel};

/// Deterministic xorshift generator, so the statistical tests are stable
/// across runs.
struct Xorshift(u64);

impl Xorshift {
    fn new(seed: u64) -> Self {
        Self(seed.max(1))
    }
}

impl RandomSource for Xorshift {
    fn next_f64(&mut self) -> f64 {
        let mut x = self.0;
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        self.0 = x;
        (x >> 11) as f64 / (1u64 << 53) as f64
    }
}

/// Clock the test advances by hand.
#[derive(Clone)]
struct ManualClock {
    now: Arc<Mutex<Instant>>,
}

impl ManualClock {
    fn new() -> Self {
        Self {
            now: Arc::new(Mutex::new(Instant::now())),
        }
    }

    fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap();
        *now += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        *self.now.lock().unwrap()
    }
}

fn policy(level: UserLevel, seed: u64) -> SamplingPolicy {
    SamplingPolicy::with_sources(
        PolicyConfig::default(),
        level,
        Box::new(Xorshift::new(seed)),
        Box::new(ManualClock::new()),
    )
}

// No difficult sounds, confidently recognized.
const EASY: &str = "a fine sunny day in Japan";

/// Fraction of `trials` easy utterances that get sampled, skipping the
/// periodic-rule hits so only the base rate is measured.
fn base_rate_sample(level: UserLevel, seed: u64, trials: usize) -> f64 {
    let mut policy = policy(level, seed);
    let mut assessed = 0usize;
    let mut counted = 0usize;
    for i in 0..trials {
        let verdict = policy.decide(EASY, 0.95);
        // Every 5th message is a guaranteed hit; exclude it.
        if (i + 1) % 5 == 0 {
            continue;
        }
        counted += 1;
        if verdict {
            assessed += 1;
        }
    }
    assessed as f64 / counted as f64
}

#[test]
fn counters_track_every_decision_and_only_recorded_assessments() {
    let mut policy = policy(UserLevel::Intermediate, 7);
    let mut positives = 0u64;
    for _ in 0..100 {
        if policy.decide(EASY, 0.95) {
            positives += 1;
            policy.record_assessment();
        }
    }

    let stats = policy.stats();
    assert_eq!(stats.total_messages, 100);
    assert_eq!(stats.assessment_count, positives);
    assert!((stats.assessment_rate - positives as f64 / 100.0).abs() < 1e-12);
}

#[test]
fn low_confidence_overrides_every_other_rule() {
    let mut policy = policy(UserLevel::Advanced, 11);
    for _ in 0..200 {
        assert!(policy.decide(EASY, 0.50));
    }
}

#[test]
fn short_and_garbled_text_always_assessed() {
    let mut policy = policy(UserLevel::Advanced, 13);
    assert!(policy.decide("Hi", 0.99));
    assert!(policy.decide("Hello ???", 0.99));
}

#[test]
fn base_rates_order_by_proficiency() {
    const TRIALS: usize = 2000;
    let beginner = base_rate_sample(UserLevel::Beginner, 42, TRIALS);
    let intermediate = base_rate_sample(UserLevel::Intermediate, 42, TRIALS);
    let advanced = base_rate_sample(UserLevel::Advanced, 42, TRIALS);

    assert!(
        beginner > intermediate && intermediate > advanced,
        "rates were {beginner:.3} / {intermediate:.3} / {advanced:.3}"
    );
    assert!((beginner - 0.30).abs() < 0.05, "beginner rate {beginner:.3}");
    assert!((advanced - 0.10).abs() < 0.05, "advanced rate {advanced:.3}");
}

#[test]
fn difficult_sounds_sample_more_often_than_the_advanced_base_rate() {
    const TRIALS: usize = 2000;
    let mut policy = policy(UserLevel::Advanced, 99);
    let mut assessed = 0usize;
    let mut counted = 0usize;
    for i in 0..TRIALS {
        let verdict = policy.decide("I think this is good", 0.95);
        if (i + 1) % 5 == 0 {
            continue;
        }
        counted += 1;
        if verdict {
            assessed += 1;
        }
    }
    let rate = assessed as f64 / counted as f64;
    assert!((rate - 0.40).abs() < 0.05, "difficult-sound rate {rate:.3}");
}

#[test]
fn beginner_difficult_text_lands_in_the_expected_overall_band() {
    // All rules in play: the periodic rule guarantees every 5th hit and
    // the difficult-word rule decides the rest, so the overall rate is
    // 0.2 + 0.8 * 0.4 = 0.52.
    let mut policy = policy(UserLevel::Beginner, 7);
    let mut assessed = 0usize;
    for _ in 0..1000 {
        if policy.decide("I think this is good", 0.95) {
            assessed += 1;
        }
    }
    let rate = assessed as f64 / 1000.0;
    assert!((0.40..=0.60).contains(&rate), "overall rate {rate:.3}");
}

#[test]
fn long_idle_gaps_reengage_assessment() {
    let clock = ManualClock::new();
    // A constant draw of 0.45 rejects the beginner base rate (0.30) but
    // accepts time decay (0.50), isolating the decay rule.
    struct Const(f64);
    impl RandomSource for Const {
        fn next_f64(&mut self) -> f64 {
            self.0
        }
    }
    let mut policy = SamplingPolicy::with_sources(
        PolicyConfig::default(),
        UserLevel::Beginner,
        Box::new(Const(0.45)),
        Box::new(clock.clone()),
    );

    policy.decide(EASY, 0.95);
    policy.record_assessment();

    // Shortly after an assessment the decay rule is idle and the base
    // rate rejects.
    clock.advance(Duration::from_secs(10));
    assert!(!policy.decide(EASY, 0.95));

    // After a minute of quiet the decay rule takes over.
    clock.advance(Duration::from_secs(55));
    assert!(policy.decide(EASY, 0.95));
}

#[test]
fn reset_starts_a_fresh_session() {
    let mut policy = policy(UserLevel::Beginner, 3);
    for _ in 0..20 {
        if policy.decide(EASY, 0.95) {
            policy.record_assessment();
        }
    }
    policy.reset_stats();

    let stats = policy.stats();
    assert_eq!(stats.total_messages, 0);
    assert_eq!(stats.assessment_count, 0);
    assert_eq!(stats.estimated_cost, 0.0);

    // The periodic rule counts from scratch as well: messages 5 and 10
    // after the reset are guaranteed hits.
    let mut verdicts = Vec::new();
    for _ in 0..10 {
        verdicts.push(policy.decide(EASY, 0.95));
    }
    assert!(verdicts[4], "5th message after reset is a guaranteed hit");
    assert!(verdicts[9], "10th message after reset is a guaranteed hit");
}
