//! Pronunciation scoring against the Azure Speech service.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use crate::assessment::policy::SamplingPolicy;
use crate::assessment::report::{PronunciationReport, WordScore};
use crate::capture::AudioClip;
use crate::error::AssessmentError;

/// Scores a spoken clip against the text it was recognized as.
#[async_trait]
pub trait PronunciationScorer: Send + Sync {
    async fn score(
        &self,
        clip: &AudioClip,
        reference_text: &str,
    ) -> Result<PronunciationReport, AssessmentError>;
}

/// Azure Speech pronunciation assessment client.
pub struct AzureScorer {
    client: reqwest::Client,
    api_key: String,
    region: String,
}

impl AzureScorer {
    pub fn new(api_key: String, region: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key,
            region,
        }
    }

    fn endpoint(&self) -> String {
        format!(
            "https://{}.stt.speech.microsoft.com/speech/recognition/conversation/cognitiveservices/v1?language=en-US&format=detailed",
            self.region
        )
    }
}

#[async_trait]
impl PronunciationScorer for AzureScorer {
    async fn score(
        &self,
        clip: &AudioClip,
        reference_text: &str,
    ) -> Result<PronunciationReport, AssessmentError> {
        let assessment_params = json!({
            "ReferenceText": reference_text,
            "GradingSystem": "HundredMark",
            "Granularity": "Word",
            "Dimension": "Comprehensive",
            "EnableMiscue": true,
        });

        let response = self
            .client
            .post(self.endpoint())
            .header("Ocp-Apim-Subscription-Key", &self.api_key)
            .header("Content-Type", clip.format().mime())
            .header("Accept", "application/json")
            .header("Pronunciation-Assessment", assessment_params.to_string())
            .body(clip.bytes().to_vec())
            .send()
            .await
            .map_err(|e| {
                if e.is_connect() {
                    AssessmentError("Cannot reach the Azure Speech service. Check your internet connection.".to_string())
                } else if e.is_timeout() {
                    AssessmentError("The Azure Speech request timed out.".to_string())
                } else {
                    AssessmentError(format!("Azure Speech request failed: {e}"))
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let message = match status.as_u16() {
                401 | 403 => "Azure Speech rejected the subscription key.".to_string(),
                429 => "Azure Speech rate limit exceeded. Try again shortly.".to_string(),
                500..=504 => "The Azure Speech service is having trouble. Try again later.".to_string(),
                code => format!("Azure Speech returned an unexpected status: {code}"),
            };
            return Err(AssessmentError(message));
        }

        let body: RecognitionResponse = response
            .json()
            .await
            .map_err(|e| AssessmentError(format!("Invalid Azure Speech response: {e}")))?;

        let best = body
            .n_best
            .into_iter()
            .next()
            .ok_or_else(|| AssessmentError("Azure Speech returned no recognition candidates.".to_string()))?;

        Ok(PronunciationReport {
            accuracy: best.accuracy_score,
            pronunciation: best.pron_score,
            fluency: best.fluency_score,
            completeness: best.completeness_score,
            words: best
                .words
                .into_iter()
                .map(|w| WordScore {
                    word: w.word,
                    accuracy: w.accuracy_score,
                })
                .collect(),
        })
    }
}

#[derive(Deserialize)]
struct RecognitionResponse {
    #[serde(rename = "NBest", default)]
    n_best: Vec<NBestEntry>,
}

#[derive(Deserialize)]
struct NBestEntry {
    #[serde(rename = "AccuracyScore", default)]
    accuracy_score: f64,
    #[serde(rename = "PronScore", default)]
    pron_score: f64,
    #[serde(rename = "FluencyScore", default)]
    fluency_score: f64,
    #[serde(rename = "CompletenessScore", default)]
    completeness_score: f64,
    #[serde(rename = "Words", default)]
    words: Vec<WordEntry>,
}

#[derive(Deserialize)]
struct WordEntry {
    #[serde(rename = "Word")]
    word: String,
    #[serde(rename = "AccuracyScore", default)]
    accuracy_score: f64,
}

/// Ties the sampling policy to a scorer. Assessment failures are logged
/// and swallowed; the conversation keeps flowing either way.
pub struct Assessor<S: PronunciationScorer> {
    policy: SamplingPolicy,
    scorer: S,
}

impl<S: PronunciationScorer> Assessor<S> {
    pub fn new(policy: SamplingPolicy, scorer: S) -> Self {
        Self { policy, scorer }
    }

    pub fn policy(&self) -> &SamplingPolicy {
        &self.policy
    }

    pub fn policy_mut(&mut self) -> &mut SamplingPolicy {
        &mut self.policy
    }

    /// Runs the sampling decision and, when it says yes, scores the clip.
    /// The counter only advances on a successful scoring call.
    pub async fn maybe_assess(
        &mut self,
        text: &str,
        confidence: f64,
        clip: Option<&AudioClip>,
    ) -> Option<PronunciationReport> {
        if !self.policy.decide(text, confidence) {
            return None;
        }
        let clip = match clip {
            Some(c) if !c.is_empty() => c,
            _ => {
                tracing::debug!("Assessment sampled but no audio clip is available");
                return None;
            }
        };
        match self.scorer.score(clip, text).await {
            Ok(report) => {
                self.policy.record_assessment();
                Some(report)
            }
            Err(e) => {
                tracing::warn!("Pronunciation assessment failed: {e}");
                None
            }
        }
    }
}
