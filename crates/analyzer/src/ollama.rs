//! Ollama client and the analyzer built on top of it.
//!
//! `OllamaClient` speaks the `/api/generate` endpoint of a local Ollama
//! instance; `OllamaAnalyzer` layers the four intent-analysis prompts on top
//! and decodes the model's JSON into the core verdict types. Unknown or
//! missing fields always decode to the conservative value (invalid / deny /
//! analysis_failed) so a confused model can never widen access.

use async_trait::async_trait;
use chrono::Utc;
use intentgate_core::{
    AnalyzerError, ClientIntent, CompatibilityReport, CompatibilityStatus, DriftAction,
    DriftReport, DriftSeverity, IntentAnalyzer, ResponseVerdict, ServerCapability,
    SuggestedAction, TransactionRecord, TransactionVerdict, ValidationResult,
};
use intentgate_config::AnalyzerConfig;
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::repair::parse_json_output;

/// Client for a local Ollama instance.
pub struct OllamaClient {
    base_url: String,
    model: String,
    temperature: f32,
    num_predict: u32,
    num_ctx: u32,
    client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    response: String,
}

#[derive(Debug, Deserialize)]
struct TagsResponse {
    #[serde(default)]
    models: Vec<TagModel>,
}

#[derive(Debug, Deserialize)]
struct TagModel {
    name: String,
}

impl OllamaClient {
    /// Create a client with default generation options.
    pub fn new(base_url: impl Into<String>, model: impl Into<String>) -> Self {
        Self::from_config(&AnalyzerConfig {
            base_url: base_url.into(),
            model: model.into(),
            ..AnalyzerConfig::default()
        })
    }

    /// Create a client from configuration.
    pub fn from_config(config: &AnalyzerConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            temperature: config.temperature,
            num_predict: config.num_predict,
            num_ctx: config.num_ctx,
            client,
        }
    }

    /// The model this client is configured for.
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Generate a completion for the given prompt.
    pub async fn generate(
        &self,
        prompt: &str,
        system: Option<&str>,
    ) -> Result<String, AnalyzerError> {
        let url = format!("{}/api/generate", self.base_url);

        let mut body = serde_json::json!({
            "model": self.model,
            "prompt": prompt,
            "stream": false,
            "options": {
                "num_predict": self.num_predict,
                "temperature": self.temperature,
                "top_p": 0.9,
                "num_ctx": self.num_ctx,
                "repeat_penalty": 1.1,
            },
        });
        if let Some(system) = system {
            body["system"] = serde_json::json!(system);
        }

        debug!(model = %self.model, prompt_len = prompt.len(), "Sending generate request");

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(map_reqwest_err)?;

        let status = response.status().as_u16();
        if status != 200 {
            let message = response.text().await.unwrap_or_default();
            warn!(status, body = %message, "Ollama returned error");
            return Err(AnalyzerError::Api {
                status_code: status,
                message,
            });
        }

        let parsed: GenerateResponse = response.json().await.map_err(|e| AnalyzerError::Api {
            status_code: 200,
            message: format!("Failed to parse generate response: {e}"),
        })?;

        debug!(response_len = parsed.response.len(), "Generate complete");
        Ok(parsed.response)
    }

    /// Check that Ollama is reachable and the configured model is present.
    pub async fn health_check(&self) -> Result<bool, AnalyzerError> {
        let url = format!("{}/api/tags", self.base_url);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(map_reqwest_err)?;

        if response.status().as_u16() != 200 {
            return Ok(false);
        }

        let tags: TagsResponse = response.json().await.map_err(|e| AnalyzerError::Api {
            status_code: 200,
            message: format!("Failed to parse tags response: {e}"),
        })?;

        Ok(tags.models.iter().any(|m| m.name == self.model))
    }
}

fn map_reqwest_err(e: reqwest::Error) -> AnalyzerError {
    if e.is_timeout() {
        AnalyzerError::Timeout(e.to_string())
    } else {
        AnalyzerError::Network(e.to_string())
    }
}

/// LLM-powered intent analysis over an [`OllamaClient`].
pub struct OllamaAnalyzer {
    client: OllamaClient,
}

impl OllamaAnalyzer {
    pub fn new(client: OllamaClient) -> Self {
        Self { client }
    }

    /// Create an analyzer directly from configuration.
    pub fn from_config(config: &AnalyzerConfig) -> Self {
        Self::new(OllamaClient::from_config(config))
    }
}

#[async_trait]
impl IntentAnalyzer for OllamaAnalyzer {
    fn name(&self) -> &str {
        "ollama"
    }

    async fn analyze_compatibility(
        &self,
        intent: &ClientIntent,
        capability: &ServerCapability,
    ) -> Result<CompatibilityReport, AnalyzerError> {
        info!(
            purpose = %intent.purpose,
            provides = ?capability.provides,
            "Performing semantic intent compatibility analysis"
        );

        let response = self
            .client
            .generate(
                &compatibility_prompt(intent, capability),
                Some(COMPATIBILITY_SYSTEM),
            )
            .await?;
        let analysis = parse_json_output(&response)?;
        let report = decode_compatibility(&analysis, self.client.model(), response.len());

        info!(
            status = ?report.status,
            confidence = report.confidence,
            "Compatibility analysis complete"
        );
        Ok(report)
    }

    async fn validate_transaction(
        &self,
        request: &serde_json::Value,
        response: Option<&serde_json::Value>,
        purpose: &str,
        constraints: &[String],
    ) -> Result<TransactionVerdict, AnalyzerError> {
        let output = self
            .client
            .generate(
                &transaction_prompt(request, response, purpose, constraints),
                Some(TRANSACTION_SYSTEM),
            )
            .await?;
        let analysis = parse_json_output(&output)?;
        Ok(decode_transaction(&analysis))
    }

    async fn validate_response(
        &self,
        intent: &ClientIntent,
        capability: &ServerCapability,
        request: &serde_json::Value,
        response: &serde_json::Value,
        constraints: &[String],
    ) -> Result<ResponseVerdict, AnalyzerError> {
        let output = self
            .client
            .generate(
                &response_prompt(intent, capability, request, response, constraints),
                Some(RESPONSE_SYSTEM),
            )
            .await?;
        let analysis = parse_json_output(&output)?;
        Ok(decode_response(&analysis))
    }

    async fn analyze_drift(
        &self,
        purpose: &str,
        records: &[TransactionRecord],
        window_hours: i64,
    ) -> Result<DriftReport, AnalyzerError> {
        let output = self
            .client
            .generate(
                &drift_prompt(purpose, records, window_hours),
                Some(DRIFT_SYSTEM),
            )
            .await?;
        let analysis = parse_json_output(&output)?;
        Ok(decode_drift(&analysis))
    }

    async fn health_check(&self) -> Result<bool, AnalyzerError> {
        self.client.health_check().await
    }
}

// ── Prompts ────────────────────────────────────────────────────────────

const COMPATIBILITY_SYSTEM: &str = "You are an AI security analyst for a mutual-intent \
agreement system. Analyze the MEANING and PURPOSE behind a client's declared intent and a \
server's declared capability, not just keywords. Evaluate purpose alignment, scope \
compatibility, constraint consistency, and security/privacy risk, and recommend additional \
constraints where needed. Respond only with a JSON object.";

const TRANSACTION_SYSTEM: &str = "You are an AI security analyst validating transactions \
against an agreed intent contract. Determine whether the request (and response, if present) \
serves the agreed purpose and respects every constraint. Look for anomalies and scope creep. \
Respond with a JSON object containing: validation_result (\"valid\", \"invalid\", \
\"suspicious\", or \"drift_detected\"), confidence_score (0.0-1.0), validation_reasons \
(array of strings), intent_alignment_score (0.0-1.0), risk_factors (array of strings), and \
suggested_action (\"allow\", \"deny\", \"flag\", or \"require_review\").";

const RESPONSE_SYSTEM: &str = "You are an AI security analyst protecting clients from \
malicious servers. Verify that the server's response contains only data the client \
requested, respects the client's privacy constraints, and includes no tracking or \
unexpected data. Respond with a JSON object containing: validation_result (\"valid\", \
\"invalid\", or \"suspicious\"), confidence_score (0.0-1.0), validation_reasons (array), \
data_compliance_score (0.0-1.0), privacy_violations (array), data_leakage_risks (array), \
unexpected_data (array), and suggested_action (\"allow\", \"sanitize\", \"deny\", or \
\"flag\").";

const DRIFT_SYSTEM: &str = "You are an AI security analyst detecting intent drift. Analyze \
recent transactions for pattern changes, scope creep, and behavioral anomalies relative to \
the originally declared purpose. Respond with a JSON object containing: drift_detected \
(boolean), drift_severity (\"low\", \"medium\", or \"high\"), drift_indicators (array), \
recommended_action (\"continue\", \"review\", \"renegotiate\", or \"terminate\"), and \
confidence_score (0.0-1.0).";

fn compatibility_prompt(intent: &ClientIntent, capability: &ServerCapability) -> String {
    format!(
        "Perform intent compatibility analysis.\n\n\
         CLIENT INTENT DECLARATION:\n\
         Purpose: \"{}\"\n\
         Data Requirements: {:?}\n\
         Constraints: {:?}\n\
         Duration: {:?} minutes\n\n\
         SERVER CAPABILITY DECLARATION:\n\
         Provides: {:?}\n\
         Boundaries: {:?}\n\
         Supported Operations: {:?}\n\
         Data Sensitivity: {:?}\n\
         Rate Limits: {:?}\n\n\
         Provide analysis as JSON:\n\
         {{\n\
           \"status\": \"compatible|incompatible|requires_negotiation|analysis_failed\",\n\
           \"confidence_score\": 0.0,\n\
           \"compatibility_reasons\": [\"...\"],\n\
           \"suggested_constraints\": [\"...\"],\n\
           \"risk_assessment\": {{\"risk_level\": \"low|medium|high|critical\"}}\n\
         }}",
        intent.purpose,
        intent.data_requirements,
        intent.constraints,
        intent.duration_minutes,
        capability.provides,
        capability.boundaries,
        capability.supported_operations,
        capability.data_sensitivity,
        capability.rate_limits,
    )
}

fn transaction_prompt(
    request: &serde_json::Value,
    response: Option<&serde_json::Value>,
    purpose: &str,
    constraints: &[String],
) -> String {
    format!(
        "Validate this transaction against the agreed intent contract:\n\n\
         AGREED PURPOSE: {purpose}\n\
         CONSTRAINTS: {constraints:?}\n\n\
         REQUEST:\n{request}\n\n\
         RESPONSE:\n{}\n\n\
         Provide your validation analysis as a JSON object:",
        response
            .map(|r| r.to_string())
            .unwrap_or_else(|| "No response yet".into()),
    )
}

fn response_prompt(
    intent: &ClientIntent,
    capability: &ServerCapability,
    request: &serde_json::Value,
    response: &serde_json::Value,
    constraints: &[String],
) -> String {
    format!(
        "Analyze this server response for client protection:\n\n\
         CLIENT INTENT:\n\
         Purpose: {}\n\
         Data Requirements: {:?}\n\
         Constraints: {:?}\n\n\
         SERVER CAPABILITY:\n\
         Provides: {:?}\n\
         Boundaries: {:?}\n\n\
         CONTRACT CONSTRAINTS:\n{:?}\n\n\
         ORIGINAL REQUEST:\n{}\n\n\
         SERVER RESPONSE:\n{}\n\n\
         Does the response contain only requested data types? Any privacy violations, \
         unexpected data, or signs of tracking? Provide analysis as a JSON object:",
        intent.purpose,
        intent.data_requirements,
        intent.constraints,
        capability.provides,
        capability.boundaries,
        constraints,
        request,
        response,
    )
}

fn drift_prompt(purpose: &str, records: &[TransactionRecord], window_hours: i64) -> String {
    format!(
        "Analyze potential intent drift:\n\n\
         ORIGINAL PURPOSE: {purpose}\n\
         TIME WINDOW: Last {window_hours} hours\n\n\
         RECENT TRANSACTIONS:\n{}\n\n\
         Provide your drift analysis as a JSON object:",
        serde_json::to_string_pretty(records).unwrap_or_else(|_| "[]".into()),
    )
}

// ── Decoding ───────────────────────────────────────────────────────────

fn decode_compatibility(
    analysis: &serde_json::Value,
    model: &str,
    raw_len: usize,
) -> CompatibilityReport {
    let status = match analysis["status"].as_str() {
        Some("compatible") => CompatibilityStatus::Compatible,
        Some("incompatible") => CompatibilityStatus::Incompatible,
        Some("requires_negotiation") => CompatibilityStatus::RequiresNegotiation,
        other => {
            warn!(status = ?other, "Unrecognized compatibility status, treating as failed");
            CompatibilityStatus::AnalysisFailed
        }
    };

    let mut metadata = serde_json::Map::new();
    metadata.insert("model".into(), serde_json::Value::String(model.to_string()));
    metadata.insert(
        "analyzed_at".into(),
        serde_json::Value::String(Utc::now().to_rfc3339()),
    );
    metadata.insert("raw_response_length".into(), serde_json::json!(raw_len));

    CompatibilityReport {
        status,
        confidence: score_field(analysis, "confidence_score"),
        reasons: string_list(analysis, "compatibility_reasons"),
        suggested_constraints: string_list(analysis, "suggested_constraints"),
        risk_assessment: object_field(analysis, "risk_assessment"),
        metadata,
    }
}

fn decode_transaction(analysis: &serde_json::Value) -> TransactionVerdict {
    TransactionVerdict {
        // Filled in by the broker.
        contract_id: String::new(),
        transaction_id: String::new(),
        result: validation_result(analysis["validation_result"].as_str()),
        confidence: score_field(analysis, "confidence_score"),
        reasons: string_list(analysis, "validation_reasons"),
        alignment_score: score_field(analysis, "intent_alignment_score"),
        risk_factors: string_list(analysis, "risk_factors"),
        suggested_action: suggested_action(analysis["suggested_action"].as_str()),
        validated_at: Utc::now(),
        client_protection: None,
    }
}

fn decode_response(analysis: &serde_json::Value) -> ResponseVerdict {
    ResponseVerdict {
        contract_id: String::new(),
        transaction_id: String::new(),
        result: validation_result(analysis["validation_result"].as_str()),
        confidence: score_field(analysis, "confidence_score"),
        reasons: string_list(analysis, "validation_reasons"),
        compliance_score: score_field(analysis, "data_compliance_score"),
        privacy_violations: string_list(analysis, "privacy_violations"),
        leakage_risks: string_list(analysis, "data_leakage_risks"),
        unexpected_data: string_list(analysis, "unexpected_data"),
        suggested_action: suggested_action(analysis["suggested_action"].as_str()),
        validated_at: Utc::now(),
    }
}

fn decode_drift(analysis: &serde_json::Value) -> DriftReport {
    let severity = match analysis["drift_severity"].as_str() {
        Some("none") => DriftSeverity::None,
        Some("low") => DriftSeverity::Low,
        Some("medium") => DriftSeverity::Medium,
        Some("high") => DriftSeverity::High,
        _ => DriftSeverity::Unknown,
    };
    let recommended_action = match analysis["recommended_action"].as_str() {
        Some("continue") => DriftAction::Continue,
        Some("renegotiate") => DriftAction::Renegotiate,
        Some("terminate") => DriftAction::Terminate,
        _ => DriftAction::Review,
    };
    DriftReport {
        drift_detected: analysis["drift_detected"].as_bool().unwrap_or(false),
        severity,
        indicators: string_list(analysis, "drift_indicators"),
        recommended_action,
        confidence: score_field(analysis, "confidence_score"),
        error: None,
    }
}

fn validation_result(s: Option<&str>) -> ValidationResult {
    match s {
        Some("valid") => ValidationResult::Valid,
        Some("suspicious") => ValidationResult::Suspicious,
        Some("drift_detected") => ValidationResult::DriftDetected,
        _ => ValidationResult::Invalid,
    }
}

fn suggested_action(s: Option<&str>) -> SuggestedAction {
    match s {
        Some("allow") => SuggestedAction::Allow,
        Some("flag") => SuggestedAction::Flag,
        Some("sanitize") => SuggestedAction::Sanitize,
        Some("require_review") => SuggestedAction::RequireReview,
        _ => SuggestedAction::Deny,
    }
}

fn score_field(value: &serde_json::Value, key: &str) -> f64 {
    value[key].as_f64().unwrap_or(0.0).clamp(0.0, 1.0)
}

fn string_list(value: &serde_json::Value, key: &str) -> Vec<String> {
    value[key]
        .as_array()
        .map(|items| {
            items
                .iter()
                .filter_map(|v| v.as_str().map(String::from))
                .collect()
        })
        .unwrap_or_default()
}

fn object_field(value: &serde_json::Value, key: &str) -> serde_json::Map<String, serde_json::Value> {
    value[key].as_object().cloned().unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_compatibility_happy_path() {
        let analysis = serde_json::json!({
            "status": "compatible",
            "confidence_score": 0.92,
            "compatibility_reasons": ["purpose matches offered data"],
            "suggested_constraints": ["aggregate_only"],
            "risk_assessment": {"risk_level": "low"}
        });
        let report = decode_compatibility(&analysis, "test-model", 512);
        assert_eq!(report.status, CompatibilityStatus::Compatible);
        assert!((report.confidence - 0.92).abs() < f64::EPSILON);
        assert_eq!(report.suggested_constraints, vec!["aggregate_only"]);
        assert_eq!(report.metadata["model"], "test-model");
    }

    #[test]
    fn unknown_status_decodes_as_failed() {
        let analysis = serde_json::json!({"status": "maybe", "confidence_score": 0.7});
        let report = decode_compatibility(&analysis, "m", 0);
        assert_eq!(report.status, CompatibilityStatus::AnalysisFailed);
    }

    #[test]
    fn missing_fields_decode_conservatively() {
        let verdict = decode_transaction(&serde_json::json!({}));
        assert_eq!(verdict.result, ValidationResult::Invalid);
        assert_eq!(verdict.suggested_action, SuggestedAction::Deny);
        assert_eq!(verdict.confidence, 0.0);
    }

    #[test]
    fn confidence_is_clamped() {
        let verdict = decode_transaction(&serde_json::json!({
            "validation_result": "valid",
            "confidence_score": 3.5
        }));
        assert_eq!(verdict.result, ValidationResult::Valid);
        assert_eq!(verdict.confidence, 1.0);
    }

    #[test]
    fn decode_response_fields() {
        let verdict = decode_response(&serde_json::json!({
            "validation_result": "suspicious",
            "confidence_score": 0.8,
            "data_compliance_score": 0.4,
            "privacy_violations": ["tracking_id_present"],
            "data_leakage_risks": ["fingerprinting"],
            "unexpected_data": ["device_info"],
            "suggested_action": "sanitize"
        }));
        assert_eq!(verdict.result, ValidationResult::Suspicious);
        assert_eq!(verdict.suggested_action, SuggestedAction::Sanitize);
        assert_eq!(verdict.unexpected_data, vec!["device_info"]);
    }

    #[test]
    fn decode_drift_defaults_to_review() {
        let report = decode_drift(&serde_json::json!({
            "drift_detected": true,
            "drift_severity": "catastrophic"
        }));
        assert!(report.drift_detected);
        assert_eq!(report.severity, DriftSeverity::Unknown);
        assert_eq!(report.recommended_action, DriftAction::Review);
    }

    #[test]
    fn prompts_carry_contract_terms() {
        let prompt = transaction_prompt(
            &serde_json::json!({"tool": "get_weather"}),
            None,
            "plan a trip",
            &["read_only".to_string()],
        );
        assert!(prompt.contains("plan a trip"));
        assert!(prompt.contains("read_only"));
        assert!(prompt.contains("No response yet"));
    }

    #[test]
    fn drift_prompt_embeds_records() {
        let records = vec![TransactionRecord {
            transaction_id: "t-1".into(),
            timestamp: Utc::now(),
            request: serde_json::json!({"tool": "get_weather"}),
            response: None,
            result: ValidationResult::Valid,
            alignment_score: 0.9,
        }];
        let prompt = drift_prompt("plan a trip", &records, 24);
        assert!(prompt.contains("get_weather"));
        assert!(prompt.contains("Last 24 hours"));
    }
}
