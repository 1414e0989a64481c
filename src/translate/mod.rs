//! Client for the public web translation endpoint.

mod retry;

use anyhow::{Context, Result, anyhow};
use serde_json::{Value, json};
use tracing::{debug, warn};

use crate::settings::Settings;
use retry::{
    RATE_LIMIT_BASE_DELAY, RATE_LIMIT_MAX_RETRIES, is_rate_limited, retry_after, wait_with_backoff,
};

const RPC_ID: &str = "MkEWBc";
const RPC_PATH: &str = "/_/TranslateWebserverUi/data/batchexecute?rpcids=MkEWBc&rt=c&bl=boq_translate-webserver_20201110.10_p0";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Translation {
    pub text: String,
    /// Detected language, or the requested one when none was reported.
    pub source_language: String,
    pub target_language: Option<String>,
}

#[derive(Debug, Clone)]
pub struct WebTranslator {
    endpoints: Vec<String>,
    client: reqwest::Client,
}

impl WebTranslator {
    pub fn new(endpoints: Vec<String>) -> Self {
        let endpoints = if endpoints.is_empty() {
            vec!["translate.google.com".to_string()]
        } else {
            endpoints
        };
        Self {
            endpoints,
            client: reqwest::Client::new(),
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(settings.translation_endpoints.clone())
    }

    pub fn endpoints(&self) -> &[String] {
        &self.endpoints
    }

    /// Tries every endpoint in order; `None` when all of them fail.
    pub async fn translate(&self, text: &str, source: &str, target: &str) -> Option<Translation> {
        for endpoint in &self.endpoints {
            match self.translate_with(endpoint, text, source, target).await {
                Ok(translation) => return Some(translation),
                Err(err) => warn!("translation via {} failed: {:#}", endpoint, err),
            }
        }
        None
    }

    async fn translate_with(
        &self,
        endpoint: &str,
        text: &str,
        source: &str,
        target: &str,
    ) -> Result<Translation> {
        let url = endpoint_url(endpoint);
        let payload = request_payload(text, source, target)?;
        let mut attempt = 0usize;
        let mut delay = RATE_LIMIT_BASE_DELAY;
        loop {
            attempt += 1;
            let response = self
                .client
                .post(&url)
                .form(&[("f.req", payload.as_str())])
                .send()
                .await
                .with_context(|| format!("request to {} failed", endpoint))?;
            let status = response.status();
            let wait = retry_after(response.headers());
            let body = response.text().await.unwrap_or_default();
            if status.is_success() {
                debug!("{} answered with {} bytes", endpoint, body.len());
                return parse_response(&body, source);
            }
            if is_rate_limited(status) && attempt < RATE_LIMIT_MAX_RETRIES {
                delay = wait_with_backoff(endpoint, attempt, delay, wait).await;
                continue;
            }
            return Err(anyhow!("{} returned {}", endpoint, status));
        }
    }
}

pub fn endpoint_url(endpoint: &str) -> String {
    let endpoint = endpoint.trim().trim_end_matches('/');
    if endpoint.starts_with("http://") || endpoint.starts_with("https://") {
        format!("{}{}", endpoint, RPC_PATH)
    } else {
        format!("https://{}{}", endpoint, RPC_PATH)
    }
}

/// The `f.req` form value: the request is JSON nested inside JSON.
pub fn request_payload(text: &str, source: &str, target: &str) -> Result<String> {
    let inner = serde_json::to_string(&json!([[text, source, target, true], [null]]))?;
    Ok(serde_json::to_string(&json!([[[RPC_ID, inner, null, "generic"]]]))?)
}

/// Decodes the batch response: a length line followed by a JSON envelope
/// whose `[0][2]` holds the actual result as a JSON string.
pub fn parse_response(body: &str, requested_source: &str) -> Result<Translation> {
    let start = payload_start(body).ok_or_else(|| anyhow!("no payload length in response"))?;
    let envelope = serde_json::Deserializer::from_str(&body[start..])
        .into_iter::<Value>()
        .next()
        .ok_or_else(|| anyhow!("empty response payload"))?
        .with_context(|| "malformed response envelope")?;
    let inner = envelope[0][2]
        .as_str()
        .ok_or_else(|| anyhow!("response envelope carries no result"))?;
    let data: Value = serde_json::from_str(inner).with_context(|| "malformed result")?;

    let candidates = data[1][0]
        .as_array()
        .ok_or_else(|| anyhow!("result carries no translation"))?;
    let text = if candidates.len() > 1 {
        // Gendered alternatives: each as "<text>\n<note>".
        candidates
            .iter()
            .map(|candidate| {
                format!(
                    "{}\n{}",
                    candidate[0].as_str().unwrap_or_default(),
                    candidate[2].as_str().unwrap_or_default()
                )
            })
            .collect::<Vec<_>>()
            .join("\n\n")
    } else {
        let sentences = candidates
            .first()
            .and_then(|candidate| candidate[5].as_array())
            .ok_or_else(|| anyhow!("translation carries no sentences"))?;
        sentences
            .iter()
            .filter_map(|sentence| {
                let mut options = Vec::new();
                flatten_strings(sentence, &mut options);
                options.into_iter().next()
            })
            .collect::<Vec<_>>()
            .join(" ")
    };

    let source_language = data[0][2]
        .as_str()
        .filter(|value| !value.is_empty())
        .unwrap_or(requested_source)
        .to_string();
    Ok(Translation {
        text,
        source_language,
        target_language: data[1][1].as_str().map(str::to_string),
    })
}

/// Byte offset just past the first line consisting only of digits.
fn payload_start(body: &str) -> Option<usize> {
    let mut offset = 0;
    for line in body.split_inclusive('\n') {
        let line_start = offset;
        offset += line.len();
        if line_start == 0 {
            continue;
        }
        if let Some(digits) = line.strip_suffix('\n') {
            let digits = digits.trim_end_matches('\r');
            if !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()) {
                return Some(offset);
            }
        }
    }
    None
}

fn flatten_strings<'a>(value: &'a Value, out: &mut Vec<&'a str>) {
    match value {
        Value::String(text) => out.push(text),
        Value::Array(items) => {
            for item in items {
                flatten_strings(item, out);
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wrap(data: &Value) -> String {
        let inner = serde_json::to_string(data).expect("inner");
        let envelope =
            serde_json::to_string(&json!([["wrb.fr", RPC_ID, inner, null, null, null, "generic"]]))
                .expect("envelope");
        format!(")]}}'\n\n{}\n{}\n25\n[[\"di\",42],[\"af.httprm\",41]]\n", envelope.len() + 1, envelope)
    }

    #[test]
    fn request_payload_nests_json() {
        let payload = request_payload("こんにちは", "auto", "en").expect("payload");
        let outer: Value = serde_json::from_str(&payload).expect("outer");
        assert_eq!(outer[0][0][0], "MkEWBc");
        assert_eq!(outer[0][0][3], "generic");
        let inner: Value =
            serde_json::from_str(outer[0][0][1].as_str().expect("inner")).expect("inner json");
        assert_eq!(inner, json!([["こんにちは", "auto", "en", true], [null]]));
    }

    #[test]
    fn endpoints_become_batch_urls() {
        assert!(endpoint_url("translate.google.ca").starts_with(
            "https://translate.google.ca/_/TranslateWebserverUi/data/batchexecute?rpcids=MkEWBc"
        ));
        assert!(endpoint_url("http://127.0.0.1:9000/").starts_with("http://127.0.0.1:9000/_/"));
    }

    #[test]
    fn sentences_are_joined_with_spaces() {
        let data = json!([
            [null, null, "ja"],
            [[[null, null, null, null, null, [
                ["Hello.", null, [["Hello.", 1], ["Hi.", 2]]],
                ["How are you?", null, [["How are you?", 1]]]
            ]]], "en"]
        ]);
        let translation = parse_response(&wrap(&data), "auto").expect("parse");
        assert_eq!(translation.text, "Hello. How are you?");
        assert_eq!(translation.source_language, "ja");
        assert_eq!(translation.target_language.as_deref(), Some("en"));
    }

    #[test]
    fn gendered_alternatives_are_listed() {
        let data = json!([
            [null, null, null],
            [[
                ["Es médica.", null, "(feminine)"],
                ["Es médico.", null, "(masculine)"]
            ], "es"]
        ]);
        let translation = parse_response(&wrap(&data), "en").expect("parse");
        assert_eq!(
            translation.text,
            "Es médica.\n(feminine)\n\nEs médico.\n(masculine)"
        );
        assert_eq!(translation.source_language, "en");
    }

    #[test]
    fn garbage_is_an_error() {
        assert!(parse_response("<html>blocked</html>", "auto").is_err());
        assert!(parse_response(")]}'\n\n12\n[[\"wrb.fr\"]]\n", "auto").is_err());
    }
}
