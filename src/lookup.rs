//! HTTP client for the identity/financial lookup service.
//!
//! Implements the core `LookupService` port. Rate limiting and transport
//! problems map to the tagged outcome variants; nothing here panics or
//! aborts the caller.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};

use enrichment_core::model::LookupProfile;
use enrichment_core::ports::{LookupOutcome, LookupQuery, LookupService};

use crate::config::Config;

/// Request timeout for lookup calls.
const LOOKUP_TIMEOUT_SECS: u64 = 30;

pub struct LookupClient {
    http: Client,
    base_url: String,
    api_key: String,
}

impl LookupClient {
    pub fn new(config: &Config) -> anyhow::Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(LOOKUP_TIMEOUT_SECS))
            .build()?;
        Ok(Self {
            http,
            base_url: config.lookup_base_url.trim_end_matches('/').to_string(),
            api_key: config.lookup_api_key.clone(),
        })
    }

    fn url_for(&self, query: &LookupQuery) -> String {
        match query {
            LookupQuery::Cpf(cpf) => format!("{}/v1/persons?cpf={cpf}", self.base_url),
            LookupQuery::Phone(phone) => format!("{}/v1/persons?phone={phone}", self.base_url),
        }
    }
}

#[async_trait]
impl LookupService for LookupClient {
    async fn lookup(&self, query: &LookupQuery) -> LookupOutcome {
        let response = self
            .http
            .get(self.url_for(query))
            .bearer_auth(&self.api_key)
            .send()
            .await;

        let response = match response {
            Ok(r) => r,
            Err(e) => return LookupOutcome::Transient(format!("lookup request failed: {e}")),
        };

        match response.status() {
            StatusCode::TOO_MANY_REQUESTS => LookupOutcome::RateLimited,
            StatusCode::NOT_FOUND => LookupOutcome::NotFound,
            status if status.is_success() => match response.json::<serde_json::Value>().await {
                Ok(body) => match parse_profile(body) {
                    Some(profile) => LookupOutcome::Found(profile),
                    None => LookupOutcome::NotFound,
                },
                Err(e) => LookupOutcome::Transient(format!("malformed lookup response: {e}")),
            },
            status => LookupOutcome::Transient(format!("lookup returned {status}")),
        }
    }
}

/// Extract the fields the core classifies on; the full body rides along as
/// the raw payload.
fn parse_profile(body: serde_json::Value) -> Option<LookupProfile> {
    let personal = body.get("personal_info")?;
    let cpf = personal.get("cpf")?.as_str()?.to_string();
    if cpf.is_empty() {
        return None;
    }
    let name = personal
        .get("name")
        .and_then(|v| v.as_str())
        .map(String::from);
    let birth_date = personal
        .get("birth_date")
        .and_then(|v| v.as_str())
        .map(String::from);
    let mother_name = personal
        .get("mother_name")
        .and_then(|v| v.as_str())
        .map(String::from);

    let financial = body.get("financial_info");
    let income = financial
        .and_then(|f| f.get("income"))
        .and_then(|v| v.as_f64());
    let income_range = financial
        .and_then(|f| f.get("income_range"))
        .and_then(|v| v.as_str())
        .map(String::from);
    let purchasing_power_code = financial
        .and_then(|f| f.get("purchasing_power"))
        .and_then(|p| p.get("code"))
        .and_then(|v| v.as_i64())
        .map(|c| c as i32);

    let phones = body
        .get("contact_info")
        .and_then(|c| c.get("phones"))
        .and_then(|v| v.as_array())
        .map(|items| {
            items
                .iter()
                .filter_map(|p| p.get("phone").and_then(|v| v.as_str()))
                .map(String::from)
                .collect()
        })
        .unwrap_or_default();

    let addresses = body
        .get("addresses")
        .and_then(|v| v.as_array())
        .cloned()
        .unwrap_or_default();

    Some(LookupProfile {
        cpf,
        name,
        birth_date,
        mother_name,
        income,
        income_range,
        purchasing_power_code,
        phones,
        addresses,
        raw: body,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_a_full_profile() {
        let body = json!({
            "personal_info": {"cpf": "52998224725", "name": "Ana Souza"},
            "financial_info": {
                "income": 8200.0,
                "income_range": "5K-10K",
                "purchasing_power": {"code": 7}
            },
            "contact_info": {"phones": [{"phone": "11987654321", "ddd": "11"}]},
            "addresses": [{"city": "São Paulo"}]
        });
        let profile = parse_profile(body).expect("profile should parse");
        assert_eq!(profile.cpf, "52998224725");
        assert_eq!(profile.income, Some(8200.0));
        assert_eq!(profile.purchasing_power_code, Some(7));
        assert_eq!(profile.phones, vec!["11987654321"]);
        assert!(profile.has_identity());
        assert!(profile.has_economic_data());
    }

    #[test]
    fn body_without_cpf_is_not_a_profile() {
        assert!(parse_profile(json!({"personal_info": {"name": "Ana"}})).is_none());
        assert!(parse_profile(json!({"personal_info": {"cpf": ""}})).is_none());
        assert!(parse_profile(json!({})).is_none());
    }

    #[test]
    fn identity_only_body_parses_as_incomplete() {
        let profile = parse_profile(json!({
            "personal_info": {"cpf": "52998224725", "name": "Ana Souza"}
        }))
        .expect("profile should parse");
        assert!(profile.has_identity());
        assert!(!profile.has_economic_data());
    }
}
