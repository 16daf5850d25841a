//! Shared harness: mock identity provider, model provider and Dataverse, plus
//! a context bootstrapped against them exactly as the server does at startup.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;

use copilot::config::Config;
use copilot::context::AppContext;
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde_json::{json, Value};
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const TENANT: &str = "contoso-tenant";
pub const CLIENT_ID: &str = "copilot-api-client";
pub const KID: &str = "test-key-1";
pub const DATAVERSE_TOKEN: &str = "dataverse-obo-token-0123456789";

pub const SIGNING_KEY: &str = include_str!("../fixtures/signing_key.pem");
pub const ROGUE_KEY: &str = include_str!("../fixtures/rogue_key.pem");
/// Public half of `signing_key.pem`.
pub const MODULUS: &str = "pxr0rdkWwNu5_mgssRmGQ5is30woYgqhHK5VmCTLdu3IY7CaPmOpeZy9OErVmNUhQQTsa-NhaawbpnuJWiItF3H-Slo2KP5Y9O3_GOm7C87A3gPRfzKG-Wjf2igvZKSKy0PxO74w0PRgMnIp5ti8Z2aANYxs5duIDO2_fKcd61nNIvbcDA7fhIYP0SkB8h4BqQ4VJiNMPRfXhr6OvdsoBoTsu6-i2_w4CSImcf7EmuL9gUeAvGIa_UQM4G0enBYDf3Thpod2qbxlBp7TF_vs2gIS08Y0rAJw0_JH_XdhkqIZHsT58Gvqfx-od7vMENxAEOVv9k2Xi7itZsTczg57lQ";

pub const WORK_ORDER_FETCH: &str = r#"<fetch top="50">
  <entity name="msdyn_workorder">
    <attribute name="msdyn_name" />
    <attribute name="msdyn_city" />
    <filter>
      <condition attribute="ownerid" operator="eq-userid" />
      <condition attribute="statecode" operator="eq" value="0" />
      <condition attribute="msdyn_city" operator="eq" value="Seattle" />
    </filter>
  </entity>
</fetch>"#;

pub struct Harness {
    pub identity: MockServer,
    pub model: MockServer,
    pub dataverse: MockServer,
    pub ctx: Arc<AppContext>,
}

impl Harness {
    pub async fn start() -> Self {
        let identity = MockServer::start().await;
        let model = MockServer::start().await;
        let dataverse = MockServer::start().await;

        // Keys are read once at startup, never per request.
        Mock::given(method("GET"))
            .and(path(format!("/{}/discovery/v2.0/keys", TENANT)))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "keys": [{"kty": "RSA", "use": "sig", "kid": KID, "n": MODULUS, "e": "AQAB"}]
            })))
            .expect(1)
            .mount(&identity)
            .await;

        let env: HashMap<&str, String> = HashMap::from([
            ("AZURE_TENANT_ID", TENANT.to_string()),
            ("AZURE_CLIENT_ID", CLIENT_ID.to_string()),
            ("AZURE_CLIENT_SECRET", "client-secret".to_string()),
            ("AZURE_AUTHORITY_HOST", identity.uri()),
            ("DATAVERSE_URL", dataverse.uri()),
            ("OPENAI_API_KEY", "sk-test".to_string()),
            ("OPENAI_BASE_URL", model.uri()),
        ]);
        let config = Config::from_lookup(|k| env.get(k).cloned()).unwrap();
        let ctx = Arc::new(AppContext::bootstrap(config).await.unwrap());

        Self {
            identity,
            model,
            dataverse,
            ctx,
        }
    }

    pub fn issuer(&self) -> String {
        format!("{}/{}/v2.0", self.identity.uri(), TENANT)
    }

    pub fn claims(&self) -> Value {
        let now = chrono::Utc::now().timestamp();
        json!({
            "sub": "user-sub-1",
            "oid": "00000000-0000-0000-0000-00000000abcd",
            "name": "Dana Technician",
            "preferred_username": "dana@contoso.com",
            "iss": self.issuer(),
            "aud": CLIENT_ID,
            "scp": "user_impersonation",
            "iat": now,
            "nbf": now,
            "exp": now + 3600,
        })
    }

    /// A token the context accepts.
    pub fn token(&self) -> String {
        sign(SIGNING_KEY, Some(KID), &self.claims())
    }

    // ── Identity provider ────────────────────────────────────

    pub async fn expect_exchange(&self, user_token: &str) {
        Mock::given(method("POST"))
            .and(path(format!("/{}/oauth2/v2.0/token", TENANT)))
            .and(body_string_contains("requested_token_use=on_behalf_of"))
            .and(body_string_contains(format!("assertion={}", user_token)))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "token_type": "Bearer",
                "scope": format!("{}/user_impersonation", self.dataverse.uri()),
                "expires_in": 3599,
                "ext_expires_in": 3599,
                "access_token": DATAVERSE_TOKEN
            })))
            .expect(1)
            .mount(&self.identity)
            .await;
    }

    pub async fn reject_exchange(&self) {
        Mock::given(method("POST"))
            .and(path(format!("/{}/oauth2/v2.0/token", TENANT)))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "error": "invalid_grant",
                "error_description": "AADSTS65001: The user or administrator has not consented to use the application.",
                "error_codes": [65001],
                "correlation_id": "3d2f0f6e-0000-0000-0000-000000000000"
            })))
            .expect(1)
            .mount(&self.identity)
            .await;
    }

    pub async fn forbid_exchange(&self) {
        Mock::given(method("POST"))
            .and(path(format!("/{}/oauth2/v2.0/token", TENANT)))
            .respond_with(ResponseTemplate::new(500))
            .expect(0)
            .mount(&self.identity)
            .await;
    }

    // ── Model provider ───────────────────────────────────────

    pub async fn model_replies(&self, content: &str) {
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "chatcmpl-test",
                "object": "chat.completion",
                "model": "gpt-4o",
                "choices": [{
                    "index": 0,
                    "message": {"role": "assistant", "content": content},
                    "finish_reason": "stop"
                }]
            })))
            .expect(1)
            .mount(&self.model)
            .await;
    }

    pub async fn model_writes_fetch(&self, fetch: &str) {
        self.model_replies(&format!("```fetchxml\n{}\n```", fetch)).await;
    }

    pub async fn forbid_model(&self) {
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .expect(0)
            .mount(&self.model)
            .await;
    }

    // ── Dataverse ────────────────────────────────────────────

    pub async fn dataverse_responds(&self, collection: &str, template: ResponseTemplate) {
        Mock::given(method("GET"))
            .and(path(format!("/api/data/v9.2/{}", collection)))
            .and(wiremock::matchers::header(
                "authorization",
                format!("Bearer {}", DATAVERSE_TOKEN).as_str(),
            ))
            .respond_with(template)
            .expect(1)
            .mount(&self.dataverse)
            .await;
    }

    pub async fn forbid_dataverse(&self) {
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .expect(0)
            .mount(&self.dataverse)
            .await;
    }
}

pub fn sign(pem: &str, kid: Option<&str>, claims: &Value) -> String {
    let mut header = Header::new(Algorithm::RS256);
    header.kid = kid.map(String::from);
    let key = EncodingKey::from_rsa_pem(pem.as_bytes()).unwrap();
    encode(&header, claims, &key).unwrap()
}

pub fn work_orders(names: &[&str]) -> Value {
    let value: Vec<Value> = names
        .iter()
        .enumerate()
        .map(|(i, name)| {
            json!({
                "@odata.etag": format!("W/\"{}\"", 1000 + i),
                "msdyn_name": name,
                "msdyn_city": "Seattle",
                "msdyn_systemstatus": 690970001,
                "msdyn_systemstatus@OData.Community.Display.V1.FormattedValue": "Scheduled",
                "msdyn_workorderid": format!("00000000-0000-0000-0000-{:012}", i)
            })
        })
        .collect();
    json!({
        "@odata.context": "https://contoso.crm.dynamics.com/api/data/v9.2/$metadata#msdyn_workorders",
        "value": value
    })
}
