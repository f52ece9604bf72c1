use std::{fs, path::Path};

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use base64::engine::{general_purpose::STANDARD as BASE64, Engine};
use log::info;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{Environment, Mechanism, SignOption, SigningGateway};
use crate::jws::algorithm::DigestAlgorithm;

/// Connection settings for a remote signing gateway.
///
/// Passed explicitly to [`HttpGateway::new`]; the project is chosen per call.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct GatewayConfig {
    /// Base URL of the gateway API
    pub url: String,
    /// API key for bearer authentication
    pub api_key: String,
}

impl GatewayConfig {
    /// Loads gateway settings from a JSON file.
    ///
    /// # Returns
    ///
    /// `Some(GatewayConfig)` if the file exists and is valid, `None` if the file doesn't exist.
    pub fn load(config_file: &Path) -> Result<Option<Self>> {
        if config_file.exists() {
            let contents = fs::read_to_string(config_file)?;
            let config = serde_json::from_str::<GatewayConfig>(&contents)?;

            Ok(Some(config))
        } else {
            info!("No signing gateway config found");

            Ok(None)
        }
    }
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct EnvironmentResponse {
    certificate_chain_data: String,
    key_id: String,
}

#[derive(Serialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
struct SignRequest {
    key_id: String,
    mechanism: Mechanism,
    digest_alg: DigestAlgorithm,
    payload: String,
    b64_flag: bool,
    raw_flag: bool,
}

/// Signing gateway reached over its REST API.
#[derive(Clone, Debug)]
pub struct HttpGateway {
    config: GatewayConfig,
    client: reqwest::Client,
}

impl HttpGateway {
    pub fn new(config: GatewayConfig) -> Self {
        HttpGateway {
            config,
            client: reqwest::Client::new(),
        }
    }

    fn project_url(&self, project: &str, endpoint: &str) -> String {
        let url = self.config.url.trim_end_matches('/');
        format!("{url}/api/v1/projects/{project}/{endpoint}")
    }

    async fn read_json(response: reqwest::Response) -> Result<Value> {
        let status = response.status();
        let text = response.text().await?;

        log::trace!("Response status: {status}");

        if !status.is_success() {
            return Err(anyhow!("Request failed with status {status}: {text}"));
        }

        if text.is_empty() {
            return Err(anyhow!("Server returned empty response"));
        }

        serde_json::from_str(&text)
            .map_err(|e| anyhow!("Failed to parse JSON response: {e}. Response body: {text}"))
    }
}

#[async_trait]
impl SigningGateway for HttpGateway {
    async fn environment(&self, project: &str) -> Result<Environment> {
        log::debug!("Fetching signing environment for {project}");
        let response = self
            .client
            .get(self.project_url(project, "environment"))
            .bearer_auth(&self.config.api_key)
            .send()
            .await
            .map_err(|e| anyhow!("unable to connect to {}: {e}", self.config.url))?;

        let response = Self::read_json(response).await?;
        let environment = serde_json::from_value::<EnvironmentResponse>(response)
            .map_err(|e| anyhow!("Failed to deserialize environment: {e}"))?;

        Ok(Environment {
            certificate_chain_data: environment.certificate_chain_data.into_bytes(),
            key_id: environment.key_id,
        })
    }

    async fn sign(&self, project: &str, option: &SignOption) -> Result<Vec<u8>> {
        // forwarded as-is; with b64Flag it is already base64 text
        let payload = String::from_utf8(option.payload.clone())
            .map_err(|_| anyhow!("payload must be UTF-8, set b64Flag for binary data"))?;

        log::trace!(
            "Sign request for {project}: key {} with {} over {}",
            option.key_id,
            option.mechanism,
            option.digest_algorithm
        );
        let request = SignRequest {
            key_id: option.key_id.clone(),
            mechanism: option.mechanism,
            digest_alg: option.digest_algorithm,
            payload,
            b64_flag: option.b64_flag,
            raw_flag: option.raw_flag,
        };

        let request = self
            .client
            .post(self.project_url(project, "sign"))
            .bearer_auth(&self.config.api_key)
            .json(&request);

        let response = request
            .send()
            .await
            .map_err(|e| anyhow!("unable to connect to {}: {e}", self.config.url))?;
        let response = Self::read_json(response).await?;

        let sig = response
            .get("signature")
            .ok_or_else(|| anyhow!("API response is missing 'signature' field"))?
            .as_str()
            .ok_or_else(|| anyhow!("API response 'signature' field is not a string"))?;

        Ok(BASE64.decode(sig)?)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use wiremock::{
        matchers::{bearer_token, body_partial_json, method, path},
        Mock, MockServer, ResponseTemplate,
    };

    use rsa::{
        pkcs1v15,
        pkcs8::DecodePrivateKey,
        signature::{SignatureEncoding, Signer},
        RsaPrivateKey,
    };
    use sha2::Sha256;

    use super::*;
    use crate::{
        gateway::public_key_from_chain,
        jws::{self, compact, SignatureAlgorithm},
    };

    const RSA_KEY: &str = include_str!("../../testdata/rsa_key.pem");
    const RSA_CERT: &str = include_str!("../../testdata/rsa_cert.pem");

    fn gateway(server: &MockServer) -> HttpGateway {
        HttpGateway::new(GatewayConfig {
            url: format!("{}/", server.uri()),
            api_key: "secret-token".to_owned(),
        })
    }

    #[tokio::test]
    async fn fetches_environment() {
        let _ = env_logger::builder().is_test(true).try_init();
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/projects/proj-1/environment"))
            .and(bearer_token("secret-token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "certificateChainData": RSA_CERT,
                "keyId": "key-123",
            })))
            .mount(&server)
            .await;

        let environment = gateway(&server).environment("proj-1").await.unwrap();
        assert_eq!(environment.key_id, "key-123");
        assert_eq!(environment.certificate_chain_data, RSA_CERT.as_bytes().to_vec());
    }

    #[tokio::test]
    async fn environment_failure_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404).set_body_string("no such project"))
            .mount(&server)
            .await;

        let err = gateway(&server).environment("proj-1").await.unwrap_err();
        assert!(err.to_string().contains("404"), "{err}");
    }

    #[tokio::test]
    async fn sends_base64_payload() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v1/projects/proj-1/sign"))
            .and(bearer_token("secret-token"))
            .and(body_partial_json(json!({
                "keyId": "key-123",
                "mechanism": "rsa-pkcs",
                "digestAlg": "sha256",
                "payload": "aGVhZGVyLnBheWxvYWQ=",
                "b64Flag": true,
                "rawFlag": false,
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "signature": BASE64.encode([1u8, 2, 3]),
            })))
            .mount(&server)
            .await;

        let sig = gateway(&server)
            .sign(
                "proj-1",
                &SignOption {
                    key_id: "key-123".to_owned(),
                    mechanism: Mechanism::RsaPkcs,
                    digest_algorithm: DigestAlgorithm::Sha256,
                    payload: b"aGVhZGVyLnBheWxvYWQ=".to_vec(),
                    b64_flag: true,
                    raw_flag: false,
                },
            )
            .await
            .unwrap();
        assert_eq!(sig, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn signs_token_through_gateway() {
        let _ = env_logger::builder().is_test(true).try_init();
        let server = MockServer::start().await;
        let payload = br#"{"files":[{"name":"data.json","hash":"abc123"}]}"#;
        let input = compact::build_signing_input(br#"{"alg":"RS256"}"#, payload);

        let key = RsaPrivateKey::from_pkcs8_pem(RSA_KEY).unwrap();
        let signature = pkcs1v15::SigningKey::<Sha256>::new(key)
            .sign(&input)
            .to_vec();

        Mock::given(method("GET"))
            .and(path("/api/v1/projects/proj-1/environment"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "certificateChainData": RSA_CERT,
                "keyId": "key-123",
            })))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/api/v1/projects/proj-1/sign"))
            .and(body_partial_json(json!({
                "keyId": "key-123",
                "mechanism": "rsa-pkcs",
                "digestAlg": "sha256",
                "payload": BASE64.encode(&input),
                "b64Flag": true,
                "rawFlag": false,
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "signature": BASE64.encode(&signature),
            })))
            .expect(1)
            .mount(&server)
            .await;

        let token = jws::sign_with_default_header(
            payload,
            SignatureAlgorithm::RS256,
            "proj-1",
            &gateway(&server),
        )
        .await
        .unwrap();
        assert!(token.starts_with("eyJhbGciOiJSUzI1NiJ9."), "{token}");

        let public_key = public_key_from_chain(RSA_CERT.as_bytes()).unwrap();
        let decoded = jws::verify_token(&token, SignatureAlgorithm::RS256, &public_key).unwrap();
        assert_eq!(decoded, payload.to_vec());
    }

    #[tokio::test]
    async fn unreachable_gateway() {
        let option = SignOption {
            key_id: "key-123".to_owned(),
            mechanism: Mechanism::RsaPkcs,
            digest_algorithm: DigestAlgorithm::Sha256,
            payload: b"YQ==".to_vec(),
            b64_flag: true,
            raw_flag: false,
        };
        let gateway = HttpGateway::new(GatewayConfig {
            url: "http://127.0.0.1:1".to_owned(),
            api_key: "secret-token".to_owned(),
        });

        let err = gateway.sign("proj-1", &option).await.unwrap_err();
        assert!(err.to_string().contains("unable to connect to"), "{err}");
    }

    #[tokio::test]
    async fn missing_signature_field() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"sig": "AQID"})))
            .mount(&server)
            .await;

        let option = SignOption {
            key_id: "key-123".to_owned(),
            mechanism: Mechanism::Ecdsa,
            digest_algorithm: DigestAlgorithm::Sha256,
            payload: b"a.b".to_vec(),
            b64_flag: false,
            raw_flag: false,
        };
        let err = gateway(&server).sign("proj-1", &option).await.unwrap_err();
        assert!(err.to_string().contains("signature"), "{err}");
    }

    #[test]
    fn load_config() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("gateway.json");
        assert!(GatewayConfig::load(&file).unwrap().is_none());

        fs::write(&file, r#"{"url":"https://sign.example.com","api_key":"k"}"#).unwrap();
        let config = GatewayConfig::load(&file).unwrap().unwrap();
        assert_eq!(config.url, "https://sign.example.com");
        assert_eq!(config.api_key, "k");
    }
}
