//! In-memory test doubles shared by the adapter tests.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, OnceLock};

use async_trait::async_trait;
use base64::{Engine, engine::general_purpose::STANDARD};
use rsa::pkcs8::{EncodePrivateKey, EncodePublicKey};
use rsa::rand_core::OsRng;
use rsa::{RsaPrivateKey, RsaPublicKey};
use serde_json::Value;

use paygate_types::{GatewayConfig, HttpRequest, HttpResponse, HttpTransport, PayError};

use crate::support::{Endpoints, Support};

/// Records requests and replays scripted responses in order.
#[derive(Default)]
pub struct MockTransport {
    requests: Mutex<Vec<HttpRequest>>,
    responses: Mutex<VecDeque<HttpResponse>>,
}

impl MockTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn push_json(&self, body: Value) {
        self.push_text(body.to_string());
    }

    pub fn push_text(&self, body: impl Into<String>) {
        self.push_status(200, body);
    }

    pub fn push_status(&self, status: u16, body: impl Into<String>) {
        self.responses.lock().unwrap().push_back(HttpResponse {
            status,
            body: body.into(),
        });
    }

    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn last_request(&self) -> HttpRequest {
        self.requests
            .lock()
            .unwrap()
            .last()
            .cloned()
            .expect("no request recorded")
    }
}

#[async_trait]
impl HttpTransport for MockTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, PayError> {
        self.requests.lock().unwrap().push(request);
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| PayError::Transport("no scripted response".into()))
    }
}

/// Builds a `Support` over a mock transport.
pub fn support(
    name: &'static str,
    urls: Endpoints,
    config: GatewayConfig,
) -> (Support, Arc<MockTransport>) {
    let http = MockTransport::new();
    (Support::new(name, config, urls, http.clone()), http)
}

pub struct TestKeys {
    pub private: RsaPrivateKey,
    pub public: RsaPublicKey,
    pub private_b64: String,
    pub public_b64: String,
}

/// One 1024-bit key pair per test binary; generation is slow.
pub fn test_keys() -> &'static TestKeys {
    static KEYS: OnceLock<TestKeys> = OnceLock::new();
    KEYS.get_or_init(|| {
        let private = RsaPrivateKey::new(&mut OsRng, 1024).unwrap();
        let public = private.to_public_key();
        let private_b64 = STANDARD.encode(private.to_pkcs8_der().unwrap().as_bytes());
        let public_b64 = STANDARD.encode(public.to_public_key_der().unwrap().as_bytes());
        TestKeys {
            private,
            public,
            private_b64,
            public_b64,
        }
    })
}
