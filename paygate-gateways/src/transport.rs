//! reqwest-backed `HttpTransport`.

use std::time::Duration;

use async_trait::async_trait;
use tracing::instrument;

use paygate_types::{
    HttpMethod, HttpOptions, HttpRequest, HttpResponse, HttpTransport, PayError, RequestBody,
};

pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new(options: &HttpOptions) -> Result<Self, PayError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(options.timeout_secs))
            .connect_timeout(Duration::from_secs(options.connect_timeout_secs))
            .build()
            .map_err(|e| PayError::Transport(e.to_string()))?;
        Ok(Self { client })
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    #[instrument(skip(self, request), fields(url = %request.url))]
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, PayError> {
        let mut builder = match request.method {
            HttpMethod::Get => self.client.get(&request.url),
            HttpMethod::Post => self.client.post(&request.url),
        };
        if !request.query.is_empty() {
            builder = builder.query(request.query.as_map());
        }
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        builder = match request.body {
            RequestBody::Empty => builder,
            RequestBody::Form(params) => builder.form(params.as_map()),
            RequestBody::Json(value) => builder.json(&value),
            RequestBody::Raw { content_type, body } => builder
                .header(reqwest::header::CONTENT_TYPE, content_type)
                .body(body),
        };

        let response = builder
            .send()
            .await
            .map_err(|e| PayError::Transport(e.to_string()))?;
        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| PayError::Transport(e.to_string()))?;

        Ok(HttpResponse { status, body })
    }
}
