use anyhow::{Result, anyhow};
use reqwest::{
    Client,
    header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE, AUTHORIZATION},
    Method,
};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, error};

use shared_config::AppConfig;

/// PostgREST `Prefer` header values used by the stores.
pub mod prefer {
    pub const RETURN_REPRESENTATION: &str = "return=representation";
    pub const IGNORE_DUPLICATES: &str = "return=representation,resolution=ignore-duplicates";
    pub const MERGE_DUPLICATES: &str = "return=representation,resolution=merge-duplicates";
}

#[derive(Clone)]
pub struct SupabaseClient {
    client: Client,
    base_url: String,
    service_key: String,
}

impl SupabaseClient {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            client: Client::new(),
            base_url: config.supabase_url.trim_end_matches('/').to_string(),
            service_key: config.supabase_service_role_key.clone(),
        }
    }

    fn get_headers(&self, prefer: Option<&str>) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();

        headers.insert("apikey", HeaderValue::from_str(&self.service_key)?);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", self.service_key))?,
        );

        if let Some(prefer) = prefer {
            headers.insert(HeaderName::from_static("prefer"), HeaderValue::from_str(prefer)?);
        }

        Ok(headers)
    }

    pub async fn request<T>(&self, method: Method, path: &str, body: Option<Value>) -> Result<T>
    where T: DeserializeOwned {
        self.request_with_prefer(method, path, body, None).await
    }

    /// Same as [`request`](Self::request) with a PostgREST `Prefer` header attached.
    pub async fn request_with_prefer<T>(&self, method: Method, path: &str,
                                        body: Option<Value>, prefer: Option<&str>)
                                        -> Result<T>
    where T: DeserializeOwned {
        let url = format!("{}{}", self.base_url, path);
        debug!("Making {} request to {}", method, url);

        let headers = self.get_headers(prefer)?;

        let mut req = self.client.request(method, &url)
            .headers(headers);

        if let Some(body_data) = body {
            req = req.json(&body_data);
        }

        let response = req.send().await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await?;
            error!("API error ({}): {}", status, error_text);

            return Err(match status.as_u16() {
                401 | 403 => anyhow!("Authentication error: {}", error_text),
                404 => anyhow!("Resource not found: {}", error_text),
                409 => anyhow!("Conflict: {}", error_text),
                _ => anyhow!("API error ({}): {}", status, error_text),
            });
        }

        let data = response.json::<T>().await?;
        Ok(data)
    }

    /// Calls a Postgres function exposed under `/rest/v1/rpc/{name}`.
    pub async fn rpc<T>(&self, function: &str, args: Value) -> Result<T>
    where T: DeserializeOwned {
        let path = format!("/rest/v1/rpc/{}", function);
        self.request(Method::POST, &path, Some(args)).await
    }

    pub fn get_base_url(&self) -> &str {
        &self.base_url
    }
}
