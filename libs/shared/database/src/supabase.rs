use anyhow::{Result, anyhow};
use reqwest::{
    Client,
    header::{HeaderMap, HeaderValue, CONTENT_TYPE, AUTHORIZATION},
    Method,
};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, error};

use shared_config::AppConfig;

pub struct SupabaseClient {
    client: Client,
    base_url: String,
    anon_key: String,
    service_role_key: String,
}

impl SupabaseClient {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            client: Client::new(),
            base_url: config.supabase_url.clone(),
            anon_key: config.supabase_anon_key.clone(),
            service_role_key: config.supabase_service_role_key.clone(),
        }
    }

    fn get_headers(&self, api_key: &str, auth_token: Option<&str>) -> HeaderMap {
        let mut headers = HeaderMap::new();

        headers.insert("apikey", HeaderValue::from_str(api_key).unwrap());
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        if let Some(token) = auth_token {
            headers.insert(
                AUTHORIZATION,
                HeaderValue::from_str(&format!("Bearer {}", token)).unwrap()
            );
        }

        headers
    }

    async fn execute<T>(&self, method: Method, path: &str,
                        mut headers: HeaderMap, body: Option<Value>,
                        extra_headers: Option<HeaderMap>)
                        -> Result<T>
    where T: DeserializeOwned {
        let url = format!("{}{}", self.base_url, path);
        debug!("Making request to {}", url);

        if let Some(extra) = extra_headers {
            headers.extend(extra);
        }

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
                _ => anyhow!("API error ({}): {}", status, error_text),
            });
        }

        let data = response.json::<T>().await?;
        Ok(data)
    }

    pub async fn request<T>(&self, method: Method, path: &str,
                            auth_token: Option<&str>, body: Option<Value>)
                            -> Result<T>
    where T: DeserializeOwned {
        let headers = self.get_headers(&self.anon_key, auth_token);
        self.execute(method, path, headers, body, None).await
    }

    pub async fn request_with_headers<T>(&self, method: Method, path: &str,
                                         auth_token: Option<&str>, body: Option<Value>,
                                         extra_headers: Option<HeaderMap>)
                                         -> Result<T>
    where T: DeserializeOwned {
        let headers = self.get_headers(&self.anon_key, auth_token);
        self.execute(method, path, headers, body, extra_headers).await
    }

    /// Privileged path: service-role key bypasses row-level security.
    ///
    /// Held slot rows are readable only by their holder on the anon path, so
    /// internal steps (overlap release, confirm verification, sweeping,
    /// recalculation) go through here.
    pub async fn service_request<T>(&self, method: Method, path: &str,
                                    body: Option<Value>)
                                    -> Result<T>
    where T: DeserializeOwned {
        let headers = self.get_headers(&self.service_role_key, Some(&self.service_role_key));
        self.execute(method, path, headers, body, None).await
    }

    pub async fn service_request_with_headers<T>(&self, method: Method, path: &str,
                                                 body: Option<Value>,
                                                 extra_headers: Option<HeaderMap>)
                                                 -> Result<T>
    where T: DeserializeOwned {
        let headers = self.get_headers(&self.service_role_key, Some(&self.service_role_key));
        self.execute(method, path, headers, body, extra_headers).await
    }

    pub fn get_base_url(&self) -> &str {
        &self.base_url
    }
}

/// The `Prefer: return=representation` header makes PostgREST return the rows
/// a write actually touched; an empty array means the filter matched nothing,
/// which is how conditional updates report a failed precondition.
pub fn representation_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert("Prefer", HeaderValue::from_static("return=representation"));
    headers
}
