//! Prefill data retrieval.

use std::future::Future;

use forms_common::{FormsError, WorkerConfig};
use serde_json::Value;
use url::Url;

/// Source of prefill data for a form.
pub trait DataFetcher {
    /// Fetch the data to import into form `form_id`.
    ///
    /// `search` is the page's query string, forwarded verbatim so the data
    /// service can pick the record to prefill from. `Ok(None)` means there is
    /// nothing to import.
    fn fetch(
        &self,
        form_id: &str,
        search: Option<&str>,
    ) -> impl Future<Output = Result<Option<Value>, FormsError>>;
}

/// Fetches prefill data from the AEM forms data endpoint.
#[derive(Debug, Clone)]
pub struct HttpDataFetcher {
    client: reqwest::Client,
    base_url: Url,
}

impl HttpDataFetcher {
    pub fn new(base_url: Url) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url,
        }
    }

    pub fn from_config(config: &WorkerConfig) -> Self {
        Self::new(config.data_base_url.clone())
    }

    pub fn data_url(&self, form_id: &str, search: Option<&str>) -> Result<Url, FormsError> {
        let base = self.base_url.as_str().trim_end_matches('/');
        let search = search.unwrap_or("");
        let url = format!("{base}/adobe/forms/af/data/{form_id}{search}");
        Url::parse(&url).map_err(|e| FormsError::Fetch {
            form_id: form_id.to_string(),
            message: format!("invalid data URL {url}: {e}"),
        })
    }
}

impl DataFetcher for HttpDataFetcher {
    async fn fetch(&self, form_id: &str, search: Option<&str>) -> Result<Option<Value>, FormsError> {
        let url = self.data_url(form_id, search)?;
        let fetch_err = |message: String| FormsError::Fetch {
            form_id: form_id.to_string(),
            message,
        };

        tracing::debug!(%url, "fetching prefill data");
        let response = self
            .client
            .get(url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| fetch_err(e.to_string()))?;
        let body: Value = response
            .json()
            .await
            .map_err(|e| fetch_err(e.to_string()))?;

        Ok(unwrap_prefill(body))
    }
}

/// Pick the bound data out of a data service response.
///
/// Prefers `data.afData.afBoundData.data`, then `data.afData.afBoundData`,
/// then `data` itself.
pub fn unwrap_prefill(body: Value) -> Option<Value> {
    let Value::Object(mut body) = body else {
        return None;
    };
    let data = body.remove("data").filter(|d| !d.is_null())?;
    let bound = data
        .get("afData")
        .and_then(|af| af.get("afBoundData"))
        .filter(|b| !b.is_null());
    match bound {
        Some(bound) => match bound.get("data").filter(|d| !d.is_null()) {
            Some(inner) => Some(inner.clone()),
            None => Some(bound.clone()),
        },
        None => Some(data),
    }
}
