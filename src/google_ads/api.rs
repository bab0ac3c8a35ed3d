use super::customer_id::CustomerId;
use super::types::{AccessibleCustomers, CustomerFields, GoogleAdsRow, SearchRequest, SearchResponse};
use crate::config::GoogleAdsConfig;
use crate::error::AdsError;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use tracing::debug;

/// Error bodies are cut to this many characters before logging or surfacing.
pub const UPSTREAM_BODY_PREVIEW_CHARS: usize = 300;

const LOGIN_CUSTOMER_ID: &str = "login-customer-id";
const DEVELOPER_TOKEN: &str = "developer-token";

/// Thin client over the Google Ads REST search surface.
#[derive(Clone)]
pub struct GoogleAdsApi {
    cfg: Arc<GoogleAdsConfig>,
    http: reqwest::Client,
}

impl GoogleAdsApi {
    pub fn new(cfg: Arc<GoogleAdsConfig>, http: reqwest::Client) -> Self {
        Self { cfg, http }
    }

    pub fn config(&self) -> &GoogleAdsConfig {
        &self.cfg
    }

    pub fn http(&self) -> &reqwest::Client {
        &self.http
    }

    fn search_url(&self, customer: &CustomerId) -> String {
        format!(
            "{}/customers/{}/googleAds:search",
            self.cfg.versioned_base(),
            customer.as_str()
        )
    }

    /// One page of a GAQL query. `login` becomes the `login-customer-id` header when set.
    pub async fn search_page(
        &self,
        access_token: &str,
        customer: &CustomerId,
        login: Option<&CustomerId>,
        query: &str,
        page_token: Option<&str>,
    ) -> Result<SearchResponse, AdsError> {
        let mut request = self
            .http
            .post(self.search_url(customer))
            .bearer_auth(access_token)
            .header(DEVELOPER_TOKEN, self.cfg.developer_token.as_str())
            .json(&SearchRequest { query, page_token });
        if let Some(login) = login {
            request = request.header(LOGIN_CUSTOMER_ID, login.as_str());
        }

        let resp = request.send().await?;
        read_json(resp, customer).await
    }

    /// Runs a GAQL query and follows `nextPageToken` until the result set is exhausted.
    pub async fn search_all(
        &self,
        access_token: &str,
        customer: &CustomerId,
        login: Option<&CustomerId>,
        query: &str,
    ) -> Result<Vec<GoogleAdsRow>, AdsError> {
        let mut rows = Vec::new();
        let mut page_token: Option<String> = None;
        let mut pages = 0usize;

        loop {
            let page = self
                .search_page(access_token, customer, login, query, page_token.as_deref())
                .await?;
            pages += 1;
            rows.extend(page.results);

            match page.next_page_token.filter(|t| !t.is_empty()) {
                Some(next) => page_token = Some(next),
                None => break,
            }
        }

        debug!(
            customer_id = %customer.masked(),
            pages,
            rows = rows.len(),
            "GAQL search completed"
        );
        Ok(rows)
    }

    /// Asks `candidate` whether `target` is among its client accounts.
    pub async fn manages(
        &self,
        access_token: &str,
        candidate: &CustomerId,
        target: &CustomerId,
    ) -> Result<bool, AdsError> {
        let query = format!(
            "SELECT customer_client.id, customer_client.manager, customer_client.level \
             FROM customer_client WHERE customer_client.id = {}",
            target.as_str()
        );
        let page = self
            .search_page(access_token, candidate, Some(candidate), &query, None)
            .await?;

        Ok(page.results.iter().any(|row| {
            row.customer_client
                .as_ref()
                .and_then(|c| c.id.as_deref())
                .is_some_and(|id| id == target.as_str())
        }))
    }

    /// Direct non-manager clients of `manager`, queried with `manager` as login customer.
    pub async fn list_client_accounts(
        &self,
        access_token: &str,
        manager: &CustomerId,
    ) -> Result<Vec<(CustomerId, CustomerFields)>, AdsError> {
        const QUERY: &str = "SELECT customer_client.id, customer_client.descriptive_name, \
             customer_client.manager, customer_client.level FROM customer_client \
             WHERE customer_client.level <= 1 AND customer_client.manager = FALSE";
        let rows = self
            .search_all(access_token, manager, Some(manager), QUERY)
            .await?;

        Ok(rows
            .into_iter()
            .filter_map(|row| row.customer_client)
            .filter(|client| !client.manager)
            .filter_map(|client| {
                let id = CustomerId::parse(client.id.as_deref()?).ok()?;
                (id != *manager).then_some((id, client))
            })
            .collect())
    }

    /// Account ids directly reachable with this token.
    pub async fn list_accessible_customers(
        &self,
        access_token: &str,
    ) -> Result<Vec<CustomerId>, AdsError> {
        let url = format!(
            "{}/customers:listAccessibleCustomers",
            self.cfg.versioned_base()
        );
        let resp = self
            .http
            .get(url)
            .bearer_auth(access_token)
            .header(DEVELOPER_TOKEN, self.cfg.developer_token.as_str())
            .send()
            .await?;

        if !resp.status().is_success() {
            return Err(upstream_status(resp).await);
        }
        let list: AccessibleCustomers = resp.json().await?;
        Ok(list
            .customer_ids()
            .filter_map(|id| CustomerId::parse(id).ok())
            .collect())
    }

    /// Name and manager flag of a single account.
    pub async fn describe_customer(
        &self,
        access_token: &str,
        customer: &CustomerId,
    ) -> Result<Option<CustomerFields>, AdsError> {
        const QUERY: &str =
            "SELECT customer.id, customer.descriptive_name, customer.manager FROM customer LIMIT 1";
        let page = self
            .search_page(access_token, customer, None, QUERY, None)
            .await?;
        Ok(page.results.into_iter().find_map(|row| row.customer))
    }
}

async fn read_json<T: DeserializeOwned>(
    resp: reqwest::Response,
    customer: &CustomerId,
) -> Result<T, AdsError> {
    if !resp.status().is_success() {
        let err = upstream_status(resp).await;
        debug!(customer_id = %customer.masked(), error = %err, "Google Ads search failed");
        return Err(err);
    }
    Ok(resp.json::<T>().await?)
}

async fn upstream_status(resp: reqwest::Response) -> AdsError {
    let status = resp.status();
    let body = match resp.bytes().await {
        Ok(bytes) => {
            let raw_body = String::from_utf8_lossy(&bytes);
            format!("{:.len$}", raw_body, len = UPSTREAM_BODY_PREVIEW_CHARS)
        }
        Err(e) => format!("<failed to read body: {e}>"),
    };
    AdsError::UpstreamStatus { status, body }
}
