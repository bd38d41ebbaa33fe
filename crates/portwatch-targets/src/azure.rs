//! Public IPs from Azure: every public IP resource in every visible subscription.

use crate::error::{Result, TargetError};
use portwatch_core::{AzureAccount, Target};
use reqwest::Client;
use serde::Deserialize;
use std::collections::BTreeSet;
use std::time::Duration;

const LOGIN_URL: &str = "https://login.microsoftonline.com";
const MANAGEMENT_URL: &str = "https://management.azure.com";
const SUBSCRIPTIONS_API_VERSION: &str = "2020-01-01";
const NETWORK_API_VERSION: &str = "2021-02-01";

/// Enumerates public IPs visible to a set of Azure service principals.
#[derive(Debug, Clone)]
pub struct AzureSource {
    accounts: Vec<AzureAccount>,
    client: Client,
    login_url: String,
    management_url: String,
}

impl AzureSource {
    /// Create a source for the given service principals.
    ///
    /// # Errors
    /// Returns error if the HTTP client cannot be created.
    pub fn new(accounts: Vec<AzureAccount>, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("portwatch/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            accounts,
            client,
            login_url: LOGIN_URL.to_string(),
            management_url: MANAGEMENT_URL.to_string(),
        })
    }

    /// Fetch every public IP for every configured service principal.
    pub async fn fetch(&self) -> Result<BTreeSet<Target>> {
        let mut targets = BTreeSet::new();

        for account in &self.accounts {
            let token = self.access_token(account).await?;
            let subscriptions = self.subscriptions(&token).await?;
            tracing::debug!(
                tenant_id = %account.tenant_id,
                count = subscriptions.len(),
                "Listed Azure subscriptions"
            );

            for subscription in &subscriptions {
                let found = self.public_ips(&token, subscription).await?;
                tracing::info!(
                    subscription = %subscription,
                    count = found.len(),
                    "Discovered Azure public IPs"
                );
                targets.extend(found);
            }
        }

        Ok(targets)
    }

    async fn access_token(&self, account: &AzureAccount) -> Result<String> {
        let token_url = format!("{}/{}/oauth2/v2.0/token", self.login_url, account.tenant_id);
        let scope = format!("{}/.default", self.management_url);

        let response = self
            .client
            .post(&token_url)
            .form(&[
                ("grant_type", "client_credentials"),
                ("client_id", account.client_id.as_str()),
                ("client_secret", account.client_secret.as_str()),
                ("scope", scope.as_str()),
            ])
            .send()
            .await?;

        let auth_error = |message: String| TargetError::AzureAuth {
            tenant_id: account.tenant_id.clone(),
            message,
        };

        if !response.status().is_success() {
            return Err(auth_error(format!(
                "token endpoint returned {}",
                response.status()
            )));
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| auth_error(format!("token parse failed: {e}")))?;

        token
            .access_token
            .ok_or_else(|| auth_error("no access_token in response".to_string()))
    }

    async fn subscriptions(&self, token: &str) -> Result<Vec<String>> {
        let url = format!(
            "{}/subscriptions?api-version={SUBSCRIPTIONS_API_VERSION}",
            self.management_url
        );
        let pages: Vec<ListPage<Subscription>> = self.get_all(token, url).await?;

        Ok(pages
            .into_iter()
            .flat_map(|page| page.value)
            .map(|subscription| subscription.subscription_id)
            .collect())
    }

    async fn public_ips(&self, token: &str, subscription: &str) -> Result<Vec<Target>> {
        let url = format!(
            "{}/subscriptions/{subscription}/providers/Microsoft.Network/publicIPAddresses?api-version={NETWORK_API_VERSION}",
            self.management_url
        );
        let pages: Vec<ListPage<PublicIpResource>> = self.get_all(token, url).await?;

        Ok(pages
            .into_iter()
            .flat_map(|page| page.value)
            .filter_map(PublicIpResource::into_target)
            .collect())
    }

    /// GET a list endpoint, following `nextLink` until exhausted.
    async fn get_all<T>(&self, token: &str, first: String) -> Result<Vec<ListPage<T>>>
    where
        T: for<'de> Deserialize<'de>,
    {
        let mut pages = Vec::new();
        let mut next_url = Some(first);

        while let Some(url) = next_url.take() {
            let response = self.client.get(&url).bearer_auth(token).send().await?;

            if !response.status().is_success() {
                return Err(TargetError::AzureApi {
                    status: response.status().as_u16(),
                    url,
                });
            }

            let page: ListPage<T> = response.json().await?;
            next_url = page.next_link.clone().filter(|link| !link.is_empty());
            pages.push(page);
        }

        Ok(pages)
    }
}

// --- Azure REST API response types ---

#[derive(Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
}

#[derive(Deserialize)]
struct ListPage<T> {
    #[serde(default = "Vec::new")]
    value: Vec<T>,
    #[serde(rename = "nextLink", default)]
    next_link: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Subscription {
    subscription_id: String,
}

#[derive(Deserialize)]
struct PublicIpResource {
    #[serde(default)]
    properties: Option<PublicIpProperties>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PublicIpProperties {
    ip_address: Option<String>,
}

impl PublicIpResource {
    /// Unallocated public IP resources carry no address.
    fn into_target(self) -> Option<Target> {
        self.properties
            .and_then(|p| p.ip_address)
            .and_then(|ip| Target::new(ip).ok())
    }
}
