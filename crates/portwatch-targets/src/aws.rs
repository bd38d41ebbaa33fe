//! Public IPs from AWS EC2: Elastic IPs plus instance public addresses.

use crate::error::{Result, TargetError};
use portwatch_core::{AwsAccount, Target};
use std::collections::BTreeSet;

const DEFAULT_REGION: &str = "us-east-1";

/// Enumerates public IPs across a set of AWS accounts and regions.
#[derive(Debug, Clone)]
pub struct AwsSource {
    accounts: Vec<AwsAccount>,
}

impl AwsSource {
    /// Create a source for the given accounts.
    #[must_use]
    pub fn new(accounts: Vec<AwsAccount>) -> Self {
        Self { accounts }
    }

    /// Fetch every public IP from every configured account and region.
    pub async fn fetch(&self) -> Result<BTreeSet<Target>> {
        let mut targets = BTreeSet::new();

        for account in &self.accounts {
            let label = account
                .profile_name
                .clone()
                .unwrap_or_else(|| account.access_key_id.clone());

            let regions = if account.regions.is_empty() {
                vec![DEFAULT_REGION.to_string()]
            } else {
                account.regions.clone()
            };

            for region in &regions {
                let found = fetch_region(account, &label, region).await?;
                tracing::info!(
                    account = %label,
                    region = %region,
                    count = found.len(),
                    "Discovered AWS public IPs"
                );
                targets.extend(found);
            }
        }

        Ok(targets)
    }
}

#[cfg(feature = "aws")]
async fn fetch_region(account: &AwsAccount, label: &str, region: &str) -> Result<Vec<Target>> {
    let credentials = aws_sdk_ec2::config::Credentials::new(
        account.access_key_id.clone(),
        account.secret_access_key.clone(),
        None,
        None,
        "portwatch",
    );

    let region_config = aws_config::defaults(aws_config::BehaviorVersion::latest())
        .region(aws_config::Region::new(region.to_string()))
        .credentials_provider(credentials)
        .load()
        .await;
    let client = aws_sdk_ec2::Client::new(&region_config);

    let api_error = |message: String| TargetError::Aws {
        account: label.to_string(),
        region: region.to_string(),
        message,
    };

    let mut ips = Vec::new();

    let addresses = client
        .describe_addresses()
        .send()
        .await
        .map_err(|e| api_error(format!("DescribeAddresses failed: {e}")))?;
    ips.extend(
        addresses
            .addresses()
            .iter()
            .filter_map(|address| address.public_ip())
            .map(str::to_string),
    );

    let mut next_token: Option<String> = None;
    loop {
        let mut request = client.describe_instances();
        if let Some(ref token) = next_token {
            request = request.next_token(token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| api_error(format!("DescribeInstances failed: {e}")))?;

        for reservation in response.reservations() {
            ips.extend(
                reservation
                    .instances()
                    .iter()
                    .filter_map(|instance| instance.public_ip_address())
                    .map(str::to_string),
            );
        }

        match response.next_token() {
            Some(token) if !token.is_empty() => next_token = Some(token.to_string()),
            _ => break,
        }
    }

    Ok(ips
        .into_iter()
        .filter_map(|ip| Target::new(ip).ok())
        .collect())
}

#[cfg(not(feature = "aws"))]
async fn fetch_region(_account: &AwsAccount, _label: &str, _region: &str) -> Result<Vec<Target>> {
    Err(TargetError::Unsupported("aws".to_string()))
}
