use crate::db::{AccountType, AdAccountUpsert, DbActorHandle, TokenPatch};
use crate::error::AdsError;
use crate::google_ads::{CustomerId, GoogleAdsApi};
use serde::Serialize;
use std::collections::HashSet;
use tracing::{info, warn};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DiscoveryReport {
    pub accounts_discovered: usize,
    pub managers: usize,
    /// Clients found only through a manager's hierarchy.
    pub managed_clients: usize,
    pub skipped: usize,
}

/// Records every account a freshly connected token can reach in `ad_accounts`.
///
/// Direct clients of every manager found are recorded too, since most client accounts
/// are only reachable through a manager. The first manager account found becomes the
/// token's `login_customer_id` unless one is already set. Accounts that cannot be
/// described are skipped.
pub async fn discover_accounts(
    api: &GoogleAdsApi,
    db: &DbActorHandle,
    user_id: &str,
    token_id: i64,
    access_token: &str,
    current_login: Option<&str>,
) -> Result<DiscoveryReport, AdsError> {
    let accessible = api.list_accessible_customers(access_token).await?;
    let mut report = DiscoveryReport::default();
    let mut managers: Vec<CustomerId> = Vec::new();
    let mut seen: HashSet<CustomerId> = HashSet::new();

    for customer in accessible {
        let fields = match api.describe_customer(access_token, &customer).await {
            Ok(Some(fields)) => fields,
            Ok(None) => {
                report.skipped += 1;
                continue;
            }
            Err(e) => {
                warn!(customer_id = %customer.masked(), error = %e, "Skipping account during discovery");
                report.skipped += 1;
                continue;
            }
        };

        let account_type = AccountType::from_manager_flag(fields.manager);
        db.upsert_ad_account(AdAccountUpsert {
            user_id: user_id.to_string(),
            customer_id: customer.as_str().to_string(),
            descriptive_name: fields.descriptive_name,
            account_type,
        })
        .await?;

        report.accounts_discovered += 1;
        seen.insert(customer.clone());
        if account_type == AccountType::Manager {
            report.managers += 1;
            managers.push(customer);
        }
    }

    for manager in &managers {
        let clients = match api.list_client_accounts(access_token, manager).await {
            Ok(clients) => clients,
            Err(e) => {
                warn!(manager_id = %manager.masked(), error = %e, "Skipping manager hierarchy during discovery");
                continue;
            }
        };
        for (client, fields) in clients {
            if !seen.insert(client.clone()) {
                continue;
            }
            db.upsert_ad_account(AdAccountUpsert {
                user_id: user_id.to_string(),
                customer_id: client.as_str().to_string(),
                descriptive_name: fields.descriptive_name,
                account_type: AccountType::Client,
            })
            .await?;
            report.accounts_discovered += 1;
            report.managed_clients += 1;
        }
    }

    let first_manager = managers.into_iter().next();

    let has_login = current_login.is_some_and(|s| !s.is_empty());
    if let (false, Some(manager)) = (has_login, first_manager) {
        db.patch_token(
            token_id,
            TokenPatch {
                login_customer_id: Some(manager.as_str().to_string()),
                ..TokenPatch::default()
            },
        )
        .await?;
        info!(manager_id = %manager.masked(), "Default manager account recorded");
    }

    info!(
        user_id,
        accounts = report.accounts_discovered,
        managers = report.managers,
        managed_clients = report.managed_clients,
        skipped = report.skipped,
        "Account discovery finished"
    );
    Ok(report)
}
