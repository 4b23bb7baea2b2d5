use crate::core::{Contact, ContactPage, ContactsApi};
use crate::utils::error::{CleanerError, Result};
use crate::utils::retry::{parse_retry_after, RetryPolicy};
use async_trait::async_trait;
use reqwest::header::RETRY_AFTER;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use std::time::Duration;

const SCAN_PERSON_FIELDS: &str = "names,emailAddresses,metadata";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListConnectionsResponse {
    #[serde(default)]
    connections: Vec<Person>,
    next_page_token: Option<String>,
    total_people: Option<u64>,
    total_items: Option<u64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Person {
    resource_name: String,
    etag: Option<String>,
    #[serde(default)]
    names: Vec<PersonName>,
    #[serde(default)]
    email_addresses: Vec<EmailAddress>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PersonName {
    display_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct EmailAddress {
    value: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    message: String,
}

impl From<Person> for Contact {
    fn from(person: Person) -> Self {
        Contact {
            resource_name: person.resource_name,
            display_name: person.names.into_iter().find_map(|n| n.display_name),
            emails: person
                .email_addresses
                .into_iter()
                .filter_map(|e| e.value)
                .filter(|v| !v.trim().is_empty())
                .collect(),
            etag: person.etag,
        }
    }
}

/// Google People API client scoped to the authenticated user's contacts.
pub struct PeopleClient {
    client: Client,
    base_url: String,
    access_token: String,
    retry: RetryPolicy,
}

impl PeopleClient {
    pub fn new(
        base_url: &str,
        access_token: String,
        retry: RetryPolicy,
        timeout: Duration,
    ) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("bounce-cleaner/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            access_token,
            retry,
        })
    }

    fn connections_url(&self) -> String {
        format!("{}/v1/people/me/connections", self.base_url)
    }

    /// Sends the request built by `build`, retrying while the API answers
    /// 429. Any other non-success status is returned as an error.
    async fn send_with_retry<F>(&self, build: F) -> Result<Response>
    where
        F: Fn() -> RequestBuilder,
    {
        let mut attempt = 0;
        loop {
            attempt += 1;
            let response = build().bearer_auth(&self.access_token).send().await?;

            if response.status() != StatusCode::TOO_MANY_REQUESTS {
                return Self::check_status(response).await;
            }

            if !self.retry.should_retry(attempt) {
                tracing::warn!("⏳ Still rate limited after {} attempts, giving up", attempt);
                return Err(CleanerError::RateLimitedError { attempts: attempt });
            }

            let retry_after = parse_retry_after(
                response
                    .headers()
                    .get(RETRY_AFTER)
                    .and_then(|v| v.to_str().ok()),
            );
            let delay = self.retry.delay_for(attempt, retry_after);
            tracing::warn!(
                "⏳ Rate limited (attempt {}/{}), retrying in {:?}",
                attempt,
                self.retry.max_attempts,
                delay
            );
            tokio::time::sleep(delay).await;
        }
    }

    async fn check_status(response: Response) -> Result<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let message = match serde_json::from_str::<ApiErrorBody>(&body) {
            Ok(parsed) => parsed.error.message,
            Err(_) if !body.trim().is_empty() => body,
            Err(_) => status.canonical_reason().unwrap_or("unknown error").to_string(),
        };

        Err(CleanerError::ApiStatusError {
            status: status.as_u16(),
            message,
        })
    }
}

#[async_trait]
impl ContactsApi for PeopleClient {
    async fn list_contacts(
        &self,
        page_token: Option<&str>,
        page_size: u32,
    ) -> Result<ContactPage> {
        let url = self.connections_url();
        let mut query = vec![
            ("pageSize", page_size.to_string()),
            ("personFields", SCAN_PERSON_FIELDS.to_string()),
        ];
        if let Some(token) = page_token {
            query.push(("pageToken", token.to_string()));
        }

        tracing::debug!("Listing connections (pageToken: {:?})", page_token);
        let response = self
            .send_with_retry(|| self.client.get(&url).query(&query))
            .await?;
        let body: ListConnectionsResponse = response.json().await?;

        Ok(ContactPage {
            contacts: body.connections.into_iter().map(Contact::from).collect(),
            next_page_token: body.next_page_token.filter(|t| !t.is_empty()),
        })
    }

    async fn total_contacts(&self) -> Result<u64> {
        let url = self.connections_url();
        let query = [("pageSize", "1"), ("personFields", "names")];

        let response = self
            .send_with_retry(|| self.client.get(&url).query(&query))
            .await?;
        let body: ListConnectionsResponse = response.json().await?;

        Ok(body.total_people.or(body.total_items).unwrap_or(0))
    }

    async fn delete_contact(&self, resource_name: &str) -> Result<()> {
        if !resource_name.starts_with("people/") {
            return Err(CleanerError::InvalidConfigValueError {
                field: "resourceName".to_string(),
                value: resource_name.to_string(),
                reason: "Expected a resource name of the form people/<id>".to_string(),
            });
        }

        let url = format!("{}/v1/{}:deleteContact", self.base_url, resource_name);
        tracing::debug!("Deleting {}", resource_name);
        self.send_with_retry(|| self.client.delete(&url)).await?;
        Ok(())
    }
}
