use crate::core::{
    BouncedEmailSet, ConfigProvider, ContactStats, ContactsApi, DeleteFailure, FlaggedContact,
    RemovalOutcome, ScanFigures, ScanReport, Storage,
};
use crate::utils::error::Result;

/// Finds contacts whose addresses bounced and removes them.
pub struct BounceCleaner<A: ContactsApi, S: Storage, C: ConfigProvider> {
    api: A,
    storage: S,
    config: C,
    bounced: BouncedEmailSet,
}

impl<A: ContactsApi, S: Storage, C: ConfigProvider> BounceCleaner<A, S, C> {
    pub fn new(api: A, storage: S, config: C, bounced: BouncedEmailSet) -> Self {
        Self {
            api,
            storage,
            config,
            bounced,
        }
    }

    /// Walks every page of the contact list and flags contacts with at
    /// least one bounced address. A failed page aborts the whole scan.
    pub async fn scan(&self) -> Result<ScanReport> {
        let mut report = ScanReport::default();

        if self.bounced.is_empty() {
            tracing::warn!("⚠️  No bounced emails loaded, nothing to search for");
            return Ok(report);
        }

        tracing::info!(
            "🔍 Searching contacts for {} bounced emails...",
            self.bounced.len()
        );

        let mut page_token: Option<String> = None;
        loop {
            let page = self
                .api
                .list_contacts(page_token.as_deref(), self.config.page_size())
                .await?;

            report.total_scanned += page.contacts.len();

            for contact in &page.contacts {
                if let Some(email) = self.bounced.first_match(contact) {
                    tracing::debug!("Matched {} via {}", contact.resource_name, email);
                    report.flagged.push(FlaggedContact::from_match(contact, email));
                }
            }

            match page.next_page_token {
                Some(token) => {
                    tracing::info!("  Processed {} contacts so far...", report.total_scanned);
                    page_token = Some(token);
                }
                None => break,
            }
        }

        tracing::info!(
            "✅ Scanned {} contacts, {} with bounced emails",
            report.total_scanned,
            report.flagged.len()
        );
        Ok(report)
    }

    /// Scans, then deletes the flagged contacts unless running dry. A
    /// failed delete is recorded and the remaining contacts still go.
    pub async fn remove(&self) -> Result<RemovalOutcome> {
        let scan = self.scan().await?;
        let dry_run = self.config.dry_run();
        let mut outcome = RemovalOutcome {
            dry_run,
            ..RemovalOutcome::default()
        };

        if dry_run || scan.flagged.is_empty() {
            outcome.scan = scan;
            return Ok(outcome);
        }

        tracing::info!("⏳ Starting deletion of {} contacts", scan.flagged.len());
        let batch_size = self.config.delete_batch_size().max(1);

        for (batch_index, batch) in scan.flagged.chunks(batch_size).enumerate() {
            tracing::info!(
                "Processing batch {} ({} contacts)...",
                batch_index + 1,
                batch.len()
            );

            for contact in batch {
                match self.api.delete_contact(&contact.resource_name).await {
                    Ok(()) => {
                        outcome.deleted += 1;
                        tracing::info!("  ✅ Deleted: {} ({})", contact.name, contact.email);
                    }
                    Err(e) => {
                        tracing::error!("  ❌ Failed: {} - {}", contact.name, e);
                        outcome.failures.push(DeleteFailure {
                            contact: contact.clone(),
                            error: e.to_string(),
                        });
                    }
                }
            }
        }

        outcome.scan = scan;
        Ok(outcome)
    }

    /// Writes the flagged contacts to the export file as a JSON array.
    /// Nothing is written when no contact matched.
    pub async fn export(&self) -> Result<ScanReport> {
        let scan = self.scan().await?;

        if scan.flagged.is_empty() {
            tracing::info!("No contacts to export");
            return Ok(scan);
        }

        let json = serde_json::to_string_pretty(&scan.flagged)?;
        self.storage
            .write_file(self.config.export_file(), json.as_bytes())
            .await?;
        tracing::info!(
            "📁 Exported {} contacts to {}",
            scan.flagged.len(),
            self.config.export_file()
        );
        Ok(scan)
    }

    pub async fn stats(&self) -> Result<ContactStats> {
        let total_contacts = self.api.total_contacts().await?;

        let scan = if self.bounced.is_empty() {
            None
        } else {
            let report = self.scan().await?;
            let flagged = report.flagged.len();
            Some(ScanFigures {
                scanned: report.total_scanned,
                flagged,
                remaining: total_contacts.saturating_sub(flagged as u64),
            })
        };

        Ok(ContactStats {
            total_contacts,
            bounced_loaded: self.bounced.len(),
            scan,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Contact, ContactPage};
    use crate::utils::error::CleanerError;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    /// In-memory contact store serving fixed pages and recording deletes.
    #[derive(Clone, Default)]
    struct MockApi {
        pages: Vec<Vec<Contact>>,
        failing_deletes: Vec<String>,
        fail_listing_at: Option<usize>,
        total: u64,
        deleted: Arc<Mutex<Vec<String>>>,
        list_calls: Arc<Mutex<Vec<Option<String>>>>,
    }

    impl MockApi {
        fn with_pages(pages: Vec<Vec<Contact>>) -> Self {
            let total = pages.iter().map(|p| p.len() as u64).sum();
            Self {
                pages,
                total,
                ..Self::default()
            }
        }

        fn deleted(&self) -> Vec<String> {
            self.deleted.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ContactsApi for MockApi {
        async fn list_contacts(
            &self,
            page_token: Option<&str>,
            _page_size: u32,
        ) -> Result<ContactPage> {
            self.list_calls
                .lock()
                .unwrap()
                .push(page_token.map(str::to_string));

            let index = match page_token {
                None => 0,
                Some(token) => token.trim_start_matches("page-").parse::<usize>().unwrap(),
            };
            if self.fail_listing_at == Some(index) {
                return Err(CleanerError::ApiStatusError {
                    status: 500,
                    message: "backend error".to_string(),
                });
            }

            let next_page_token = if index + 1 < self.pages.len() {
                Some(format!("page-{}", index + 1))
            } else {
                None
            };
            Ok(ContactPage {
                contacts: self.pages.get(index).cloned().unwrap_or_default(),
                next_page_token,
            })
        }

        async fn total_contacts(&self) -> Result<u64> {
            Ok(self.total)
        }

        async fn delete_contact(&self, resource_name: &str) -> Result<()> {
            if self.failing_deletes.iter().any(|r| r == resource_name) {
                return Err(CleanerError::ApiStatusError {
                    status: 404,
                    message: "Requested entity was not found.".to_string(),
                });
            }
            self.deleted.lock().unwrap().push(resource_name.to_string());
            Ok(())
        }
    }

    #[derive(Clone, Default)]
    struct MockStorage {
        files: Arc<Mutex<HashMap<String, Vec<u8>>>>,
    }

    impl MockStorage {
        fn get_file(&self, path: &str) -> Option<Vec<u8>> {
            self.files.lock().unwrap().get(path).cloned()
        }
    }

    impl Storage for MockStorage {
        async fn write_file(&self, path: &str, data: &[u8]) -> Result<()> {
            self.files
                .lock()
                .unwrap()
                .insert(path.to_string(), data.to_vec());
            Ok(())
        }
    }

    struct MockConfig {
        dry_run: bool,
        batch_size: usize,
    }

    impl MockConfig {
        fn dry() -> Self {
            Self {
                dry_run: true,
                batch_size: 2,
            }
        }

        fn live() -> Self {
            Self {
                dry_run: false,
                batch_size: 2,
            }
        }
    }

    impl ConfigProvider for MockConfig {
        fn export_file(&self) -> &str {
            "contacts_to_delete.json"
        }

        fn dry_run(&self) -> bool {
            self.dry_run
        }

        fn page_size(&self) -> u32 {
            1000
        }

        fn delete_batch_size(&self) -> usize {
            self.batch_size
        }
    }

    fn contact(id: u32, name: Option<&str>, emails: &[&str]) -> Contact {
        Contact {
            resource_name: format!("people/c{}", id),
            display_name: name.map(str::to_string),
            emails: emails.iter().map(|e| e.to_string()).collect(),
            etag: Some(format!("etag-{}", id)),
        }
    }

    fn bounced(lines: &[&str]) -> BouncedEmailSet {
        BouncedEmailSet::from_lines(lines.iter().copied())
    }

    fn two_page_api() -> MockApi {
        MockApi::with_pages(vec![
            vec![
                contact(1, Some("Alice"), &["alice@example.com"]),
                contact(2, Some("Bob"), &["bob@work.example", "BOB@Bounce.example"]),
                contact(3, None, &[]),
            ],
            vec![
                contact(4, None, &["gone@example.com"]),
                contact(5, Some("Eve"), &["eve@example.com"]),
            ],
        ])
    }

    #[tokio::test]
    async fn test_scan_follows_pages_and_flags_case_insensitively() {
        let api = two_page_api();
        let cleaner = BounceCleaner::new(
            api.clone(),
            MockStorage::default(),
            MockConfig::dry(),
            bounced(&["bob@bounce.example", "Gone@Example.com", "nobody@example.com"]),
        );

        let report = cleaner.scan().await.unwrap();

        assert_eq!(report.total_scanned, 5);
        assert_eq!(report.flagged.len(), 2);
        assert_eq!(report.flagged[0].resource_name, "people/c2");
        assert_eq!(report.flagged[0].email, "bob@bounce.example");
        assert_eq!(report.flagged[1].name, "Unknown");
        assert_eq!(
            *api.list_calls.lock().unwrap(),
            vec![None, Some("page-1".to_string())]
        );
    }

    #[tokio::test]
    async fn test_contact_with_several_bounced_emails_is_flagged_once() {
        let api = MockApi::with_pages(vec![vec![contact(
            9,
            Some("Dup"),
            &["a@bounce.example", "b@bounce.example"],
        )]]);
        let cleaner = BounceCleaner::new(
            api,
            MockStorage::default(),
            MockConfig::dry(),
            bounced(&["a@bounce.example", "b@bounce.example"]),
        );

        let report = cleaner.scan().await.unwrap();
        assert_eq!(report.flagged.len(), 1);
        assert_eq!(report.flagged[0].email, "a@bounce.example");
    }

    #[tokio::test]
    async fn test_scan_with_empty_bounced_set_skips_api() {
        let api = two_page_api();
        let cleaner = BounceCleaner::new(
            api.clone(),
            MockStorage::default(),
            MockConfig::dry(),
            BouncedEmailSet::new(),
        );

        let report = cleaner.scan().await.unwrap();
        assert_eq!(report.total_scanned, 0);
        assert!(report.flagged.is_empty());
        assert!(api.list_calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_scan_aborts_on_page_error() {
        let mut api = two_page_api();
        api.fail_listing_at = Some(1);
        let cleaner = BounceCleaner::new(
            api,
            MockStorage::default(),
            MockConfig::dry(),
            bounced(&["gone@example.com"]),
        );

        let err = cleaner.scan().await.unwrap_err();
        assert!(matches!(err, CleanerError::ApiStatusError { status: 500, .. }));
    }

    #[tokio::test]
    async fn test_dry_run_never_deletes() {
        let api = two_page_api();
        let cleaner = BounceCleaner::new(
            api.clone(),
            MockStorage::default(),
            MockConfig::dry(),
            bounced(&["bob@bounce.example", "gone@example.com"]),
        );

        let outcome = cleaner.remove().await.unwrap();

        assert!(outcome.dry_run);
        assert_eq!(outcome.scan.flagged.len(), 2);
        assert_eq!(outcome.deleted, 0);
        assert!(api.deleted().is_empty());
    }

    #[tokio::test]
    async fn test_live_run_deletes_and_counts_failures() {
        let mut api = MockApi::with_pages(vec![vec![
            contact(1, Some("A"), &["a@bounce.example"]),
            contact(2, Some("B"), &["b@bounce.example"]),
            contact(3, Some("C"), &["c@bounce.example"]),
            contact(4, Some("D"), &["keep@example.com"]),
        ]]);
        api.failing_deletes = vec!["people/c2".to_string()];
        let cleaner = BounceCleaner::new(
            api.clone(),
            MockStorage::default(),
            MockConfig::live(),
            bounced(&["a@bounce.example", "b@bounce.example", "c@bounce.example"]),
        );

        let outcome = cleaner.remove().await.unwrap();

        assert!(!outcome.dry_run);
        assert_eq!(outcome.deleted, 2);
        assert_eq!(outcome.failures.len(), 1);
        assert_eq!(outcome.failures[0].contact.resource_name, "people/c2");
        assert!(outcome.failures[0].error.contains("404"));
        assert_eq!(api.deleted(), vec!["people/c1", "people/c3"]);
    }

    #[tokio::test]
    async fn test_export_writes_exactly_flagged_contacts() {
        let storage = MockStorage::default();
        let cleaner = BounceCleaner::new(
            two_page_api(),
            storage.clone(),
            MockConfig::dry(),
            bounced(&["bob@bounce.example", "gone@example.com"]),
        );

        let report = cleaner.export().await.unwrap();
        let data = storage.get_file("contacts_to_delete.json").unwrap();
        let exported: Vec<FlaggedContact> = serde_json::from_slice(&data).unwrap();

        assert_eq!(exported, report.flagged);
        let raw: serde_json::Value = serde_json::from_slice(&data).unwrap();
        assert_eq!(raw[0]["resourceName"], "people/c2");
        assert_eq!(raw[0]["etag"], "etag-2");
    }

    #[tokio::test]
    async fn test_export_without_matches_writes_nothing() {
        let storage = MockStorage::default();
        let cleaner = BounceCleaner::new(
            two_page_api(),
            storage.clone(),
            MockConfig::dry(),
            bounced(&["nobody@example.com"]),
        );

        let report = cleaner.export().await.unwrap();
        assert!(report.flagged.is_empty());
        assert!(storage.get_file("contacts_to_delete.json").is_none());
    }

    #[tokio::test]
    async fn test_stats_counts_scanned_and_flagged() {
        let cleaner = BounceCleaner::new(
            two_page_api(),
            MockStorage::default(),
            MockConfig::dry(),
            bounced(&["gone@example.com", "alice@example.com", "unused@example.com"]),
        );

        let stats = cleaner.stats().await.unwrap();

        assert_eq!(stats.total_contacts, 5);
        assert_eq!(stats.bounced_loaded, 3);
        assert_eq!(
            stats.scan,
            Some(ScanFigures {
                scanned: 5,
                flagged: 2,
                remaining: 3
            })
        );
    }

    #[tokio::test]
    async fn test_stats_without_bounced_emails_skips_scan() {
        let api = two_page_api();
        let cleaner = BounceCleaner::new(
            api.clone(),
            MockStorage::default(),
            MockConfig::dry(),
            BouncedEmailSet::new(),
        );

        let stats = cleaner.stats().await.unwrap();
        assert_eq!(stats.total_contacts, 5);
        assert!(stats.scan.is_none());
        assert!(api.list_calls.lock().unwrap().is_empty());
    }
}
