use crate::utils::error::{CleanerError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

/// Lowercased, trimmed form used for every email comparison.
pub fn normalize_email(raw: &str) -> String {
    raw.trim().to_lowercase()
}

/// A remote contact, reduced to what matching and deletion need.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contact {
    pub resource_name: String,
    pub display_name: Option<String>,
    pub emails: Vec<String>,
    pub etag: Option<String>,
}

impl Contact {
    pub fn name_or_unknown(&self) -> &str {
        self.display_name
            .as_deref()
            .filter(|n| !n.trim().is_empty())
            .unwrap_or("Unknown")
    }
}

/// One page of the remote connection listing.
#[derive(Debug, Clone, Default)]
pub struct ContactPage {
    pub contacts: Vec<Contact>,
    pub next_page_token: Option<String>,
}

/// Addresses that failed delivery, normalized and deduplicated.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BouncedEmailSet {
    emails: HashSet<String>,
}

impl BouncedEmailSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads one address per line. Blank lines and lines without an `@`
    /// are skipped.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(CleanerError::BouncedFileNotFound {
                    path: path.display().to_string(),
                });
            }
            Err(e) => return Err(e.into()),
        };

        let set = Self::from_lines(content.lines());
        tracing::info!(
            "📄 Loaded {} bounced emails from {}",
            set.len(),
            path.display()
        );
        Ok(set)
    }

    pub fn from_lines<'a, I>(lines: I) -> Self
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut set = Self::new();
        for line in lines {
            set.insert(line);
        }
        set
    }

    /// Returns false when the value was rejected or already present.
    pub fn insert(&mut self, raw: &str) -> bool {
        let email = normalize_email(raw);
        if email.is_empty() || !email.contains('@') {
            return false;
        }
        self.emails.insert(email)
    }

    pub fn contains(&self, email: &str) -> bool {
        self.emails.contains(&normalize_email(email))
    }

    /// First address of `contact` that is in the set, normalized.
    pub fn first_match(&self, contact: &Contact) -> Option<String> {
        contact
            .emails
            .iter()
            .map(|e| normalize_email(e))
            .find(|e| self.emails.contains(e))
    }

    pub fn len(&self) -> usize {
        self.emails.len()
    }

    pub fn is_empty(&self) -> bool {
        self.emails.is_empty()
    }

    pub fn sorted(&self) -> Vec<&str> {
        let mut emails: Vec<&str> = self.emails.iter().map(String::as_str).collect();
        emails.sort_unstable();
        emails
    }

    pub fn save_sorted<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let mut content = self.sorted().join("\n");
        if !content.is_empty() {
            content.push('\n');
        }
        std::fs::write(path.as_ref(), content)?;
        tracing::info!(
            "💾 Saved {} bounced emails to {}",
            self.len(),
            path.as_ref().display()
        );
        Ok(())
    }
}

/// A contact selected for deletion. Field names follow the export format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlaggedContact {
    #[serde(rename = "resourceName")]
    pub resource_name: String,
    pub name: String,
    pub email: String,
    pub etag: String,
}

impl FlaggedContact {
    pub fn from_match(contact: &Contact, email: String) -> Self {
        Self {
            resource_name: contact.resource_name.clone(),
            name: contact.name_or_unknown().to_string(),
            email,
            etag: contact.etag.clone().unwrap_or_default(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ScanReport {
    pub total_scanned: usize,
    pub flagged: Vec<FlaggedContact>,
}

#[derive(Debug, Clone)]
pub struct DeleteFailure {
    pub contact: FlaggedContact,
    pub error: String,
}

#[derive(Debug, Clone, Default)]
pub struct RemovalOutcome {
    pub dry_run: bool,
    pub scan: ScanReport,
    pub deleted: usize,
    pub failures: Vec<DeleteFailure>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanFigures {
    pub scanned: usize,
    pub flagged: usize,
    pub remaining: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContactStats {
    pub total_contacts: u64,
    pub bounced_loaded: usize,
    pub scan: Option<ScanFigures>,
}
