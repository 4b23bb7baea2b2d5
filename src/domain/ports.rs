use crate::domain::model::ContactPage;
use crate::utils::error::Result;
use async_trait::async_trait;

pub trait Storage: Send + Sync {
    fn write_file(
        &self,
        path: &str,
        data: &[u8],
    ) -> impl std::future::Future<Output = Result<()>> + Send;
}

pub trait ConfigProvider: Send + Sync {
    fn export_file(&self) -> &str;
    fn dry_run(&self) -> bool;
    fn page_size(&self) -> u32;
    /// Deletions are reported in groups of this size.
    fn delete_batch_size(&self) -> usize;
}

/// Remote contact store. Calls are issued one at a time by the cleaner.
#[async_trait]
pub trait ContactsApi: Send + Sync {
    /// Fetches one page of connections, continuing from `page_token`.
    async fn list_contacts(&self, page_token: Option<&str>, page_size: u32)
        -> Result<ContactPage>;

    /// Total number of contacts as reported by the service.
    async fn total_contacts(&self) -> Result<u64>;

    async fn delete_contact(&self, resource_name: &str) -> Result<()>;
}
