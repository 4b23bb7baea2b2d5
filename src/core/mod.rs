pub mod cleaner;
pub mod report;

pub use crate::domain::model::{
    normalize_email, BouncedEmailSet, Contact, ContactPage, ContactStats, DeleteFailure,
    FlaggedContact, RemovalOutcome, ScanFigures, ScanReport,
};
pub use crate::domain::ports::{ConfigProvider, ContactsApi, Storage};
pub use crate::utils::error::Result;
