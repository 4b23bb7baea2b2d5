// Adapters layer: concrete implementations for external systems (OAuth, People API, local disk).

pub mod oauth;
pub mod people;
pub mod storage;

pub use oauth::{Authenticator, ClientSecrets, StoredToken};
pub use people::PeopleClient;
pub use storage::LocalStorage;
