mod client;
mod store;

pub use self::client::{AuthClient, HttpAuthClient};
pub use self::store::{
    ACCESS_TOKEN_KEY, CredentialStore, FileCredentialStore, MemoryCredentialStore,
};
