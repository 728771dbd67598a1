pub mod auth_request;
pub mod authorization_code;
pub mod idp;
pub mod passkey_session;

pub use auth_request::{AuthRequestStore, MemoryAuthRequestStore, SqlAuthRequestStore};
pub use authorization_code::{
    AuthorizationCodeStore, MemoryAuthorizationCodeStore, SqlAuthorizationCodeStore,
};
pub use idp::{IdpConfigStore, SqlIdpConfigStore};
pub use passkey_session::{
    MemoryPasskeySessionStore, PasskeySessionStore, RetrievedSession, SqlPasskeySessionStore,
};
