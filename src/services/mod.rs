pub mod authorization;
pub mod federated;
pub mod passkey;
pub mod validation;

pub use authorization::{AuthorizationService, AuthorizeOutcome};
pub use passkey::PasskeyService;
