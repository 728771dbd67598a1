pub mod oauth;
pub mod passkey;

pub use oauth::*;
pub use passkey::*;
