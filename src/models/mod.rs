pub mod application;
pub mod assertion;
pub mod authorization_code;
pub mod idp;
pub mod oauth_params;
pub mod passkey;

pub use application::*;
pub use assertion::*;
pub use authorization_code::*;
pub use idp::*;
pub use oauth_params::*;
pub use passkey::*;
