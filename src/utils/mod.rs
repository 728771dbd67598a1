pub mod pkce;
pub mod scope;
pub mod uri;
