pub mod authenticator;
pub mod sessions_actor;
