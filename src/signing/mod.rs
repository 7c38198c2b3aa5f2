pub mod wallet;

pub use wallet::{address_var, build_accounts, key_var, CredentialSource, EnvCredentials};
