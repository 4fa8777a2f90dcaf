pub mod credential_validator;
pub mod token_manager;

pub use credential_validator::{CredentialValidator, ValidationResult};
pub use token_manager::{CredentialManager, TokenInfo, mask_secret_in, mask_token};
