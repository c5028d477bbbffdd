//! # day2ops-lambda
//!
//! Serverless entry point for day-2 database operations. An invocation names a
//! database secret and an action; the handler resolves the secret into a
//! connection URL and runs the migration runner against it.

pub mod credentials;
pub mod handler;

pub use credentials::{
    AwsSecretsStore, CredentialBundle, CredentialError, CredentialResolver, SecretsStore,
    StaticSecretsStore,
};
pub use handler::{Action, Handler, InvocationRequest, LambdaResponse, UnknownAction};
