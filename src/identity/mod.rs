//! Human identity verification (Privado ID)

pub mod groth16;
pub mod request;
pub mod session;
pub mod verifier;
pub mod workflow;

pub use groth16::CircuitKey;
pub use request::AuthorizationRequest;
pub use session::{
    spawn_cleanup_task, RegistrationOutcome, VerificationSession, VerificationStore,
    VerifiedRecord,
};
pub use verifier::{Iden3Verifier, ProofVerifier, VerifiedIdentity, VerifyError};
pub use workflow::{
    CallbackResult, CompleteRequest, CompleteResult, IdentityWorkflow, VerificationStart,
    VerificationStatus,
};
