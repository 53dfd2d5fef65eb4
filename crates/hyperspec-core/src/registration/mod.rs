mod pipeline;
mod types;

pub use pipeline::{register, register_reported};
pub use types::{
    NoOpReporter, ProgressReporter, Registered, RegistrationFailure, RegistrationOutput,
    RegistrationStage, RegistrationStats,
};
