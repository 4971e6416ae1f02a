//! Post-extraction services: field normalization and registration policies.

pub mod normalize;
pub mod policy;

pub use normalize::{normalize, parse_registration, registration_number};
pub use policy::{
    BusinessLicenceClient, IssuedRegistrationNumberPolicy, LicenceRegistry, Policy, PolicyResult,
    ValidRegistrationNumberPolicy,
};
