//! Workflow engine and HTTP surface for a conversational personal-loan agent.
//!
//! The crate routes a single mutable [`workflows::loan::ApplicantRecord`]
//! through a fixed pipeline of stages (intake, negotiation, verification,
//! underwriting, sanction) with data-dependent branching. External systems
//! such as identity and credit lookups, reply generation, document rendering,
//! and slip OCR sit behind the traits in [`workflows::loan::collaborators`]
//! so the decision core stays deterministic and testable.

pub mod config;
pub mod error;
pub mod telemetry;
pub mod workflows;
