//! Data models for etongue-wizard
//!
//! - Session identity derived from factory and medicine names
//! - Collection form with seven numeric fields
//! - Backend records with optional timestamps
//! - Collection and prediction session state

pub mod collection_form;
pub mod identity;
pub mod record;
pub mod session;

pub use collection_form::{CollectionForm, FormField};
pub use identity::{derive_factory_medicine_id, SessionIdentity};
pub use record::{filter_session_records, records_from_response, Record, TIMESTAMP_ALIASES};
pub use session::{
    is_collection_done, status_code, CollectionPhase, CollectionSession, PicronStatus,
    PredictionSession,
};
