//! Voter registration core: text normalization, registry reconciliation and
//! bulk-import row classification, plus the SQLite store they persist to.

pub mod bulk;
pub mod config;
pub mod db;
pub mod normalize;
pub mod reconcile;
pub mod registration;
pub mod registry;
pub mod schema;
pub mod validation;

pub use bulk::{classify_row, import_rows, ImportContext, RowRejection};
pub use config::CanvassConfig;
pub use reconcile::{compare, voting_place_matches};
pub use schema::{AuthoritativeRecord, Classification, Field, ManualRecord, ReconciliationResult};
