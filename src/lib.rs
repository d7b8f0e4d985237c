//! VRM avatar codec.
//!
//! Converts an in-memory avatar scene to VRM files (binary glTF with the
//! `VRM` 0.x or `VRMC_vrm` 1.0 extension block) and reads them back.

pub mod convert;
pub mod error;
pub mod glb;
pub mod json;
pub mod scene;
pub mod settings;
pub mod texture;

pub use convert::{
    ExportOptions, ExportReport, ImportReport, MigrationReport, PbrGatherer, export_vrm,
    import_vrm, migrate_vrm,
};
pub use error::{Severity, ValidationIssue, VrmError};
pub use scene::{SceneInput, VrmVersion};
