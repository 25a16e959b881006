//! Upload subsystem.
//!
//! # Data Flow
//! ```text
//! POST /api/v1/images/upload (multipart field `file`)
//!     → policy.rs  (present? allowed type? within size?)
//!     → service.rs (blob write, then metadata record, on a spawned task)
//!     → UploadReceipt { filename, url, size, type }
//! ```
//!
//! # Design Decisions
//! - No storage call happens before validation passes
//! - Metadata expires; the blob it describes does not
//! - CDN transform options are validated and echoed, never applied

pub mod policy;
pub mod service;
pub mod transform;
pub mod types;

pub use policy::UploadPolicy;
pub use service::UploadService;
pub use transform::ImageTransform;
pub use types::{UploadFile, UploadReceipt, UploadRecord};
