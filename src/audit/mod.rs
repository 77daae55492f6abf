//! Per-request audit trail.

mod encoding;
mod logger;
mod record;
mod redaction;

pub use encoding::repair_utf8;
pub use logger::AuditLogger;
pub use record::{
    is_success_status, AuditRecord, DownstreamRequest, TaskId, UpstreamRequest, UpstreamResponse,
};
pub use redaction::{header_snapshot, mask_value};
