//! Run notifications
//!
//! One message per invocation: the SNS publisher used in production, a log-only
//! notifier for local runs and the formatting of register, acquire and renew summaries.

mod log_notifier;
mod sns;
pub mod summary;

pub use log_notifier::LogNotifier;
pub use sns::{sanitize_subject, SnsNotifier, MAX_SUBJECT_LEN};
pub use summary::{acquire_message, register_message, renew_message};

pub mod test_utils;
