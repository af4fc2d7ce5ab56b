//! Activity subscribers: a local JSONL log and an optional webhook.

pub mod logger;
pub mod webhook;

pub use logger::ActivityLog;
pub use webhook::WebhookForwarder;
