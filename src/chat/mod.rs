//! Conversation state: the message log, the send state machine, history
//! synchronization, exports and backups.

mod attachment;
mod backup;
mod controller;
mod event;
mod export;
mod history;
mod log;

#[cfg(test)]
mod tests;

pub use attachment::{ImageAttachment, MAX_IMAGE_BYTES};
pub use backup::{parse_backup, BackupEnvelope, SessionSnapshot, BACKUP_VERSION};
pub use controller::{AdminReport, ChatController, ControllerOptions, DEFAULT_IMAGE_PROMPT};
pub use event::{NoticeLevel, UiEvent};
pub use export::{export, ExportBlob, ExportContext, ExportFormat};
pub use log::{LogStats, MessageLog};
