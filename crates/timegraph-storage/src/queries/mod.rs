pub mod command_ops;
pub mod document_ops;
pub mod event_ops;
pub mod skeleton_ops;
pub mod snapshot_ops;
