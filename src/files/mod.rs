pub mod watcher;

pub use watcher::{confirm_export, ExportBaseline, FileSnapshot, FileWatcher, FsWatcher};
