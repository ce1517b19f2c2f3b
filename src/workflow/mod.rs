//! Document export workflows
//!
//! [`SaveMachine`] owns the loop; [`InvoiceWorkflow`] and [`ReportWorkflow`]
//! describe their screens and the input that moves between them.

pub mod dialogs;
pub mod invoice;
pub mod machine;
pub mod report;

pub use dialogs::{dismiss_interrupt, handle_unwanted_dialog, GlobalPopup, Interrupt};
pub use invoice::{InvoiceAction, InvoiceDialog, InvoiceWorkflow};
pub use machine::{Phase, SaveMachine, SaveReport, Step, Workflow};
pub use report::{ReportAction, ReportDialog, ReportWorkflow};

use crate::desktop::DesktopSession;
use crate::error::Result;
use crate::files::FileWatcher;
use crate::models::DocumentQueue;

/// Export every queued invoice as PDF
pub fn save_invoices(
    session: &mut DesktopSession,
    watcher: &dyn FileWatcher,
    queue: &mut DocumentQueue,
) -> Result<SaveReport> {
    let workflow = InvoiceWorkflow::new(
        session.config().main_window_title.clone(),
        session.config().home_attempts,
    );
    SaveMachine::new(session, watcher, workflow).save(queue)
}

/// Export every queued memorized report as CSV
pub fn save_reports(
    session: &mut DesktopSession,
    watcher: &dyn FileWatcher,
    queue: &mut DocumentQueue,
) -> Result<SaveReport> {
    let workflow = ReportWorkflow::new(session.config());
    SaveMachine::new(session, watcher, workflow).save(queue)
}
