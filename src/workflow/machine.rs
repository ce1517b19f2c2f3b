//! Queue-driven save loop shared by every document workflow
//!
//! The loop is level-triggered: each iteration looks at the windows that are
//! actually open, classifies the topmost one, and asks the workflow's pure
//! transition table what to do about it. The only memory carried between
//! iterations is the [`Phase`], which disambiguates screens that look the
//! same at different points of the save (an invoice on screen before and
//! after it was searched for).

use std::fmt;
use std::thread;

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use super::dialogs::{dismiss_interrupt, handle_unwanted_dialog, Interrupt};
use crate::desktop::DesktopSession;
use crate::error::{ExportError, Result};
use crate::files::{confirm_export, ExportBaseline, FileWatcher};
use crate::models::{Document, DocumentKind, DocumentQueue, ExportRecord};

/// Progress through one document's save
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Phase {
    Home,
    Searching,
    Viewing,
    Printing,
    SavingFile,
    /// Export path entered, waiting on the file. Sticky until confirmed.
    Confirming,
}

/// What the machine does on one iteration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step<A> {
    /// Workflow-specific input sequence
    Perform(A),
    Dismiss(Interrupt),
    /// Close whatever is on top, it does not belong here
    CloseTop,
    /// The next screen is still loading
    Wait,
    /// Wait for the export file and pop the queue head
    ConfirmExport,
}

/// One document type's screens and the input that moves between them
pub trait Workflow {
    /// Classification of the topmost window
    type Dialog: fmt::Debug;
    type Action: fmt::Debug;

    fn kind(&self) -> DocumentKind;

    /// Bring the application to a known state before the queue is processed
    fn prepare(&mut self, session: &mut DesktopSession) -> Result<()>;

    /// Name the situation described by the open window titles (topmost first)
    fn classify(&self, titles: &[String], head: &Document) -> Self::Dialog;

    /// Pure transition table
    fn transition(phase: Phase, dialog: &Self::Dialog) -> (Phase, Step<Self::Action>);

    fn perform(&mut self, session: &mut DesktopSession, action: Self::Action, head: &Document) -> Result<()>;

    /// Runs after each confirmed export
    fn after_export(&mut self, _session: &mut DesktopSession) {}

    /// Runs when the save call ends, successfully or not
    fn finish(&mut self, _session: &mut DesktopSession) {}
}

/// Outcome of one save call
#[derive(Debug, Clone, Serialize)]
pub struct SaveReport {
    pub run_id: Uuid,
    pub kind: DocumentKind,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub exported: Vec<ExportRecord>,
}

/// Drives a [`Workflow`] over a [`DocumentQueue`]
pub struct SaveMachine<'s, W: Workflow> {
    session: &'s mut DesktopSession,
    watcher: &'s dyn FileWatcher,
    workflow: W,
    phase: Phase,
}

impl<'s, W: Workflow> SaveMachine<'s, W> {
    pub fn new(session: &'s mut DesktopSession, watcher: &'s dyn FileWatcher, workflow: W) -> Self {
        Self {
            session,
            watcher,
            workflow,
            phase: Phase::Home,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Export every queued document, head first. A document leaves the queue
    /// only once its file is confirmed; on error the failing document and
    /// everything behind it stay queued.
    pub fn save(&mut self, queue: &mut DocumentQueue) -> Result<SaveReport> {
        let run_id = Uuid::new_v4();
        let kind = self.workflow.kind();
        let span = tracing::info_span!("save", %run_id, %kind);
        let _guard = span.enter();

        let started_at = Utc::now();
        tracing::info!("Saving {} queued {}(s)", queue.len(), kind);

        let mut exported = Vec::new();
        let result = self
            .workflow
            .prepare(self.session)
            .and_then(|_| self.drain(queue, &mut exported));
        self.workflow.finish(self.session);

        match result {
            Ok(()) => {
                tracing::info!("Exported {} {}(s)", exported.len(), kind);
                Ok(SaveReport {
                    run_id,
                    kind,
                    started_at,
                    finished_at: Utc::now(),
                    exported,
                })
            }
            Err(e) => {
                tracing::error!(
                    "Save stopped after {} export(s), {} still queued: {}",
                    exported.len(),
                    queue.len(),
                    e
                );
                Err(e)
            }
        }
    }

    fn drain(&mut self, queue: &mut DocumentQueue, exported: &mut Vec<ExportRecord>) -> Result<()> {
        while let Some(head) = queue.head().cloned() {
            if head.kind() != self.workflow.kind() {
                return Err(ExportError::InvalidArgument(format!(
                    "{} queued for a {} save",
                    head,
                    self.workflow.kind()
                )));
            }

            let record = self.save_one(&head)?;
            match queue.complete(&record) {
                Some(done) => tracing::info!("{} done, {} remaining", done, queue.len()),
                None => {
                    return Err(ExportError::InvalidArgument(format!(
                        "export of `{}` does not match queue head {}",
                        record.identifier, head
                    )))
                }
            }
            exported.push(record);

            self.workflow.after_export(self.session);
            self.phase = if queue.is_empty() {
                Phase::Home
            } else {
                Phase::Searching
            };
        }
        Ok(())
    }

    fn save_one(&mut self, head: &Document) -> Result<ExportRecord> {
        let baseline = ExportBaseline::capture(self.watcher, head)?;
        let budget = self.session.config().max_transitions_per_document;
        let settle = self.session.config().navigation_delay;

        for transition in 1..=budget {
            if let Err(e) = self.session.tracker().focus_main() {
                tracing::debug!("Could not focus main window: {}", e);
            }

            let titles = self.session.tracker().all_dialog_titles()?;
            if titles.is_empty() {
                return Err(ExportError::Platform(anyhow::anyhow!(
                    "target application shows no windows"
                )));
            }
            let dialog = self.workflow.classify(&titles, head);
            let (next, step) = W::transition(self.phase, &dialog);
            tracing::debug!(
                "[{}/{}] {:?} on `{}` ({:?}) -> {:?}, {:?}",
                transition,
                budget,
                self.phase,
                titles[0],
                dialog,
                next,
                step
            );
            self.phase = next;

            match step {
                Step::Perform(action) => self.workflow.perform(self.session, action, head)?,
                Step::Dismiss(interrupt) => {
                    if let Err(e) = dismiss_interrupt(self.session, interrupt) {
                        tracing::warn!("{}", e);
                    }
                }
                Step::CloseTop => match self.session.tracker().close_top() {
                    Ok(title) => tracing::info!("Closed out-of-place window `{}`", title),
                    Err(e) => tracing::warn!("{}", e),
                },
                Step::Wait => thread::sleep(settle),
                Step::ConfirmExport => {
                    let record =
                        confirm_export(self.watcher, head, &baseline, self.session.config())?;
                    handle_unwanted_dialog(self.session);
                    return Ok(record);
                }
            }

            handle_unwanted_dialog(self.session);
        }

        Err(ExportError::Stalled {
            document: head.identifier().to_string(),
            transitions: budget,
            top_dialog: self.session.tracker().top_dialog_lossy(),
        })
    }
}
