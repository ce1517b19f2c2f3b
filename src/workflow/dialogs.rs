//! Dialogs the application may throw up at any point, and how to get rid of
//! them

use crate::desktop::DesktopSession;
use crate::error::RecoverableError;
use crate::models::{ControlType, ElementDescriptor};

/// Interrupting dialogs recognized by exact title
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Interrupt {
    /// Overwrite prompt when the export path already exists
    ConfirmSaveAs,
    AvailableCredits,
    RecordingTransaction,
}

impl Interrupt {
    pub const ALL: [Interrupt; 3] = [
        Interrupt::ConfirmSaveAs,
        Interrupt::AvailableCredits,
        Interrupt::RecordingTransaction,
    ];

    pub fn title(self) -> &'static str {
        match self {
            Interrupt::ConfirmSaveAs => "Confirm Save As",
            Interrupt::AvailableCredits => "Available Credits",
            Interrupt::RecordingTransaction => "Recording Transaction",
        }
    }

    /// Chord that answers the dialog
    pub fn keystroke(self) -> &'static str {
        match self {
            Interrupt::ConfirmSaveAs => "y",
            Interrupt::AvailableCredits | Interrupt::RecordingTransaction => "alt+n",
        }
    }

    pub fn from_title(title: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|i| i.title() == title)
    }
}

/// How a global popup is sent away
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dismissal {
    Close,
    /// Focus the popup, then send this chord
    Keystroke(&'static str),
}

/// Nag screens that are not ordinary titled dialogs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GlobalPopup {
    /// Floating "have a question?" help viewer
    HaveAnyQuestions,
    /// What's-new host pane
    NewFeature,
    QuickBooksPayments,
}

impl GlobalPopup {
    pub const ALL: [GlobalPopup; 3] = [
        GlobalPopup::HaveAnyQuestions,
        GlobalPopup::NewFeature,
        GlobalPopup::QuickBooksPayments,
    ];

    pub fn descriptor(self) -> ElementDescriptor {
        match self {
            GlobalPopup::HaveAnyQuestions => {
                ElementDescriptor::with_auto_id(ControlType::Window, "FloatingViewerFrame")
            }
            GlobalPopup::NewFeature => ElementDescriptor::titled(ControlType::Pane, "QB WPF Host"),
            GlobalPopup::QuickBooksPayments => {
                ElementDescriptor::titled(ControlType::Window, "QuickBooks Payments")
            }
        }
    }

    pub fn dismissal(self) -> Dismissal {
        match self {
            GlobalPopup::HaveAnyQuestions => Dismissal::Close,
            GlobalPopup::NewFeature => Dismissal::Keystroke("enter"),
            GlobalPopup::QuickBooksPayments => Dismissal::Keystroke("esc"),
        }
    }
}

/// Focus `interrupt`'s dialog and answer it
pub fn dismiss_interrupt(
    session: &mut DesktopSession,
    interrupt: Interrupt,
) -> Result<(), RecoverableError> {
    let title = interrupt.title();
    let failed = |source: anyhow::Error| RecoverableError::Dismiss {
        title: title.to_string(),
        source,
    };

    tracing::debug!("Unwanted dialog `{}` detected, answering {}", title, interrupt.keystroke());
    match session.tracker().focus_window_titled(title) {
        Ok(true) => {}
        Ok(false) => return Err(failed(anyhow::anyhow!("no longer open"))),
        Err(e) => return Err(failed(e.into())),
    }
    session
        .press(interrupt.keystroke())
        .map_err(|e| failed(e.into()))
}

fn dismiss_popup(session: &mut DesktopSession, popup: GlobalPopup) -> Result<bool, RecoverableError> {
    let descriptor = popup.descriptor();
    let failed = |source: anyhow::Error| RecoverableError::Dismiss {
        title: descriptor.to_string(),
        source,
    };

    let Some(name) = session
        .tracker()
        .resolve(&descriptor)
        .map_err(|e| failed(e.into()))?
        .map(|element| element.info().name.clone())
    else {
        return Ok(false);
    };

    tracing::debug!("Global popup {:?} (`{}`) detected, dismissing", popup, name);
    match popup.dismissal() {
        Dismissal::Close => {
            session
                .tracker()
                .close_titled(&name)
                .map_err(|e| failed(e.into()))?;
        }
        Dismissal::Keystroke(chord) => {
            let timeout = session.config().poll_interval;
            session
                .focus(&descriptor, timeout)
                .map_err(|e| failed(e.into()))?;
            session.press(chord).map_err(|e| failed(e.into()))?;
        }
    }
    Ok(true)
}

/// Answer a known interrupt on top, then sweep the global popups.
/// Failures are logged and skipped. Returns how many dialogs were handled.
pub fn handle_unwanted_dialog(session: &mut DesktopSession) -> u32 {
    let mut handled = 0;

    match session.tracker().top_dialog() {
        Ok(top) => {
            if let Some(interrupt) = Interrupt::from_title(&top) {
                match dismiss_interrupt(session, interrupt) {
                    Ok(()) => handled += 1,
                    Err(e) => tracing::warn!("{}", e),
                }
            }
        }
        Err(e) => tracing::warn!("Could not read top dialog: {}", e),
    }

    for popup in GlobalPopup::ALL {
        match dismiss_popup(session, popup) {
            Ok(true) => handled += 1,
            Ok(false) => {}
            Err(e) => tracing::warn!("{}", e),
        }
    }

    handled
}
