//! Invoice export: find the invoice by number, print it to PDF, save the
//! print output under the document's export path.

use super::dialogs::Interrupt;
use super::machine::{Phase, Step, Workflow};
use crate::desktop::DesktopSession;
use crate::error::{ExportError, Result, TargetKind};
use crate::models::{ControlType, Document, DocumentKind, ElementDescriptor};
use crate::vision::VerifyMode;

pub const BLANK_INVOICE: &str = "Create Invoices - Accounts Receivable (Editing Transaction...) ";
pub const VIEWING_INVOICE: &str = "Create Invoices - Accounts Receivable";
pub const FIND_INVOICES: &str = "Find Invoices";
pub const PRINT_ONE_INVOICE: &str = "Print One Invoice";
pub const SAVE_PRINT_OUTPUT: &str = "Save Print Output As";

/// Tabs from the Find dialog's initial focus to the invoice number field
const TABS_TO_NUMBER_FIELD: u32 = 3;
const NUMBER_FIELD_ATTEMPTS: u32 = 10;

fn invoice_number_field() -> ElementDescriptor {
    ElementDescriptor::with_auto_id(ControlType::Edit, "3636")
}

fn find_button() -> ElementDescriptor {
    ElementDescriptor::exact(ControlType::Button, "Find", "51")
}

fn file_name_field() -> ElementDescriptor {
    ElementDescriptor::with_auto_id(ControlType::Edit, "1001")
}

fn window(title: &str) -> ElementDescriptor {
    ElementDescriptor::titled(ControlType::Window, title)
}

/// Topmost window, as far as invoices are concerned
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvoiceDialog {
    Interrupt(Interrupt),
    /// Only the main window is open
    Main,
    BlankInvoice,
    ViewingInvoice,
    FindInvoices,
    PrintOneInvoice,
    SavePrintOutput,
    Unknown,
}

const SCREENS: [(&str, InvoiceDialog); 5] = [
    (BLANK_INVOICE, InvoiceDialog::BlankInvoice),
    (VIEWING_INVOICE, InvoiceDialog::ViewingInvoice),
    (FIND_INVOICES, InvoiceDialog::FindInvoices),
    (PRINT_ONE_INVOICE, InvoiceDialog::PrintOneInvoice),
    (SAVE_PRINT_OUTPUT, InvoiceDialog::SavePrintOutput),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvoiceAction {
    /// ctrl+i from the main window
    OpenInvoices,
    /// ctrl+f on the invoice form
    OpenFind,
    /// Type the head's number into Find Invoices and search
    EnterNumber,
    /// ctrl+p on the invoice form
    OpenPrint,
    /// Check the selected printer, then print
    VerifyPrinter,
    /// Type the export path into Save Print Output As and save
    EnterExportPath,
}

pub struct InvoiceWorkflow {
    main_title: String,
    home_attempts: u32,
}

impl InvoiceWorkflow {
    pub fn new(main_title: impl Into<String>, home_attempts: u32) -> Self {
        Self {
            main_title: main_title.into(),
            home_attempts,
        }
    }

    /// Close everything but the main window
    fn home(&self, session: &DesktopSession) {
        let main = &self.main_title;
        let outcome = session.tracker().home(
            |titles| titles.len() == 1 && titles[0].contains(main.as_str()),
            self.home_attempts,
        );
        tracing::debug!("Invoice home: {:?}", outcome);
    }

    fn enter_number(&self, session: &mut DesktopSession, head: &Document) -> Result<()> {
        let config = session.config().clone();
        session.focus(&window(FIND_INVOICES), config.dialog_load_delay)?;
        session.press_times("tab", TABS_TO_NUMBER_FIELD)?;

        let field = invoice_number_field();
        let mut remaining = NUMBER_FIELD_ATTEMPTS;
        while !session.tracker().is_element_active(
            &field,
            config.poll_interval * 4,
            config.poll_interval,
            true,
        ) {
            if remaining == 0 {
                return Err(ExportError::ElementTimeout {
                    element: field.to_string(),
                    timeout: config.poll_interval * 4 * NUMBER_FIELD_ATTEMPTS,
                    top_dialog: session.tracker().top_dialog_lossy(),
                });
            }
            tracing::warn!(
                "Invoice number field not focused yet, {} attempts remaining",
                remaining
            );
            session.press("tab")?;
            remaining -= 1;
        }

        // An invoice left open from earlier would pass for the search result
        if session.tracker().close_titled(VIEWING_INVOICE)? {
            tracing::info!("Closed an invoice left open before searching");
        }

        tracing::info!("Searching for invoice {}", head.identifier());
        session.type_text(head.identifier(), false)?;
        session.click(&find_button(), config.dialog_load_delay)?;

        let found = session.tracker().wait_for_titles(
            |titles| {
                titles.iter().any(|t| t == VIEWING_INVOICE) && !titles.iter().any(|t| t == FIND_INVOICES)
            },
            config.window_load_delay,
        )?;
        if !found {
            return Err(ExportError::ElementTimeout {
                element: window(VIEWING_INVOICE).to_string(),
                timeout: config.window_load_delay,
                top_dialog: session.tracker().top_dialog_lossy(),
            });
        }
        Ok(())
    }

    fn verify_printer(&self, session: &mut DesktopSession) -> Result<()> {
        let config = session.config().clone();
        let dialog = window(PRINT_ONE_INVOICE);
        session.focus(&dialog, config.dialog_load_delay)?;

        let result = session.verify_on_screen(
            &dialog,
            config.accent_color,
            config.color_tolerance,
            &config.valid_invoice_printer,
            config.printer_match_threshold,
            VerifyMode::Single,
        )?;
        if !result.matched {
            return Err(ExportError::InvalidTarget {
                target: TargetKind::Printer,
                expected: config.valid_invoice_printer,
                observed: result.observed_text,
                confidence: result.confidence,
                threshold: config.printer_match_threshold,
            });
        }

        session.focus(&dialog, config.dialog_load_delay)?;
        session.press("enter")?;
        session
            .tracker()
            .wait_for_top(|t| t == SAVE_PRINT_OUTPUT, config.dialog_load_delay)?;
        Ok(())
    }
}

impl Workflow for InvoiceWorkflow {
    type Dialog = InvoiceDialog;
    type Action = InvoiceAction;

    fn kind(&self) -> DocumentKind {
        DocumentKind::Invoice
    }

    fn prepare(&mut self, session: &mut DesktopSession) -> Result<()> {
        self.home(session);
        Ok(())
    }

    /// Each search starts from a blank form, never from the last invoice
    fn after_export(&mut self, session: &mut DesktopSession) {
        self.home(session);
    }

    fn classify(&self, titles: &[String], _head: &Document) -> InvoiceDialog {
        let Some(top) = titles.first() else {
            return InvoiceDialog::Unknown;
        };
        if let Some(interrupt) = Interrupt::from_title(top) {
            return InvoiceDialog::Interrupt(interrupt);
        }
        if let Some((_, dialog)) = SCREENS.iter().find(|(title, _)| title == top) {
            return *dialog;
        }
        if top.contains(&self.main_title) {
            return InvoiceDialog::Main;
        }
        InvoiceDialog::Unknown
    }

    fn transition(phase: Phase, dialog: &InvoiceDialog) -> (Phase, Step<InvoiceAction>) {
        use InvoiceAction::*;
        use InvoiceDialog as D;
        use Phase::*;

        match (phase, *dialog) {
            (_, D::Interrupt(i)) => (phase, Step::Dismiss(i)),
            (Confirming, _) => (Confirming, Step::ConfirmExport),

            (_, D::Main) => (Home, Step::Perform(OpenInvoices)),
            (_, D::BlankInvoice) => (Searching, Step::Perform(OpenFind)),
            (_, D::FindInvoices) => (Viewing, Step::Perform(EnterNumber)),

            (Viewing, D::ViewingInvoice) => (Printing, Step::Perform(OpenPrint)),
            (Printing | SavingFile, D::ViewingInvoice) => (phase, Step::Wait),
            (Home | Searching, D::ViewingInvoice) => (phase, Step::CloseTop),

            (Viewing | Printing, D::PrintOneInvoice) => (SavingFile, Step::Perform(VerifyPrinter)),
            (_, D::PrintOneInvoice) => (phase, Step::CloseTop),

            (Printing | SavingFile, D::SavePrintOutput) => (Confirming, Step::Perform(EnterExportPath)),
            (_, D::SavePrintOutput) => (phase, Step::CloseTop),

            (_, D::Unknown) => (phase, Step::CloseTop),
        }
    }

    fn perform(&mut self, session: &mut DesktopSession, action: InvoiceAction, head: &Document) -> Result<()> {
        let config = session.config().clone();
        match action {
            InvoiceAction::OpenInvoices => {
                session.tracker().focus_main()?;
                session.press("ctrl+i")?;
                session
                    .tracker()
                    .wait_for_top(|t| t == BLANK_INVOICE || t == VIEWING_INVOICE, config.window_load_delay)?;
            }
            InvoiceAction::OpenFind => {
                session.tracker().focus_main()?;
                session.press("ctrl+f")?;
                session.focus(&window(FIND_INVOICES), config.dialog_load_delay)?;
            }
            InvoiceAction::EnterNumber => self.enter_number(session, head)?,
            InvoiceAction::OpenPrint => {
                session.tracker().focus_main()?;
                session.press("ctrl+p")?;
                session.focus(&window(PRINT_ONE_INVOICE), config.dialog_load_delay)?;
            }
            InvoiceAction::VerifyPrinter => self.verify_printer(session)?,
            InvoiceAction::EnterExportPath => {
                let path = head.export_path();
                tracing::info!("Saving invoice {} to {:?}", head.identifier(), path);
                session.set_text_verified(&file_name_field(), &path.to_string_lossy())?;
                session.press("alt+s")?;
            }
        }
        Ok(())
    }
}
