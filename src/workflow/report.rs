//! Memorized report export: open the report from the memorized report list,
//! send it to Excel as a comma separated file.

use super::dialogs::{handle_unwanted_dialog, Interrupt};
use super::machine::{Phase, Step, Workflow};
use crate::config::EngineConfig;
use crate::desktop::DesktopSession;
use crate::error::{ExportError, Result, TargetKind};
use crate::models::{ControlType, Document, DocumentKind, ElementDescriptor};
use crate::vision::VerifyMode;

pub const SEND_TO_EXCEL: &str = "Send Report to Excel";
pub const CREATE_DISK_FILE: &str = "Create Disk File";

const MEMORIZED_LIST_AUTO_ID: &str = "65281";

fn excel_button() -> ElementDescriptor {
    ElementDescriptor::exact(ControlType::Pane, "Excel", "7")
}

fn csv_option() -> ElementDescriptor {
    ElementDescriptor::exact(
        ControlType::Pane,
        "Create a comma separated values (.csv) file",
        "1841",
    )
}

fn file_name_field() -> ElementDescriptor {
    ElementDescriptor::exact(ControlType::Edit, "File name:", "1148")
}

fn window(title: &str) -> ElementDescriptor {
    ElementDescriptor::titled(ControlType::Window, title)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportDialog {
    Interrupt(Interrupt),
    Main,
    MemorizedList,
    /// The head report's own window
    Report,
    ExcelExport,
    CreateDiskFile,
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportAction {
    /// Reports > Memorized Reports > Memorized Report List
    OpenMemorizedList,
    /// Type the report name, check the highlighted row, open it
    SelectReport,
    /// Excel toolbar button, then "create new worksheet"
    ExportToExcel,
    ExportAsCsv,
    /// Type the export path into Create Disk File and save
    SaveFile,
}

pub struct ReportWorkflow {
    main_title: String,
    memorized_list_title: String,
    home_attempts: u32,
}

impl ReportWorkflow {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            main_title: config.main_window_title.clone(),
            memorized_list_title: config.memorized_list_title.clone(),
            home_attempts: config.home_attempts,
        }
    }

    fn memorized_list(&self) -> ElementDescriptor {
        ElementDescriptor::exact(
            ControlType::Window,
            &self.memorized_list_title,
            MEMORIZED_LIST_AUTO_ID,
        )
    }

    /// Close everything but the main window
    fn strict_home(&self, session: &DesktopSession) {
        let main = &self.main_title;
        let outcome = session.tracker().home(
            |titles| titles.len() == 1 && titles[0].contains(main.as_str()),
            self.home_attempts,
        );
        tracing::debug!("Strict home: {:?}", outcome);
    }

    /// Close everything but the main window and the memorized report list
    fn soft_home(&self, session: &DesktopSession) {
        let main = &self.main_title;
        let list = &self.memorized_list_title;
        let outcome = session.tracker().home(
            |titles| {
                !titles.is_empty()
                    && titles
                        .iter()
                        .all(|t| t.contains(main.as_str()) || t == list)
            },
            self.home_attempts,
        );
        tracing::debug!("Soft home: {:?}", outcome);
    }

    fn select_report(&self, session: &mut DesktopSession, head: &Document) -> Result<()> {
        let config = session.config().clone();
        let name = head.identifier();

        if session.tracker().all_dialog_titles()?.iter().any(|t| t == name) {
            tracing::info!("Report `{}` is already open behind the list, starting over", name);
            self.strict_home(session);
            return Ok(());
        }

        let list = self.memorized_list();
        session.focus(&list, config.dialog_load_delay)?;
        session.type_text(name, true)?;

        let result = session.verify_on_screen(
            &list,
            config.accent_color,
            config.color_tolerance,
            name,
            config.report_match_threshold,
            VerifyMode::Multi,
        )?;
        if !result.matched {
            return Err(ExportError::InvalidTarget {
                target: TargetKind::Report,
                expected: name.to_string(),
                observed: result.observed_text,
                confidence: result.confidence,
                threshold: config.report_match_threshold,
            });
        }

        session.focus(&list, config.dialog_load_delay)?;
        session.press("alt+s")?;
        if !session
            .tracker()
            .wait_for_titles(|titles| titles.iter().any(|t| t == name), config.window_load_delay)?
        {
            return Err(ExportError::ElementTimeout {
                element: window(name).to_string(),
                timeout: config.window_load_delay,
                top_dialog: session.tracker().top_dialog_lossy(),
            });
        }
        Ok(())
    }
}

impl Workflow for ReportWorkflow {
    type Dialog = ReportDialog;
    type Action = ReportAction;

    fn kind(&self) -> DocumentKind {
        DocumentKind::Report
    }

    fn prepare(&mut self, session: &mut DesktopSession) -> Result<()> {
        handle_unwanted_dialog(session);
        self.strict_home(session);
        Ok(())
    }

    fn classify(&self, titles: &[String], head: &Document) -> ReportDialog {
        let Some(top) = titles.first() else {
            return ReportDialog::Unknown;
        };
        if let Some(interrupt) = Interrupt::from_title(top) {
            return ReportDialog::Interrupt(interrupt);
        }
        match top.as_str() {
            t if t == head.identifier() => ReportDialog::Report,
            t if t == self.memorized_list_title => ReportDialog::MemorizedList,
            SEND_TO_EXCEL => ReportDialog::ExcelExport,
            CREATE_DISK_FILE => ReportDialog::CreateDiskFile,
            t if t.contains(&self.main_title) => ReportDialog::Main,
            _ => ReportDialog::Unknown,
        }
    }

    fn transition(phase: Phase, dialog: &ReportDialog) -> (Phase, Step<ReportAction>) {
        use Phase::*;
        use ReportAction::*;
        use ReportDialog as D;

        match (phase, *dialog) {
            (_, D::Interrupt(i)) => (phase, Step::Dismiss(i)),
            (Confirming, _) => (Confirming, Step::ConfirmExport),

            (_, D::Main) => (Searching, Step::Perform(OpenMemorizedList)),
            (_, D::MemorizedList) => (Viewing, Step::Perform(SelectReport)),

            (Viewing, D::Report) => (Printing, Step::Perform(ExportToExcel)),
            (Printing | SavingFile, D::Report) => (phase, Step::Wait),
            (Home | Searching, D::Report) => (phase, Step::CloseTop),

            (Printing, D::ExcelExport) => (SavingFile, Step::Perform(ExportAsCsv)),
            (_, D::ExcelExport) => (phase, Step::CloseTop),

            (SavingFile, D::CreateDiskFile) => (Confirming, Step::Perform(SaveFile)),
            (_, D::CreateDiskFile) => (phase, Step::CloseTop),

            (_, D::Unknown) => (phase, Step::CloseTop),
        }
    }

    fn perform(&mut self, session: &mut DesktopSession, action: ReportAction, head: &Document) -> Result<()> {
        let config = session.config().clone();
        match action {
            ReportAction::OpenMemorizedList => {
                session.tracker().focus_main()?;
                session.press("alt+r")?;
                session.press("z")?;
                session.press("enter")?;
                let list = self.memorized_list_title.clone();
                session
                    .tracker()
                    .wait_for_top(|t| t == list, config.window_load_delay)?;
            }
            ReportAction::SelectReport => self.select_report(session, head)?,
            ReportAction::ExportToExcel => {
                session.focus(&window(head.identifier()), config.dialog_load_delay)?;
                session.click(&excel_button(), config.dialog_load_delay)?;
                session.press("n")?;
                session
                    .tracker()
                    .wait_for_top(|t| t == SEND_TO_EXCEL, config.dialog_load_delay)?;
            }
            ReportAction::ExportAsCsv => {
                session.click(&csv_option(), config.dialog_load_delay)?;
                session.press("alt+x")?;
                session
                    .tracker()
                    .wait_for_top(|t| t == CREATE_DISK_FILE, config.dialog_load_delay)?;
            }
            ReportAction::SaveFile => {
                let path = head.export_path();
                tracing::info!("Saving report `{}` to {:?}", head.identifier(), path);
                session.set_text_verified(&file_name_field(), &path.to_string_lossy())?;
                session.press("enter")?;
            }
        }
        Ok(())
    }

    fn after_export(&mut self, session: &mut DesktopSession) {
        self.soft_home(session);
    }

    fn finish(&mut self, session: &mut DesktopSession) {
        self.strict_home(session);
    }
}
