//! Simulated QuickBooks desktop for driving the export workflows without a
//! real application.
//!
//! One `SimApp` holds the window stack and form state. Cheap handles to it
//! implement every platform trait the session needs, so keystrokes sent by
//! the engine move the simulated application between screens.

#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::fs::File;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::time::{Duration, SystemTime};

use image::{Rgba, RgbaImage};

use quickbooks_export::desktop::{
    AccessibilityProvider, DesktopSession, ElementInfo, InputBackend, KeyCode, MouseButton,
    OcrEngine, Point, ScreenCapture, ScreenRect, WindowInfo,
};
use quickbooks_export::models::{Color, ControlType, ElementDescriptor};
use quickbooks_export::vision::Region;
use quickbooks_export::workflow::invoice::{
    BLANK_INVOICE, FIND_INVOICES, PRINT_ONE_INVOICE, SAVE_PRINT_OUTPUT, VIEWING_INVOICE,
};
use quickbooks_export::workflow::report::{CREATE_DISK_FILE, SEND_TO_EXCEL};
use quickbooks_export::EngineConfig;

pub const MAIN: &str = "QuickBooks Desktop Pro 2024";
pub const MEMORIZED_LIST: &str = "Memorized Report List";
pub const HELP_VIEWER: &str = "Have a Question?";

const ACCENT: Color = Color::rgb(0x4e, 0x9e, 0x19);
const BACKGROUND: Rgba<u8> = Rgba([255, 255, 255, 255]);
/// Blue channel of the pixel that carries a text index for the fake OCR
const MARKER_BLUE: u8 = 0xAB;
const WINDOW_BOUNDS: ScreenRect = ScreenRect::new(0, 0, 400, 300);

/// Engine timings shrunk for tests
pub fn fast_config() -> EngineConfig {
    EngineConfig {
        window_load_delay: Duration::from_millis(200),
        dialog_load_delay: Duration::from_millis(200),
        navigation_delay: Duration::ZERO,
        poll_interval: Duration::from_millis(1),
        max_export_wait: Duration::from_secs(2),
        max_stable_wait: Duration::from_secs(2),
        stability_interval: Duration::from_millis(20),
        acceptable_file_age: Duration::from_secs(30),
        max_transitions_per_document: 40,
        ..EngineConfig::default()
    }
}

#[derive(Debug, Clone)]
struct SimWindow {
    title: String,
    auto_id: String,
}

impl SimWindow {
    fn new(title: &str) -> Self {
        Self {
            title: title.to_string(),
            auto_id: String::new(),
        }
    }

    fn with_auto_id(title: &str, auto_id: &str) -> Self {
        Self {
            title: title.to_string(),
            auto_id: auto_id.to_string(),
        }
    }
}

/// State of the simulated application
#[derive(Debug)]
pub struct SimApp {
    /// Topmost first, main window last
    windows: Vec<SimWindow>,
    /// Titles whose close request is refused
    pub sticky: HashSet<String>,
    held: Vec<KeyCode>,
    cursor: Point,
    focused: Option<String>,
    fields: HashMap<String, String>,
    menu_depth: u8,
    find_tabs: u32,
    excel_menu: bool,
    csv_selected: bool,
    pending_save: Option<PathBuf>,
    /// Texts drawn by the last capture, indexed by marker
    screen_texts: Vec<String>,

    pub invoices: HashSet<String>,
    /// Invoices that raise "Available Credits" when opened
    pub invoices_with_credits: HashSet<String>,
    pub reports: Vec<String>,
    /// Reports that stay closed when chosen from the list
    pub unopenable_reports: HashSet<String>,
    pub printer: String,
    /// Show the help viewer when the print dialog opens
    pub help_viewer_on_print: bool,
    /// Backdate every written export by an hour
    pub write_stale: bool,
    /// Fixed body for every export instead of a numbered one
    pub export_content: Option<String>,
    writes: u32,
    pub keys: Vec<String>,
}

impl SimApp {
    fn new() -> Self {
        Self {
            windows: vec![SimWindow::new(MAIN)],
            sticky: HashSet::new(),
            held: Vec::new(),
            cursor: Point::default(),
            focused: None,
            fields: HashMap::new(),
            menu_depth: 0,
            find_tabs: 0,
            excel_menu: false,
            csv_selected: false,
            pending_save: None,
            screen_texts: Vec::new(),
            invoices: HashSet::new(),
            invoices_with_credits: HashSet::new(),
            reports: Vec::new(),
            unopenable_reports: HashSet::new(),
            printer: "Microsoft Print to PDF".to_string(),
            help_viewer_on_print: false,
            write_stale: false,
            export_content: None,
            writes: 0,
            keys: Vec::new(),
        }
    }

    pub fn titles(&self) -> Vec<String> {
        self.windows.iter().map(|w| w.title.clone()).collect()
    }

    /// Open a window on top of the stack
    pub fn open(&mut self, title: &str) {
        let window = if title == HELP_VIEWER {
            SimWindow::with_auto_id(title, "FloatingViewerFrame")
        } else if title == MEMORIZED_LIST {
            SimWindow::with_auto_id(title, "65281")
        } else {
            SimWindow::new(title)
        };
        self.windows.insert(0, window);
    }

    fn top(&self) -> &str {
        self.windows.first().map(|w| w.title.as_str()).unwrap_or("")
    }

    fn is_open(&self, title: &str) -> bool {
        self.windows.iter().any(|w| w.title == title)
    }

    fn remove(&mut self, title: &str) {
        if let Some(i) = self.windows.iter().position(|w| w.title == title) {
            self.windows.remove(i);
        }
    }

    fn field(&self, auto_id: &str) -> String {
        self.fields.get(auto_id).cloned().unwrap_or_default()
    }

    fn elements(&self) -> Vec<ElementInfo> {
        let mut elements: Vec<ElementInfo> = self
            .windows
            .iter()
            .map(|w| element(ControlType::Window, &w.title, &w.auto_id, WINDOW_BOUNDS))
            .collect();

        let mut add = |ct, name: &str, auto_id: &str, bounds| elements.push(element(ct, name, auto_id, bounds));
        if self.is_open(FIND_INVOICES) {
            add(ControlType::Edit, "", "3636", ScreenRect::new(10, 10, 100, 20));
            add(ControlType::Button, "Find", "51", ScreenRect::new(300, 250, 60, 20));
        }
        if self.is_open(SAVE_PRINT_OUTPUT) {
            add(ControlType::Edit, "", "1001", ScreenRect::new(10, 40, 200, 20));
        }
        if self.reports.iter().any(|r| r == self.top()) {
            add(ControlType::Pane, "Excel", "7", ScreenRect::new(200, 10, 40, 20));
        }
        if self.is_open(SEND_TO_EXCEL) {
            add(
                ControlType::Pane,
                "Create a comma separated values (.csv) file",
                "1841",
                ScreenRect::new(20, 120, 200, 20),
            );
        }
        if self.is_open(CREATE_DISK_FILE) {
            add(ControlType::Edit, "File name:", "1148", ScreenRect::new(10, 70, 200, 20));
        }
        elements
    }

    /// Report row highlighted by what has been typed into the list
    fn highlighted_report(&self) -> Option<&String> {
        let typed = self.field("65281").to_lowercase();
        if typed.is_empty() {
            return None;
        }
        self.reports.iter().find(|r| r.to_lowercase().starts_with(&typed))
    }

    fn write_export(&mut self, path: &Path) {
        self.writes += 1;
        let content = self
            .export_content
            .clone()
            .unwrap_or_else(|| format!("export #{} for {}", self.writes, path.display()));
        std::fs::write(path, content).expect("write export");
        if self.write_stale {
            let old = SystemTime::now() - Duration::from_secs(3600);
            File::options()
                .write(true)
                .open(path)
                .and_then(|f| f.set_modified(old))
                .expect("backdate export");
        }
    }

    fn modifiers(&self) -> (bool, bool) {
        (
            self.held.contains(&KeyCode::Control),
            self.held.contains(&KeyCode::Alt),
        )
    }

    fn on_key(&mut self, key: KeyCode) {
        let (ctrl, alt) = self.modifiers();
        let top = self.top().to_string();
        let on_main = top == MAIN;

        match (ctrl, alt, key) {
            (true, false, KeyCode::Char('i')) if on_main => self.open(BLANK_INVOICE),
            (true, false, KeyCode::Char('f')) if top == BLANK_INVOICE || top == VIEWING_INVOICE => {
                self.find_tabs = 0;
                self.fields.remove("3636");
                self.open(FIND_INVOICES);
            }
            (true, false, KeyCode::Char('p')) if top == VIEWING_INVOICE => {
                self.open(PRINT_ONE_INVOICE);
                if self.help_viewer_on_print {
                    self.open(HELP_VIEWER);
                }
            }
            (true, false, KeyCode::Char('a')) => {
                if let Some(field) = self.focused.clone() {
                    self.fields.remove(&field);
                }
            }
            (false, false, KeyCode::Tab) if top == FIND_INVOICES => self.find_tabs += 1,
            (false, false, KeyCode::Enter) if top == PRINT_ONE_INVOICE => {
                self.remove(PRINT_ONE_INVOICE);
                self.fields.remove("1001");
                self.open(SAVE_PRINT_OUTPUT);
            }
            (false, true, KeyCode::Char('s')) if top == SAVE_PRINT_OUTPUT => {
                let path = PathBuf::from(self.field("1001"));
                if path.exists() {
                    self.pending_save = Some(path);
                    self.open("Confirm Save As");
                } else {
                    self.remove(SAVE_PRINT_OUTPUT);
                    self.write_export(&path);
                }
            }
            (false, false, KeyCode::Char('y')) if top == "Confirm Save As" => {
                self.remove("Confirm Save As");
                self.remove(SAVE_PRINT_OUTPUT);
                self.remove(CREATE_DISK_FILE);
                if let Some(path) = self.pending_save.take() {
                    self.write_export(&path);
                }
            }
            (false, true, KeyCode::Char('n')) if top == "Available Credits" => self.remove(&top),

            (false, true, KeyCode::Char('r')) if on_main => self.menu_depth = 1,
            (false, false, KeyCode::Char('z')) if self.menu_depth == 1 => self.menu_depth = 2,
            (false, false, KeyCode::Enter) if self.menu_depth == 2 => {
                self.menu_depth = 0;
                self.fields.remove("65281");
                self.open(MEMORIZED_LIST);
            }
            (false, true, KeyCode::Char('s')) if top == MEMORIZED_LIST => {
                let report = self
                    .highlighted_report()
                    .filter(|r| !self.unopenable_reports.contains(*r))
                    .cloned();
                if let Some(report) = report {
                    self.fields.remove("65281");
                    self.open(&report);
                }
            }
            (false, false, KeyCode::Char('n')) if self.excel_menu => {
                self.excel_menu = false;
                self.csv_selected = false;
                self.open(SEND_TO_EXCEL);
            }
            (false, true, KeyCode::Char('x')) if top == SEND_TO_EXCEL && self.csv_selected => {
                self.remove(SEND_TO_EXCEL);
                self.fields.remove("1148");
                self.open(CREATE_DISK_FILE);
            }
            (false, false, KeyCode::Enter) if top == CREATE_DISK_FILE => {
                let path = PathBuf::from(self.field("1148"));
                if path.exists() {
                    self.pending_save = Some(path);
                    self.open("Confirm Save As");
                } else {
                    self.remove(CREATE_DISK_FILE);
                    self.write_export(&path);
                }
            }
            (false, false, KeyCode::Escape) if !on_main => self.remove(&top),
            _ => {}
        }
    }

    fn on_click(&mut self) {
        let cursor = self.cursor;
        let Some(target) = self
            .elements()
            .into_iter()
            .filter(|e| e.control_type != ControlType::Window)
            .find(|e| e.bounds.contains(cursor))
        else {
            return;
        };

        match target.auto_id.as_str() {
            "51" => {
                let number = self.field("3636");
                if self.invoices.contains(&number) {
                    self.remove(FIND_INVOICES);
                    self.remove(BLANK_INVOICE);
                    self.remove(VIEWING_INVOICE);
                    self.open(VIEWING_INVOICE);
                    if self.invoices_with_credits.contains(&number) {
                        self.open("Available Credits");
                    }
                } else {
                    // "No matches" is acknowledged and the search closes
                    self.remove(FIND_INVOICES);
                }
            }
            "7" => self.excel_menu = true,
            "1841" => self.csv_selected = true,
            _ => {}
        }
    }

    fn on_text(&mut self, text: &str) {
        let top = self.top().to_string();
        let field = if top == MEMORIZED_LIST {
            Some("65281".to_string())
        } else {
            self.focused.clone()
        };
        if let Some(field) = field {
            self.fields.entry(field).or_default().push_str(text);
        }
    }

    /// Draw accent boxes for the texts on the current top window
    fn render(&mut self, rect: ScreenRect) -> RgbaImage {
        let top = self.top().to_string();
        let texts: Vec<String> = if top == PRINT_ONE_INVOICE {
            vec![self.printer.clone()]
        } else if top == MEMORIZED_LIST {
            let mut texts = vec!["Report Name".to_string()];
            texts.extend(self.highlighted_report().cloned());
            texts
        } else {
            Vec::new()
        };

        let mut image = RgbaImage::from_pixel(rect.width, rect.height, BACKGROUND);
        for (i, _) in texts.iter().enumerate() {
            let y = 10 + i as u32 * 30;
            for yy in y..y + 12 {
                for xx in 10..90 {
                    image.put_pixel(xx, yy, Rgba([ACCENT.r, ACCENT.g, ACCENT.b, 255]));
                }
            }
            image.put_pixel(50, y + 6, Rgba([i as u8, 0, MARKER_BLUE, 255]));
        }
        self.screen_texts = texts;
        image
    }
}

fn element(control_type: ControlType, name: &str, auto_id: &str, bounds: ScreenRect) -> ElementInfo {
    ElementInfo {
        handle: format!("{}:{}:{}", control_type.as_str(), name, auto_id),
        control_type,
        name: name.to_string(),
        auto_id: auto_id.to_string(),
        bounds,
        is_enabled: true,
        has_focus: false,
    }
}

/// Shared handle to the simulated application
#[derive(Clone)]
pub struct Sim(pub Rc<RefCell<SimApp>>);

impl Sim {
    pub fn new() -> Self {
        Self(Rc::new(RefCell::new(SimApp::new())))
    }

    pub fn app(&self) -> std::cell::RefMut<'_, SimApp> {
        self.0.borrow_mut()
    }

    pub fn titles(&self) -> Vec<String> {
        self.0.borrow().titles()
    }

    pub fn session(&self, config: EngineConfig) -> DesktopSession {
        DesktopSession::new(
            Box::new(self.clone()),
            Box::new(self.clone()),
            Box::new(self.clone()),
            Box::new(self.clone()),
            config,
        )
    }
}

impl AccessibilityProvider for Sim {
    fn windows(&self) -> anyhow::Result<Vec<WindowInfo>> {
        Ok(self
            .0
            .borrow()
            .windows
            .iter()
            .map(|w| {
                let mut info = WindowInfo::new(w.title.clone(), WINDOW_BOUNDS);
                info.handle = Some(w.title.clone());
                info
            })
            .collect())
    }

    fn resolve(&self, descriptor: &ElementDescriptor) -> anyhow::Result<Option<ElementInfo>> {
        Ok(self
            .0
            .borrow()
            .elements()
            .into_iter()
            .find(|e| descriptor.matches(e.control_type, &e.name, &e.auto_id)))
    }

    fn focus(&self, element: &ElementInfo) -> anyhow::Result<()> {
        let mut app = self.0.borrow_mut();
        app.focused = match element.control_type {
            ControlType::Edit => Some(element.auto_id.clone()),
            _ => None,
        };
        Ok(())
    }

    fn set_text(&self, element: &ElementInfo, text: &str) -> anyhow::Result<()> {
        self.0
            .borrow_mut()
            .fields
            .insert(element.auto_id.clone(), text.to_string());
        Ok(())
    }

    fn read_text(&self, element: &ElementInfo) -> anyhow::Result<Option<String>> {
        Ok(self.0.borrow().fields.get(&element.auto_id).cloned())
    }

    fn focus_window(&self, _window: &WindowInfo) -> anyhow::Result<()> {
        Ok(())
    }

    fn close_window(&self, window: &WindowInfo) -> anyhow::Result<()> {
        let mut app = self.0.borrow_mut();
        if app.sticky.contains(&window.title) {
            anyhow::bail!("`{}` ignored the close request", window.title);
        }
        app.remove(&window.title);
        Ok(())
    }
}

impl InputBackend for Sim {
    fn key_down(&mut self, key: KeyCode) -> anyhow::Result<()> {
        let mut app = self.0.borrow_mut();
        if key.is_modifier() {
            app.held.push(key);
        } else {
            app.keys.push(key.to_string());
            app.on_key(key);
        }
        Ok(())
    }

    fn key_up(&mut self, key: KeyCode) -> anyhow::Result<()> {
        self.0.borrow_mut().held.retain(|k| *k != key);
        Ok(())
    }

    fn text(&mut self, text: &str) -> anyhow::Result<()> {
        self.0.borrow_mut().on_text(text);
        Ok(())
    }

    fn move_mouse(&mut self, to: Point) -> anyhow::Result<()> {
        self.0.borrow_mut().cursor = to;
        Ok(())
    }

    fn click(&mut self, _button: MouseButton) -> anyhow::Result<()> {
        self.0.borrow_mut().on_click();
        Ok(())
    }
}

impl ScreenCapture for Sim {
    fn capture(&self, rect: ScreenRect) -> anyhow::Result<Region> {
        let image = self.0.borrow_mut().render(rect);
        Ok(Region::captured(rect.origin(), image))
    }
}

impl OcrEngine for Sim {
    fn recognize(&self, image: &RgbaImage) -> anyhow::Result<String> {
        let app = self.0.borrow();
        Ok(image
            .pixels()
            .find(|p| p.0[2] == MARKER_BLUE && p.0[1] == 0)
            .and_then(|p| app.screen_texts.get(p.0[0] as usize).cloned())
            .unwrap_or_default())
    }
}
