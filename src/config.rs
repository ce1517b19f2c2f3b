use std::env;
use std::time::Duration;

use crate::models::Color;

/// Tunables for one automation session.
///
/// Durations are read from the environment as (fractional) seconds.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    // ============ Timing ============
    /// Wait for a full window (invoice form, report) to load
    pub window_load_delay: Duration,
    /// Wait for a dialog to appear and become active
    pub dialog_load_delay: Duration,
    /// Pause after each keystroke sequence
    pub navigation_delay: Duration,
    /// Sleep between polls of the accessibility tree
    pub poll_interval: Duration,
    /// Longest wait for the export file to appear
    pub max_export_wait: Duration,
    /// Longest wait for the export file to stop changing
    pub max_stable_wait: Duration,
    /// Size and mtime must hold still this long to count as stable
    pub stability_interval: Duration,
    /// A rewritten pre-existing export younger than this is accepted
    pub acceptable_file_age: Duration,

    // ============ Verification ============
    pub string_match_threshold: f64,
    pub printer_match_threshold: f64,
    pub report_match_threshold: f64,
    pub valid_invoice_printer: String,
    /// Highlight color of selected rows and active fields
    pub accent_color: Color,
    pub color_tolerance: u8,
    /// Connected components smaller than this are noise
    pub min_region_area: u64,
    pub ocr_language: String,

    // ============ Session ============
    /// Fragment of the main window title that identifies the process
    pub main_window_title: String,
    pub memorized_list_title: String,
    pub home_attempts: u32,
    /// Loop iterations allowed per document before giving up
    pub max_transitions_per_document: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            window_load_delay: Duration::from_secs(5),
            dialog_load_delay: Duration::from_secs(3),
            navigation_delay: Duration::from_millis(250),
            poll_interval: Duration::from_millis(50),
            max_export_wait: Duration::from_secs(60),
            max_stable_wait: Duration::from_secs(60),
            stability_interval: Duration::from_millis(500),
            acceptable_file_age: Duration::from_secs(30),

            string_match_threshold: 90.0,
            printer_match_threshold: 90.0,
            report_match_threshold: 90.0,
            valid_invoice_printer: "Microsoft Print to PDF".to_string(),
            accent_color: Color::rgb(0x4e, 0x9e, 0x19),
            color_tolerance: 10,
            min_region_area: 50,
            ocr_language: "en".to_string(),

            main_window_title: "QuickBooks".to_string(),
            memorized_list_title: "Memorized Report List".to_string(),
            home_attempts: 10,
            max_transitions_per_document: 40,
        }
    }
}

impl EngineConfig {
    /// Defaults overridden by `QB_*` environment variables. Unparseable
    /// values are logged and ignored.
    pub fn from_env() -> Self {
        let d = Self::default();
        Self {
            window_load_delay: secs("QB_WINDOW_LOAD_DELAY", d.window_load_delay),
            dialog_load_delay: secs("QB_DIALOG_LOAD_DELAY", d.dialog_load_delay),
            navigation_delay: secs("QB_NAVIGATION_DELAY", d.navigation_delay),
            poll_interval: secs("QB_POLL_INTERVAL", d.poll_interval),
            max_export_wait: secs("QB_MAX_EXPORT_WAIT", d.max_export_wait),
            max_stable_wait: secs("QB_MAX_STABLE_WAIT", d.max_stable_wait),
            stability_interval: secs("QB_STABILITY_INTERVAL", d.stability_interval),
            acceptable_file_age: secs("QB_ACCEPTABLE_FILE_AGE", d.acceptable_file_age),

            string_match_threshold: parsed("QB_STRING_MATCH_THRESHOLD", d.string_match_threshold),
            printer_match_threshold: parsed("QB_PRINTER_MATCH_THRESHOLD", d.printer_match_threshold),
            report_match_threshold: parsed("QB_REPORT_MATCH_THRESHOLD", d.report_match_threshold),
            valid_invoice_printer: env::var("QB_VALID_INVOICE_PRINTER").unwrap_or(d.valid_invoice_printer),
            accent_color: parsed("QB_ACCENT_COLOR", d.accent_color),
            color_tolerance: parsed("QB_COLOR_TOLERANCE", d.color_tolerance),
            min_region_area: parsed("QB_MIN_REGION_AREA", d.min_region_area),
            ocr_language: env::var("QB_OCR_LANGUAGE").unwrap_or(d.ocr_language),

            main_window_title: env::var("QB_MAIN_WINDOW_TITLE").unwrap_or(d.main_window_title),
            memorized_list_title: env::var("QB_MEMORIZED_LIST_TITLE").unwrap_or(d.memorized_list_title),
            home_attempts: parsed("QB_HOME_ATTEMPTS", d.home_attempts),
            max_transitions_per_document: parsed(
                "QB_MAX_TRANSITIONS_PER_DOCUMENT",
                d.max_transitions_per_document,
            ),
        }
    }
}

fn parsed<T: std::str::FromStr>(name: &str, default: T) -> T {
    match env::var(name) {
        Ok(raw) => raw.trim().parse().unwrap_or_else(|_| {
            tracing::warn!("Ignoring unparseable {}={:?}", name, raw);
            default
        }),
        Err(_) => default,
    }
}

fn secs(name: &str, default: Duration) -> Duration {
    let value: f64 = parsed(name, default.as_secs_f64());
    Duration::try_from_secs_f64(value).unwrap_or_else(|_| {
        tracing::warn!("Ignoring out of range {}={}", name, value);
        default
    })
}
