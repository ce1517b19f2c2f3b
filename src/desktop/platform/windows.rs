#![cfg(target_os = "windows")]

use std::cell::RefCell;

use anyhow::{anyhow, Result};
use windows::{
    core::{Interface, BSTR},
    Win32::{
        Foundation::{BOOL, HWND, LPARAM, RECT, WPARAM},
        System::{
            Com::{CoCreateInstance, CoInitializeEx, CLSCTX_ALL, COINIT_MULTITHREADED, SAFEARRAY},
            Ole::SafeArrayDestroy,
        },
        UI::{
            Accessibility::{
                CUIAutomation, IUIAutomation, IUIAutomationElement, IUIAutomationValuePattern,
                IUIAutomationWindowPattern, TreeScope_Descendants, TreeScope_Subtree,
                UIA_ButtonControlTypeId, UIA_EditControlTypeId, UIA_PaneControlTypeId,
                UIA_ValuePatternId, UIA_WindowControlTypeId, UIA_WindowPatternId,
            },
            WindowsAndMessaging::{
                EnumWindows, GetClassNameW, GetWindowRect, GetWindowTextW,
                GetWindowThreadProcessId, IsWindowVisible, PostMessageW, SetForegroundWindow,
                ShowWindow, SW_RESTORE, WM_CLOSE,
            },
        },
    },
};

use super::AccessibilityProvider;
use crate::desktop::types::{ElementInfo, ScreenRect, WindowInfo};
use crate::models::{ControlType, ElementDescriptor};

/// Window class of standard Win32 dialog boxes
const DIALOG_CLASS: &str = "#32770";

const HWND_PREFIX: &str = "hwnd:";
const UIA_PREFIX: &str = "uia:";

/// Top-level window as reported by EnumWindows
struct RawWindow {
    hwnd: HWND,
    title: String,
    class: String,
    pid: u32,
    bounds: ScreenRect,
}

/// Windows UI Automation provider bound to one process
///
/// The automation object is created once on the calling thread; the provider
/// must stay on that thread.
pub struct WindowsAccessibility {
    automation: IUIAutomation,
    main_title: String,
    /// Element from the most recent resolve, so follow-up calls skip a tree scan
    last_resolved: RefCell<Option<(String, IUIAutomationElement)>>,
}

impl WindowsAccessibility {
    pub fn new(main_title: &str) -> Result<Self> {
        let automation = unsafe {
            let _ = CoInitializeEx(None, COINIT_MULTITHREADED);
            CoCreateInstance(&CUIAutomation, None, CLSCTX_ALL)
                .map_err(|e| anyhow!("Failed to create UIAutomation: {}", e))?
        };
        Ok(Self {
            automation,
            main_title: main_title.to_string(),
            last_resolved: RefCell::new(None),
        })
    }

    fn uia_control_type(control_type: ControlType) -> i32 {
        match control_type {
            ControlType::Window => UIA_WindowControlTypeId.0,
            ControlType::Pane => UIA_PaneControlTypeId.0,
            ControlType::Edit => UIA_EditControlTypeId.0,
            ControlType::Button => UIA_ButtonControlTypeId.0,
        }
    }

    fn control_type_from_uia(id: i32) -> Option<ControlType> {
        match id {
            x if x == UIA_WindowControlTypeId.0 => Some(ControlType::Window),
            x if x == UIA_PaneControlTypeId.0 => Some(ControlType::Pane),
            x if x == UIA_EditControlTypeId.0 => Some(ControlType::Edit),
            x if x == UIA_ButtonControlTypeId.0 => Some(ControlType::Button),
            _ => None,
        }
    }

    /// Every visible, titled top-level window in z-order
    fn enumerate_top_level() -> Vec<RawWindow> {
        let mut windows: Vec<RawWindow> = Vec::new();

        unsafe {
            unsafe extern "system" fn enum_callback(hwnd: HWND, lparam: LPARAM) -> BOOL {
                let windows = &mut *(lparam.0 as *mut Vec<RawWindow>);

                if !IsWindowVisible(hwnd).as_bool() {
                    return BOOL(1);
                }

                let mut title_buf = [0u16; 512];
                let len = GetWindowTextW(hwnd, &mut title_buf);
                if len <= 0 {
                    return BOOL(1);
                }
                let title = String::from_utf16_lossy(&title_buf[..len as usize]);

                let mut class_buf = [0u16; 256];
                let class_len = GetClassNameW(hwnd, &mut class_buf);
                let class = String::from_utf16_lossy(&class_buf[..class_len.max(0) as usize]);

                let mut rect = RECT::default();
                if GetWindowRect(hwnd, &mut rect).is_err() {
                    return BOOL(1);
                }

                let mut pid: u32 = 0;
                GetWindowThreadProcessId(hwnd, Some(&mut pid));

                windows.push(RawWindow {
                    hwnd,
                    title,
                    class,
                    pid,
                    bounds: rect_to_screen(&rect),
                });

                BOOL(1)
            }

            let windows_ptr = LPARAM(&mut windows as *mut Vec<RawWindow> as isize);
            let _ = EnumWindows(Some(enum_callback), windows_ptr);
        }

        windows
    }

    /// Top-level windows of the target process, topmost first
    fn process_windows(&self) -> Result<Vec<RawWindow>> {
        let all = Self::enumerate_top_level();
        let pid = all
            .iter()
            .find(|w| w.title.contains(&self.main_title))
            .map(|w| w.pid)
            .ok_or_else(|| anyhow!("No window titled like `{}` is open", self.main_title))?;
        Ok(all.into_iter().filter(|w| w.pid == pid).collect())
    }

    /// Window-type elements hosted inside the main window (MDI children)
    fn hosted_windows(&self, main: &RawWindow) -> Result<Vec<WindowInfo>> {
        unsafe {
            let root = self
                .automation
                .ElementFromHandle(main.hwnd)
                .map_err(|e| anyhow!("Failed to get element from handle: {}", e))?;
            let condition = self.automation.CreateTrueCondition()?;
            let found = root.FindAll(TreeScope_Descendants, &condition)?;

            let mut hosted = Vec::new();
            for i in 0..found.Length().unwrap_or(0) {
                let Ok(element) = found.GetElement(i) else {
                    continue;
                };
                let control_type = element.CurrentControlType().map(|c| c.0).unwrap_or(0);
                if control_type != UIA_WindowControlTypeId.0 {
                    continue;
                }
                let title = element.CurrentName().map(|s| s.to_string()).unwrap_or_default();
                if title.trim().is_empty() {
                    continue;
                }
                let Some(runtime_id) = runtime_id(&element) else {
                    continue;
                };
                let bounds = element
                    .CurrentBoundingRectangle()
                    .map(|r| rect_to_screen(&r))
                    .unwrap_or_default();
                hosted.push(WindowInfo {
                    title,
                    bounds,
                    handle: Some(format!("{}{}", UIA_PREFIX, runtime_id)),
                    friendly_class: "Window".to_string(),
                });
            }
            Ok(hosted)
        }
    }

    fn element_info(element: &IUIAutomationElement, control_type: ControlType) -> Option<ElementInfo> {
        unsafe {
            Some(ElementInfo {
                handle: runtime_id(element)?,
                control_type,
                name: element.CurrentName().map(|s| s.to_string()).unwrap_or_default(),
                auto_id: element
                    .CurrentAutomationId()
                    .map(|s| s.to_string())
                    .unwrap_or_default(),
                bounds: element
                    .CurrentBoundingRectangle()
                    .map(|r| rect_to_screen(&r))
                    .unwrap_or_default(),
                is_enabled: element.CurrentIsEnabled().map(|b| b.as_bool()).unwrap_or(false),
                has_focus: element
                    .CurrentHasKeyboardFocus()
                    .map(|b| b.as_bool())
                    .unwrap_or(false),
            })
        }
    }

    /// Find a live element by runtime id, trying the last resolved one first
    fn find_by_runtime_id(&self, id: &str) -> Result<IUIAutomationElement> {
        if let Some((cached_id, element)) = self.last_resolved.borrow().as_ref() {
            if cached_id == id {
                return Ok(element.clone());
            }
        }

        let condition = unsafe { self.automation.CreateTrueCondition()? };
        for window in self.process_windows()? {
            unsafe {
                let Ok(root) = self.automation.ElementFromHandle(window.hwnd) else {
                    continue;
                };
                let found = root.FindAll(TreeScope_Subtree, &condition)?;
                for i in 0..found.Length().unwrap_or(0) {
                    if let Ok(element) = found.GetElement(i) {
                        if runtime_id(&element).as_deref() == Some(id) {
                            return Ok(element);
                        }
                    }
                }
            }
        }
        Err(anyhow!("Element not found: {}", id))
    }

    fn value_pattern(element: &IUIAutomationElement) -> Result<IUIAutomationValuePattern> {
        unsafe {
            element
                .GetCurrentPattern(UIA_ValuePatternId)
                .map_err(|_| anyhow!("Element does not support ValuePattern"))?
                .cast::<IUIAutomationValuePattern>()
                .map_err(|_| anyhow!("Failed to cast to ValuePattern"))
        }
    }
}

impl AccessibilityProvider for WindowsAccessibility {
    fn windows(&self) -> Result<Vec<WindowInfo>> {
        let raw = self.process_windows()?;
        let mut windows = Vec::with_capacity(raw.len());

        for w in &raw {
            if w.title.contains(&self.main_title) {
                match self.hosted_windows(w) {
                    Ok(hosted) => windows.extend(hosted),
                    Err(e) => tracing::warn!("Failed to list windows inside `{}`: {}", w.title, e),
                }
            }
            windows.push(WindowInfo {
                title: w.title.clone(),
                bounds: w.bounds,
                handle: Some(format!("{}{}", HWND_PREFIX, w.hwnd.0 as usize)),
                friendly_class: if w.class == DIALOG_CLASS {
                    "Dialog".to_string()
                } else {
                    w.class.clone()
                },
            });
        }

        Ok(windows)
    }

    fn resolve(&self, descriptor: &ElementDescriptor) -> Result<Option<ElementInfo>> {
        let wanted = Self::uia_control_type(descriptor.control_type());
        let condition = unsafe { self.automation.CreateTrueCondition()? };

        for window in self.process_windows()? {
            unsafe {
                let Ok(root) = self.automation.ElementFromHandle(window.hwnd) else {
                    continue;
                };
                let found = root.FindAll(TreeScope_Subtree, &condition)?;
                for i in 0..found.Length().unwrap_or(0) {
                    let Ok(element) = found.GetElement(i) else {
                        continue;
                    };
                    let control_type = element.CurrentControlType().map(|c| c.0).unwrap_or(0);
                    if control_type != wanted {
                        continue;
                    }
                    let Some(control_type) = Self::control_type_from_uia(control_type) else {
                        continue;
                    };
                    let name = element.CurrentName().map(|s| s.to_string()).unwrap_or_default();
                    let auto_id = element
                        .CurrentAutomationId()
                        .map(|s| s.to_string())
                        .unwrap_or_default();
                    if !descriptor.matches(control_type, &name, &auto_id) {
                        continue;
                    }
                    if let Some(info) = Self::element_info(&element, control_type) {
                        *self.last_resolved.borrow_mut() = Some((info.handle.clone(), element));
                        return Ok(Some(info));
                    }
                }
            }
        }

        Ok(None)
    }

    fn focus(&self, element: &ElementInfo) -> Result<()> {
        let live = self.find_by_runtime_id(&element.handle)?;
        unsafe {
            live.SetFocus()
                .map_err(|e| anyhow!("Failed to focus {}: {}", element.name, e))
        }
    }

    fn set_text(&self, element: &ElementInfo, text: &str) -> Result<()> {
        let live = self.find_by_runtime_id(&element.handle)?;
        let pattern = Self::value_pattern(&live)?;
        unsafe {
            pattern
                .SetValue(&BSTR::from(text))
                .map_err(|e| anyhow!("Failed to set value: {}", e))
        }
    }

    fn read_text(&self, element: &ElementInfo) -> Result<Option<String>> {
        let live = self.find_by_runtime_id(&element.handle)?;
        if let Ok(pattern) = Self::value_pattern(&live) {
            if let Ok(value) = unsafe { pattern.CurrentValue() } {
                return Ok(Some(value.to_string()));
            }
        }
        let name = unsafe { live.CurrentName() }.map(|s| s.to_string()).unwrap_or_default();
        Ok(Some(name).filter(|s| !s.is_empty()))
    }

    fn focus_window(&self, window: &WindowInfo) -> Result<()> {
        let handle = window
            .handle
            .as_deref()
            .ok_or_else(|| anyhow!("Window `{}` has no handle", window.title))?;

        if let Some(hwnd) = parse_hwnd(handle) {
            unsafe {
                let _ = ShowWindow(hwnd, SW_RESTORE);
                if !SetForegroundWindow(hwnd).as_bool() {
                    return Err(anyhow!("Failed to set foreground window"));
                }
            }
            return Ok(());
        }

        let id = handle.strip_prefix(UIA_PREFIX).unwrap_or(handle);
        let live = self.find_by_runtime_id(id)?;
        unsafe {
            live.SetFocus()
                .map_err(|e| anyhow!("Failed to focus `{}`: {}", window.title, e))
        }
    }

    fn close_window(&self, window: &WindowInfo) -> Result<()> {
        let handle = window
            .handle
            .as_deref()
            .ok_or_else(|| anyhow!("Window `{}` has no handle", window.title))?;

        if let Some(hwnd) = parse_hwnd(handle) {
            return unsafe {
                PostMessageW(hwnd, WM_CLOSE, WPARAM(0), LPARAM(0))
                    .map_err(|e| anyhow!("Failed to post close to `{}`: {}", window.title, e))
            };
        }

        let id = handle.strip_prefix(UIA_PREFIX).unwrap_or(handle);
        let live = self.find_by_runtime_id(id)?;
        unsafe {
            let pattern = live
                .GetCurrentPattern(UIA_WindowPatternId)
                .map_err(|_| anyhow!("`{}` does not support WindowPattern", window.title))?
                .cast::<IUIAutomationWindowPattern>()
                .map_err(|_| anyhow!("Failed to cast to WindowPattern"))?;
            pattern
                .Close()
                .map_err(|e| anyhow!("Failed to close `{}`: {}", window.title, e))
        }
    }
}

fn rect_to_screen(rect: &RECT) -> ScreenRect {
    ScreenRect::new(
        rect.left,
        rect.top,
        (rect.right - rect.left).max(0) as u32,
        (rect.bottom - rect.top).max(0) as u32,
    )
}

fn parse_hwnd(handle: &str) -> Option<HWND> {
    let value: usize = handle.strip_prefix(HWND_PREFIX)?.parse().ok()?;
    Some(HWND(value as *mut _))
}

/// Dotted runtime id (`42.1234.4.5`) of an element
fn runtime_id(element: &IUIAutomationElement) -> Option<String> {
    unsafe {
        let arr: *mut SAFEARRAY = element.GetRuntimeId().ok()?;
        if arr.is_null() {
            return None;
        }
        let bounds = (*arr).rgsabound[0];
        let data = (*arr).pvData as *const i32;
        let parts: Vec<String> = (0..bounds.cElements.min(10))
            .map(|i| (*data.add(i as usize)).to_string())
            .collect();
        let _ = SafeArrayDestroy(arr);
        Some(parts.join(".")).filter(|id| !id.is_empty())
    }
}
