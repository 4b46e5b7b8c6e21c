//! Keyboard bindings for the tab shell.
//!
//! Accelerators are written the way menu items are ("CmdOrCtrl+Shift+Tab") and
//! resolved against key events reported by the host.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::settings::ShortcutSettings;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct AcceleratorError(String);

/// Commands reachable from the keyboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ShellCommand {
    NextTab,
    PrevTab,
    CloseActiveTab,
    NewTab,
    ReopenClosedTab,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Modifiers {
    pub ctrl: bool,
    pub alt: bool,
    pub shift: bool,
    pub meta: bool,
    /// Satisfied by either Ctrl or Meta.
    pub cmd_or_ctrl: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Accelerator {
    pub modifiers: Modifiers,
    /// Single characters are upper-cased; named keys keep their canonical spelling.
    pub key: String,
}

impl fmt::Display for Accelerator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts: Vec<&str> = Vec::new();
        if self.modifiers.cmd_or_ctrl {
            parts.push("CmdOrCtrl");
        }
        if self.modifiers.ctrl {
            parts.push("Ctrl");
        }
        if self.modifiers.alt {
            parts.push("Alt");
        }
        if self.modifiers.shift {
            parts.push("Shift");
        }
        if self.modifiers.meta {
            parts.push("Meta");
        }
        parts.push(self.key.as_str());
        write!(f, "{}", parts.join("+"))
    }
}

/// A key event as the host reports it (mirrors the DOM KeyboardEvent fields).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct KeyStroke {
    pub key: String,
    pub ctrl: bool,
    pub alt: bool,
    pub shift: bool,
    pub meta: bool,
}

impl Accelerator {
    pub fn parse(s: &str) -> Result<Self, AcceleratorError> {
        let parts: Vec<&str> = s.split('+').map(str::trim).collect();
        let mut modifiers = Modifiers::default();
        let mut key = None;

        for (i, part) in parts.iter().enumerate() {
            let is_modifier = match part.to_lowercase().as_str() {
                "ctrl" | "control" => {
                    modifiers.ctrl = true;
                    true
                }
                "alt" | "option" => {
                    modifiers.alt = true;
                    true
                }
                "shift" => {
                    modifiers.shift = true;
                    true
                }
                "meta" | "super" | "cmd" | "command" => {
                    modifiers.meta = true;
                    true
                }
                "cmdorctrl" | "commandorcontrol" => {
                    modifiers.cmd_or_ctrl = true;
                    true
                }
                _ => false,
            };

            if is_modifier {
                if i == parts.len() - 1 {
                    return Err(AcceleratorError(format!("'{}' ends with a modifier", s)));
                }
            } else if key.is_some() {
                return Err(AcceleratorError(format!("'{}' names more than one key", s)));
            } else {
                key = Some(normalize_key(part).ok_or_else(|| {
                    AcceleratorError(format!("'{}' has an empty key", s))
                })?);
            }
        }

        let key = key.ok_or_else(|| AcceleratorError(format!("'{}' names no key", s)))?;
        Ok(Self { modifiers, key })
    }

    pub fn matches(&self, stroke: &KeyStroke) -> bool {
        if normalize_key(&stroke.key).as_deref() != Some(self.key.as_str()) {
            return false;
        }
        let m = &self.modifiers;
        if stroke.shift != m.shift || stroke.alt != m.alt {
            return false;
        }
        if m.cmd_or_ctrl {
            // Either one fills the slot; the other must still be asked for explicitly.
            let ctrl_ok = stroke.ctrl || !m.ctrl;
            let meta_ok = stroke.meta || !m.meta;
            (stroke.ctrl || stroke.meta) && ctrl_ok && meta_ok
        } else {
            stroke.ctrl == m.ctrl && stroke.meta == m.meta
        }
    }
}

fn normalize_key(key: &str) -> Option<String> {
    let mut chars = key.chars();
    let first = chars.next()?;
    if chars.next().is_none() {
        return Some(first.to_uppercase().collect());
    }
    let lower = key.to_lowercase();
    let named = match lower.as_str() {
        "tab" => "Tab",
        "esc" | "escape" => "Escape",
        "enter" | "return" => "Enter",
        "space" => "Space",
        "left" | "arrowleft" => "ArrowLeft",
        "right" | "arrowright" => "ArrowRight",
        "pageup" => "PageUp",
        "pagedown" => "PageDown",
        _ => return Some(key.to_string()),
    };
    Some(named.to_string())
}

#[derive(Debug, Clone, Default)]
pub struct Keymap {
    bindings: Vec<(Accelerator, ShellCommand)>,
}

impl Keymap {
    /// Unparsable accelerators are skipped with a warning; the rest stay bound.
    pub fn from_settings(shortcuts: &ShortcutSettings) -> Self {
        let entries = [
            (&shortcuts.next_tab, ShellCommand::NextTab),
            (&shortcuts.prev_tab, ShellCommand::PrevTab),
            (&shortcuts.close_tab, ShellCommand::CloseActiveTab),
            (&shortcuts.new_tab, ShellCommand::NewTab),
            (&shortcuts.reopen_closed_tab, ShellCommand::ReopenClosedTab),
        ];

        let mut bindings = Vec::with_capacity(entries.len());
        for (accelerator, command) in entries {
            match Accelerator::parse(accelerator) {
                Ok(acc) => bindings.push((acc, command)),
                Err(e) => log::warn!("[Shortcuts] Ignoring binding for {:?}: {}", command, e),
            }
        }
        Self { bindings }
    }

    pub fn lookup(&self, stroke: &KeyStroke) -> Option<ShellCommand> {
        self.bindings
            .iter()
            .find(|(acc, _)| acc.matches(stroke))
            .map(|(_, command)| *command)
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}
