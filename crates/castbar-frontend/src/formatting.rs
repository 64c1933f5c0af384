use std::fmt::{Display, Write};

use castbar_backend::ServiceState;

/// Label of the start/stop menu entry for the current service state.
pub const fn toggle_label(state: ServiceState) -> &'static str {
    match state {
        ServiceState::Running => "Stop Cast",
        ServiceState::Stopped => "Start Cast",
    }
}

/// Label showing the address the renderer is reachable on.
pub fn ip_label(address: impl Display) -> String {
    format!("IP: {address}")
}

/// Label of the about entry, carrying the installed version.
pub fn about_label(version: &str) -> String {
    format!("castbar (v{version})")
}

pub const fn switch_label(enabled: bool) -> &'static str {
    if enabled { "on" } else { "off" }
}

/// Formats a list of choices as `index:label`, marking the selected one with
/// a leading `*`.
///
/// ```text
/// 0:Small *1:Normal 2:Large
/// ```
pub fn format_choices<T: Copy + PartialEq>(
    choices: &[T],
    selected: T,
    label: impl Fn(T) -> &'static str,
) -> String {
    let mut out = String::new();
    for (index, choice) in choices.iter().copied().enumerate() {
        if index > 0 {
            out.push(' ');
        }
        if choice == selected {
            out.push('*');
        }
        // writing into a String cannot fail
        let _ = write!(out, "{index}:{}", label(choice));
    }
    out
}
