//! Presentation helpers: policy descriptions and version cell markup.

use crate::policy::ComparisonPolicy;

/// Placeholder shown when a worker's version cannot be verified.
pub const NOT_AVAILABLE: &str = "N/A";

/// Human-readable description of a policy.
pub fn policy_description(policy: ComparisonPolicy) -> &'static str {
    match policy {
        ComparisonPolicy::RuntimeAtLeastControllerBytecode => {
            "Agent runtime must be at least the controller's bytecode level (recommended)"
        }
        ComparisonPolicy::MajorMinorMatch => {
            "Agent runtime version must be at least the controller's, compared component by component"
        }
        ComparisonPolicy::ExactMatch => "Agent and controller runtime versions must match exactly",
    }
}

/// `(description, tag)` for every policy, in presentation order.
pub fn policy_choices() -> Vec<(&'static str, &'static str)> {
    ComparisonPolicy::ALL
        .iter()
        .map(|policy| (policy_description(*policy), policy.as_str()))
        .collect()
}

fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Flag a mismatched version for display.
pub fn wrap_error_span(text: &str) -> String {
    format!(
        "<span class=error style='display:inline-block'>{}</span>",
        escape_html(text)
    )
}

/// Version cell: verbatim when compatible, flagged otherwise.
pub fn version_cell(version: &str, compatible: bool) -> String {
    if compatible {
        escape_html(version)
    } else {
        wrap_error_span(version)
    }
}
