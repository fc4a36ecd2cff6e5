//! Text and role heuristics over scanned elements. No page access here.

use crate::types::ElementSnapshot;

/// Labels accepted on the submit control, compared after whitespace removal.
pub const SUBMIT_LABELS: [&str; 2] = ["送信", "Submit"];

const EMAIL_TOKENS: [&str; 2] = ["メールアドレス", "email"];
const RECORD_TOKENS: [&str; 2] = ["記録", "record"];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Classification {
    pub is_text_field: bool,
    pub is_email_toggle: bool,
    pub is_submit_control: bool,
}

pub fn classify(el: &ElementSnapshot) -> Classification {
    Classification {
        is_text_field: is_text_field(el),
        is_email_toggle: is_email_toggle(el),
        is_submit_control: is_submit_control(el),
    }
}

/// Drop every whitespace character, ideographic space included.
pub fn normalize_text(text: &str) -> String {
    text.chars().filter(|c| !c.is_whitespace()).collect()
}

fn has_role(el: &ElementSnapshot, role: &str) -> bool {
    el.role.as_deref().is_some_and(|r| r.eq_ignore_ascii_case(role))
}

fn is_text_field(el: &ElementSnapshot) -> bool {
    match el.tag.as_str() {
        "textarea" => true,
        "input" => el
            .input_type
            .as_deref()
            .is_some_and(|t| t.eq_ignore_ascii_case("text")),
        _ => false,
    }
}

fn is_email_toggle(el: &ElementSnapshot) -> bool {
    if !has_role(el, "checkbox") {
        return false;
    }
    let label = normalize_text(&el.label_text).to_lowercase();
    let contains_any = |tokens: &[&str]| tokens.iter().any(|t| label.contains(&t.to_lowercase()));
    contains_any(&EMAIL_TOKENS[..]) && contains_any(&RECORD_TOKENS[..])
}

fn is_submit_control(el: &ElementSnapshot) -> bool {
    let candidate = has_role(el, "button") || el.tag == "button" || el.tag == "span";
    candidate && SUBMIT_LABELS.contains(&normalize_text(&el.text).as_str())
}
