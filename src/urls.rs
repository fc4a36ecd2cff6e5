//! URL shape rules shared by the editor and the automation agent.

/// Path marker of a fillable form page.
pub const FORM_PAGE_MARKER: &str = "viewform";
/// Path marker of the page shown after a response was recorded.
pub const CONFIRMATION_MARKER: &str = "formResponse";

const FORM_ID_PREFIX: &str = "/d/e/";
const FORM_URL_BASE: &str = "https://docs.google.com/forms/d/e/";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageKind {
    Form,
    Confirmation,
    Other,
}

impl PageKind {
    pub fn of(url: &str) -> Self {
        if url.contains(CONFIRMATION_MARKER) {
            PageKind::Confirmation
        } else if url.contains(FORM_PAGE_MARKER) {
            PageKind::Form
        } else {
            PageKind::Other
        }
    }
}

/// The published form id out of `.../d/e/<id>/...`, or the whole URL when
/// there is none.
pub fn extract_match_key(url: &str) -> String {
    for (start, _) in url.match_indices(FORM_ID_PREFIX) {
        let rest = &url[start + FORM_ID_PREFIX.len()..];
        if let Some((id, _)) = rest.split_once('/') {
            if !id.is_empty() {
                return id.to_string();
            }
        }
    }
    url.to_string()
}

/// URL to open for a stored match key.
pub fn form_url(match_key: &str) -> String {
    if match_key.contains("://") {
        match_key.to_string()
    } else {
        format!("{FORM_URL_BASE}{match_key}/{FORM_PAGE_MARKER}")
    }
}
