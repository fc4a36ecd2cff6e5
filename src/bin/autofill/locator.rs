use anyhow::Result;
use tracing::{debug, info};

use crate::classify::classify;
use crate::page::Page;
use crate::types::{ElementId, ElementSnapshot};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldLookup {
    Found(ElementId),
    Missing { available: usize },
}

/// The `position`-th free-text field in document order.
pub fn locate_text_field(elements: &[ElementSnapshot], position: usize) -> FieldLookup {
    let fields: Vec<&ElementSnapshot> = elements
        .iter()
        .filter(|el| classify(el).is_text_field)
        .collect();
    match fields.get(position) {
        Some(el) => FieldLookup::Found(el.id()),
        None => FieldLookup::Missing {
            available: fields.len(),
        },
    }
}

/// Unchecked "record my email address" checkboxes, all of them.
pub fn pending_email_toggles(elements: &[ElementSnapshot]) -> Vec<ElementId> {
    elements
        .iter()
        .filter(|el| classify(el).is_email_toggle && !el.is_checked())
        .map(ElementSnapshot::id)
        .collect()
}

/// Click every email-recording checkbox that is not already on.
/// Returns how many were clicked.
pub async fn activate_email_toggles(page: &dyn Page) -> Result<usize> {
    let elements = page.scan().await?;
    let pending = pending_email_toggles(&elements);
    if pending.is_empty() {
        debug!("no unchecked email toggle on page");
    }
    for id in &pending {
        info!(eid = %id, "turning on email address recording");
        page.click(id).await?;
    }
    Ok(pending.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::FixturePage;

    const FIELDS: &str = r#"
        <input type="text" aria-label="first">
        <input type="email">
        <textarea></textarea>
        <input type="text" aria-label="third">
    "#;

    #[test]
    fn position_counts_only_text_capable_fields() {
        let page = FixturePage::from_html("https://x/viewform", FIELDS);
        let elements = page.snapshots();
        assert_eq!(
            locate_text_field(&elements, 1),
            FieldLookup::Found(elements[2].id())
        );
        assert_eq!(
            locate_text_field(&elements, 2),
            FieldLookup::Found(elements[3].id())
        );
        assert_eq!(
            locate_text_field(&elements, 3),
            FieldLookup::Missing { available: 3 }
        );
    }

    const TOGGLES: &str = r#"
        <label><div role="checkbox" aria-checked="false"></div>
          メールアドレスとして taro@example.com を回答に記録する</label>
        <div><div role="checkbox" aria-checked="false"></div><span>回答のコピーを送信</span></div>
        <div><div role="checkbox" aria-checked="false"></div>メールアドレスを記録</div>
    "#;

    #[tokio::test]
    async fn clicks_every_matching_toggle_once() {
        let page = FixturePage::from_html("https://x/viewform", TOGGLES);

        assert_eq!(activate_email_toggles(&page).await.unwrap(), 2);
        assert_eq!(page.clicks().len(), 2);

        // Both are checked now; a second pass leaves them alone.
        assert_eq!(activate_email_toggles(&page).await.unwrap(), 0);
        assert_eq!(page.clicks().len(), 2);
    }

    #[tokio::test]
    async fn already_checked_toggle_is_not_clicked() {
        let page = FixturePage::from_html(
            "https://x/viewform",
            r#"<label><div role="checkbox" aria-checked="true"></div>メールアドレスを記録</label>"#,
        );
        assert_eq!(activate_email_toggles(&page).await.unwrap(), 0);
        assert!(page.clicks().is_empty());
    }
}
