//! In-memory [`Page`] built from static HTML, recording everything done to it.

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use scraper::{ElementRef, Html, Selector};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use tokio::time::Instant;

use crate::dom::CANDIDATE_SELECTOR;
use crate::page::Page;
use crate::types::{ElementId, ElementSnapshot, Point};

struct FixtureElement {
    snapshot: ElementSnapshot,
    html_id: Option<String>,
}

#[derive(Default)]
struct State {
    url: String,
    loads: u32,
    elements: Vec<FixtureElement>,
    late_render: Option<(usize, String)>,
    scans: usize,
    first_scan_at: Option<Instant>,
    url_reads: usize,
    failing_url_reads: usize,
    pending_navigation: Option<(usize, String)>,
    navigate_on_click: Option<String>,
    values: HashMap<ElementId, String>,
    events: Vec<(ElementId, &'static str)>,
    clicks: Vec<ElementId>,
    highlighted: Vec<ElementId>,
    pointers: HashMap<ElementId, Point>,
    posted: Vec<Value>,
}

impl State {
    fn index_of(&self, id: &ElementId) -> Result<usize> {
        self.elements
            .iter()
            .position(|el| el.snapshot.eid == id.0)
            .ok_or_else(|| anyhow!("element {id} is gone"))
    }
}

pub struct FixturePage {
    state: Mutex<State>,
}

impl FixturePage {
    pub fn from_html(url: &str, html: &str) -> Self {
        Self {
            state: Mutex::new(State {
                url: url.to_string(),
                loads: 1,
                elements: parse(html),
                ..Default::default()
            }),
        }
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap()
    }

    /// Replace the document with `html` for scans after the first `scans`.
    pub fn render_after_scans(&self, scans: usize, html: &str) {
        self.state().late_render = Some((scans, html.to_string()));
    }

    /// Switch the URL for reads after the first `reads`.
    pub fn navigate_after_url_reads(&self, reads: usize, url: &str) {
        self.state().pending_navigation = Some((reads, url.to_string()));
    }

    /// Switch the URL once a pointer click sequence arrives.
    pub fn navigate_on_click(&self, url: &str) {
        self.state().navigate_on_click = Some(url.to_string());
    }

    /// Load the same document again.
    pub fn reload(&self) {
        self.state().loads += 1;
    }

    /// Make the first `reads` URL reads fail.
    pub fn fail_url_reads(&self, reads: usize) {
        self.state().failing_url_reads = reads;
    }

    pub fn snapshots(&self) -> Vec<ElementSnapshot> {
        self.state()
            .elements
            .iter()
            .map(|el| el.snapshot.clone())
            .collect()
    }

    pub fn html_id(&self, id: &ElementId) -> Option<String> {
        let state = self.state();
        let index = state.index_of(id).ok()?;
        state.elements[index].html_id.clone()
    }

    pub fn by_html_id(&self, html_id: &str) -> ElementId {
        self.state()
            .elements
            .iter()
            .find(|el| el.html_id.as_deref() == Some(html_id))
            .map(|el| el.snapshot.id())
            .unwrap_or_else(|| panic!("no element with id {html_id}"))
    }

    pub fn center(&self, id: &ElementId) -> Point {
        let index = self.state().index_of(id).unwrap();
        Point {
            x: 120.0,
            y: 20.0 + 40.0 * index as f64,
        }
    }

    pub fn scan_count(&self) -> usize {
        self.state().scans
    }

    pub fn first_scan_at(&self) -> Option<Instant> {
        self.state().first_scan_at
    }

    pub fn url_reads(&self) -> usize {
        self.state().url_reads
    }

    pub fn value_of(&self, id: &ElementId) -> Option<String> {
        self.state().values.get(id).cloned()
    }

    pub fn values(&self) -> HashMap<ElementId, String> {
        self.state().values.clone()
    }

    pub fn events_on(&self, id: &ElementId) -> Vec<&'static str> {
        self.state()
            .events
            .iter()
            .filter(|(target, _)| target == id)
            .map(|(_, kind)| *kind)
            .collect()
    }

    pub fn all_events(&self) -> Vec<(ElementId, &'static str)> {
        self.state().events.clone()
    }

    pub fn clicks(&self) -> Vec<ElementId> {
        self.state().clicks.clone()
    }

    pub fn highlighted(&self) -> Vec<ElementId> {
        self.state().highlighted.clone()
    }

    pub fn pointer_at(&self, id: &ElementId) -> Option<Point> {
        self.state().pointers.get(id).copied()
    }

    pub fn posted(&self) -> Vec<Value> {
        self.state().posted.clone()
    }
}

#[async_trait]
impl Page for FixturePage {
    async fn url(&self) -> Result<String> {
        let mut state = self.state();
        state.url_reads += 1;
        if state.url_reads <= state.failing_url_reads {
            return Err(anyhow!("target closed"));
        }
        let due = state
            .pending_navigation
            .as_ref()
            .is_some_and(|(after, _)| state.url_reads > *after);
        if due {
            if let Some((_, url)) = state.pending_navigation.take() {
                state.url = url;
            }
        }
        Ok(state.url.clone())
    }

    async fn load_id(&self) -> Result<String> {
        Ok(format!("load-{}", self.state().loads))
    }

    async fn scan(&self) -> Result<Vec<ElementSnapshot>> {
        {
            let mut state = self.state();
            state.scans += 1;
            state.first_scan_at.get_or_insert_with(Instant::now);
            let due = state
                .late_render
                .as_ref()
                .is_some_and(|(after, _)| state.scans > *after);
            if due {
                if let Some((_, html)) = state.late_render.take() {
                    state.elements = parse(&html);
                }
            }
        }
        Ok(self.snapshots())
    }

    async fn set_control_value(&self, id: &ElementId, value: &str) -> Result<()> {
        let mut state = self.state();
        state.index_of(id)?;
        state.values.insert(id.clone(), value.to_string());
        state.events.push((id.clone(), "input"));
        Ok(())
    }

    async fn click(&self, id: &ElementId) -> Result<()> {
        let mut state = self.state();
        let index = state.index_of(id)?;
        state.clicks.push(id.clone());
        let snapshot = &mut state.elements[index].snapshot;
        if snapshot.role.as_deref() == Some("checkbox") {
            let next = if snapshot.is_checked() { "false" } else { "true" };
            snapshot.aria_checked = Some(next.to_string());
        }
        Ok(())
    }

    async fn highlight(&self, id: &ElementId) -> Result<()> {
        let mut state = self.state();
        state.index_of(id)?;
        state.highlighted.push(id.clone());
        Ok(())
    }

    async fn center_of(&self, id: &ElementId) -> Result<Point> {
        self.state().index_of(id)?;
        Ok(self.center(id))
    }

    async fn dispatch_pointer_sequence(&self, id: &ElementId, at: Point) -> Result<()> {
        let mut state = self.state();
        state.index_of(id)?;
        for kind in ["mousedown", "mouseup", "click"] {
            state.events.push((id.clone(), kind));
        }
        state.pointers.insert(id.clone(), at);
        if let Some(url) = state.navigate_on_click.take() {
            state.url = url;
        }
        Ok(())
    }

    async fn post_message(&self, payload: &Value) -> Result<()> {
        self.state().posted.push(payload.clone());
        Ok(())
    }
}

/// Same candidates and fields the in-browser scan script reports.
fn parse(html: &str) -> Vec<FixtureElement> {
    let document = Html::parse_document(html);
    let selector = Selector::parse(CANDIDATE_SELECTOR).unwrap();
    let candidates: Vec<ElementRef> = document.select(&selector).collect();
    let eid_of = |el: ElementRef| {
        candidates
            .iter()
            .position(|c| c.id() == el.id())
            .map(|index| index.to_string())
    };

    candidates
        .iter()
        .enumerate()
        .map(|(index, el)| {
            let attr = |name: &str| el.value().attr(name).map(String::from);
            let clickable = self_and_ancestors(*el).find(|e| is_clickable(*e));
            FixtureElement {
                snapshot: ElementSnapshot {
                    eid: index.to_string(),
                    tag: el.value().name().to_string(),
                    role: attr("role"),
                    input_type: attr("type"),
                    text: el.text().collect(),
                    label_text: label_text(*el),
                    aria_checked: attr("aria-checked"),
                    clickable_eid: clickable.and_then(eid_of),
                },
                html_id: attr("id"),
            }
        })
        .collect()
}

fn self_and_ancestors(el: ElementRef<'_>) -> impl Iterator<Item = ElementRef<'_>> {
    std::iter::once(el).chain(el.ancestors().filter_map(ElementRef::wrap))
}

fn is_clickable(el: ElementRef) -> bool {
    el.value().name() == "button" || el.value().attr("role") == Some("button")
}

fn label_text(el: ElementRef) -> String {
    let container = self_and_ancestors(el)
        .find(|e| e.value().name() == "label")
        .or_else(|| el.parent().and_then(ElementRef::wrap))
        .unwrap_or(el);
    container.text().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_candidates_like_the_page_script() {
        let page = FixturePage::from_html(
            "https://x",
            r#"
            <p>intro</p>
            <label id="l"><div role="checkbox" aria-checked="false" id="cb"></div>記録</label>
            <div role="button" id="b"><span id="s">送信</span></div>
            <input type="text" id="t">
            "#,
        );
        let snapshots = page.snapshots();
        let ids: Vec<_> = snapshots
            .iter()
            .map(|s| page.html_id(&s.id()).unwrap())
            .collect();
        assert_eq!(ids, ["cb", "b", "s", "t"]);

        let span = &snapshots[2];
        assert_eq!(span.clickable_eid.as_deref(), Some(snapshots[1].eid.as_str()));
        assert_eq!(snapshots[0].label_text, "記録");
        assert!(!snapshots[0].is_checked());
        assert_eq!(snapshots[3].input_type.as_deref(), Some("text"));
        assert_eq!(snapshots[3].clickable_eid, None);
    }
}
