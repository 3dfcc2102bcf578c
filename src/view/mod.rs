//! Host view: the report and chart regions, driven by `RequestState`.
//!
//! Both regions always mirror the same state. Only `Success` renders
//! fragments; every other state clears whatever was rendered before.

use crate::dom::{Document, ScriptHost};
use crate::orchestrator::RequestState;
use crate::render::{append_placeholder, FragmentRenderer, RegionPolicies, Regions, RenderOutcome, RenderedFragment};

pub const IDLE_PROMPT: &str = "Ask a data question to get started.";
pub const IDLE_CHARTS: &str = "Charts will appear here.";
pub const PROGRESS_MESSAGE: &str = "Running the pipeline...";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewStatus {
    Placeholder,
    Progress,
    Rendered,
    Failed(String),
}

/// Text view of one rendered figure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChartSummary {
    pub label: String,
    pub text: String,
    pub scripts: usize,
}

#[derive(Debug)]
pub struct HostView<H> {
    doc: Document<H>,
    regions: Regions,
    renderer: FragmentRenderer,
    fragments: Vec<RenderedFragment>,
    outcome: RenderOutcome,
    status: ViewStatus,
    sql_query: Option<String>,
    reformulated_intent: Option<String>,
}

impl<H: ScriptHost> HostView<H> {
    pub fn new(host: H, policies: RegionPolicies) -> Self {
        let mut doc = Document::new(host);
        let regions = mount_regions(&mut doc);

        let mut view = Self {
            doc,
            regions,
            renderer: FragmentRenderer::new(policies),
            fragments: Vec::new(),
            outcome: RenderOutcome::default(),
            status: ViewStatus::Placeholder,
            sql_query: None,
            reformulated_intent: None,
        };
        view.sync(&RequestState::Idle);
        view
    }

    /// Rebuild both regions for `state`. Called once per transition.
    pub fn sync(&mut self, state: &RequestState) {
        // Nothing from the previous state survives, so start from a fresh arena.
        self.doc.reset();
        self.regions = mount_regions(&mut self.doc);
        self.fragments.clear();
        self.outcome = RenderOutcome::default();
        self.sql_query = None;
        self.reformulated_intent = None;
        match state {
            RequestState::Idle => {
                self.fill(IDLE_PROMPT, IDLE_CHARTS, "placeholder");
                self.status = ViewStatus::Placeholder;
            }
            RequestState::Loading => {
                self.fill(PROGRESS_MESSAGE, PROGRESS_MESSAGE, "progress");
                self.status = ViewStatus::Progress;
            }
            RequestState::Success(response) => {
                self.fragments = RenderedFragment::from_charts(&response.chart_html_list);
                self.outcome = self.renderer.render(&mut self.doc, self.regions, response);
                self.sql_query = response.sql_query.clone();
                self.reformulated_intent = response.reformulated_intent.clone();
                self.status = ViewStatus::Rendered;
            }
            RequestState::Error(message) => {
                self.fill(message, message, "error");
                self.status = ViewStatus::Failed(message.clone());
            }
        }
    }

    pub fn status(&self) -> &ViewStatus {
        &self.status
    }

    /// The message both regions show after a failed call.
    pub fn error_message(&self) -> Option<&str> {
        match &self.status {
            ViewStatus::Failed(message) => Some(message),
            _ => None,
        }
    }

    pub fn document(&self) -> &Document<H> {
        &self.doc
    }

    pub fn document_mut(&mut self) -> &mut Document<H> {
        &mut self.doc
    }

    pub fn regions(&self) -> Regions {
        self.regions
    }

    pub fn fragments(&self) -> &[RenderedFragment] {
        &self.fragments
    }

    pub fn sql_query(&self) -> Option<&str> {
        self.sql_query.as_deref()
    }

    /// How the pipeline restated the question before querying.
    pub fn reformulated_intent(&self) -> Option<&str> {
        self.reformulated_intent.as_deref()
    }

    pub fn scripts_replaced(&self) -> usize {
        self.outcome.scripts_replaced
    }

    pub fn report_text(&self) -> String {
        normalize_whitespace(&self.doc.text_content(self.regions.report))
    }

    pub fn report_markdown(&self) -> String {
        self.doc.to_markdown(self.regions.report)
    }

    pub fn charts_text(&self) -> String {
        normalize_whitespace(&self.doc.text_content(self.regions.charts))
    }

    pub fn chart_summaries(&self) -> Vec<ChartSummary> {
        self.fragments
            .iter()
            .zip(&self.outcome.chart_surfaces)
            .map(|(fragment, surface)| ChartSummary {
                label: fragment.label(),
                text: normalize_whitespace(&self.doc.text_content(*surface)),
                scripts: self.doc.elements_by_tag(*surface, "script").len(),
            })
            .collect()
    }

    fn fill(&mut self, report_message: &str, charts_message: &str, class: &str) {
        for (region, message) in [(self.regions.report, report_message), (self.regions.charts, charts_message)] {
            self.doc.remove_children(region);
            append_placeholder(&mut self.doc, region, message);
            if let Some(p) = self.doc.children(region).first().copied() {
                self.doc.set_attribute(p, "class", class);
            }
        }
    }
}

fn mount_regions<H: ScriptHost>(doc: &mut Document<H>) -> Regions {
    let root = doc.root();
    let main = doc.create_element("main");
    let report = doc.create_element("section");
    doc.set_attribute(report, "id", "report");
    let charts = doc.create_element("section");
    doc.set_attribute(charts, "id", "charts");
    doc.append_child(main, report);
    doc.append_child(main, charts);
    doc.append_child(root, main);
    Regions { report, charts }
}

fn normalize_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}
