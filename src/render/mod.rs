//! Fragment rendering: isolated surfaces plus the script re-execution pass.
//!
//! Markup injection leaves every `<script>` inert. After a render pass has
//! committed its markup, each injected script is swapped for a freshly built
//! element with the same attributes and body; the document runs the new
//! element as it is connected. Replacements are flagged on the node and
//! skipped by later passes, so a second pass over an unchanged subtree runs
//! nothing. They also carry a `data-reexecuted` attribute for readers of the
//! exported page; the pass never trusts that attribute, since fragments can
//! carry it too.

mod policy;

use crate::dom::{Document, NodeId, ScriptHost};
use crate::pipeline::PipelineResponse;

pub use policy::{IsolationPolicy, RegionPolicies};

pub const REEXECUTED_ATTR: &str = "data-reexecuted";

pub const NO_REPORT_PLACEHOLDER: &str = "No report was returned for this question.";
pub const NO_CHARTS_PLACEHOLDER: &str = "No charts were returned for this question.";

/// One fragment keyed by its position in the response. Identical HTML at two
/// positions is still two fragments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedFragment {
    pub position: usize,
    pub html: String,
}

impl RenderedFragment {
    pub fn from_charts(charts: &[String]) -> Vec<RenderedFragment> {
        charts
            .iter()
            .enumerate()
            .map(|(position, html)| RenderedFragment { position, html: html.clone() })
            .collect()
    }

    /// "Figure i", 1-based.
    pub fn label(&self) -> String {
        format!("Figure {}", self.position + 1)
    }
}

/// Replace every not-yet-replaced script below `root` with a fresh copy.
/// Returns how many scripts were replaced.
pub fn reexecute_scripts<H: ScriptHost>(doc: &mut Document<H>, root: NodeId) -> usize {
    // Collected up front: replacements made below are never revisited.
    let originals: Vec<NodeId> = doc
        .elements_by_tag(root, "script")
        .into_iter()
        .filter(|script| !doc.is_reexecuted(*script))
        .collect();

    for old in &originals {
        let fresh = doc.create_element("script");
        for (name, value) in doc.attributes(*old).to_vec() {
            doc.set_attribute(fresh, &name, &value);
        }
        doc.set_attribute(fresh, REEXECUTED_ATTR, "");
        doc.mark_reexecuted(fresh);
        let body = doc.child_text(*old);
        if !body.is_empty() {
            let text = doc.create_text(&body);
            doc.append_child(fresh, text);
        }
        doc.replace_with(*old, fresh);
    }
    originals.len()
}

/// Where rendered content goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Regions {
    pub report: NodeId,
    pub charts: NodeId,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RenderOutcome {
    pub report_surface: Option<NodeId>,
    pub chart_surfaces: Vec<NodeId>,
    pub scripts_replaced: usize,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct FragmentRenderer {
    policies: RegionPolicies,
}

impl FragmentRenderer {
    pub fn new(policies: RegionPolicies) -> Self {
        Self { policies }
    }

    pub fn policies(&self) -> RegionPolicies {
        self.policies
    }

    /// One render pass: commit the report and every chart into fresh
    /// surfaces, then re-execute scripts, report region first.
    pub fn render<H: ScriptHost>(
        &self,
        doc: &mut Document<H>,
        regions: Regions,
        response: &PipelineResponse,
    ) -> RenderOutcome {
        doc.remove_children(regions.report);
        doc.remove_children(regions.charts);
        let mut outcome = RenderOutcome::default();

        if response.has_report() {
            let surface = mount_surface(doc, regions.report, self.policies.report, "Report");
            doc.set_inner_html(surface, &response.report_html);
            outcome.report_surface = Some(surface);
        } else {
            append_placeholder(doc, regions.report, NO_REPORT_PLACEHOLDER);
        }

        let fragments = RenderedFragment::from_charts(&response.chart_html_list);
        if fragments.is_empty() {
            append_placeholder(doc, regions.charts, NO_CHARTS_PLACEHOLDER);
        }
        for fragment in &fragments {
            let label = fragment.label();
            let figure = doc.create_element("figure");
            doc.set_attribute(figure, "data-position", &fragment.position.to_string());
            let caption = doc.create_element("figcaption");
            let caption_text = doc.create_text(&label);
            doc.append_child(caption, caption_text);
            doc.append_child(figure, caption);
            doc.append_child(regions.charts, figure);

            let surface = mount_surface(doc, figure, self.policies.chart, &label);
            doc.set_inner_html(surface, &fragment.html);
            outcome.chart_surfaces.push(surface);
        }

        outcome.scripts_replaced = reexecute_scripts(doc, regions.report) + reexecute_scripts(doc, regions.charts);
        tracing::debug!(
            charts = fragments.len(),
            scripts = outcome.scripts_replaced,
            "render pass complete"
        );
        outcome
    }
}

fn mount_surface<H: ScriptHost>(doc: &mut Document<H>, parent: NodeId, policy: IsolationPolicy, title: &str) -> NodeId {
    let surface = doc.create_element("iframe");
    doc.set_attribute(surface, "class", "surface");
    doc.set_attribute(surface, "title", title);
    doc.set_attribute(surface, "sandbox", &policy.sandbox_tokens());
    doc.append_child(parent, surface);
    surface
}

pub(crate) fn append_placeholder<H: ScriptHost>(doc: &mut Document<H>, parent: NodeId, message: &str) {
    let p = doc.create_element("p");
    doc.set_attribute(p, "class", "placeholder");
    let text = doc.create_text(message);
    doc.append_child(p, text);
    doc.append_child(parent, p);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::{ScriptLog, ScriptOrigin};

    fn setup() -> (Document<ScriptLog>, Regions) {
        let mut doc = Document::new(ScriptLog::default());
        let root = doc.root();
        let report = doc.create_element("section");
        let charts = doc.create_element("section");
        doc.append_child(root, report);
        doc.append_child(root, charts);
        (doc, Regions { report, charts })
    }

    fn response(report: &str, charts: &[&str]) -> PipelineResponse {
        PipelineResponse {
            report_html: report.to_string(),
            chart_html_list: charts.iter().map(|c| c.to_string()).collect(),
            sql_query: None,
            reformulated_intent: None,
        }
    }

    #[test]
    fn pass_replaces_each_script_and_runs_it_once() {
        let (mut doc, regions) = setup();
        doc.set_inner_html(regions.charts, "<script>a()</script><div><script src=\"lib.js\" defer></script></div>");
        assert!(doc.host().executed().is_empty());

        assert_eq!(reexecute_scripts(&mut doc, regions.charts), 2);
        let executed = doc.host().executed();
        assert_eq!(executed.len(), 2);
        assert_eq!(executed[0].text, "a()");
        assert_eq!(executed[1].src.as_deref(), Some("lib.js"));
        assert!(executed[1].attributes.iter().any(|(k, _)| k == "defer"));
    }

    #[test]
    fn second_pass_is_a_no_op() {
        let (mut doc, regions) = setup();
        doc.set_inner_html(regions.report, "<script>once()</script>");
        reexecute_scripts(&mut doc, regions.report);
        assert_eq!(reexecute_scripts(&mut doc, regions.report), 0);
        assert_eq!(doc.host().executed().len(), 1);
    }

    #[test]
    fn marker_attribute_in_markup_does_not_skip_the_script() {
        let (mut doc, regions) = setup();
        doc.set_inner_html(regions.charts, "<script data-reexecuted>window.x=1</script>");

        assert_eq!(reexecute_scripts(&mut doc, regions.charts), 1);
        assert_eq!(doc.host().executed().len(), 1);
        assert_eq!(doc.host().executed()[0].text, "window.x=1");

        assert_eq!(reexecute_scripts(&mut doc, regions.charts), 0);
        assert_eq!(doc.host().executed().len(), 1);
    }

    #[test]
    fn reinserted_content_runs_again() {
        let (mut doc, regions) = setup();
        doc.set_inner_html(regions.report, "<script>r()</script>");
        reexecute_scripts(&mut doc, regions.report);
        doc.set_inner_html(regions.report, "<script>r()</script>");
        reexecute_scripts(&mut doc, regions.report);
        assert_eq!(doc.host().executed().len(), 2);
    }

    #[test]
    fn scripts_run_report_first_then_charts_in_order() {
        let (mut doc, regions) = setup();
        let out = FragmentRenderer::default().render(
            &mut doc,
            regions,
            &response("<script>report()</script>", &["<script>c1()</script>", "<script>c2()</script>"]),
        );
        assert_eq!(out.scripts_replaced, 3);
        let order: Vec<&str> = doc.host().executed().iter().map(|s| s.text.as_str()).collect();
        assert_eq!(order, vec!["report()", "c1()", "c2()"]);
    }

    #[test]
    fn report_runs_same_origin_and_charts_run_opaque() {
        let (mut doc, regions) = setup();
        FragmentRenderer::default().render(&mut doc, regions, &response("<script>r()</script>", &["<script>c()</script>"]));
        let executed = doc.host().executed();
        assert_eq!(executed[0].origin, ScriptOrigin::Host);
        assert_eq!(executed[1].origin, ScriptOrigin::Opaque);
    }

    #[test]
    fn figures_are_labelled_by_position() {
        let (mut doc, regions) = setup();
        let out = FragmentRenderer::default().render(&mut doc, regions, &response("", &["<p>x</p>", "<p>x</p>", "<p>y</p>"]));
        assert_eq!(out.chart_surfaces.len(), 3);
        let captions: Vec<String> = doc
            .elements_by_tag(regions.charts, "figcaption")
            .into_iter()
            .map(|c| doc.text_content(c))
            .collect();
        assert_eq!(captions, vec!["Figure 1", "Figure 2", "Figure 3"]);
    }

    #[test]
    fn absent_report_and_charts_render_placeholders() {
        let (mut doc, regions) = setup();
        let out = FragmentRenderer::default().render(&mut doc, regions, &response("  ", &[]));
        assert_eq!(out.report_surface, None);
        assert!(out.chart_surfaces.is_empty());
        assert_eq!(doc.text_content(regions.report), NO_REPORT_PLACEHOLDER);
        assert_eq!(doc.text_content(regions.charts), NO_CHARTS_PLACEHOLDER);
    }

    #[test]
    fn rerender_discards_previous_surfaces() {
        let (mut doc, regions) = setup();
        let renderer = FragmentRenderer::default();
        renderer.render(&mut doc, regions, &response("<p>old</p>", &["<p>1</p>", "<p>2</p>"]));
        renderer.render(&mut doc, regions, &response("<p>new</p>", &["<p>3</p>"]));
        assert_eq!(doc.elements_by_tag(regions.charts, "figure").len(), 1);
        assert_eq!(doc.text_content(regions.report), "new");
    }

    #[test]
    fn locked_chart_policy_blocks_chart_scripts() {
        let (mut doc, regions) = setup();
        let renderer = FragmentRenderer::new(RegionPolicies {
            report: IsolationPolicy::REPORT,
            chart: IsolationPolicy { allow_scripts: false, allow_same_origin: false },
        });
        renderer.render(&mut doc, regions, &response("", &["<script>c()</script>"]));
        assert!(doc.host().executed().is_empty());
    }
}
