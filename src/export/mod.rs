//! Standalone HTML export of the host view.
//!
//! Surfaces are written as `<iframe sandbox=… srcdoc=…>`, so a browser parses
//! each fragment as its own document and runs its scripts under the same
//! sandbox the in-process view used.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};

use crate::dom::{ScriptHost, SerializeOptions};
use crate::view::HostView;

const STYLE: &str = "body{font-family:system-ui,sans-serif;margin:2rem;background:#0f172a;color:#f8fafc}\
main{display:flex;gap:1.5rem;flex-wrap:wrap}\
#report{flex:2;min-width:320px}\
#charts{flex:2;min-width:320px;display:flex;flex-direction:column;gap:1.5rem}\
iframe.surface{width:100%;min-height:480px;border:0;border-radius:6px;background:#fff}\
figure{margin:0}\
figcaption{font-weight:600;margin-bottom:.5rem}\
.error{color:#f87171}\
.placeholder,.progress{color:#cbd5e1}";

pub fn page<H: ScriptHost>(view: &HostView<H>, query: Option<&str>) -> String {
    let doc = view.document();
    let opts = SerializeOptions { surfaces_as_srcdoc: true };
    let body: String = doc
        .children(doc.root())
        .iter()
        .map(|child| doc.outer_html(*child, opts))
        .collect();

    let mut out = String::from("<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n");
    out.push_str("<title>Khawarizmi</title>\n<style>");
    out.push_str(STYLE);
    out.push_str("</style>\n</head>\n<body>\n<header><h1>Khawarizmi</h1>");
    if let Some(q) = query {
        out.push_str("<p class=\"query\">");
        out.push_str(&escape(q));
        out.push_str("</p>");
    }
    out.push_str("</header>\n");
    out.push_str(&body);
    out.push_str("\n</body>\n</html>\n");
    out
}

pub fn write_page(path: &Path, html: &str) -> Result<()> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        fs::create_dir_all(dir).with_context(|| format!("failed to create {}", dir.display()))?;
    }
    fs::write(path, html).with_context(|| format!("failed to write {}", path.display()))?;
    tracing::info!(path = %path.display(), bytes = html.len(), "exported page");
    Ok(())
}

fn escape(s: &str) -> String {
    s.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::ScriptLog;
    use crate::orchestrator::RequestState;
    use crate::pipeline::PipelineResponse;
    use crate::render::RegionPolicies;

    fn rendered() -> HostView<ScriptLog> {
        let mut view = HostView::new(ScriptLog::default(), RegionPolicies::default());
        view.sync(&RequestState::Success(PipelineResponse {
            report_html: "<h1>Report</h1>".into(),
            chart_html_list: vec!["<div id=\"c\"></div><script>Plotly.newPlot(\"c\", [])</script>".into()],
            sql_query: None,
            reformulated_intent: None,
        }));
        view
    }

    #[test]
    fn surfaces_become_sandboxed_srcdoc_frames() {
        let html = page(&rendered(), Some("sales <by> region"));
        assert!(html.starts_with("<!DOCTYPE html>"));
        assert!(html.contains("<p class=\"query\">sales &lt;by&gt; region</p>"));
        assert!(html.contains(
            "sandbox=\"allow-scripts allow-same-origin\" srcdoc=\"&lt;h1&gt;Report&lt;/h1&gt;\"></iframe>"
        ));
        assert!(html.contains("sandbox=\"allow-scripts\" srcdoc=\"&lt;div id=&quot;c&quot;&gt;&lt;/div&gt;&lt;script"));
        assert!(html.contains("<figcaption>Figure 1</figcaption>"));
        assert!(!html.contains("<script>Plotly"), "fragment scripts must only live inside srcdoc");
    }

    #[test]
    fn write_page_creates_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("report.html");
        write_page(&path, "<html></html>").unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "<html></html>");
    }
}
