use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use tokio::sync::{mpsc, oneshot};

use khawarizmi::dom::{Script, ScriptHost, ScriptLog, ScriptOrigin};
use khawarizmi::error::{PipelineError, ValidationError, PIPELINE_FAILURE_MESSAGE};
use khawarizmi::orchestrator::{Orchestrator, RequestState, Resolution};
use khawarizmi::pipeline::{Pipeline, PipelineRequest, PipelineResponse};
use khawarizmi::query::Query;
use khawarizmi::render::RegionPolicies;
use khawarizmi::tui::app::App;
use khawarizmi::view::{HostView, ViewStatus};

type Reply = Result<PipelineResponse, PipelineError>;

/// Pipeline whose answers are released by the test, keyed by query text.
#[derive(Default)]
struct ScriptedPipeline {
    pending: Mutex<HashMap<String, oneshot::Receiver<Reply>>>,
    requests: Mutex<Vec<PipelineRequest>>,
}

impl ScriptedPipeline {
    fn expect(&self, query: &str) -> oneshot::Sender<Reply> {
        let (tx, rx) = oneshot::channel();
        self.pending.lock().unwrap().insert(query.to_string(), rx);
        tx
    }

    fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

impl Pipeline for ScriptedPipeline {
    async fn run(&self, request: &PipelineRequest) -> Reply {
        let pending = {
            self.requests.lock().unwrap().push(request.clone());
            self.pending.lock().unwrap().remove(&request.query)
        };
        match pending {
            Some(rx) => rx
                .await
                .unwrap_or_else(|_| Err(PipelineError::Transport("reply dropped".into()))),
            None => Err(PipelineError::Transport(format!("unexpected query {:?}", request.query))),
        }
    }
}

/// Script host that understands `window.<name>=<value>` statements, one
/// global object per origin.
#[derive(Debug, Default)]
struct MiniWindow {
    host: HashMap<String, String>,
    sandboxed: HashMap<String, String>,
}

impl ScriptHost for MiniWindow {
    fn execute(&mut self, script: &Script) {
        let globals = match script.origin {
            ScriptOrigin::Host => &mut self.host,
            ScriptOrigin::Opaque => &mut self.sandboxed,
        };
        for statement in script.text.split(';') {
            if let Some((lhs, rhs)) = statement.trim().split_once('=') {
                if let Some(name) = lhs.trim().strip_prefix("window.") {
                    globals.insert(name.to_string(), rhs.trim().to_string());
                }
            }
        }
    }
}

fn ok(report: &str, charts: &[&str]) -> Reply {
    Ok(PipelineResponse {
        report_html: report.to_string(),
        chart_html_list: charts.iter().map(|c| c.to_string()).collect(),
        sql_query: None,
        reformulated_intent: None,
    })
}

fn query(text: &str) -> Query {
    Query::parse(text).unwrap()
}

#[tokio::test]
async fn successful_query_renders_report_and_runs_chart_script() {
    let pipeline = Arc::new(ScriptedPipeline::default());
    let reply = pipeline.expect("show me sales by region");
    let mut orch = Orchestrator::new("gpt-4o-mini");
    let mut state_rx = orch.subscribe();
    let mut view = HostView::new(MiniWindow::default(), RegionPolicies::default());
    let (tx, mut rx) = mpsc::unbounded_channel();

    orch.submit(query("show me sales by region"), pipeline.clone(), tx);
    view.sync(&state_rx.borrow_and_update().clone());
    assert_eq!(view.status(), &ViewStatus::Progress);

    reply.send(ok("<div>ok</div>", &["<script>window.x=1</script>"])).unwrap();
    orch.resolve(rx.recv().await.unwrap()).unwrap();
    let state = state_rx.borrow_and_update().clone();
    assert!(matches!(state, RequestState::Success(_)));
    view.sync(&state);

    assert_eq!(view.report_text(), "ok");
    let charts = view.chart_summaries();
    assert_eq!(charts.len(), 1);
    assert_eq!(charts[0].label, "Figure 1");

    let window = view.document().host();
    assert_eq!(window.sandboxed.get("x").map(String::as_str), Some("1"));
    assert!(window.host.get("x").is_none(), "chart script must not reach the host window");

    let requests = pipeline.requests.lock().unwrap();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].model_id, "gpt-4o-mini");
}

#[tokio::test]
async fn network_error_clears_previous_charts_in_both_regions() {
    let pipeline = Arc::new(ScriptedPipeline::default());
    let first = pipeline.expect("revenue by month");
    let second = pipeline.expect("revenue by week");
    let mut orch = Orchestrator::new("m");
    let mut state_rx = orch.subscribe();
    let mut view = HostView::new(ScriptLog::default(), RegionPolicies::default());
    let (tx, mut rx) = mpsc::unbounded_channel();

    orch.submit(query("revenue by month"), pipeline.clone(), tx.clone());
    first.send(ok("<p>monthly</p>", &["<p>jan</p>", "<p>feb</p>"])).unwrap();
    orch.resolve(rx.recv().await.unwrap()).unwrap();
    view.sync(&state_rx.borrow_and_update().clone());
    assert_eq!(view.chart_summaries().len(), 2);

    orch.submit(query("revenue by week"), pipeline.clone(), tx);
    view.sync(&state_rx.borrow_and_update().clone());
    assert!(view.chart_summaries().is_empty(), "loading must not show stale charts");

    second.send(Err(PipelineError::Transport("connection reset".into()))).unwrap();
    orch.resolve(rx.recv().await.unwrap()).unwrap();
    let state = state_rx.borrow_and_update().clone();
    assert_eq!(state, RequestState::Error(PIPELINE_FAILURE_MESSAGE.to_string()));
    view.sync(&state);

    assert_eq!(view.report_text(), PIPELINE_FAILURE_MESSAGE);
    assert_eq!(view.charts_text(), PIPELINE_FAILURE_MESSAGE);
    assert!(view.chart_summaries().is_empty());
    assert!(view.document().elements_by_tag(view.regions().charts, "figure").is_empty());
}

#[tokio::test]
async fn whitespace_query_never_reaches_the_pipeline() {
    let pipeline = Arc::new(ScriptedPipeline::default());
    let mut orch = Orchestrator::new("m");
    let (tx, _rx) = mpsc::unbounded_channel();
    let mut app = App::new("m".into(), "http://pipeline".into(), PathBuf::from("out.html"), RegionPolicies::default());

    for c in "   ".chars() {
        app.insert_char(c);
    }
    match app.take_query() {
        Ok(q) => {
            orch.submit(q, pipeline.clone(), tx);
        }
        Err(err) => assert_eq!(err, ValidationError::EmptyQuery),
    }

    assert!(app.is_rejecting(std::time::Instant::now()));
    assert_eq!(orch.state(), RequestState::Idle);
    assert_eq!(orch.generation().get(), 0);
    assert_eq!(pipeline.request_count(), 0);
}

#[tokio::test]
async fn earlier_submission_resolving_last_is_discarded() {
    let pipeline = Arc::new(ScriptedPipeline::default());
    let reply_a = pipeline.expect("a");
    let reply_b = pipeline.expect("b");
    let mut orch = Orchestrator::new("m");
    let (tx, mut rx) = mpsc::unbounded_channel::<Resolution>();

    let gen_a = orch.submit(query("a"), pipeline.clone(), tx.clone());
    let gen_b = orch.submit(query("b"), pipeline.clone(), tx);
    assert!(gen_b > gen_a);

    reply_b.send(ok("<p>B</p>", &["<p>b1</p>"])).unwrap();
    let resolved_b = rx.recv().await.unwrap();
    assert_eq!(resolved_b.generation, gen_b);
    orch.resolve(resolved_b).unwrap();

    reply_a.send(ok("<p>A</p>", &["<p>a1</p>", "<p>a2</p>"])).unwrap();
    let resolved_a = rx.recv().await.unwrap();
    assert_eq!(resolved_a.generation, gen_a);
    assert!(orch.resolve(resolved_a).is_err());

    assert_eq!(orch.state(), ok("<p>B</p>", &["<p>b1</p>"]).map(RequestState::Success).unwrap());
}

#[tokio::test]
async fn chart_count_and_labels_follow_response_order() {
    let charts = ["<p>q1</p>", "<p>q2</p>", "<p>q3</p>", "<p>q4</p>"];
    let pipeline = Arc::new(ScriptedPipeline::default());
    let reply = pipeline.expect("quarterly totals");
    let mut orch = Orchestrator::new("m");
    let mut view = HostView::new(ScriptLog::default(), RegionPolicies::default());
    let (tx, mut rx) = mpsc::unbounded_channel();

    orch.submit(query("quarterly totals"), pipeline, tx);
    reply.send(ok("", &charts)).unwrap();
    orch.resolve(rx.recv().await.unwrap()).unwrap();
    view.sync(&orch.state());

    let summaries = view.chart_summaries();
    assert_eq!(summaries.len(), charts.len());
    for (i, summary) in summaries.iter().enumerate() {
        assert_eq!(summary.label, format!("Figure {}", i + 1));
        assert_eq!(summary.text, format!("q{}", i + 1));
    }
}
