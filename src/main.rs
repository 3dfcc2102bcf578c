mod cli;

use std::io::{self, Read};
use std::sync::Arc;

use anyhow::{anyhow, bail, Result};
use is_terminal::IsTerminal;
use owo_colors::OwoColorize;
use tokio::sync::mpsc;

use khawarizmi::{
    config::Config,
    dom::ScriptLog,
    export,
    orchestrator::{Orchestrator, RequestState},
    pipeline::{HttpPipeline, WireSchema},
    printer::{self, TextPrinter},
    query::Query,
    render::RegionPolicies,
    telemetry,
    tui::{self, TuiOptions},
    view::HostView,
};

#[tokio::main]
async fn main() -> Result<()> {
    let args = cli::Cli::parse();
    let cfg = Config::load();

    // CLI overrides config
    let model = args.model.clone().unwrap_or_else(|| cfg.default_model());
    let endpoint = args.endpoint.clone().unwrap_or_else(|| cfg.pipeline_url());
    let schema = match args.schema.as_deref() {
        Some(s) => s.parse::<WireSchema>().map_err(|e| anyhow!(e))?,
        None => cfg.wire_schema(),
    };
    let pipeline = HttpPipeline::new(endpoint.clone(), schema, cfg.request_timeout())?;

    // Question: positional, else piped stdin
    let mut question = args.question.clone();
    if question.is_none() && !io::stdin().is_terminal() {
        let mut buf = String::new();
        io::stdin().read_to_string(&mut buf)?;
        question = Some(buf);
    }

    if args.tui || (question.is_none() && io::stdout().is_terminal()) {
        telemetry::init("off");
        let opts = TuiOptions {
            model,
            endpoint,
            export_path: args.out.clone().unwrap_or_else(|| cfg.export_path()),
            initial_query: question,
        };
        return tui::run_tui(pipeline, opts).await;
    }

    telemetry::init("warn");
    let Some(raw) = question else {
        bail!("Provide a question as an argument, pipe one on stdin, or use --tui");
    };
    let query = match Query::parse(&raw) {
        Ok(q) => q,
        Err(_) => {
            TextPrinter { color: Some("yellow") }.print("Nothing to ask: the question is empty.");
            std::process::exit(2);
        }
    };

    let markdown = if args.no_md {
        false
    } else if args.md {
        true
    } else {
        cfg.get_bool("PRETTIFY_MARKDOWN")
    };
    let accent = cfg.get("DEFAULT_COLOR").as_deref().and_then(printer::color_name);

    let mut orchestrator = Orchestrator::new(model);
    let mut state_rx = orchestrator.subscribe();
    let mut view = HostView::new(ScriptLog::default(), RegionPolicies::default());
    let (result_tx, mut result_rx) = mpsc::unbounded_channel();
    let query_text = query.to_string();

    orchestrator.submit(query, Arc::new(pipeline), result_tx);
    view.sync(&state_rx.borrow_and_update().clone());
    eprintln!("{} {}", "Running the pipeline for:".dimmed(), query_text);

    let resolution = result_rx
        .recv()
        .await
        .ok_or_else(|| anyhow!("pipeline task ended without a result"))?;
    // Only one submission is in flight here, so the resolution is never stale.
    let _ = orchestrator.resolve(resolution);
    let state = state_rx.borrow_and_update().clone();
    view.sync(&state);

    printer::print_view(&view, markdown, accent);

    if let Some(out) = args.out.as_deref() {
        export::write_page(out, &export::page(&view, Some(&query_text)))?;
        println!("\n{} {}", "Page written to".dimmed(), out.display());
    }

    if matches!(state, RequestState::Error(_)) {
        std::process::exit(1);
    }
    Ok(())
}
