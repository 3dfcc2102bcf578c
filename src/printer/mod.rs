//! Printers: text, markdown (termimad) and the one-shot result summary.

use owo_colors::OwoColorize;
use termimad::MadSkin;

use crate::dom::ScriptHost;
use crate::view::{HostView, ViewStatus};

pub struct TextPrinter {
    pub color: Option<&'static str>,
}

impl TextPrinter {
    pub fn print(&self, text: &str) {
        if let Some(c) = self.color {
            match c {
                "green" => println!("{}", text.green()),
                "cyan" => println!("{}", text.cyan()),
                "magenta" => println!("{}", text.magenta()),
                "yellow" => println!("{}", text.yellow()),
                "red" => println!("{}", text.red()),
                _ => println!("{}", text),
            }
        } else {
            println!("{}", text);
        }
    }
}

/// Maps a configured color name onto the palette `TextPrinter` knows.
pub fn color_name(name: &str) -> Option<&'static str> {
    match name.to_ascii_lowercase().as_str() {
        "green" => Some("green"),
        "cyan" => Some("cyan"),
        "magenta" => Some("magenta"),
        "yellow" => Some("yellow"),
        "red" => Some("red"),
        _ => None,
    }
}

pub struct MarkdownPrinter {
    pub skin: MadSkin,
}

impl Default for MarkdownPrinter {
    fn default() -> Self {
        Self { skin: MadSkin::default() }
    }
}

impl MarkdownPrinter {
    pub fn print(&self, text: &str) {
        self.skin.print_text(text);
        println!();
    }
}

/// Print the host view after a one-shot query.
pub fn print_view<H: ScriptHost>(view: &HostView<H>, markdown: bool, accent: Option<&'static str>) {
    let heading = TextPrinter { color: accent };
    match view.status() {
        ViewStatus::Failed(message) => {
            TextPrinter { color: Some("red") }.print(message);
        }
        ViewStatus::Placeholder | ViewStatus::Progress => {
            TextPrinter { color: None }.print(&view.report_text());
        }
        ViewStatus::Rendered => {
            heading.print("Report");
            if markdown {
                MarkdownPrinter::default().print(&view.report_markdown());
            } else {
                println!("{}\n", view.report_text());
            }
            if let Some(intent) = view.reformulated_intent() {
                println!("{} {}", "Interpreted as:".dimmed(), intent);
            }
            if let Some(sql) = view.sql_query() {
                println!("{} {}\n", "SQL:".dimmed(), sql);
            }

            heading.print("Charts");
            let charts = view.chart_summaries();
            if charts.is_empty() {
                println!("{}", view.charts_text());
            }
            for chart in charts {
                let detail = if chart.text.is_empty() { "(graphic)".to_string() } else { chart.text };
                println!(
                    "{} {} {}",
                    chart.label.bold(),
                    detail,
                    format!("[{} script(s)]", chart.scripts).dimmed()
                );
            }
        }
    }
}
