// src/main.rs
mod input;
mod theme;
mod ui;
mod utils;

use std::io;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use anyhow::Result;
use clap::Parser;
use crossterm::event::{self, DisableMouseCapture, EnableMouseCapture, Event};
use crossterm::execute;
use crossterm::terminal::{self, EnterAlternateScreen, LeaveAlternateScreen};
use ratatui::prelude::*;
use tokio::runtime::{Handle, Runtime};
use tracing::info;

use lexipen::config::{self, Backend, Settings};
use lexipen::diagnostics;
use lexipen::host::{ElementId, ElementSpec, HostDocument, InputType, Rect as PageRect};
use lexipen::logging;
use lexipen::network::{ChatCompletionsCompleter, GeminiCompleter, PromptedService};
use lexipen::pipeline::ActionPipeline;
use lexipen::prompts::Prompts;
use lexipen::service::{StubTransformService, TextTransformService};
use lexipen::{AssistantSession, SessionOptions};

use crate::input::OverlayForm;

const PAGE_URL: &str = "https://mail.example.test/compose";

#[derive(Parser, Debug)]
#[command(name = "lexipen", version, about = "Writing assistant for the text fields of a page")]
struct Args {
    /// Text backend, overriding the configured one.
    #[arg(long, value_enum)]
    backend: Option<Backend>,

    /// Attach to the sample page, print the detection report as JSON and exit.
    #[arg(long)]
    report: bool,

    /// Send a sample draft through the configured backend, print the answer
    /// as JSON and exit.
    #[arg(long)]
    test_ai: bool,

    /// Store an API key in the user config file and exit.
    #[arg(long, value_name = "KEY")]
    save_api_key: Option<String>,
}

/// Everything the event loop mutates.
pub struct App {
    pub doc: HostDocument,
    pub session: AssistantSession,
    pub form: OverlayForm,
    pub status: Arc<Mutex<String>>,
    service: Arc<dyn TextTransformService>,
    unavailable: Option<String>,
    comments: Option<ElementId>,
}

impl App {
    /// Adds a comment box with a reply field below the form.
    pub fn insert_comments(&mut self) {
        if self.comments.is_some() {
            return;
        }
        let root = self.doc.root();
        let spec = ElementSpec::block("comments", PageRect::new(20, 700, 920, 80))
            .with_text("Comments")
            .child(ElementSpec::editable("reply", PageRect::new(20, 720, 920, 60)));
        self.comments = self.doc.append(root, spec);
        self.set_status("Comment box inserted");
    }

    pub fn remove_comments(&mut self) {
        if let Some(id) = self.comments.take() {
            self.doc.remove(id);
            self.set_status("Comment box removed");
        }
    }

    /// Asks the page how many fields it tracks; the answer lands in the
    /// status line once the next pump has served it.
    pub fn run_diagnostics(&self, rt: &Handle) {
        let client = self.session.diagnostic_client();
        let status = Arc::clone(&self.status);
        self.set_status("Testing detection...");
        rt.spawn(async move {
            let text = match client.test_detection().await {
                Ok(report) => format!("Detection: {} text fields on {}", report.text_fields, report.url),
                Err(e) => format!("Detection failed: {e}"),
            };
            if let Ok(mut s) = status.lock() {
                *s = text;
            }
        });
    }

    /// Runs the backend check in the background and reports into the
    /// status line.
    pub fn run_ai_check(&self, rt: &Handle) {
        if let Some(reason) = &self.unavailable {
            self.set_status(format!("AI not available: {reason}"));
            return;
        }
        let service = Arc::clone(&self.service);
        let status = Arc::clone(&self.status);
        self.set_status("Testing the text backend...");
        rt.spawn(async move {
            let text = match diagnostics::test_ai(service.as_ref()).await {
                Ok(report) => format!("AI test: {}", utils::excerpt(&report.result, 80)),
                Err(e) => format!("AI error: {e}"),
            };
            if let Ok(mut s) = status.lock() {
                *s = text;
            }
        });
    }

    pub fn set_status(&self, text: impl Into<String>) {
        if let Ok(mut s) = self.status.lock() {
            *s = text.into();
        }
    }

    pub fn status(&self) -> String {
        self.status.lock().map(|s| s.clone()).unwrap_or_default()
    }
}

fn main() -> Result<()> {
    let args = Args::parse();

    if let Some(key) = args.save_api_key {
        let path = config::save_api_key(&key)?;
        println!("API key saved to {}", path.display());
        return Ok(());
    }

    let mut settings = Settings::new()?;
    if let Some(backend) = args.backend {
        settings.backend = backend;
    }
    let log_file = logging::init_tracing(&settings);
    info!(backend = ?settings.backend, log = ?log_file, "lexipen starting");

    let rt = Runtime::new()?;
    let service = build_service(&settings);

    if args.test_ai {
        return print_ai_check(&rt, &settings, service.as_ref());
    }

    let pipeline = ActionPipeline::new(Arc::clone(&service), rt.handle().clone());

    if args.report {
        return print_report(&rt, &settings, pipeline);
    }

    let (cols, rows) = terminal::size()?;
    let mut doc = sample_page(page_area(cols, rows));
    let session = AssistantSession::attach(&mut doc, SessionOptions::from(&settings), pipeline);
    let mut app = App {
        doc,
        session,
        form: OverlayForm::default(),
        status: Arc::new(Mutex::new(String::new())),
        unavailable: settings.unavailable_reason(),
        service,
        comments: None,
    };

    terminal::enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let result = run(&mut terminal, &mut app, rt.handle());

    app.session.detach(&mut app.doc);
    terminal::disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen, DisableMouseCapture)?;
    terminal.show_cursor()?;
    result
}

fn run(terminal: &mut Terminal<CrosstermBackend<io::Stdout>>, app: &mut App, rt: &Handle) -> Result<()> {
    loop {
        app.session.pump(&mut app.doc, Instant::now());
        terminal.draw(|f| ui::render(f, app))?;

        if event::poll(Duration::from_millis(50))? {
            match event::read()? {
                Event::Key(key) => {
                    if !input::handle_key(key, app, rt)? {
                        return Ok(());
                    }
                }
                Event::Resize(cols, rows) => {
                    let viewport = utils::viewport_for(page_area(cols, rows));
                    app.session.resize(&mut app.doc, viewport);
                }
                Event::Mouse(mouse) => {
                    let size = terminal.size()?;
                    let area = Rect::new(0, 0, size.width, size.height);
                    input::handle_mouse(mouse, area, app);
                }
                _ => {}
            }
        }
    }
}

/// Inside of the page block: the terminal minus its borders and the footer.
fn page_area(cols: u16, rows: u16) -> Rect {
    Rect::new(0, 0, cols.saturating_sub(2), rows.saturating_sub(5))
}

fn build_service(settings: &Settings) -> Arc<dyn TextTransformService> {
    let prompts = Prompts::load(settings.custom_prompt_path.as_deref());
    match settings.backend {
        Backend::Stub => Arc::new(StubTransformService::new(settings.stub_delays())),
        Backend::Gemini => Arc::new(PromptedService::new(
            GeminiCompleter::new(settings.gemini_model.as_str()),
            prompts,
        )),
        Backend::Openai => Arc::new(PromptedService::new(
            ChatCompletionsCompleter::new(
                settings.api_base.as_str(),
                settings.api_key.clone(),
                settings.model.as_str(),
            ),
            prompts,
        )),
    }
}

fn print_ai_check(rt: &Runtime, settings: &Settings, service: &dyn TextTransformService) -> Result<()> {
    if let Some(reason) = settings.unavailable_reason() {
        anyhow::bail!("AI not available: {reason}");
    }
    let report = rt
        .block_on(diagnostics::test_ai(service))
        .map_err(|e| anyhow::anyhow!("AI error: {e}"))?;
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

fn print_report(rt: &Runtime, settings: &Settings, pipeline: ActionPipeline) -> Result<()> {
    let mut doc = sample_page(Rect::new(0, 0, 96, 40));
    let mut session = AssistantSession::attach(&mut doc, SessionOptions::from(settings), pipeline);
    let client = session.diagnostic_client();
    let query = rt.spawn(async move { client.test_detection().await });
    while !query.is_finished() {
        session.pump(&mut doc, Instant::now());
        std::thread::sleep(Duration::from_millis(5));
    }
    let report = rt.block_on(query)??;
    session.detach(&mut doc);
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

/// A compose form with every kind of field the assistant has to tell apart.
fn sample_page(area: Rect) -> HostDocument {
    let mut doc = HostDocument::new(PAGE_URL, utils::viewport_for(area));
    let root = doc.root();
    let specs = [
        ElementSpec::block("heading", PageRect::new(20, 0, 900, 20)).with_text("New message"),
        ElementSpec::input(InputType::Text, "subject", PageRect::new(20, 60, 560, 60)),
        ElementSpec::input(InputType::Email, "to", PageRect::new(600, 60, 340, 60)),
        ElementSpec::input(InputType::Password, "signing password", PageRect::new(20, 180, 300, 60)),
        ElementSpec::input(InputType::Text, "pin", PageRect::new(340, 200, 40, 16)),
        ElementSpec::input(InputType::Text, "tracking id", PageRect::new(400, 180, 300, 60)).hidden(),
        ElementSpec::text_area("message", PageRect::new(20, 300, 920, 180))
            .with_text("hey john, ur presentation was pretty good"),
        ElementSpec::editable("notes", PageRect::new(20, 540, 920, 120)),
    ];
    for spec in specs {
        doc.append(root, spec);
    }
    doc
}
