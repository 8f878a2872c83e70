//! Ask - terminal client for a streaming answer endpoint.
//!
//! This is the entry point for the `ask` binary.

mod app;
mod markdown;
mod ui;

use std::fs::File;
use std::io::{self, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use ask_stream_core::{
    ClientConfig, HttpTransport, QueryTransport, ResponseStatus, SessionEvent, SessionSupervisor,
};
use clap::Parser;
use crossterm::event::{
    self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEventKind, KeyModifiers,
    MouseEventKind,
};
use crossterm::execute;
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use ratatui::backend::CrosstermBackend;
use ratatui::Terminal;
use tokio::sync::mpsc;

use app::App;

/// Lines moved by PgUp/PgDn.
const PAGE: usize = 10;

/// Log filter used with `--debug`.
const DEBUG_FILTER: &str = "ask_stream_cli=debug,ask_stream_core=debug,warn";

/// Ask - terminal client for a streaming answer endpoint.
#[derive(Parser, Debug)]
#[command(name = "ask")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Base URL of the site serving the answer endpoint.
    #[arg(long, env = "ASK_BASE_URL", default_value = "http://localhost:3000")]
    base_url: String,

    /// Path of the answer endpoint.
    #[arg(long, env = "ASK_ENDPOINT", default_value = "/api/ai")]
    endpoint: String,

    /// Bearer token sent with each query.
    #[arg(long, env = "ASK_TOKEN")]
    token: Option<String>,

    /// Connect timeout in seconds.
    #[arg(long, default_value_t = 10)]
    connect_timeout: u64,

    /// Overall request timeout in seconds. Unset means no limit.
    #[arg(long)]
    timeout: Option<u64>,

    /// Enable debug logging.
    #[arg(long, default_value = "false")]
    debug: bool,

    /// Log file used with --debug while the UI owns the terminal.
    #[arg(long, default_value = "ask.log")]
    log_file: PathBuf,

    /// Ask a single question, print the answer and exit.
    #[arg(long, value_name = "QUERY")]
    ask: Option<String>,
}

impl Args {
    fn client_config(&self) -> ClientConfig {
        ClientConfig {
            base_url: self.base_url.clone(),
            endpoint: self.endpoint.clone(),
            api_token: self.token.clone(),
            connect_timeout_seconds: self.connect_timeout,
            request_timeout_seconds: self.timeout,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let args = Args::parse();

    init_logging(&args)?;

    let config = args.client_config();
    let transport = Arc::new(HttpTransport::new(&config)?);
    tracing::info!(url = %transport.url(), "Using answer endpoint");

    if let Some(query) = args.ask.as_deref() {
        return ask_once(transport, query).await;
    }

    let (supervisor, events) = SessionSupervisor::new(transport);
    let mut app = App::new(supervisor, config.endpoint_url());

    // Setup terminal with mouse capture enabled
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let result = run_event_loop(&mut terminal, &mut app, events).await;

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen, DisableMouseCapture)?;
    terminal.show_cursor()?;

    result.map(|()| ExitCode::SUCCESS)
}

/// Install the tracing subscriber when `--debug` is given.
fn init_logging(args: &Args) -> anyhow::Result<()> {
    if !args.debug {
        return Ok(());
    }

    if args.ask.is_some() {
        tracing_subscriber::fmt()
            .with_env_filter(DEBUG_FILTER)
            .with_writer(io::stderr)
            .init();
    } else {
        // The UI owns the terminal.
        let file = File::create(&args.log_file)?;
        tracing_subscriber::fmt()
            .with_env_filter(DEBUG_FILTER)
            .with_ansi(false)
            .with_writer(Mutex::new(file))
            .init();
    }
    Ok(())
}

/// Stream one answer to stdout. Ctrl+C stops it, keeping what was printed.
async fn ask_once(transport: Arc<dyn QueryTransport>, query: &str) -> anyhow::Result<ExitCode> {
    let (mut supervisor, mut events) = SessionSupervisor::new(transport);
    if supervisor.submit(query).is_none() {
        anyhow::bail!("query is empty");
    }

    let mut stdout = io::stdout().lock();
    let mut printed = 0;

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    while supervisor.state().is_loading {
        tokio::select! {
            event = events.recv() => {
                let Some(event) = event else { break };
                if supervisor.handle_event(event) {
                    let state = supervisor.state();
                    if let Some(delta) = state.accumulated_text.get(printed..) {
                        stdout.write_all(delta.as_bytes())?;
                        stdout.flush()?;
                    }
                    printed = state.accumulated_text.len();
                }
            }
            _ = &mut ctrl_c => {
                supervisor.stop();
            }
        }
    }

    let state = supervisor.state();
    if printed > 0 {
        writeln!(stdout)?;
    }
    match state.status {
        ResponseStatus::Error => {
            eprintln!("{}", state.error.as_deref().unwrap_or_default());
            Ok(ExitCode::FAILURE)
        }
        ResponseStatus::Cancelled => {
            eprintln!("(stopped)");
            Ok(ExitCode::from(130))
        }
        _ => Ok(ExitCode::SUCCESS),
    }
}

/// Main event loop with real-time streaming support.
///
/// The event loop immediately redraws on every session event for smooth streaming.
async fn run_event_loop(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    app: &mut App,
    mut events: mpsc::Receiver<SessionEvent>,
) -> anyhow::Result<()> {
    loop {
        app.tick_animation();

        terminal.draw(|f| ui::render(f, app))?;

        // Shorter tick while loading keeps the spinner smooth
        let tick_rate = if app.is_loading() {
            Duration::from_millis(80)
        } else {
            Duration::from_millis(100)
        };

        tokio::select! {
            () = tokio::time::sleep(tick_rate) => {
                while event::poll(Duration::from_millis(0)).unwrap_or(false) {
                    if let Ok(evt) = event::read() {
                        handle_input(app, evt);
                    }
                }
            }

            Some(event) = events.recv() => {
                if app.handle_session_event(event) {
                    terminal.draw(|f| ui::render(f, app))?;
                }
            }
        }

        if app.should_quit {
            break;
        }
    }

    app.stop();

    Ok(())
}

/// Handle input events.
fn handle_input(app: &mut App, event: Event) {
    match event {
        Event::Key(key) => {
            // Only handle key press events
            if key.kind == KeyEventKind::Press {
                handle_key(app, key.code, key.modifiers);
            }
        }
        Event::Mouse(mouse) if app.is_open() => match mouse.kind {
            MouseEventKind::ScrollUp => app.scroll_up(3),
            MouseEventKind::ScrollDown => app.scroll_down(3),
            _ => {}
        },
        _ => {}
    }
}

/// Handle a key press.
///
/// Global keys work everywhere; the rest only apply while the sheet is open.
fn handle_key(app: &mut App, code: KeyCode, modifiers: KeyModifiers) {
    let ctrl = modifiers.contains(KeyModifiers::CONTROL);

    match code {
        KeyCode::Char('c' | 'q') if ctrl => {
            app.should_quit = true;
            return;
        }
        KeyCode::F(2) => {
            app.toggle_surface();
            return;
        }
        KeyCode::Char('o') if ctrl => {
            app.toggle_surface();
            return;
        }
        KeyCode::Esc => {
            if app.is_loading() {
                app.stop();
            } else {
                app.close_surface();
            }
            return;
        }
        _ => {}
    }

    if !app.is_open() {
        match code {
            KeyCode::Enter => app.open_surface(),
            KeyCode::Char(c) if !ctrl => {
                app.open_surface();
                app.insert_char(c);
            }
            _ => {}
        }
        return;
    }

    match code {
        KeyCode::PageUp => app.scroll_up(PAGE),
        KeyCode::PageDown => app.scroll_down(PAGE),
        KeyCode::Up => {
            if app.shows_suggestions() {
                app.select_prev_suggestion();
            } else {
                app.scroll_up(1);
            }
        }
        KeyCode::Down => {
            if app.shows_suggestions() {
                app.select_next_suggestion();
            } else {
                app.scroll_down(1);
            }
        }
        KeyCode::Enter => {
            if app.input.trim().is_empty() {
                if let Some(index) = app.selected_suggestion.filter(|_| app.shows_suggestions()) {
                    app.run_suggestion(index);
                }
            } else {
                app.submit();
            }
        }
        KeyCode::Char(c) if ctrl => match c {
            'a' => app.move_cursor_start(),
            'e' => app.move_cursor_end(),
            'u' => app.clear_input(),
            'w' => app.delete_word(),
            _ => {}
        },
        KeyCode::Char(c) => app.insert_char(c),
        KeyCode::Backspace => app.delete_char(),
        KeyCode::Delete => app.delete_char_forward(),
        KeyCode::Left => app.move_cursor_left(),
        KeyCode::Right => app.move_cursor_right(),
        KeyCode::Home => app.move_cursor_start(),
        KeyCode::End => app.move_cursor_end(),
        _ => {}
    }
}
