mod admin;
mod app;
mod config;
mod connection;
mod error;
mod protocol;
mod queue;
mod session;
mod ui;
mod ui_state;
mod view;

use std::fs::File;
use std::io;
use std::path::Path;
use std::sync::Mutex;
use std::time::Instant;

use clap::Parser;
use crossterm::{
    event::{
        DisableBracketedPaste, DisableMouseCapture, EnableBracketedPaste, EnableMouseCapture, Event, EventStream,
        MouseEventKind,
    },
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use futures_util::StreamExt;
use ratatui::{backend::CrosstermBackend, Terminal};
use tokio::sync::mpsc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use app::App;
use config::{Args, Config};
use connection::socket_url;
use ui::draw;

/// The terminal owns stdout, so logs only go somewhere when a file is given.
fn init_logging(log_file: Option<&Path>) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    match log_file.map(File::create) {
        Some(Ok(file)) => {
            let _ = tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .try_init();
        }
        Some(Err(e)) => {
            eprintln!("Could not open log file: {}", e);
            let _ = tracing_subscriber::fmt().with_env_filter(filter).with_writer(io::sink).try_init();
        }
        None => {
            let _ = tracing_subscriber::fmt().with_env_filter(filter).with_writer(io::sink).try_init();
        }
    }
}

#[tokio::main]
async fn main() -> io::Result<()> {
    let args = Args::parse();
    init_logging(args.log_file.as_deref());

    let endpoint = socket_url(&args.url, &args.socket_path)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e.to_string()))?;
    info!("starting planner-chat against {}", endpoint);

    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture, EnableBracketedPaste)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let mut app = App::new(Config::from_args(&args), endpoint);

    let result = run_app(&mut terminal, &mut app).await;

    // Restore terminal
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture,
        DisableBracketedPaste
    )?;
    terminal.show_cursor()?;

    if let Err(e) = result {
        error!("terminal loop failed: {}", e);
        eprintln!("Error: {}", e);
    }

    Ok(())
}

async fn run_app(terminal: &mut Terminal<CrosstermBackend<io::Stdout>>, app: &mut App) -> io::Result<()> {
    let (events_tx, mut events_rx) = mpsc::unbounded_channel();
    app.connect(events_tx);

    let mut events = EventStream::new();
    let mut ticker = tokio::time::interval(app.config.tick_rate());

    while !app.should_quit {
        terminal.draw(|frame| draw(frame, app))?;

        tokio::select! {
            _ = ticker.tick() => app.tick(Instant::now()),

            Some(event) = events_rx.recv() => app.on_socket_event(event, Instant::now()),

            maybe_event = events.next() => match maybe_event {
                Some(Ok(Event::Key(key))) => app.handle_key(key, Instant::now()),
                Some(Ok(Event::Paste(text))) => app.insert_text(&text),
                Some(Ok(Event::Mouse(mouse))) => match mouse.kind {
                    MouseEventKind::ScrollUp => app.scroll_up(),
                    MouseEventKind::ScrollDown => app.scroll_down(),
                    _ => {}
                },
                Some(Ok(_)) => {}
                Some(Err(e)) => return Err(e),
                None => app.should_quit = true,
            },
        }
    }

    app.disconnect().await;
    Ok(())
}
