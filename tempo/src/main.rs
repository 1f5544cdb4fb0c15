use anyhow::{Context, Result};
use clap::Parser;
use crossterm::{
    event::{self, Event, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::{Backend, CrosstermBackend},
    Terminal,
};
use std::convert::Infallible;
use std::fs::{self, OpenOptions};
use std::future::pending;
use std::io;
use std::sync::Mutex;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

mod app;
mod clock;
mod config;
mod host;
mod ipc;
mod notify;
mod persistence;
mod preferences;
mod scheduler;
mod ui;

use app::App;
use clock::TokioClock;
use config::Config;
use host::Host;
use ipc::server;
use notify::DesktopNotifier;
use persistence::{FileKeyValue, KeyValue, MemoryKeyValue, PreferenceStore};
use scheduler::Scheduler;

#[derive(Parser)]
#[command(name = "tempo")]
#[command(about = "A focus/break phase timer", long_about = None)]
#[command(version)]
struct Cli {
    /// Run without the terminal UI; control it with tempoctl
    #[arg(long)]
    headless: bool,

    /// Log level used when RUST_LOG is not set
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli);

    let config = config::load_config().unwrap_or_else(|e| {
        warn!("Using default config: {:#}", e);
        Config::default()
    });

    let backend: Box<dyn KeyValue> = match FileKeyValue::in_data_dir() {
        Ok(backend) => Box::new(backend),
        Err(e) => {
            warn!("Preferences will not survive a restart: {:#}", e);
            Box::new(MemoryKeyValue::default())
        }
    };
    let store = PreferenceStore::open(backend);
    let (clock, ticks) = TokioClock::new();
    let presets = preferences::catalog(&config.presets);
    let scheduler = Scheduler::new(
        store,
        Box::new(clock),
        Box::new(DesktopNotifier::default()),
        presets,
    );

    let socket = tempo_ipc::socket_path();
    let (request_tx, requests) = mpsc::channel(16);
    let ipc_task = match server::bind(socket.clone()) {
        Ok(listener) => Some(tokio::spawn(server::serve(listener, request_tx))),
        Err(e) => {
            warn!("Remote control disabled: {:#}", e);
            None
        }
    };

    info!("Starting tempo v{}", env!("CARGO_PKG_VERSION"));
    let host = Host::new(ticks, requests);
    let res = if cli.headless {
        run_headless(scheduler, host).await
    } else {
        run_tui(App::new(config, scheduler), host).await
    };

    if let Some(task) = ipc_task {
        task.abort();
        let _ = fs::remove_file(&socket);
    }
    info!("Shutdown complete");
    res
}

fn init_tracing(cli: &Cli) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("tempo={}", cli.log_level)));

    if cli.headless {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(io::stderr)
            .init();
        return;
    }

    // The terminal belongs to the UI, so logs go to a file.
    let log_file = persistence::data_dir().and_then(|dir| {
        fs::create_dir_all(&dir)?;
        let path = dir.join("tempo.log");
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .with_context(|| format!("Failed to open log file at {}", path.display()))
    });
    match log_file {
        Ok(file) => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_ansi(false)
            .with_writer(Mutex::new(file))
            .init(),
        Err(_) => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(io::sink)
            .init(),
    }
}

async fn run_headless(mut scheduler: Scheduler, mut host: Host) -> Result<()> {
    info!("Running headless");
    loop {
        tokio::select! {
            running = host.step(&mut scheduler, pending::<Option<Infallible>>()) => {
                if !running {
                    break;
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Shutdown signal received");
                break;
            }
        }
    }
    Ok(())
}

async fn run_tui(app: App, host: Host) -> Result<()> {
    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let res = run_app(&mut terminal, app, host).await;

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    if let Err(err) = &res {
        eprintln!("Error: {:?}", err);
    }
    res
}

/// Terminal input is blocking, so it is read on a blocking task and
/// forwarded. The task ends within one poll interval of the receiver closing.
fn spawn_input_reader() -> mpsc::UnboundedReceiver<Event> {
    let (tx, rx) = mpsc::unbounded_channel();
    tokio::task::spawn_blocking(move || {
        while !tx.is_closed() {
            match event::poll(Duration::from_millis(100)) {
                Ok(false) => continue,
                Ok(true) => {}
                Err(e) => {
                    warn!("Terminal input failed: {}", e);
                    break;
                }
            }
            match event::read() {
                Ok(Event::Key(key)) if key.kind != KeyEventKind::Press => {}
                Ok(event) => {
                    if tx.send(event).is_err() {
                        break;
                    }
                }
                Err(e) => {
                    warn!("Terminal input failed: {}", e);
                    break;
                }
            }
        }
    });
    rx
}

async fn run_app<B: Backend>(
    terminal: &mut Terminal<B>,
    mut app: App,
    mut host: Host,
) -> Result<()> {
    let mut input = spawn_input_reader();

    loop {
        terminal.draw(|f| ui::draw(f, &app))?;

        if !host.step(&mut app, input.recv()).await {
            break;
        }
        if app.should_quit {
            break;
        }
    }
    Ok(())
}
