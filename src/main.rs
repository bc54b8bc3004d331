// ============================================================================
// Cotacao - Point d'entrée
// ============================================================================
// Programme TUI : login sur l'API de cotação puis affichage du dollar,
// rafraîchi automatiquement les jours ouvrés
//
// CONCEPTS RUST CLÉS :
// 1. Terminal raw mode : contrôle total du terminal
// 2. Event loop async : tokio::select! entre clavier et contrôleur de session
// 3. Thread clavier : crossterm est bloquant, il vit hors du runtime
// 4. Restauration du terminal même en cas d'erreur
// ============================================================================

use std::io;
use std::sync::Arc;

use anyhow::{Context, Result};
use crossterm::{
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};
use tokio::sync::mpsc;
use tracing::{debug, error, info};

use cotacao::api::{AuthClient, QuoteClient};
use cotacao::app::{App, Screen};
use cotacao::calendar::BrazilianCalendar;
use cotacao::config::AppConfig;
use cotacao::session::{SessionController, SessionDeps, SessionEvent, SessionState};
use cotacao::storage::{FileStore, KeyValueStore};
use cotacao::ui::{events::Event, render, EventHandler};

// ============================================================================
// Initialisation du logging
// ============================================================================
// Le TUI occupe stdout : les logs vont dans un fichier à rotation quotidienne
//
//   tail -f ~/.local/share/cotacao/logs/cotacao.log.<date>
//   RUST_LOG=cotacao=trace cargo run
// ============================================================================

fn init_logging(config: &AppConfig) -> Result<()> {
    use tracing_appender::rolling::{RollingFileAppender, Rotation};
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    std::fs::create_dir_all(&config.log_dir)
        .context("Échec de la création du répertoire de logs")?;

    let file_appender = RollingFileAppender::new(Rotation::DAILY, &config.log_dir, "cotacao.log");

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(file_appender)
                .with_ansi(false)
                .with_target(true)
                .with_thread_ids(true)
                .with_line_number(true),
        )
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "cotacao=debug,info".into()),
        )
        .try_init()
        .context("Échec de l'initialisation du subscriber tracing")?;

    info!(log_dir = ?config.log_dir, "Logging initialisé");
    Ok(())
}

fn main() -> Result<()> {
    let config = AppConfig::from_env();

    // Sans logs on continue quand même
    init_logging(&config).unwrap_or_else(|e| {
        eprintln!("⚠️  Warning: Failed to initialize logging: {:#}", e);
        eprintln!("   Continuing without logging...");
    });

    info!(api_url = %config.api_url, poll_interval = ?config.poll_interval, data_dir = ?config.data_dir, "Cotacao starting up");

    let runtime = tokio::runtime::Runtime::new().context("Échec de la création du runtime tokio")?;

    debug!("Setting up terminal");
    let mut terminal = setup_terminal()?;

    let result = runtime.block_on(run(&mut terminal, &config));

    // Restaure le terminal (même en cas d'erreur)
    debug!("Restoring terminal");
    restore_terminal(&mut terminal)?;

    match &result {
        Ok(_) => info!("Application exited normally"),
        Err(e) => error!(error = ?e, "Application exited with error"),
    }
    result
}

// ============================================================================
// Boucle principale
// ============================================================================
// À chaque itération :
//   1. RENDER : dessine l'état courant
//   2. ATTENTE : un événement de session OU un événement clavier
//   3. UPDATE : le contrôleur ou l'App traite l'événement
// ============================================================================

async fn run(terminal: &mut Terminal<CrosstermBackend<io::Stdout>>, config: &AppConfig) -> Result<()> {
    let store: Arc<dyn KeyValueStore> = Arc::new(FileStore::in_dir(&config.data_dir));
    let deps = SessionDeps {
        auth: Arc::new(AuthClient::new(&config.api_url).context("Client de login invalide")?),
        quotes: Arc::new(
            QuoteClient::new(&config.api_url, Arc::clone(&store)).context("Client de cotação invalide")?,
        ),
        store,
        calendar: Arc::new(BrazilianCalendar::new()),
    };

    let (mut session, mut session_rx) = SessionController::new(deps, config.poll_interval);
    let commands = session.sender();
    session.start().await;

    let (event_tx, mut event_rx) = mpsc::unbounded_channel();
    EventHandler::new().spawn(event_tx);

    let mut app = App::new();
    info!("Starting event loop");

    while app.is_running() {
        terminal.draw(|frame| render(frame, &app, &session.view()))?;

        tokio::select! {
            Some(event) = session_rx.recv() => session.handle(event).await,
            Some(event) = event_rx.recv() => handle_event(&mut app, session.state(), event, &commands),
            else => break,
        }
    }

    // Fin du premier plan : plus de timer
    session.shutdown();
    Ok(())
}

// ============================================================================
// Gestion des événements clavier
// ============================================================================

/// Traduit une touche en action sur l'App ou en commande de session
fn handle_event(
    app: &mut App,
    state: SessionState,
    event: Event,
    commands: &mpsc::UnboundedSender<SessionEvent>,
) {
    use cotacao::ui::events::{
        get_char_from_event, is_backspace_event, is_enter_event, is_escape_event,
        is_interrupt_event, is_logout_event, is_quit_event, is_refresh_event,
        is_switch_field_event,
    };

    if matches!(event, Event::Tick) {
        return;
    }

    if is_interrupt_event(&event) {
        info!("Interrupted by user");
        app.quit();
        return;
    }

    match Screen::for_state(state) {
        Screen::Login => {
            if is_escape_event(&event) {
                app.request_quit();
                return;
            }
            app.cancel_quit();

            // Formulaire verrouillé pendant la requête de login
            if state == SessionState::Authenticating {
                return;
            }

            if is_enter_event(&event) {
                match app.credentials() {
                    Some((username, password)) => {
                        let _ = commands.send(SessionEvent::Login { username, password });
                    }
                    None => debug!("Empty credentials, ignoring submit"),
                }
            } else if is_switch_field_event(&event) {
                app.toggle_focus();
            } else if is_backspace_event(&event) {
                app.backspace();
            } else if let Some(c) = get_char_from_event(&event) {
                app.append_char(c);
            }
        }

        Screen::Quote => {
            if is_quit_event(&event) {
                app.request_quit();
                return;
            }
            app.cancel_quit();

            if is_refresh_event(&event) {
                let _ = commands.send(SessionEvent::Refresh);
            } else if is_logout_event(&event) {
                let _ = commands.send(SessionEvent::Logout);
            }
        }
    }
}

// ============================================================================
// Setup et restauration du terminal
// ============================================================================

fn setup_terminal() -> Result<Terminal<CrosstermBackend<io::Stdout>>> {
    enable_raw_mode().context("Échec de l'activation du raw mode")?;

    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;

    let backend = CrosstermBackend::new(stdout);
    Terminal::new(backend).map_err(|e| e.into())
}

fn restore_terminal(terminal: &mut Terminal<CrosstermBackend<io::Stdout>>) -> Result<()> {
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;
    Ok(())
}
