// ============================================================================
// Gestion des événements
// ============================================================================
// Gère les événements clavier et les ticks de l'application
//
// CONCEPTS RUST :
// 1. Enums avec variants : représenter différents types d'événements
// 2. Thread dédié : crossterm::event::poll est bloquant, il ne doit pas
//    tourner sur le runtime tokio
// 3. Channel tokio : le thread clavier envoie, la boucle async reçoit
// ============================================================================

use std::time::Duration;

use anyhow::Result;
use crossterm::event::{self, Event as CrosstermEvent, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use tokio::sync::mpsc;
use tracing::debug;

/// Événements de l'application
#[derive(Debug, Clone)]
pub enum Event {
    /// Touche pressée
    Key(KeyEvent),

    /// Tick régulier (redessine l'écran)
    Tick,
}

/// Gestionnaire d'événements clavier
pub struct EventHandler {
    tick_rate: Duration,
}

impl EventHandler {
    pub fn new() -> Self {
        Self {
            tick_rate: Duration::from_millis(250),
        }
    }

    /// Lit le prochain événement (bloquant, timeout = tick_rate)
    ///
    /// Sur certains OS on reçoit Press ET Release : seul Press est gardé
    pub fn next(&self) -> Result<Event> {
        if event::poll(self.tick_rate)? {
            match event::read()? {
                CrosstermEvent::Key(key) if key.kind == KeyEventKind::Press => Ok(Event::Key(key)),
                _ => Ok(Event::Tick),
            }
        } else {
            Ok(Event::Tick)
        }
    }

    /// Lance le thread de lecture clavier
    ///
    /// Le thread s'arrête quand le receiver est fermé (fin de la boucle)
    pub fn spawn(self, tx: mpsc::UnboundedSender<Event>) -> std::thread::JoinHandle<()> {
        std::thread::spawn(move || loop {
            let event = match self.next() {
                Ok(event) => event,
                Err(e) => {
                    debug!(error = %e, "Failed to read terminal event");
                    Event::Tick
                }
            };
            if tx.send(event).is_err() {
                debug!("Event receiver closed, keyboard thread exiting");
                break;
            }
        })
    }
}

impl Default for EventHandler {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Helpers : identifier les touches
// ============================================================================

fn key_code(event: &Event) -> Option<KeyCode> {
    match event {
        Event::Key(key) => Some(key.code),
        Event::Tick => None,
    }
}

/// 'q' : quitter (écran de cotação)
pub fn is_quit_event(event: &Event) -> bool {
    matches!(key_code(event), Some(KeyCode::Char('q') | KeyCode::Char('Q')))
}

/// Ctrl+C : sortie immédiate, quel que soit l'écran
pub fn is_interrupt_event(event: &Event) -> bool {
    if let Event::Key(key) = event {
        key.modifiers.contains(KeyModifiers::CONTROL) && matches!(key.code, KeyCode::Char('c'))
    } else {
        false
    }
}

/// 'r' : "Atualizar"
pub fn is_refresh_event(event: &Event) -> bool {
    matches!(key_code(event), Some(KeyCode::Char('r') | KeyCode::Char('R')))
}

/// 's' : "Sair" (logout)
pub fn is_logout_event(event: &Event) -> bool {
    matches!(key_code(event), Some(KeyCode::Char('s') | KeyCode::Char('S')))
}

pub fn is_escape_event(event: &Event) -> bool {
    matches!(key_code(event), Some(KeyCode::Esc))
}

pub fn is_enter_event(event: &Event) -> bool {
    matches!(key_code(event), Some(KeyCode::Enter))
}

/// Tab ou flèches : change de champ dans le formulaire
pub fn is_switch_field_event(event: &Event) -> bool {
    matches!(
        key_code(event),
        Some(KeyCode::Tab | KeyCode::BackTab | KeyCode::Up | KeyCode::Down)
    )
}

pub fn is_backspace_event(event: &Event) -> bool {
    matches!(key_code(event), Some(KeyCode::Backspace))
}

/// Extrait le caractère imprimable d'un événement (sans Ctrl/Alt)
pub fn get_char_from_event(event: &Event) -> Option<char> {
    if let Event::Key(key) = event {
        if key.modifiers.intersects(KeyModifiers::CONTROL | KeyModifiers::ALT) {
            return None;
        }
        if let KeyCode::Char(c) = key.code {
            if !c.is_control() {
                return Some(c);
            }
        }
    }
    None
}
