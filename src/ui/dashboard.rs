// ============================================================================
// Dashboard - Rendu de l'interface
// ============================================================================
// Deux écrans, choisis d'après l'état de session :
// - "Autenticação" : formulaire usuário / senha
// - "Cotação do Dólar" : compra, venda, horodatage, erreur éventuelle
//
// CONCEPTS RATATUI :
// 1. Frame : surface de dessin
// 2. Layout : header / contenu / footer
// 3. Paragraph + Line + Span : texte stylé
// ============================================================================

use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Wrap},
    Frame,
};

use crate::app::{App, LoginField, Screen};
use crate::models::format_brl;
use crate::session::{SessionState, SessionView};

/// Dessine l'interface complète
pub fn render(frame: &mut Frame, app: &App, session: &SessionView) {
    let chunks = create_layout(frame.size());

    render_header(frame, chunks[0]);

    match Screen::for_state(session.state) {
        Screen::Login => render_login(frame, app, session, chunks[1]),
        Screen::Quote => render_quote(frame, session, chunks[1]),
    }

    render_footer(frame, app, session, chunks[2]);
}

/// Header (3 lignes), contenu, footer (3 lignes)
fn create_layout(area: Rect) -> Vec<Rect> {
    Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(0),
            Constraint::Length(3),
        ])
        .split(area)
        .to_vec()
}

fn render_header(frame: &mut Frame, area: Rect) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan))
        .title(" Cotação ")
        .title_alignment(Alignment::Center);

    let paragraph = Paragraph::new(Line::from(Span::styled(
        "USD → BRL",
        Style::default().fg(Color::Green).add_modifier(Modifier::BOLD),
    )))
    .block(block)
    .alignment(Alignment::Center);

    frame.render_widget(paragraph, area);
}

// ============================================================================
// Écran de login
// ============================================================================

fn render_login(frame: &mut Frame, app: &App, session: &SessionView, area: Rect) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan))
        .title(" Autenticação ");

    let field_style = |field: LoginField| {
        if app.focus == field {
            Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(Color::Gray)
        }
    };
    let cursor = |field: LoginField| if app.focus == field { "█" } else { "" };

    let mut lines = vec![
        Line::from(""),
        Line::from(vec![
            Span::styled("Usuário : ", field_style(LoginField::Username)),
            Span::raw(app.username.as_str()),
            Span::raw(cursor(LoginField::Username)),
        ]),
        Line::from(vec![
            Span::styled("Senha   : ", field_style(LoginField::Password)),
            Span::raw(app.masked_password()),
            Span::raw(cursor(LoginField::Password)),
        ]),
        Line::from(""),
    ];

    if session.state == SessionState::Authenticating {
        lines.push(Line::from(Span::styled(
            "⟳ Entrando...",
            Style::default().fg(Color::Blue),
        )));
    }

    if let Some(error) = session.error {
        lines.push(error_line(error));
    }

    let paragraph = Paragraph::new(lines).block(block).wrap(Wrap { trim: true });
    frame.render_widget(paragraph, area);
}

// ============================================================================
// Écran de cotação
// ============================================================================

fn render_quote(frame: &mut Frame, session: &SessionView, area: Rect) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan))
        .title(" Cotação do Dólar ");

    let label = Style::default().fg(Color::Gray);
    let value = Style::default().fg(Color::White).add_modifier(Modifier::BOLD);

    let mut lines = vec![Line::from("")];

    if session.busy {
        lines.push(Line::from(Span::styled(
            "⟳ Atualizando...",
            Style::default().fg(Color::Blue),
        )));
    }

    if let Some(error) = session.error {
        lines.push(error_line(error));
    }

    if let Some(quote) = session.quote {
        lines.push(Line::from(vec![
            Span::styled("Compra : ", label),
            Span::styled(format_brl(quote.buy), value.fg(Color::Green)),
        ]));
        lines.push(Line::from(vec![
            Span::styled("Venda  : ", label),
            Span::styled(format_brl(quote.sell), value.fg(Color::Red)),
        ]));
        lines.push(Line::from(""));
        lines.push(Line::from(Span::styled(
            format!("Atualizado em: {}", quote.formatted_timestamp()),
            Style::default().fg(Color::DarkGray),
        )));
    }

    let paragraph = Paragraph::new(lines)
        .block(block)
        .alignment(Alignment::Center)
        .wrap(Wrap { trim: true });
    frame.render_widget(paragraph, area);
}

fn error_line(message: &str) -> Line<'_> {
    Line::from(Span::styled(
        message,
        Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
    ))
}

// ============================================================================
// Footer : raccourcis
// ============================================================================

fn render_footer(frame: &mut Frame, app: &App, session: &SessionView, area: Rect) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan));

    let key = |k: &'static str, color: Color| {
        Span::styled(k, Style::default().fg(color).add_modifier(Modifier::BOLD))
    };

    let shortcuts = if app.is_awaiting_quit_confirmation() {
        Line::from(vec![
            Span::styled(
                "⚠  Appuyez à nouveau pour quitter, ou n'importe quelle autre touche pour annuler ⚠",
                Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
            ),
        ])
    } else {
        match Screen::for_state(session.state) {
            Screen::Login => Line::from(vec![
                key("[Enter]", Color::Green),
                Span::raw(" Entrar  "),
                key("[Tab]", Color::Yellow),
                Span::raw(" Campo  "),
                key("[Esc]", Color::Red),
                Span::raw(" Quit"),
            ]),
            Screen::Quote => Line::from(vec![
                key("[r]", Color::Green),
                Span::raw(" Atualizar  "),
                key("[s]", Color::Red),
                Span::raw(" Sair  "),
                key("[q]", Color::Yellow),
                Span::raw(" Quit"),
            ]),
        }
    };

    let paragraph = Paragraph::new(shortcuts)
        .block(block)
        .alignment(Alignment::Center);
    frame.render_widget(paragraph, area);
}
