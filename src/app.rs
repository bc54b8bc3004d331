// ============================================================================
// Structure : App
// ============================================================================
// État de l'interface TUI (ce qui n'appartient pas au contrôleur de session)
//
// L'écran affiché se déduit de l'état de session :
// - Unauthenticated / Authenticating -> formulaire de login
// - AuthenticatedIdle / Polling / PollingError -> écran de cotação
//
// App ne garde que la saisie du formulaire et la confirmation de sortie.
// ============================================================================

use crate::session::SessionState;

/// Identifiants pré-remplis du formulaire (compte de démonstration de l'API)
pub const DEFAULT_USERNAME: &str = "admin";
pub const DEFAULT_PASSWORD: &str = "12345";

/// Écrans de l'application
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Screen {
    /// Formulaire "Autenticação"
    Login,

    /// Panneau "Cotação do Dólar"
    Quote,
}

impl Screen {
    /// Écran correspondant à un état de session
    pub fn for_state(state: SessionState) -> Self {
        if state.is_authenticated() {
            Screen::Quote
        } else {
            Screen::Login
        }
    }
}

/// Champ actif du formulaire de login
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginField {
    Username,
    Password,
}

/// État de l'interface
pub struct App {
    /// Indique si l'application doit continuer à tourner
    pub running: bool,

    /// Première pression de 'q' reçue, en attente de confirmation
    pub confirm_quit: bool,

    pub username: String,
    pub password: String,
    pub focus: LoginField,
}

impl App {
    pub fn new() -> Self {
        Self {
            running: true,
            confirm_quit: false,
            username: DEFAULT_USERNAME.to_string(),
            password: DEFAULT_PASSWORD.to_string(),
            focus: LoginField::Username,
        }
    }

    pub fn quit(&mut self) {
        self.running = false;
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Two-step quit : première pression = demande, seconde = sortie
    pub fn request_quit(&mut self) {
        if self.confirm_quit {
            self.quit();
        } else {
            self.confirm_quit = true;
        }
    }

    pub fn cancel_quit(&mut self) {
        self.confirm_quit = false;
    }

    pub fn is_awaiting_quit_confirmation(&self) -> bool {
        self.confirm_quit
    }

    // ========================================================================
    // Formulaire de login
    // ========================================================================

    /// Passe au champ suivant (Tab)
    pub fn toggle_focus(&mut self) {
        self.focus = match self.focus {
            LoginField::Username => LoginField::Password,
            LoginField::Password => LoginField::Username,
        };
    }

    fn focused_buffer(&mut self) -> &mut String {
        match self.focus {
            LoginField::Username => &mut self.username,
            LoginField::Password => &mut self.password,
        }
    }

    pub fn append_char(&mut self, c: char) {
        self.focused_buffer().push(c);
    }

    pub fn backspace(&mut self) {
        self.focused_buffer().pop();
    }

    /// Identifiants à soumettre (None si un champ est vide)
    pub fn credentials(&self) -> Option<(String, String)> {
        let username = self.username.trim();
        if username.is_empty() || self.password.is_empty() {
            return None;
        }
        Some((username.to_string(), self.password.clone()))
    }

    /// Mot de passe masqué pour l'affichage
    pub fn masked_password(&self) -> String {
        "•".repeat(self.password.chars().count())
    }
}

impl Default for App {
    fn default() -> Self {
        Self::new()
    }
}
