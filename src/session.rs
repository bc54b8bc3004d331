// ============================================================================
// Module : session
// ============================================================================
// Contrôleur de session : cycle de vie du token + polling de la cotação
//
// Machine à états :
//
//   Unauthenticated --login--> Authenticating --ok--> AuthenticatedIdle
//         ^                          |                      |
//         |<--------échec------------+        jour ouvré ?  |
//         |                                  /          \   |
//         |<---401 / logout--- Polling <--oui            non--> PollingError
//
// CONCEPTS RUST :
// 1. Un seul acteur : le contrôleur n'est modifié que par la tâche qui
//    consomme le channel de SessionEvent (pas de Mutex sur l'état)
// 2. Les appels réseau tournent dans des tâches tokio et renvoient leur
//    résultat par le même channel
// 3. Le timer est une tâche tokio annulée par JoinHandle::abort()
// 4. Chaque session de polling a un numéro de génération : les résultats
//    d'une génération précédente sont ignorés
// ============================================================================

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use crate::api::{Authenticator, QuoteSource};
use crate::calendar::BusinessCalendar;
use crate::error::ApiError;
use crate::models::{Quote, QuoteEnvelope};
use crate::storage::{KeyValueStore, TOKEN_KEY};

/// Message quand le jour n'est pas ouvré (aucun polling)
pub const NO_QUOTE_TODAY: &str = "Não há cotação para hoje (fim de semana ou feriado).";

/// Message quand l'API répond avec une enveloppe vide
pub const QUOTE_UNAVAILABLE: &str = "Cotação não disponível no momento.";

/// Intervalle de polling par défaut
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// États du contrôleur
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Pas de token : écran de login
    Unauthenticated,

    /// Requête de login en cours
    Authenticating,

    /// Token présent, avant la décision jour ouvré / non ouvré
    AuthenticatedIdle,

    /// Timer armé, cotação rafraîchie périodiquement
    Polling,

    /// Jour non ouvré : message fixe, pas de timer
    PollingError,
}

impl SessionState {
    /// Vrai si un token est (ou devrait être) présent
    pub fn is_authenticated(&self) -> bool {
        matches!(
            self,
            SessionState::AuthenticatedIdle | SessionState::Polling | SessionState::PollingError
        )
    }
}

/// Événements consommés par le contrôleur
///
/// CONCEPT RUST : Command pattern avec channels
/// - Commandes utilisateur (Login, Refresh, Logout)
/// - Ticks du timer
/// - Résultats des tâches réseau (LoginFinished, FetchFinished)
#[derive(Debug)]
pub enum SessionEvent {
    Login { username: String, password: String },
    Refresh,
    Logout,
    Tick { generation: u64 },
    LoginFinished(Result<String, ApiError>),
    FetchFinished {
        generation: u64,
        result: Result<QuoteEnvelope, ApiError>,
    },
}

/// Instantané en lecture seule pour le rendu
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SessionView<'a> {
    pub state: SessionState,
    pub quote: Option<&'a Quote>,
    pub error: Option<&'a str>,
    pub busy: bool,
}

/// Collaborateurs injectés dans le contrôleur
#[derive(Clone)]
pub struct SessionDeps {
    pub auth: Arc<dyn Authenticator>,
    pub quotes: Arc<dyn QuoteSource>,
    pub store: Arc<dyn KeyValueStore>,
    pub calendar: Arc<dyn BusinessCalendar>,
}

/// Contrôleur de session et de polling
pub struct SessionController {
    deps: SessionDeps,
    poll_interval: Duration,
    events_tx: mpsc::UnboundedSender<SessionEvent>,

    state: SessionState,
    token: Option<String>,
    quote: Option<Quote>,
    error: Option<String>,

    /// Un fetch est en vol : les ticks et refresh sont ignorés
    busy: bool,
    generation: u64,
    timer: Option<JoinHandle<()>>,
}

impl SessionController {
    /// Crée le contrôleur et le receiver de ses événements
    ///
    /// Le receiver doit être consommé par la boucle principale, qui appelle
    /// `handle()` pour chaque événement.
    pub fn new(
        deps: SessionDeps,
        poll_interval: Duration,
    ) -> (Self, mpsc::UnboundedReceiver<SessionEvent>) {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let controller = Self {
            deps,
            poll_interval,
            events_tx,
            state: SessionState::Unauthenticated,
            token: None,
            quote: None,
            error: None,
            busy: false,
            generation: 0,
            timer: None,
        };
        (controller, events_rx)
    }

    // ========================================================================
    // Accesseurs (lecture seule pour l'UI)
    // ========================================================================

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn quote(&self) -> Option<&Quote> {
        self.quote.as_ref()
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Vrai si un token est chargé en mémoire
    pub fn has_token(&self) -> bool {
        self.token.is_some()
    }

    pub fn is_busy(&self) -> bool {
        self.busy
    }

    pub fn is_timer_armed(&self) -> bool {
        self.timer.is_some()
    }

    pub fn view(&self) -> SessionView<'_> {
        SessionView {
            state: self.state,
            quote: self.quote.as_ref(),
            error: self.error.as_deref(),
            busy: self.busy,
        }
    }

    /// Sender pour injecter des commandes utilisateur
    pub fn sender(&self) -> mpsc::UnboundedSender<SessionEvent> {
        self.events_tx.clone()
    }

    // ========================================================================
    // Cycle de vie
    // ========================================================================

    /// Démarrage : charge le token stocké
    pub async fn start(&mut self) {
        match self.deps.store.get_item(TOKEN_KEY).await {
            Ok(Some(token)) if !token.is_empty() => {
                info!("Stored token found, resuming session");
                self.token = Some(token);
                self.enter_authenticated();
            }
            Ok(_) => {
                info!("No stored token, waiting for login");
                self.state = SessionState::Unauthenticated;
            }
            Err(e) => {
                error!(error = %e, "Failed to read stored token");
                self.state = SessionState::Unauthenticated;
                self.error = Some(e.to_string());
            }
        }
    }

    /// Arrêt du processus : annule le timer
    pub fn shutdown(&mut self) {
        self.cancel_timer();
        self.generation += 1;
        self.busy = false;
        debug!("Session controller shut down");
    }

    /// Traite un événement
    pub async fn handle(&mut self, event: SessionEvent) {
        match event {
            SessionEvent::Login { username, password } => self.submit_login(username, password),
            SessionEvent::LoginFinished(result) => self.on_login_finished(result).await,
            SessionEvent::Refresh => self.refresh(),
            SessionEvent::Logout => {
                info!("User logged out");
                self.deauthenticate(None).await;
            }
            SessionEvent::Tick { generation } => self.on_tick(generation),
            SessionEvent::FetchFinished { generation, result } => {
                self.on_fetch_finished(generation, result).await
            }
        }
    }

    // ========================================================================
    // Login
    // ========================================================================

    fn submit_login(&mut self, username: String, password: String) {
        if self.state != SessionState::Unauthenticated {
            debug!(state = ?self.state, "Login ignored in current state");
            return;
        }

        info!(username = %username, "Submitting credentials");
        self.state = SessionState::Authenticating;
        self.error = None;

        let auth = Arc::clone(&self.deps.auth);
        let tx = self.events_tx.clone();
        tokio::spawn(async move {
            let result = auth.login(&username, &password).await;
            let _ = tx.send(SessionEvent::LoginFinished(result));
        });
    }

    async fn on_login_finished(&mut self, result: Result<String, ApiError>) {
        if self.state != SessionState::Authenticating {
            // Logout pendant le login : le résultat n'a plus de destinataire
            debug!(state = ?self.state, "Stale login result discarded");
            return;
        }

        let token = match result {
            Ok(token) => token,
            Err(e) => {
                warn!(error = %e, "Login failed");
                self.state = SessionState::Unauthenticated;
                self.error = Some(e.to_string());
                return;
            }
        };

        if let Err(e) = self.deps.store.set_item(TOKEN_KEY, &token).await {
            error!(error = %e, "Failed to persist token");
            self.state = SessionState::Unauthenticated;
            self.error = Some(e.to_string());
            return;
        }

        info!("Token persisted");
        self.token = Some(token);
        self.enter_authenticated();
    }

    // ========================================================================
    // Polling
    // ========================================================================

    /// Entrée dans AuthenticatedIdle : décision jour ouvré, une seule fois
    fn enter_authenticated(&mut self) {
        self.state = SessionState::AuthenticatedIdle;
        self.quote = None;

        if !self.deps.calendar.is_working_day_today() {
            info!("Not a business day, polling disabled");
            self.state = SessionState::PollingError;
            self.error = Some(NO_QUOTE_TODAY.to_string());
            return;
        }

        self.error = None;
        self.generation += 1;
        self.state = SessionState::Polling;
        info!(
            generation = self.generation,
            interval_ms = self.poll_interval.as_millis() as u64,
            "Starting quote polling"
        );

        self.start_fetch();
        self.arm_timer();
    }

    /// Rafraîchissement manuel : un fetch immédiat, le timer continue
    fn refresh(&mut self) {
        if self.state != SessionState::Polling {
            debug!(state = ?self.state, "Refresh ignored outside polling");
            return;
        }
        if self.busy {
            debug!("Refresh ignored, fetch already in flight");
            return;
        }
        info!("Manual refresh");
        self.start_fetch();
    }

    fn on_tick(&mut self, generation: u64) {
        if generation != self.generation || self.state != SessionState::Polling {
            debug!(generation, current = self.generation, "Stale tick ignored");
            return;
        }
        if self.busy {
            debug!("Tick skipped, previous fetch still in flight");
            return;
        }
        self.start_fetch();
    }

    /// Lance un fetch dans une tâche tokio, avec le token de la session courante
    fn start_fetch(&mut self) {
        self.busy = true;

        let quotes = Arc::clone(&self.deps.quotes);
        let tx = self.events_tx.clone();
        let generation = self.generation;
        // Pas de token : le client répond MissingCredential sans requête
        let token = self.token.clone().unwrap_or_default();
        debug!(generation, "Fetching quote");

        tokio::spawn(async move {
            let result = quotes.get_quote(&token).await;
            let _ = tx.send(SessionEvent::FetchFinished { generation, result });
        });
    }

    async fn on_fetch_finished(&mut self, generation: u64, result: Result<QuoteEnvelope, ApiError>) {
        if generation != self.generation {
            // Fetch lancé avec un token qui n'est plus le token courant
            debug!(generation, current = self.generation, "Stale fetch result discarded");
            return;
        }
        self.busy = false;

        match result {
            Ok(envelope) => match envelope.into_first() {
                Some(quote) => {
                    debug!(buy = quote.buy, sell = quote.sell, "Quote updated");
                    self.quote = Some(quote);
                    self.error = None;
                }
                None => {
                    warn!("Quote envelope empty");
                    self.quote = None;
                    self.error = Some(QUOTE_UNAVAILABLE.to_string());
                }
            },
            Err(e) if e.is_authorization_expired() => {
                warn!("Authorization expired, logging out");
                self.deauthenticate(Some(e.to_string())).await;
            }
            Err(e) => {
                // Erreur passagère : le prochain tick réessaie
                warn!(error = %e, "Quote fetch failed");
                self.error = Some(e.to_string());
            }
        }
    }

    // ========================================================================
    // Timer
    // ========================================================================

    fn arm_timer(&mut self) {
        self.cancel_timer();

        let tx = self.events_tx.clone();
        let generation = self.generation;
        let period = self.poll_interval;

        self.timer = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            // Le premier tick est immédiat : le fetch initial est déjà parti
            ticker.tick().await;
            loop {
                ticker.tick().await;
                if tx.send(SessionEvent::Tick { generation }).is_err() {
                    break;
                }
            }
        }));
    }

    fn cancel_timer(&mut self) {
        if let Some(handle) = self.timer.take() {
            handle.abort();
            debug!("Polling timer cancelled");
        }
    }

    /// Retour à Unauthenticated : timer annulé, token effacé
    async fn deauthenticate(&mut self, message: Option<String>) {
        self.cancel_timer();
        self.generation += 1;
        self.busy = false;
        self.token = None;
        self.quote = None;
        self.state = SessionState::Unauthenticated;
        self.error = message;

        if let Err(e) = self.deps.store.remove_item(TOKEN_KEY).await {
            error!(error = %e, "Failed to clear stored token");
            self.error = Some(e.to_string());
        }
    }
}

impl Drop for SessionController {
    fn drop(&mut self) {
        self.cancel_timer();
    }
}

// ============================================================================
// Tests unitaires
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use async_trait::async_trait;
    use chrono::NaiveDate;

    use crate::error::LOGIN_FAILED_MESSAGE;
    use crate::storage::MemoryStore;

    // ------------------------------------------------------------------------
    // Faux collaborateurs
    // ------------------------------------------------------------------------

    struct FakeAuth {
        result: Mutex<Option<Result<String, ApiError>>>,
    }

    impl FakeAuth {
        fn ok(token: &str) -> Arc<Self> {
            Arc::new(Self {
                result: Mutex::new(Some(Ok(token.to_string()))),
            })
        }

        fn err(error: ApiError) -> Arc<Self> {
            Arc::new(Self {
                result: Mutex::new(Some(Err(error))),
            })
        }
    }

    #[async_trait]
    impl Authenticator for FakeAuth {
        async fn login(&self, username: &str, password: &str) -> Result<String, ApiError> {
            assert_eq!((username, password), ("admin", "12345"));
            self.result
                .lock()
                .unwrap()
                .take()
                .unwrap_or_else(|| Err(ApiError::Authentication(LOGIN_FAILED_MESSAGE.to_string())))
        }
    }

    /// Réponse scriptée du faux serveur de cotação
    enum Reply {
        Quote(QuoteEnvelope),
        Status(u16),
    }

    /// Se comporte comme QuoteClient : efface le token envoyé sur 401
    struct FakeQuotes {
        store: Arc<MemoryStore>,
        replies: Mutex<VecDeque<Reply>>,
        requests: AtomicUsize,
        tokens_seen: Mutex<Vec<String>>,
        delay: Duration,
    }

    impl FakeQuotes {
        fn new(store: Arc<MemoryStore>, replies: Vec<Reply>) -> Arc<Self> {
            Self::with_delay(store, replies, Duration::ZERO)
        }

        fn with_delay(store: Arc<MemoryStore>, replies: Vec<Reply>, delay: Duration) -> Arc<Self> {
            Arc::new(Self {
                store,
                replies: Mutex::new(replies.into()),
                requests: AtomicUsize::new(0),
                tokens_seen: Mutex::new(Vec::new()),
                delay,
            })
        }

        fn requests(&self) -> usize {
            self.requests.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl QuoteSource for FakeQuotes {
        async fn get_quote(&self, token: &str) -> Result<QuoteEnvelope, ApiError> {
            if token.is_empty() {
                return Err(ApiError::MissingCredential);
            }

            self.requests.fetch_add(1, Ordering::SeqCst);
            self.tokens_seen.lock().unwrap().push(token.to_string());
            // La réponse est choisie à l'envoi, dans l'ordre des requêtes
            let reply = self.replies.lock().unwrap().pop_front();
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }

            // Quand le script est épuisé, on renvoie la dernière cotação connue
            match reply {
                Some(Reply::Quote(envelope)) => Ok(envelope),
                Some(Reply::Status(401)) => {
                    self.store.remove_item_if(TOKEN_KEY, token).await?;
                    Err(ApiError::AuthorizationExpired)
                }
                Some(Reply::Status(status)) => Err(ApiError::Fetch { status }),
                None => Ok(sample_envelope()),
            }
        }
    }

    struct FixedCalendar(bool);

    impl BusinessCalendar for FixedCalendar {
        fn is_working_day(&self, _date: NaiveDate) -> bool {
            self.0
        }
    }

    // ------------------------------------------------------------------------
    // Helpers
    // ------------------------------------------------------------------------

    fn sample_quote() -> Quote {
        Quote::new(5.10, 5.15, "2024-01-02T10:00:00")
    }

    fn sample_envelope() -> QuoteEnvelope {
        QuoteEnvelope {
            value: vec![sample_quote()],
        }
    }

    fn controller(
        auth: Arc<FakeAuth>,
        quotes: Arc<FakeQuotes>,
        store: Arc<MemoryStore>,
        working_day: bool,
        interval: Duration,
    ) -> (SessionController, mpsc::UnboundedReceiver<SessionEvent>) {
        let deps = SessionDeps {
            auth,
            quotes,
            store,
            calendar: Arc::new(FixedCalendar(working_day)),
        };
        SessionController::new(deps, interval)
    }

    /// Traite les événements jusqu'à ce que `done` soit vrai
    async fn pump_until(
        ctrl: &mut SessionController,
        rx: &mut mpsc::UnboundedReceiver<SessionEvent>,
        done: impl Fn(&SessionController) -> bool,
    ) {
        while !done(ctrl) {
            let event = tokio::time::timeout(Duration::from_secs(2), rx.recv())
                .await
                .expect("timed out waiting for session event")
                .expect("channel closed");
            ctrl.handle(event).await;
        }
    }

    /// Traite tout ce qui arrive pendant `duration`
    async fn pump_for(
        ctrl: &mut SessionController,
        rx: &mut mpsc::UnboundedReceiver<SessionEvent>,
        duration: Duration,
    ) {
        let deadline = tokio::time::Instant::now() + duration;
        while let Ok(Some(event)) = tokio::time::timeout_at(deadline, rx.recv()).await {
            ctrl.handle(event).await;
        }
    }

    const LONG: Duration = Duration::from_secs(3600);
    const SHORT: Duration = Duration::from_millis(20);

    // ------------------------------------------------------------------------
    // Démarrage
    // ------------------------------------------------------------------------

    #[tokio::test]
    async fn test_demarrage_sans_token() {
        let store = Arc::new(MemoryStore::new());
        let quotes = FakeQuotes::new(store.clone(), vec![]);
        let (mut ctrl, _rx) = controller(FakeAuth::ok("abc123"), quotes.clone(), store, true, LONG);

        ctrl.start().await;

        assert_eq!(ctrl.state(), SessionState::Unauthenticated);
        assert!(!ctrl.is_timer_armed());
        assert_eq!(quotes.requests(), 0);
    }

    #[tokio::test]
    async fn test_demarrage_avec_token_reprend_le_polling() {
        let store = Arc::new(MemoryStore::with_token("saved"));
        let quotes = FakeQuotes::new(store.clone(), vec![]);
        let (mut ctrl, mut rx) = controller(FakeAuth::ok("x"), quotes.clone(), store, true, LONG);

        ctrl.start().await;
        assert_eq!(ctrl.state(), SessionState::Polling);
        assert!(ctrl.is_timer_armed());
        assert!(ctrl.is_busy());

        pump_until(&mut ctrl, &mut rx, |c| c.quote().is_some()).await;
        assert_eq!(quotes.tokens_seen.lock().unwrap().as_slice(), ["saved"]);
    }

    // ------------------------------------------------------------------------
    // Login
    // ------------------------------------------------------------------------

    #[tokio::test]
    async fn test_scenario_login_puis_cotacao() {
        let store = Arc::new(MemoryStore::new());
        let quotes = FakeQuotes::new(store.clone(), vec![Reply::Quote(sample_envelope())]);
        let (mut ctrl, mut rx) =
            controller(FakeAuth::ok("abc123"), quotes.clone(), store.clone(), true, LONG);
        ctrl.start().await;

        ctrl.handle(SessionEvent::Login {
            username: "admin".to_string(),
            password: "12345".to_string(),
        })
        .await;
        assert_eq!(ctrl.state(), SessionState::Authenticating);

        pump_until(&mut ctrl, &mut rx, |c| c.quote().is_some()).await;

        assert_eq!(ctrl.state(), SessionState::Polling);
        assert!(ctrl.has_token());
        assert_eq!(ctrl.quote(), Some(&sample_quote()));
        assert_eq!(ctrl.error(), None);
        assert_eq!(store.get_item(TOKEN_KEY).await.unwrap().as_deref(), Some("abc123"));
        assert_eq!(quotes.tokens_seen.lock().unwrap().as_slice(), ["abc123"]);
    }

    #[tokio::test]
    async fn test_login_refuse() {
        let store = Arc::new(MemoryStore::new());
        let quotes = FakeQuotes::new(store.clone(), vec![]);
        let auth = FakeAuth::err(ApiError::Authentication(LOGIN_FAILED_MESSAGE.to_string()));
        let (mut ctrl, mut rx) = controller(auth, quotes.clone(), store.clone(), true, LONG);
        ctrl.start().await;

        ctrl.handle(SessionEvent::Login {
            username: "admin".to_string(),
            password: "12345".to_string(),
        })
        .await;
        pump_until(&mut ctrl, &mut rx, |c| c.state() != SessionState::Authenticating).await;

        assert_eq!(ctrl.state(), SessionState::Unauthenticated);
        assert_eq!(ctrl.error(), Some(LOGIN_FAILED_MESSAGE));
        assert_eq!(store.get_item(TOKEN_KEY).await.unwrap(), None);
        assert_eq!(quotes.requests(), 0);
    }

    #[tokio::test]
    async fn test_login_sans_token_rien_n_est_persiste() {
        let store = Arc::new(MemoryStore::new());
        let quotes = FakeQuotes::new(store.clone(), vec![]);
        let auth = FakeAuth::err(ApiError::MalformedResponse("token ausente".to_string()));
        let (mut ctrl, mut rx) = controller(auth, quotes, store.clone(), true, LONG);
        ctrl.start().await;

        ctrl.handle(SessionEvent::Login {
            username: "admin".to_string(),
            password: "12345".to_string(),
        })
        .await;
        pump_until(&mut ctrl, &mut rx, |c| c.state() != SessionState::Authenticating).await;

        assert_eq!(ctrl.state(), SessionState::Unauthenticated);
        assert!(ctrl.error().is_some());
        assert_eq!(store.get_item(TOKEN_KEY).await.unwrap(), None);
    }

    // ------------------------------------------------------------------------
    // Jour non ouvré
    // ------------------------------------------------------------------------

    #[tokio::test]
    async fn test_jour_non_ouvre_pas_de_polling() {
        let store = Arc::new(MemoryStore::with_token("abc123"));
        let quotes = FakeQuotes::new(store.clone(), vec![]);
        let (mut ctrl, mut rx) = controller(FakeAuth::ok("x"), quotes.clone(), store, false, SHORT);

        ctrl.start().await;
        pump_for(&mut ctrl, &mut rx, Duration::from_millis(100)).await;

        assert_eq!(ctrl.state(), SessionState::PollingError);
        assert_eq!(ctrl.error(), Some(NO_QUOTE_TODAY));
        assert!(!ctrl.is_timer_armed());
        assert_eq!(quotes.requests(), 0);

        // Pas de refresh manuel hors Polling
        ctrl.handle(SessionEvent::Refresh).await;
        pump_for(&mut ctrl, &mut rx, Duration::from_millis(50)).await;
        assert_eq!(quotes.requests(), 0);
    }

    // ------------------------------------------------------------------------
    // Erreurs de fetch
    // ------------------------------------------------------------------------

    #[tokio::test]
    async fn test_401_deconnecte_et_arrete_le_timer() {
        let store = Arc::new(MemoryStore::with_token("abc123"));
        let quotes = FakeQuotes::new(
            store.clone(),
            vec![Reply::Quote(sample_envelope()), Reply::Status(401)],
        );
        let (mut ctrl, mut rx) = controller(FakeAuth::ok("x"), quotes.clone(), store.clone(), true, SHORT);

        ctrl.start().await;
        pump_until(&mut ctrl, &mut rx, |c| c.state() == SessionState::Unauthenticated).await;

        assert_eq!(store.get_item(TOKEN_KEY).await.unwrap(), None);
        assert!(!ctrl.is_timer_armed());
        assert!(ctrl.quote().is_none());
        assert!(ctrl.error().is_some());

        // Plus aucun fetch après ce point
        let requests = quotes.requests();
        assert_eq!(requests, 2);
        pump_for(&mut ctrl, &mut rx, SHORT * 5).await;
        assert_eq!(quotes.requests(), requests);
        assert_eq!(ctrl.state(), SessionState::Unauthenticated);
    }

    #[tokio::test]
    async fn test_erreur_passagere_le_polling_continue() {
        let store = Arc::new(MemoryStore::with_token("abc123"));
        let quotes = FakeQuotes::new(store.clone(), vec![Reply::Status(500)]);
        let (mut ctrl, mut rx) = controller(FakeAuth::ok("x"), quotes.clone(), store, true, SHORT);

        ctrl.start().await;
        pump_until(&mut ctrl, &mut rx, |c| c.error().is_some()).await;
        assert_eq!(ctrl.error(), Some("Falha ao buscar dados da API. Status: 500"));
        assert_eq!(ctrl.state(), SessionState::Polling);
        assert!(ctrl.is_timer_armed());

        // Le tick suivant réussit et efface l'erreur
        pump_until(&mut ctrl, &mut rx, |c| c.quote().is_some()).await;
        assert_eq!(ctrl.error(), None);
        assert!(quotes.requests() >= 2);
    }

    #[tokio::test]
    async fn test_enveloppe_vide() {
        let store = Arc::new(MemoryStore::with_token("abc123"));
        let quotes = FakeQuotes::new(store.clone(), vec![Reply::Quote(QuoteEnvelope::default())]);
        let (mut ctrl, mut rx) = controller(FakeAuth::ok("x"), quotes, store, true, LONG);

        ctrl.start().await;
        pump_until(&mut ctrl, &mut rx, |c| !c.is_busy()).await;

        assert_eq!(ctrl.state(), SessionState::Polling);
        assert!(ctrl.quote().is_none());
        assert_eq!(ctrl.error(), Some(QUOTE_UNAVAILABLE));
    }

    // ------------------------------------------------------------------------
    // Logout, refresh, busy flag
    // ------------------------------------------------------------------------

    #[tokio::test]
    async fn test_logout() {
        let store = Arc::new(MemoryStore::with_token("abc123"));
        let quotes = FakeQuotes::new(store.clone(), vec![]);
        let (mut ctrl, mut rx) = controller(FakeAuth::ok("x"), quotes.clone(), store.clone(), true, SHORT);

        ctrl.start().await;
        pump_until(&mut ctrl, &mut rx, |c| c.quote().is_some()).await;

        ctrl.handle(SessionEvent::Logout).await;
        assert_eq!(ctrl.state(), SessionState::Unauthenticated);
        assert!(!ctrl.has_token());
        assert!(!ctrl.is_timer_armed());
        assert!(ctrl.quote().is_none());
        assert_eq!(ctrl.error(), None);
        assert_eq!(store.get_item(TOKEN_KEY).await.unwrap(), None);

        let requests = quotes.requests();
        pump_for(&mut ctrl, &mut rx, SHORT * 5).await;
        assert_eq!(quotes.requests(), requests);
    }

    #[tokio::test(start_paused = true)]
    async fn test_refresh_manuel_garde_la_cadence_du_timer() {
        let period = Duration::from_secs(10);
        let store = Arc::new(MemoryStore::with_token("abc123"));
        let quotes = FakeQuotes::new(store.clone(), vec![]);
        let (mut ctrl, mut rx) = controller(FakeAuth::ok("x"), quotes.clone(), store, true, period);

        let started = tokio::time::Instant::now();
        ctrl.start().await;
        pump_until(&mut ctrl, &mut rx, |c| !c.is_busy()).await;
        assert_eq!(quotes.requests(), 1);

        // Refresh à 6 s : fetch immédiat
        tokio::time::sleep(Duration::from_secs(6)).await;
        ctrl.handle(SessionEvent::Refresh).await;
        assert!(ctrl.is_busy());
        pump_until(&mut ctrl, &mut rx, |c| !c.is_busy()).await;
        assert_eq!(quotes.requests(), 2);
        assert!(ctrl.is_timer_armed());

        // Le tick suivant tombe à 10 s du démarrage, pas à 10 s du refresh
        let event = rx.recv().await.expect("channel closed");
        assert!(matches!(event, SessionEvent::Tick { .. }));
        let elapsed = started.elapsed();
        assert!(elapsed >= period && elapsed < period + Duration::from_secs(1), "{:?}", elapsed);

        ctrl.handle(event).await;
        pump_until(&mut ctrl, &mut rx, |c| !c.is_busy()).await;
        assert_eq!(quotes.requests(), 3);
    }

    #[tokio::test]
    async fn test_ticks_ignores_pendant_un_fetch() {
        let store = Arc::new(MemoryStore::with_token("abc123"));
        let quotes = FakeQuotes::with_delay(store.clone(), vec![], Duration::from_millis(200));
        let (mut ctrl, mut rx) = controller(FakeAuth::ok("x"), quotes.clone(), store, true, SHORT);

        ctrl.start().await;
        // Plusieurs ticks arrivent pendant que le premier fetch dort
        pump_for(&mut ctrl, &mut rx, Duration::from_millis(100)).await;
        assert!(ctrl.is_busy());
        assert_eq!(quotes.requests(), 1);

        ctrl.handle(SessionEvent::Refresh).await;
        tokio::task::yield_now().await;
        assert_eq!(quotes.requests(), 1);

        pump_until(&mut ctrl, &mut rx, |c| c.quote().is_some()).await;
    }

    #[tokio::test]
    async fn test_resultat_perime_apres_logout() {
        let store = Arc::new(MemoryStore::with_token("abc123"));
        let quotes = FakeQuotes::with_delay(store.clone(), vec![], Duration::from_millis(50));
        let (mut ctrl, mut rx) = controller(FakeAuth::ok("x"), quotes, store, true, LONG);

        ctrl.start().await;
        ctrl.handle(SessionEvent::Logout).await;

        // Le FetchFinished de l'ancienne génération arrive quand même
        pump_for(&mut ctrl, &mut rx, Duration::from_millis(150)).await;
        assert_eq!(ctrl.state(), SessionState::Unauthenticated);
        assert!(ctrl.quote().is_none());
    }

    #[tokio::test]
    async fn test_401_tardif_n_efface_pas_le_nouveau_token() {
        // Le fetch lancé avec "old" reçoit son 401 après logout puis re-login
        let store = Arc::new(MemoryStore::with_token("old"));
        let quotes = FakeQuotes::with_delay(
            store.clone(),
            vec![Reply::Status(401)],
            Duration::from_millis(200),
        );
        let (mut ctrl, mut rx) =
            controller(FakeAuth::ok("new"), quotes.clone(), store.clone(), true, LONG);

        ctrl.start().await;
        assert!(ctrl.is_busy());
        ctrl.handle(SessionEvent::Logout).await;

        ctrl.handle(SessionEvent::Login {
            username: "admin".to_string(),
            password: "12345".to_string(),
        })
        .await;
        pump_until(&mut ctrl, &mut rx, |c| c.state() == SessionState::Polling).await;
        assert_eq!(store.get_item(TOKEN_KEY).await.unwrap().as_deref(), Some("new"));

        // Le 401 de "old" puis la cotação de "new" arrivent
        pump_until(&mut ctrl, &mut rx, |c| c.quote().is_some()).await;
        pump_for(&mut ctrl, &mut rx, Duration::from_millis(50)).await;

        assert_eq!(quotes.tokens_seen.lock().unwrap().as_slice(), ["old", "new"]);
        assert_eq!(store.get_item(TOKEN_KEY).await.unwrap().as_deref(), Some("new"));
        assert_eq!(ctrl.state(), SessionState::Polling);
        assert!(ctrl.has_token());
        assert!(ctrl.is_timer_armed());
        assert_eq!(ctrl.error(), None);
    }

    #[tokio::test]
    async fn test_fetch_sans_token_aucune_requete() {
        let store = Arc::new(MemoryStore::new());
        let quotes = FakeQuotes::new(store.clone(), vec![]);
        let (mut ctrl, mut rx) = controller(FakeAuth::ok("x"), quotes.clone(), store, true, LONG);

        // Polling forcé sans token chargé
        ctrl.state = SessionState::Polling;
        ctrl.handle(SessionEvent::Refresh).await;
        pump_until(&mut ctrl, &mut rx, |c| !c.is_busy()).await;

        assert_eq!(quotes.requests(), 0);
        assert_eq!(ctrl.error(), Some("Nenhum token de autenticação encontrado."));
        assert_eq!(ctrl.state(), SessionState::Polling);
    }

    #[tokio::test]
    async fn test_shutdown_annule_le_timer() {
        let store = Arc::new(MemoryStore::with_token("abc123"));
        let quotes = FakeQuotes::new(store.clone(), vec![]);
        let (mut ctrl, mut rx) = controller(FakeAuth::ok("x"), quotes.clone(), store, true, SHORT);

        ctrl.start().await;
        ctrl.shutdown();
        assert!(!ctrl.is_timer_armed());

        pump_for(&mut ctrl, &mut rx, SHORT * 5).await;
        assert_eq!(quotes.requests(), 1);
    }
}
