//! Application state management for the fxconvert terminal UI
//!
//! This module holds the converter form, handles keyboard input and records
//! which network action the main loop should run next. It never talks to the
//! network itself, which keeps key handling synchronous and testable.

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

use fxconvert::cache::CacheInfo;
use fxconvert::cli::StartupConfig;
use fxconvert::data::{format_amount, ConversionRequest, ConversionResult, FetchError, HistoricalRate};
use fxconvert::engine::{swap, ConvertError};

/// Days of history requested for the history panel
pub const HISTORY_DAYS: u32 = 7;

/// Application state enum representing the current view
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppState {
    /// Initial loading state while the first conversion runs
    Loading,
    /// The converter form
    Form,
}

/// Form field that receives keyboard input
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    From,
    To,
    Amount,
}

impl Field {
    fn next(self) -> Self {
        match self {
            Field::From => Field::To,
            Field::To => Field::Amount,
            Field::Amount => Field::From,
        }
    }

    fn previous(self) -> Self {
        match self {
            Field::From => Field::Amount,
            Field::To => Field::From,
            Field::Amount => Field::To,
        }
    }
}

/// Network work requested by the UI, executed by the main loop
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    Convert(ConversionRequest),
    History { from: String, to: String },
}

/// Severity of the status line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusKind {
    Info,
    Warning,
    Error,
}

/// Message shown below the form
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusMessage {
    pub kind: StatusKind,
    pub text: String,
}

impl StatusMessage {
    fn new(kind: StatusKind, text: impl Into<String>) -> Self {
        Self {
            kind,
            text: text.into(),
        }
    }
}

/// Main application struct managing state and data
pub struct App {
    /// Current application state/view
    pub state: AppState,
    /// Currency codes offered in the selectors
    pub currencies: Vec<String>,
    /// Selected source currency
    pub from: String,
    /// Selected target currency
    pub to: String,
    /// Raw text of the amount field
    pub amount_input: String,
    /// Field receiving input
    pub focus: Field,
    /// Last successful conversion
    pub result: Option<ConversionResult>,
    /// Status line below the form
    pub status: Option<StatusMessage>,
    /// Whether the history panel is visible
    pub show_history: bool,
    /// Daily rates for the history panel
    pub history: Option<Vec<HistoricalRate>>,
    /// Cache summary for the footer
    pub cache_info: Option<CacheInfo>,
    /// Flag indicating a network action is running
    pub busy: bool,
    /// Flag to show help overlay
    pub show_help: bool,
    /// Flag indicating the application should quit
    pub should_quit: bool,
    /// Action waiting for the main loop
    pending: Option<Action>,
}

impl App {
    /// Creates a new App pre-filled from the startup configuration
    pub fn new(startup: &StartupConfig) -> Self {
        Self {
            state: AppState::Loading,
            currencies: Vec::new(),
            from: startup.from.clone(),
            to: startup.to.clone(),
            amount_input: format_amount(startup.amount),
            focus: Field::Amount,
            result: None,
            status: None,
            show_history: false,
            history: None,
            cache_info: None,
            busy: false,
            show_help: false,
            should_quit: false,
            pending: None,
        }
    }

    /// Replaces the selectable currencies, keeping the current selection
    pub fn set_currencies(&mut self, mut currencies: Vec<String>) {
        for code in [&self.from, &self.to] {
            if !currencies.contains(code) {
                currencies.push(code.clone());
            }
        }
        currencies.sort();
        currencies.dedup();
        self.currencies = currencies;
    }

    /// Parses the amount field
    pub fn amount(&self) -> Option<f64> {
        self.amount_input
            .parse::<f64>()
            .ok()
            .filter(|a| a.is_finite() && *a > 0.0)
    }

    /// Builds a request from the form, or sets an error status
    fn build_request(&mut self) -> Option<ConversionRequest> {
        match self.amount() {
            Some(amount) => Some(ConversionRequest::new(&self.from, &self.to, amount)),
            None => {
                self.status = Some(StatusMessage::new(
                    StatusKind::Error,
                    "Enter an amount greater than zero",
                ));
                None
            }
        }
    }

    /// Queues a conversion of the current form
    pub fn request_conversion(&mut self) {
        if let Some(request) = self.build_request() {
            self.pending = Some(Action::Convert(request));
        }
    }

    /// Takes the next action for the main loop to run
    pub fn take_action(&mut self) -> Option<Action> {
        self.pending.take()
    }

    /// Exchanges source and target and converts again
    pub fn swap_currencies(&mut self) {
        let request = ConversionRequest::new(&self.from, &self.to, self.amount().unwrap_or(0.0));
        let swapped = swap(&request);
        self.from = swapped.from;
        self.to = swapped.to;
        self.result = None;
        // Refetched once the conversion completes
        self.history = None;

        self.request_conversion();
    }

    /// Records the outcome of a conversion
    pub fn apply_conversion(&mut self, outcome: Result<ConversionResult, ConvertError>) {
        self.state = AppState::Form;

        match outcome {
            Ok(result) => {
                self.status = if let Some(warning) = &result.storage_warning {
                    Some(StatusMessage::new(
                        StatusKind::Warning,
                        format!("Rates could not be cached: {}", warning),
                    ))
                } else if result.is_fallback() {
                    Some(StatusMessage::new(
                        StatusKind::Warning,
                        "This rate may not be current: the rate provider is unavailable",
                    ))
                } else {
                    None
                };
                self.result = Some(result);

                if self.show_history && self.history.is_none() {
                    self.request_history();
                }
            }
            Err(e) => {
                self.result = None;
                self.status = Some(StatusMessage::new(
                    StatusKind::Error,
                    format!("Conversion failed: {}", e),
                ));
            }
        }
    }

    /// Records the outcome of a history request
    pub fn apply_history(&mut self, outcome: Result<Vec<HistoricalRate>, FetchError>) {
        match outcome {
            Ok(history) => self.history = Some(history),
            Err(_) => {
                self.history = Some(Vec::new());
                self.status = Some(StatusMessage::new(
                    StatusKind::Info,
                    "Historical data not available at the moment",
                ));
            }
        }
    }

    fn request_history(&mut self) {
        if self.from == self.to {
            self.history = Some(Vec::new());
            return;
        }
        self.pending = Some(Action::History {
            from: self.from.clone(),
            to: self.to.clone(),
        });
    }

    fn toggle_history(&mut self) {
        self.show_history = !self.show_history;
        if self.show_history && self.history.is_none() {
            self.request_history();
        }
    }

    /// Moves the focused currency selector by `step` entries
    fn cycle_currency(&mut self, step: isize) {
        if self.currencies.is_empty() {
            return;
        }
        let selected = match self.focus {
            Field::From => &mut self.from,
            Field::To => &mut self.to,
            Field::Amount => return,
        };

        let len = self.currencies.len() as isize;
        let current = self
            .currencies
            .iter()
            .position(|c| c == selected)
            .map_or(0, |i| i as isize);
        let next = (current + step).rem_euclid(len) as usize;
        *selected = self.currencies[next].clone();

        self.result = None;
        self.history = None;
    }

    fn edit_amount(&mut self, c: char) {
        match c {
            '0'..='9' => self.amount_input.push(c),
            '.' if !self.amount_input.contains('.') => {
                if self.amount_input.is_empty() {
                    self.amount_input.push('0');
                }
                self.amount_input.push('.');
            }
            _ => {}
        }
    }

    /// Handles keyboard input and updates state accordingly
    ///
    /// # Key Bindings
    /// - `q`, `Esc` or `Ctrl-C`: Quit the application
    /// - `Tab`/`Shift-Tab`: Move focus between fields
    /// - `Up`/`k`, `Down`/`j`: Change the focused currency
    /// - `0`-`9`, `.`, `Backspace`: Edit the amount
    /// - `Enter`, `r`: Convert
    /// - `s`: Swap currencies
    /// - `h`: Toggle the history panel
    /// - `?`: Toggle help
    pub fn handle_key(&mut self, key_event: KeyEvent) {
        // Handle help overlay - intercepts all keys when shown
        if self.show_help {
            match key_event.code {
                KeyCode::Esc | KeyCode::Char('?') | KeyCode::Char('q') => {
                    self.show_help = false;
                }
                _ => {}
            }
            return;
        }

        if key_event.modifiers.contains(KeyModifiers::CONTROL)
            && key_event.code == KeyCode::Char('c')
        {
            self.should_quit = true;
            return;
        }

        if self.state == AppState::Loading {
            if key_event.code == KeyCode::Char('q') {
                self.should_quit = true;
            }
            return;
        }

        match key_event.code {
            KeyCode::Char('q') | KeyCode::Esc => {
                self.should_quit = true;
            }
            KeyCode::Tab => {
                self.focus = self.focus.next();
            }
            KeyCode::BackTab => {
                self.focus = self.focus.previous();
            }
            KeyCode::Up | KeyCode::Char('k') => {
                self.cycle_currency(-1);
            }
            KeyCode::Down | KeyCode::Char('j') => {
                self.cycle_currency(1);
            }
            KeyCode::Enter | KeyCode::Char('r') => {
                self.request_conversion();
            }
            KeyCode::Char('s') => {
                self.swap_currencies();
            }
            KeyCode::Char('h') => {
                self.toggle_history();
            }
            KeyCode::Char('?') => {
                self.show_help = true;
            }
            KeyCode::Backspace if self.focus == Field::Amount => {
                self.amount_input.pop();
            }
            KeyCode::Char(c) if self.focus == Field::Amount => {
                self.edit_amount(c);
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, Utc};
    use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
    use fxconvert::data::Provenance;

    /// Helper to create a KeyEvent for testing
    fn key_event(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn ready_app() -> App {
        let mut app = App::new(&StartupConfig::default());
        app.state = AppState::Form;
        app.set_currencies(vec!["EUR".into(), "GBP".into(), "USD".into()]);
        app
    }

    fn live_result(from: &str, to: &str, amount: f64, rate: f64) -> ConversionResult {
        ConversionResult {
            request: ConversionRequest::new(from, to, amount),
            converted: amount * rate,
            rate,
            provenance: Provenance::Live,
            rates_date: None,
            storage_warning: None,
        }
    }

    #[test]
    fn test_new_app_uses_startup_config() {
        let app = App::new(&StartupConfig {
            from: "GBP".into(),
            to: "JPY".into(),
            amount: 12.5,
        });

        assert_eq!(app.state, AppState::Loading);
        assert_eq!(app.from, "GBP");
        assert_eq!(app.to, "JPY");
        assert_eq!(app.amount_input, "12.50");
        assert_eq!(app.focus, Field::Amount);
    }

    #[test]
    fn test_set_currencies_keeps_selection() {
        let mut app = App::new(&StartupConfig {
            from: "XAU".into(),
            to: "EUR".into(),
            amount: 1.0,
        });
        app.set_currencies(vec!["USD".into(), "EUR".into()]);

        assert_eq!(app.currencies, vec!["EUR", "USD", "XAU"]);
    }

    #[test]
    fn test_enter_queues_conversion() {
        let mut app = ready_app();
        app.handle_key(key_event(KeyCode::Enter));

        assert_eq!(
            app.take_action(),
            Some(Action::Convert(ConversionRequest::new("USD", "EUR", 1.0)))
        );
        assert!(app.take_action().is_none());
    }

    #[test]
    fn test_invalid_amount_sets_error_status() {
        let mut app = ready_app();
        app.amount_input.clear();

        app.handle_key(key_event(KeyCode::Enter));

        assert!(app.take_action().is_none());
        assert_eq!(app.status.as_ref().unwrap().kind, StatusKind::Error);
    }

    #[test]
    fn test_amount_editing() {
        let mut app = ready_app();
        app.amount_input.clear();

        for c in ['1', '2', '.', '5', '.', 'x', '0'] {
            app.handle_key(key_event(KeyCode::Char(c)));
        }
        assert_eq!(app.amount_input, "12.50");

        app.handle_key(key_event(KeyCode::Backspace));
        assert_eq!(app.amount_input, "12.5");
        assert_eq!(app.amount(), Some(12.5));
    }

    #[test]
    fn test_leading_dot_gets_zero() {
        let mut app = ready_app();
        app.amount_input.clear();

        app.handle_key(key_event(KeyCode::Char('.')));
        app.handle_key(key_event(KeyCode::Char('5')));

        assert_eq!(app.amount_input, "0.5");
    }

    #[test]
    fn test_tab_cycles_focus() {
        let mut app = ready_app();
        assert_eq!(app.focus, Field::Amount);

        app.handle_key(key_event(KeyCode::Tab));
        assert_eq!(app.focus, Field::From);
        app.handle_key(key_event(KeyCode::Tab));
        assert_eq!(app.focus, Field::To);
        app.handle_key(key_event(KeyCode::BackTab));
        assert_eq!(app.focus, Field::From);
    }

    #[test]
    fn test_currency_cycling_wraps() {
        let mut app = ready_app();
        app.focus = Field::From;

        app.handle_key(key_event(KeyCode::Down));
        assert_eq!(app.from, "EUR", "USD is last, so Down wraps to EUR");

        app.handle_key(key_event(KeyCode::Up));
        assert_eq!(app.from, "USD");

        app.handle_key(key_event(KeyCode::Char('k')));
        assert_eq!(app.from, "GBP");
    }

    #[test]
    fn test_currency_keys_ignored_on_amount_field() {
        let mut app = ready_app();
        app.handle_key(key_event(KeyCode::Down));

        assert_eq!(app.from, "USD");
        assert_eq!(app.to, "EUR");
    }

    #[test]
    fn test_swap_exchanges_currencies_and_converts() {
        let mut app = ready_app();
        app.result = Some(live_result("USD", "EUR", 1.0, 0.9));

        app.handle_key(key_event(KeyCode::Char('s')));

        assert_eq!(app.from, "EUR");
        assert_eq!(app.to, "USD");
        assert!(app.result.is_none());
        assert_eq!(
            app.take_action(),
            Some(Action::Convert(ConversionRequest::new("EUR", "USD", 1.0)))
        );
    }

    #[test]
    fn test_double_swap_restores_selection() {
        let mut app = ready_app();
        app.handle_key(key_event(KeyCode::Char('s')));
        app.handle_key(key_event(KeyCode::Char('s')));

        assert_eq!(app.from, "USD");
        assert_eq!(app.to, "EUR");
    }

    #[test]
    fn test_apply_live_result() {
        let mut app = App::new(&StartupConfig::default());
        app.apply_conversion(Ok(live_result("USD", "EUR", 100.0, 0.9)));

        assert_eq!(app.state, AppState::Form);
        assert!(app.result.is_some());
        assert!(app.status.is_none());
    }

    #[test]
    fn test_apply_fallback_result_warns() {
        let mut app = ready_app();
        let mut result = live_result("USD", "EUR", 100.0, 0.9);
        result.provenance = Provenance::Fallback {
            captured_at: Utc::now(),
        };

        app.apply_conversion(Ok(result));

        let status = app.status.unwrap();
        assert_eq!(status.kind, StatusKind::Warning);
        assert!(status.text.contains("may not be current"));
    }

    #[test]
    fn test_apply_storage_warning() {
        let mut app = ready_app();
        let mut result = live_result("USD", "EUR", 100.0, 0.9);
        result.storage_warning = Some("disk full".to_string());

        app.apply_conversion(Ok(result));

        assert!(app.result.is_some());
        assert!(app.status.unwrap().text.contains("disk full"));
    }

    #[test]
    fn test_apply_error_shows_message() {
        let mut app = ready_app();
        app.apply_conversion(Err(ConvertError::NoRatesAvailable("offline".into())));

        assert!(app.result.is_none());
        let status = app.status.unwrap();
        assert_eq!(status.kind, StatusKind::Error);
        assert!(status.text.contains("No exchange rates available"));
    }

    #[test]
    fn test_history_toggle_requests_history() {
        let mut app = ready_app();
        app.handle_key(key_event(KeyCode::Char('h')));

        assert!(app.show_history);
        assert_eq!(
            app.take_action(),
            Some(Action::History {
                from: "USD".into(),
                to: "EUR".into()
            })
        );

        app.apply_history(Ok(vec![HistoricalRate {
            date: NaiveDate::from_ymd_opt(2024, 7, 15).unwrap(),
            rate: 0.92,
        }]));
        assert_eq!(app.history.as_ref().unwrap().len(), 1);

        app.handle_key(key_event(KeyCode::Char('h')));
        assert!(!app.show_history);
        assert!(app.take_action().is_none());
    }

    #[test]
    fn test_history_follows_conversion_after_swap() {
        let mut app = ready_app();
        app.show_history = true;
        app.history = Some(Vec::new());

        app.handle_key(key_event(KeyCode::Char('s')));
        assert!(matches!(app.take_action(), Some(Action::Convert(_))));

        app.apply_conversion(Ok(live_result("EUR", "USD", 1.0, 1.1)));
        assert_eq!(
            app.take_action(),
            Some(Action::History {
                from: "EUR".into(),
                to: "USD".into()
            })
        );
    }

    #[test]
    fn test_history_failure_sets_info_status() {
        let mut app = ready_app();
        app.apply_history(Err(FetchError::Malformed("none".into())));

        assert_eq!(app.history, Some(Vec::new()));
        assert_eq!(app.status.unwrap().kind, StatusKind::Info);
    }

    #[test]
    fn test_help_overlay_intercepts_keys() {
        let mut app = ready_app();
        app.handle_key(key_event(KeyCode::Char('?')));
        assert!(app.show_help);

        app.handle_key(key_event(KeyCode::Enter));
        assert!(app.take_action().is_none());

        app.handle_key(key_event(KeyCode::Esc));
        assert!(!app.show_help);
        assert!(!app.should_quit);
    }

    #[test]
    fn test_quit_keys() {
        let mut app = ready_app();
        app.handle_key(key_event(KeyCode::Char('q')));
        assert!(app.should_quit);

        let mut app = ready_app();
        app.handle_key(KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL));
        assert!(app.should_quit);
    }

    #[test]
    fn test_loading_only_allows_quit() {
        let mut app = App::new(&StartupConfig::default());
        app.handle_key(key_event(KeyCode::Enter));
        assert!(app.take_action().is_none());

        app.handle_key(key_event(KeyCode::Char('q')));
        assert!(app.should_quit);
    }
}
