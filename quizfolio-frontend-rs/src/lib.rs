pub mod auth;
pub mod export;
pub mod history;
pub mod portfolio;
pub mod repository;
pub mod session;
mod utils;

use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::sync::LazyLock;

use chrono::Utc;
use rand::Rng;
use serde::{Deserialize, Serialize};
use wasm_bindgen::prelude::*;

use exam_utils::account::CurrentUser;
use exam_utils::import::{ImportReport, QuestionDraft};
use exam_utils::{FileType, ImportBatch, Question, QuestionId, UserAnswer};
use satchel::{StorageBackend, StorageError, Table};

pub use crate::auth::{Accounts, AuthError};
pub use crate::export::{ExportError, Snapshot};
pub use crate::history::{AnswerHistory, HistorySummary};
pub use crate::portfolio::{HeatmapCell, PortfolioAggregator, PortfolioRow};
pub use crate::repository::{
    BatchMeta, QuestionRepository, QuestionTable, RepositoryError, RepositoryStats, SessionFilter,
};
pub use crate::session::{
    Advanced, QuizSession, ReviewItem, ScoreSummary, SessionError, SessionPhase,
};

pub const SESSION_KEY: &str = "quizfolio.active_session";

// putting this inside LOGGER prevents us from accidentally initializing the logger more than once
#[allow(clippy::declare_interior_mutable_const)]
const LOGGER: LazyLock<()> = LazyLock::new(|| {
    utils::set_panic_hook();

    wasm_logger::init(wasm_logger::Config::default());
    log::info!("Logging initialized");
});

#[derive(Debug, thiserror::Error)]
pub enum TrainerError {
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error(transparent)]
    Import(#[from] exam_utils::import::ImportError),
    #[error(transparent)]
    Export(#[from] ExportError),
}

/// What the UI needs right after an answer: the recorded fact plus the
/// explanation screen's content.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, tsify::Tsify)]
#[tsify(into_wasm_abi, from_wasm_abi)]
pub struct AnswerOutcome {
    pub answer: UserAnswer,
    pub correct_answer: String,
    pub explanation: String,
}

/// Progress of the active session, shaped for rendering.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, tsify::Tsify)]
#[tsify(into_wasm_abi, from_wasm_abi)]
pub struct SessionView {
    pub total: usize,
    pub current_index: usize,
    pub answered: usize,
    pub reviewing: bool,
    pub score: ScoreSummary,
    pub elapsed_seconds: i64,
}

/// The whole application state: one storage backend plus every component
/// loaded over it. Constructed once and passed around explicitly — there is
/// no global store.
pub struct AppStore {
    backend: Rc<dyn StorageBackend>,
    repository: QuestionRepository,
    history: AnswerHistory,
    portfolio: PortfolioAggregator,
    accounts: Accounts,
    session: Option<QuizSession>,
    session_table: Table<Option<QuizSession>>,
}

impl AppStore {
    /// Load everything the backend has. An in-flight session left behind by
    /// a reload is picked up here and can be resumed where it stopped.
    pub fn new(backend: Rc<dyn StorageBackend>) -> Self {
        let repository = QuestionRepository::load(backend.as_ref());
        let history = AnswerHistory::load(backend.as_ref());
        let portfolio = PortfolioAggregator::load(backend.as_ref());
        let accounts = Accounts::load(backend.as_ref());
        let session_table = Table::new(SESSION_KEY);
        let session = session_table.load(backend.as_ref());
        Self {
            backend,
            repository,
            history,
            portfolio,
            accounts,
            session,
            session_table,
        }
    }

    pub fn repository(&self) -> &QuestionRepository {
        &self.repository
    }

    pub fn history(&self) -> &AnswerHistory {
        &self.history
    }

    pub fn portfolio(&self) -> &PortfolioAggregator {
        &self.portfolio
    }

    pub fn accounts(&self) -> &Accounts {
        &self.accounts
    }

    pub fn session(&self) -> Option<&QuizSession> {
        self.session.as_ref()
    }

    // --- quiz flow ---

    pub fn start_quiz(
        &mut self,
        filter: &SessionFilter,
        count: usize,
        rng: &mut impl Rng,
    ) -> Result<(), SessionError> {
        let pool = self.repository.session_pool(filter);
        let session = QuizSession::start(pool, count, rng, Utc::now())?;
        self.session = Some(session);
        self.persist_session();
        Ok(())
    }

    pub fn current_question(&self) -> Option<&Question> {
        self.session.as_ref().and_then(|s| s.current_question())
    }

    /// Record an answer: the session grades it, the fact is merged into the
    /// global history, and the portfolio moves. The memory-first rule
    /// applies: a failed write is logged by the owning component and the
    /// flow continues — the next successful write catches the store up.
    pub fn submit_answer(&mut self, selected: &str) -> Result<AnswerOutcome, SessionError> {
        let session = self.session.as_mut().ok_or(SessionError::NoSession)?;
        let now = Utc::now();
        let answer = session.submit_answer(selected, now)?;

        let question = session
            .current_question()
            .expect("the just-answered question is still current")
            .clone();

        if let Err(e) = self.history.append(self.backend.as_ref(), answer.clone()) {
            log::error!("Answer recorded in memory only: {e:?}");
        }
        if let Err(e) =
            self.portfolio
                .apply_answer(self.backend.as_ref(), &question.keywords, answer.is_correct, now)
        {
            log::error!("Portfolio update persisted in memory only: {e:?}");
        }
        self.persist_session();

        Ok(AnswerOutcome {
            answer,
            correct_answer: question.correct_answer,
            explanation: question.explanation,
        })
    }

    pub fn advance(&mut self) -> Result<Advanced, SessionError> {
        let session = self.session.as_mut().ok_or(SessionError::NoSession)?;
        let advanced = session.advance()?;
        self.persist_session();
        Ok(advanced)
    }

    pub fn review_next(&mut self) -> Result<usize, SessionError> {
        let session = self.session.as_mut().ok_or(SessionError::NoSession)?;
        let index = session.review_next()?;
        self.persist_session();
        Ok(index)
    }

    pub fn review_prev(&mut self) -> Result<usize, SessionError> {
        let session = self.session.as_mut().ok_or(SessionError::NoSession)?;
        let index = session.review_prev()?;
        self.persist_session();
        Ok(index)
    }

    pub fn review_item(&self) -> Result<ReviewItem, SessionError> {
        self.session
            .as_ref()
            .ok_or(SessionError::NoSession)?
            .review_item()
    }

    /// Drop the session. Its answers were merged at submission time, so this
    /// is purely a state transition; the final score is returned for the
    /// results screen.
    pub fn finish_quiz(&mut self) -> Result<ScoreSummary, SessionError> {
        let session = self.session.take().ok_or(SessionError::NoSession)?;
        self.session_table.clear(self.backend.as_ref());
        Ok(session.score())
    }

    pub fn session_view(&self) -> Option<SessionView> {
        self.session.as_ref().map(|s| SessionView {
            total: s.len(),
            current_index: s.current_index(),
            answered: s.answers().len(),
            reviewing: matches!(s.phase(), SessionPhase::Reviewing { .. }),
            score: s.score(),
            elapsed_seconds: s.elapsed_seconds(Utc::now()),
        })
    }

    fn persist_session(&self) {
        if let Err(e) = self.session_table.save(self.backend.as_ref(), &self.session) {
            log::error!("Session snapshot not persisted: {e:?}");
        }
    }

    // --- question management ---

    pub fn import_file(
        &mut self,
        filename: &str,
        content: &str,
        file_type: FileType,
    ) -> Result<ImportBatch, TrainerError> {
        let report: ImportReport = match file_type {
            FileType::Csv => exam_utils::import::parse_csv(content),
            FileType::Json => exam_utils::import::parse_json(content)?,
        };
        let meta = BatchMeta {
            filename: filename.to_string(),
            file_size: content.len() as u64,
            file_type,
        };
        let batch = self
            .repository
            .insert_batch(self.backend.as_ref(), report, meta, Utc::now())
            .map_err(RepositoryError::from)?;
        Ok(batch)
    }

    pub fn add_question(&mut self, draft: QuestionDraft) -> Result<Question, RepositoryError> {
        self.repository
            .insert_one(self.backend.as_ref(), draft, Utc::now())
    }

    pub fn update_question(&mut self, edited: Question) -> Result<bool, RepositoryError> {
        self.repository
            .update(self.backend.as_ref(), edited, Utc::now())
    }

    pub fn delete_question(&mut self, id: QuestionId) -> Result<bool, StorageError> {
        self.repository.delete(self.backend.as_ref(), id)
    }

    pub fn delete_batch(&mut self, batch_id: u64) -> Result<Option<usize>, StorageError> {
        self.repository.delete_batch(self.backend.as_ref(), batch_id)
    }

    // --- accounts ---

    pub fn register(
        &mut self,
        username: &str,
        password: &str,
        rng: &mut impl Rng,
    ) -> Result<(), AuthError> {
        self.accounts
            .register(self.backend.as_ref(), username, password, rng, Utc::now())
    }

    pub fn login(&mut self, username: &str, password: &str) -> Result<CurrentUser, AuthError> {
        self.accounts
            .login(self.backend.as_ref(), username, password, Utc::now())
    }

    pub fn logout(&mut self) {
        self.accounts.logout(self.backend.as_ref());
    }

    // --- snapshots and data clearing ---

    pub fn export_state(&self) -> Result<String, serde_json::Error> {
        export::export_snapshot(&self.repository, &self.history, &self.portfolio)
    }

    pub fn import_state(&mut self, json: &str) -> Result<(), ExportError> {
        export::import_snapshot(
            json,
            self.backend.as_ref(),
            &mut self.repository,
            &mut self.history,
            &mut self.portfolio,
        )
    }

    /// Explicit data-clear: progress only. The question bank and accounts
    /// stay; history, portfolio, and any in-flight session go.
    pub fn clear_progress(&mut self) {
        self.history.clear(self.backend.as_ref());
        self.portfolio.clear(self.backend.as_ref());
        self.session = None;
        self.session_table.clear(self.backend.as_ref());
    }
}

type Listener = Rc<dyn Fn()>;

/// The wasm-facing handle the JS shell holds. Wraps the [`AppStore`] in a
/// `RefCell`; we never hold a borrow while invoking listeners, because
/// listener callbacks call straight back into these methods.
#[cfg_attr(target_arch = "wasm32", wasm_bindgen)]
pub struct Trainer {
    store: RefCell<AppStore>,
    listeners: RefCell<Vec<(usize, Listener)>>,
    next_listener_key: Cell<usize>,
}

impl Trainer {
    pub fn with_backend(backend: Rc<dyn StorageBackend>) -> Self {
        Self {
            store: RefCell::new(AppStore::new(backend)),
            listeners: RefCell::new(Vec::new()),
            next_listener_key: Cell::new(0),
        }
    }

    pub fn register_listener(&self, listener: impl Fn() + 'static) -> usize {
        let key = self.next_listener_key.get();
        self.next_listener_key.set(key + 1);
        self.listeners.borrow_mut().push((key, Rc::new(listener)));
        key
    }

    pub fn unregister_listener(&self, key: usize) {
        self.listeners.borrow_mut().retain(|(k, _)| *k != key);
    }

    /// Clone the callbacks out first so no borrow is held while they run.
    fn notify_listeners(&self) {
        let callbacks: Vec<Listener> = self
            .listeners
            .borrow()
            .iter()
            .map(|(_, l)| Rc::clone(l))
            .collect();
        for callback in callbacks {
            callback();
        }
    }
}

/// Notifies listeners when dropped. Mutating methods create one up front so
/// every exit path, including `?`, ends with a notification.
struct NotifyLater<'a> {
    trainer: &'a Trainer,
}

impl<'a> NotifyLater<'a> {
    fn new(trainer: &'a Trainer) -> Self {
        Self { trainer }
    }
}

impl Drop for NotifyLater<'_> {
    fn drop(&mut self) {
        self.trainer.notify_listeners();
    }
}

fn err_to_js(e: impl std::fmt::Display) -> JsValue {
    JsValue::from_str(&e.to_string())
}

#[cfg_attr(target_arch = "wasm32", wasm_bindgen)]
impl Trainer {
    #[cfg_attr(target_arch = "wasm32", wasm_bindgen(constructor))]
    pub fn new() -> Result<Trainer, JsValue> {
        // used to only initialize the logger once
        #[allow(clippy::borrow_interior_mutable_const)]
        *LOGGER;

        #[cfg(target_arch = "wasm32")]
        let backend: Rc<dyn StorageBackend> =
            Rc::new(satchel::web::LocalStorageBackend::new().map_err(err_to_js)?);
        #[cfg(not(target_arch = "wasm32"))]
        let backend: Rc<dyn StorageBackend> = Rc::new(satchel::MemoryBackend::new());

        Ok(Self::with_backend(backend))
    }

    #[cfg_attr(target_arch = "wasm32", wasm_bindgen)]
    pub fn subscribe(&self, callback: js_sys::Function) -> usize {
        self.register_listener(move || {
            let this = JsValue::null();
            let _ = callback.call0(&this);
        })
    }

    #[cfg_attr(target_arch = "wasm32", wasm_bindgen)]
    pub fn unsubscribe(&self, key: usize) {
        self.unregister_listener(key);
    }

    // --- quiz flow ---

    pub fn start_quiz(&self, filter: SessionFilter, count: usize) -> Result<SessionView, JsValue> {
        let _notify = NotifyLater::new(self);
        let mut store = self.store.borrow_mut();
        store
            .start_quiz(&filter, count, &mut rand::thread_rng())
            .map_err(err_to_js)?;
        drop(store);
        self.session_view().ok_or_else(|| err_to_js("session vanished"))
    }

    pub fn has_active_session(&self) -> bool {
        self.store.borrow().session().is_some()
    }

    pub fn session_view(&self) -> Option<SessionView> {
        self.store.borrow().session_view()
    }

    pub fn current_question(&self) -> Option<Question> {
        self.store.borrow().current_question().cloned()
    }

    pub fn submit_answer(&self, selected: String) -> Result<AnswerOutcome, JsValue> {
        let _notify = NotifyLater::new(self);
        self.store
            .borrow_mut()
            .submit_answer(&selected)
            .map_err(err_to_js)
    }

    /// Returns true when the session just entered review mode.
    pub fn advance_question(&self) -> Result<bool, JsValue> {
        let _notify = NotifyLater::new(self);
        let advanced = self.store.borrow_mut().advance().map_err(err_to_js)?;
        Ok(advanced == Advanced::EnteredReview)
    }

    pub fn review_item(&self) -> Result<ReviewItem, JsValue> {
        self.store.borrow().review_item().map_err(err_to_js)
    }

    pub fn review_next(&self) -> Result<usize, JsValue> {
        let _notify = NotifyLater::new(self);
        self.store.borrow_mut().review_next().map_err(err_to_js)
    }

    pub fn review_prev(&self) -> Result<usize, JsValue> {
        let _notify = NotifyLater::new(self);
        self.store.borrow_mut().review_prev().map_err(err_to_js)
    }

    pub fn finish_quiz(&self) -> Result<ScoreSummary, JsValue> {
        let _notify = NotifyLater::new(self);
        self.store.borrow_mut().finish_quiz().map_err(err_to_js)
    }

    // --- question management ---

    pub fn import_csv(&self, filename: String, content: String) -> Result<ImportBatch, JsValue> {
        let _notify = NotifyLater::new(self);
        self.store
            .borrow_mut()
            .import_file(&filename, &content, FileType::Csv)
            .map_err(err_to_js)
    }

    pub fn import_json(&self, filename: String, content: String) -> Result<ImportBatch, JsValue> {
        let _notify = NotifyLater::new(self);
        self.store
            .borrow_mut()
            .import_file(&filename, &content, FileType::Json)
            .map_err(err_to_js)
    }

    pub fn add_question(&self, draft: QuestionDraft) -> Result<Question, JsValue> {
        let _notify = NotifyLater::new(self);
        self.store.borrow_mut().add_question(draft).map_err(err_to_js)
    }

    pub fn update_question(&self, edited: Question) -> Result<bool, JsValue> {
        let _notify = NotifyLater::new(self);
        self.store.borrow_mut().update_question(edited).map_err(err_to_js)
    }

    pub fn delete_question(&self, id: u64) -> Result<bool, JsValue> {
        let _notify = NotifyLater::new(self);
        self.store.borrow_mut().delete_question(id).map_err(err_to_js)
    }

    /// Returns how many questions the batch took with it, or an error for an
    /// unknown batch id.
    pub fn delete_batch(&self, batch_id: u64) -> Result<usize, JsValue> {
        let _notify = NotifyLater::new(self);
        self.store
            .borrow_mut()
            .delete_batch(batch_id)
            .map_err(err_to_js)?
            .ok_or_else(|| err_to_js(format!("no batch with id {batch_id}")))
    }

    pub fn list_questions(&self) -> Vec<Question> {
        self.store.borrow().repository().list_all()
    }

    pub fn list_batch_questions(&self, batch_id: u64) -> Vec<Question> {
        self.store.borrow().repository().list_by_batch(batch_id)
    }

    pub fn list_batches(&self) -> Vec<ImportBatch> {
        self.store.borrow().repository().batches()
    }

    pub fn repository_stats(&self) -> RepositoryStats {
        self.store.borrow().repository().stats()
    }

    // --- performance views ---

    pub fn portfolio_rows(&self) -> Vec<PortfolioRow> {
        self.store.borrow().portfolio().rows()
    }

    pub fn heatmap(&self, window_days: u32) -> Vec<HeatmapCell> {
        self.store.borrow().portfolio().heatmap(window_days, Utc::now())
    }

    pub fn history_summary(&self) -> HistorySummary {
        self.store.borrow().history().summary()
    }

    // --- accounts ---

    pub fn register(&self, username: String, password: String) -> Result<(), JsValue> {
        let _notify = NotifyLater::new(self);
        self.store
            .borrow_mut()
            .register(&username, &password, &mut rand::thread_rng())
            .map_err(err_to_js)
    }

    pub fn login(&self, username: String, password: String) -> Result<CurrentUser, JsValue> {
        let _notify = NotifyLater::new(self);
        self.store
            .borrow_mut()
            .login(&username, &password)
            .map_err(err_to_js)
    }

    pub fn logout(&self) {
        let _notify = NotifyLater::new(self);
        self.store.borrow_mut().logout();
    }

    pub fn current_user(&self) -> Option<CurrentUser> {
        self.store.borrow().accounts().current_user().cloned()
    }

    // --- snapshots ---

    pub fn export_state(&self) -> Result<String, JsValue> {
        self.store.borrow().export_state().map_err(err_to_js)
    }

    pub fn import_state(&self, json: String) -> Result<(), JsValue> {
        let _notify = NotifyLater::new(self);
        self.store.borrow_mut().import_state(&json).map_err(err_to_js)
    }

    pub fn clear_progress(&self) {
        let _notify = NotifyLater::new(self);
        self.store.borrow_mut().clear_progress();
    }
}
