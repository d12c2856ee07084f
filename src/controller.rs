//! State and async driver behind the "manage credit cards" screen.
//!
//! [`ListState`] owns the backing list, the revealed window, the filter
//! query, the selection and the hovered row. Everything the screen renders
//! is derived from it on demand. Network-shaped work goes through
//! [`ListController`], which serializes mutations with a [`Ticket`]: only
//! one may be pending, and a response that arrives after the screen was
//! torn down is dropped instead of applied.

use std::time::Duration;

use tracing::{debug, warn};

use crate::backend::{CardBackend, CardEditor};
use crate::error::{CardError, Result};
use crate::filter;
use crate::models::{CardDraft, CreditCard, DeleteOutcome, Payee};
use crate::selection::{SelectGesture, SelectionSet};
use crate::settings::ListConfig;
use crate::undo::{UndoScope, UndoState, MANAGE_CREDIT_CARDS};
use crate::window::{near_bottom, IncrementalWindow};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Uninitialized,
    Loading,
    Ready,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Load,
    Delete,
    Create,
    Edit,
}

/// Proof that an operation is in flight. Consumed by [`ListState::finish`].
#[derive(Debug)]
pub struct Ticket {
    op: Op,
    epoch: u64,
}

impl Ticket {
    pub fn op(&self) -> Op {
        self.op
    }
}

/// Window length after a save: a created card is revealed with a trailing
/// margin, an edited card only when it sat beyond the current window.
fn window_after_save(op: Op, previous: usize, index: Option<usize>, margin: usize) -> usize {
    match (op, index) {
        (Op::Create, Some(i)) => i + margin,
        (Op::Edit, Some(i)) if i > previous => i + margin,
        _ => previous,
    }
}

#[derive(Debug)]
pub struct ListState {
    config: ListConfig,
    cards: Vec<CreditCard>,
    loaded: bool,
    version: u64,
    window: IncrementalWindow,
    filter: String,
    selection: SelectionSet,
    hovered: Option<String>,
    payees: Vec<Payee>,
    pending: Option<Op>,
    epoch: u64,
    attached: bool,
}

impl ListState {
    pub fn new(config: ListConfig) -> Self {
        Self {
            config,
            cards: Vec::new(),
            loaded: false,
            version: 0,
            window: IncrementalWindow::new(),
            filter: String::new(),
            selection: SelectionSet::new(),
            hovered: None,
            payees: Vec::new(),
            pending: None,
            epoch: 0,
            attached: true,
        }
    }

    pub fn phase(&self) -> Phase {
        if self.pending.is_some() {
            Phase::Loading
        } else if self.loaded {
            Phase::Ready
        } else {
            Phase::Uninitialized
        }
    }

    pub fn is_loading(&self) -> bool {
        self.pending.is_some()
    }

    pub fn is_attached(&self) -> bool {
        self.attached
    }

    pub fn ensure_idle(&self) -> Result<()> {
        if !self.attached {
            return Err(CardError::Detached);
        }
        if self.pending.is_some() {
            return Err(CardError::Busy);
        }
        Ok(())
    }

    pub fn begin(&mut self, op: Op) -> Result<Ticket> {
        self.ensure_idle()?;
        self.pending = Some(op);
        Ok(Ticket {
            op,
            epoch: self.epoch,
        })
    }

    fn is_current(&self, ticket: &Ticket) -> bool {
        self.attached && ticket.epoch == self.epoch
    }

    pub fn finish(&mut self, ticket: Ticket) {
        if self.is_current(&ticket) {
            self.pending = None;
        }
    }

    /// Tear down: later responses are discarded and new work is refused.
    pub fn detach(&mut self) {
        self.attached = false;
        self.epoch += 1;
        self.pending = None;
    }

    fn replace_cards(&mut self, cards: Vec<CreditCard>) {
        self.cards = cards;
        self.loaded = true;
        self.version += 1;
    }

    fn discard(&self, ticket: &Ticket) -> bool {
        if self.is_current(ticket) {
            return false;
        }
        debug!(op = ?ticket.op, "discarding response for closed screen");
        true
    }

    pub fn apply_initial(&mut self, ticket: &Ticket, cards: Vec<CreditCard>) -> bool {
        if self.discard(ticket) {
            return false;
        }
        let len = cards.len();
        self.replace_cards(cards);
        self.window.initialize(len, self.config.initial_window);
        debug!(len, revealed = self.window.revealed(), "initial window");
        true
    }

    /// Keep the previously revealed row count, clamped, and drop the selection.
    pub fn apply_after_delete(&mut self, ticket: &Ticket, cards: Vec<CreditCard>) -> bool {
        if self.discard(ticket) {
            return false;
        }
        let previous = self.window.revealed();
        let len = cards.len();
        self.replace_cards(cards);
        self.window.reset_to(previous, len);
        self.selection.select_none();
        debug!(len, revealed = self.window.revealed(), "window after delete");
        true
    }

    pub fn apply_after_save(&mut self, ticket: &Ticket, cards: Vec<CreditCard>, saved_id: &str) -> bool {
        if self.discard(ticket) {
            return false;
        }
        let previous = self.window.revealed();
        let index = cards.iter().position(|c| c.id == saved_id);
        let target = window_after_save(ticket.op, previous, index, self.config.reveal_margin);
        let len = cards.len();
        self.replace_cards(cards);
        self.window.reset_to(target, len);
        debug!(len, ?index, revealed = self.window.revealed(), "window after save");
        true
    }

    pub fn apply_payees(&mut self, payees: Vec<Payee>) {
        if self.attached {
            self.payees = payees;
        }
    }

    /// Reveal the next chunk of the already-fetched list. No I/O.
    pub fn load_more(&mut self) -> bool {
        self.window.grow_by(self.config.growth_step)
    }

    /// Scroll hook for hosts measuring content in pixels.
    pub fn on_scroll(&mut self, scroll_top: f64, content_height: f64) -> bool {
        if near_bottom(scroll_top, content_height, self.config.load_more_threshold) {
            self.load_more()
        } else {
            false
        }
    }

    pub fn config(&self) -> &ListConfig {
        &self.config
    }

    /// The full backing list, unaffected by window or filter.
    pub fn cards(&self) -> &[CreditCard] {
        &self.cards
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn revealed(&self) -> usize {
        self.window.revealed()
    }

    pub fn has_more(&self) -> bool {
        !self.window.is_exhausted()
    }

    /// Rows to render: the filter applied to the revealed prefix only.
    pub fn visible(&self) -> Vec<&CreditCard> {
        filter::apply(&self.cards[..self.window.revealed()], &self.filter)
    }

    pub fn find(&self, id: &str) -> Option<&CreditCard> {
        self.cards.iter().find(|c| c.id == id)
    }

    pub fn filter(&self) -> &str {
        &self.filter
    }

    pub fn set_filter(&mut self, query: impl Into<String>) {
        self.filter = query.into();
    }

    pub fn selection(&self) -> &SelectionSet {
        &self.selection
    }

    pub fn toggle(&mut self, id: &str, gesture: SelectGesture) {
        let order: Vec<&str> = filter::apply(&self.cards[..self.window.revealed()], &self.filter)
            .into_iter()
            .map(|c| c.id.as_str())
            .collect();
        self.selection.toggle(id, gesture, &order);
    }

    /// Select every card in the backing list, including unrevealed ones.
    pub fn select_all(&mut self) {
        self.selection.select_all(self.cards.iter().map(|c| c.id.clone()));
    }

    pub fn select_none(&mut self) {
        self.selection.select_none();
    }

    /// Selected ids still present in the backing list, in selection order.
    /// Ids whose card has disappeared since the last fetch are skipped.
    pub fn selected_ids(&self) -> Vec<String> {
        self.selection
            .ids()
            .into_iter()
            .filter(|id| self.find(id).is_some())
            .collect()
    }

    /// Header checkbox: clears a non-empty selection, otherwise selects all.
    pub fn toggle_all(&mut self) {
        if self.selection.is_empty() {
            self.select_all();
        } else {
            self.select_none();
        }
    }

    pub fn hovered(&self) -> Option<&str> {
        self.hovered.as_deref()
    }

    pub fn set_hovered(&mut self, id: Option<String>) {
        self.hovered = id;
    }

    pub fn payees(&self) -> &[Payee] {
        &self.payees
    }
}

pub struct ListController<B> {
    backend: B,
    state: ListState,
    undo_state: UndoState,
    undo: Option<UndoScope>,
}

impl<B: CardBackend> ListController<B> {
    pub fn new(backend: B, config: ListConfig, undo_state: UndoState) -> Self {
        Self {
            backend,
            state: ListState::new(config),
            undo_state,
            undo: None,
        }
    }

    pub fn state(&self) -> &ListState {
        &self.state
    }

    pub fn state_mut(&mut self) -> &mut ListState {
        &mut self.state
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Open the screen: suppress undo, then fetch the list and the payees
    /// side by side. Payees are best-effort and bounded by
    /// `payee_timeout_ms`; the list is Ready regardless of how they fare.
    pub async fn mount(&mut self) -> Result<()> {
        if self.undo.is_none() {
            self.undo = Some(UndoScope::enter(self.undo_state.clone(), MANAGE_CREDIT_CARDS));
        }

        let ticket = self.state.begin(Op::Load)?;
        let payee_timeout = Duration::from_millis(self.state.config().payee_timeout_ms);
        let (cards, payees) = tokio::join!(
            self.fetch(),
            tokio::time::timeout(payee_timeout, self.backend.load_payees()),
        );

        let result = cards.map(|cards| {
            self.state.apply_initial(&ticket, cards);
        });
        self.state.finish(ticket);

        match payees {
            Ok(Ok(payees)) => self.state.apply_payees(payees),
            Ok(Err(e)) => warn!(error = %e, "payee load failed"),
            Err(_) => warn!(?payee_timeout, "payee load timed out"),
        }
        result
    }

    pub fn unmount(&mut self) {
        self.state.detach();
        self.undo = None;
    }

    async fn fetch(&self) -> Result<Vec<CreditCard>> {
        debug!("fetching credit cards");
        match self.backend.get_cards().await {
            Ok(cards) => {
                debug!(count = cards.len(), "fetched credit cards");
                Ok(cards)
            }
            Err(e) => {
                warn!(error = %e, "credit card fetch failed");
                Err(CardError::Fetch(e.to_string()))
            }
        }
    }

    /// Delete every selected card, then refetch. A partial failure is
    /// returned in the outcome for the caller to show; the refresh still runs.
    pub async fn delete_selected(&mut self) -> Result<DeleteOutcome> {
        let ticket = self.state.begin(Op::Delete)?;
        let ids = self.state.selected_ids();

        let outcome = match self.backend.delete_all(&ids).await {
            Ok(outcome) => outcome,
            Err(e) => {
                self.state.finish(ticket);
                return Err(e);
            }
        };
        if outcome.some_deletions_failed {
            warn!(requested = ids.len(), "some credit card deletions failed");
        }

        let result = self.fetch().await.map(|cards| {
            self.state.apply_after_delete(&ticket, cards);
        });
        self.state.finish(ticket);
        result.map(|()| outcome)
    }

    /// Run the edit modal seeded with default fields and store the result.
    /// Returns `None` when the modal is dismissed.
    pub async fn create<E: CardEditor>(&mut self, editor: &mut E) -> Result<Option<CreditCard>> {
        self.state.ensure_idle()?;
        let Some(mut draft) = editor.edit(CardDraft::default()).await? else {
            return Ok(None);
        };
        draft.id = None;
        self.save_and_resync(Op::Create, draft).await.map(Some)
    }

    pub async fn edit<E: CardEditor>(&mut self, id: &str, editor: &mut E) -> Result<Option<CreditCard>> {
        self.state.ensure_idle()?;
        let seed = self
            .state
            .find(id)
            .map(CardDraft::from)
            .ok_or_else(|| CardError::UnknownCard(id.to_string()))?;
        let Some(mut draft) = editor.edit(seed).await? else {
            return Ok(None);
        };
        draft.id = Some(id.to_string());
        self.save_and_resync(Op::Edit, draft).await.map(Some)
    }

    async fn save_and_resync(&mut self, op: Op, draft: CardDraft) -> Result<CreditCard> {
        let ticket = self.state.begin(op)?;
        let saved = match self.backend.save(draft).await {
            Ok(card) => card,
            Err(e) => {
                self.state.finish(ticket);
                warn!(error = %e, "credit card save failed");
                return Err(CardError::Save(e.to_string()));
            }
        };

        let result = self.fetch().await.map(|cards| {
            self.state.apply_after_save(&ticket, cards, &saved.id);
        });
        self.state.finish(ticket);
        result.map(|()| saved)
    }
}

#[cfg(test)]
mod tests {
    use std::cell::{Cell, RefCell};

    use tracing_test::traced_test;

    use super::*;

    fn card(id: String) -> CreditCard {
        CreditCard {
            id,
            account_id: None,
            processor_name: "Visa".to_string(),
            statement_closing_day: 1,
            payment_due_date: 8,
            credit_limit: 0,
            stage: None,
            actions: vec![],
        }
    }

    fn make_cards(n: usize) -> Vec<CreditCard> {
        (0..n).map(|i| card(format!("card-{i:03}"))).collect()
    }

    #[derive(Default)]
    struct FakeBackend {
        cards: RefCell<Vec<CreditCard>>,
        fail_fetch: Cell<bool>,
        fail_payees: bool,
        stall_payees: bool,
        fail_save: bool,
        partial_delete: bool,
        insert_at: Option<usize>,
        deleted: RefCell<Vec<String>>,
    }

    impl FakeBackend {
        fn with_cards(n: usize) -> Self {
            Self {
                cards: RefCell::new(make_cards(n)),
                ..Self::default()
            }
        }
    }

    impl CardBackend for FakeBackend {
        async fn get_cards(&self) -> Result<Vec<CreditCard>> {
            if self.fail_fetch.get() {
                return Err(CardError::Fetch("offline".into()));
            }
            Ok(self.cards.borrow().clone())
        }

        async fn delete_all(&self, ids: &[String]) -> Result<DeleteOutcome> {
            self.deleted.borrow_mut().extend(ids.iter().cloned());
            let mut cards = self.cards.borrow_mut();
            let missing = ids.iter().any(|id| !cards.iter().any(|c| &c.id == id));
            cards.retain(|c| !ids.contains(&c.id));
            Ok(DeleteOutcome {
                some_deletions_failed: self.partial_delete || missing,
            })
        }

        async fn save(&self, draft: CardDraft) -> Result<CreditCard> {
            if self.fail_save {
                return Err(CardError::Validation("limit too high".into()));
            }
            let mut cards = self.cards.borrow_mut();
            match draft.id {
                Some(id) => {
                    let existing = cards
                        .iter_mut()
                        .find(|c| c.id == id)
                        .ok_or(CardError::UnknownCard(id))?;
                    existing.processor_name = draft.processor_name;
                    existing.credit_limit = draft.credit_limit;
                    Ok(existing.clone())
                }
                None => {
                    let mut new_card = card("new-card".to_string());
                    new_card.processor_name = draft.processor_name;
                    let at = self.insert_at.unwrap_or(cards.len());
                    cards.insert(at, new_card.clone());
                    Ok(new_card)
                }
            }
        }

        async fn load_payees(&self) -> Result<Vec<Payee>> {
            if self.stall_payees {
                std::future::pending::<()>().await;
            }
            if self.fail_payees {
                return Err(CardError::Fetch("payees offline".into()));
            }
            Ok(vec![Payee {
                id: "p1".to_string(),
                name: "Acme".to_string(),
            }])
        }
    }

    /// Submits whatever it was seeded with, after recording the seed.
    #[derive(Default)]
    struct Accept {
        seen: Option<CardDraft>,
        processor: Option<&'static str>,
    }

    impl CardEditor for Accept {
        async fn edit(&mut self, draft: CardDraft) -> Result<Option<CardDraft>> {
            self.seen = Some(draft.clone());
            let mut out = draft;
            if let Some(p) = self.processor {
                out.processor_name = p.to_string();
            }
            Ok(Some(out))
        }
    }

    struct Dismiss;

    impl CardEditor for Dismiss {
        async fn edit(&mut self, _draft: CardDraft) -> Result<Option<CardDraft>> {
            Ok(None)
        }
    }

    fn controller(backend: FakeBackend) -> ListController<FakeBackend> {
        ListController::new(backend, ListConfig::default(), UndoState::default())
    }

    fn controller_with(backend: FakeBackend, initial_window: usize) -> ListController<FakeBackend> {
        let config = ListConfig {
            initial_window,
            ..ListConfig::default()
        };
        ListController::new(backend, config, UndoState::default())
    }

    #[tokio::test]
    async fn test_mount_reveals_first_hundred() {
        let mut ctl = controller(FakeBackend::with_cards(250));
        assert_eq!(ctl.state().phase(), Phase::Uninitialized);
        ctl.mount().await.unwrap();
        assert_eq!(ctl.state().phase(), Phase::Ready);
        assert_eq!(ctl.state().revealed(), 100);
        assert_eq!(ctl.state().visible().len(), 100);
        assert_eq!(ctl.state().payees().len(), 1);
    }

    #[tokio::test]
    async fn test_mount_short_list_reveals_all() {
        let mut ctl = controller(FakeBackend::with_cards(7));
        ctl.mount().await.unwrap();
        assert_eq!(ctl.state().revealed(), 7);
        assert!(!ctl.state().has_more());
    }

    #[tokio::test]
    async fn test_grow_clamps_to_backing_length() {
        let mut ctl = controller(FakeBackend::with_cards(120));
        ctl.mount().await.unwrap();
        assert!(ctl.state_mut().load_more());
        assert_eq!(ctl.state().revealed(), 120);
        assert!(!ctl.state_mut().load_more());
        assert_eq!(ctl.state().revealed(), 120);
    }

    #[tokio::test]
    async fn test_scroll_near_bottom_grows() {
        let mut ctl = controller(FakeBackend::with_cards(300));
        ctl.mount().await.unwrap();
        assert!(!ctl.state_mut().on_scroll(100.0, 4000.0));
        assert_eq!(ctl.state().revealed(), 100);
        assert!(ctl.state_mut().on_scroll(3300.0, 4000.0));
        assert_eq!(ctl.state().revealed(), 150);
    }

    #[tokio::test]
    async fn test_payee_failure_does_not_block_ready() {
        let backend = FakeBackend {
            fail_payees: true,
            ..FakeBackend::with_cards(3)
        };
        let mut ctl = controller(backend);
        ctl.mount().await.unwrap();
        assert_eq!(ctl.state().phase(), Phase::Ready);
        assert!(ctl.state().payees().is_empty());
    }

    #[tokio::test]
    async fn test_stalled_payees_do_not_hold_mount() {
        let backend = FakeBackend {
            stall_payees: true,
            ..FakeBackend::with_cards(3)
        };
        let config = ListConfig {
            payee_timeout_ms: 20,
            ..ListConfig::default()
        };
        let mut ctl = ListController::new(backend, config, UndoState::default());
        ctl.mount().await.unwrap();
        assert_eq!(ctl.state().phase(), Phase::Ready);
        assert_eq!(ctl.state().cards().len(), 3);
        assert!(ctl.state().payees().is_empty());
    }

    #[tokio::test]
    async fn test_delete_skips_ids_gone_since_last_fetch() {
        let mut ctl = controller(FakeBackend::with_cards(5));
        ctl.mount().await.unwrap();
        ctl.state_mut().toggle("card-001", SelectGesture::Single);
        ctl.state_mut().toggle("card-002", SelectGesture::Single);

        ctl.backend().cards.borrow_mut().retain(|c| c.id != "card-001");
        ctl.edit("card-003", &mut Accept::default()).await.unwrap();
        assert!(ctl.state().find("card-001").is_none());
        assert!(ctl.state().selection().has("card-001"));
        assert_eq!(ctl.state().selected_ids(), vec!["card-002"]);

        let outcome = ctl.delete_selected().await.unwrap();
        assert!(!outcome.some_deletions_failed);
        assert_eq!(*ctl.backend().deleted.borrow(), vec!["card-002".to_string()]);
        assert_eq!(ctl.state().cards().len(), 3);
        assert!(ctl.state().selection().is_empty());
    }

    #[tokio::test]
    async fn test_mount_fetch_failure_is_reported() {
        let backend = FakeBackend::with_cards(3);
        backend.fail_fetch.set(true);
        let mut ctl = controller(backend);
        let err = ctl.mount().await.unwrap_err();
        assert!(matches!(err, CardError::Fetch(_)));
        assert!(!ctl.state().is_loading());
        assert_eq!(ctl.state().phase(), Phase::Uninitialized);
    }

    #[tokio::test]
    async fn test_filter_narrows_within_window_only() {
        let mut ctl = controller(FakeBackend::with_cards(150));
        ctl.mount().await.unwrap();
        ctl.state_mut().set_filter("CARD-12");
        let ids: Vec<&str> = ctl.state().visible().iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["card-012"]);

        ctl.state_mut().set_filter("card-149");
        assert!(ctl.state().visible().is_empty());
        assert!(ctl.state().find("card-149").is_some());
    }

    #[tokio::test]
    async fn test_select_all_covers_unrevealed_cards() {
        let mut ctl = controller(FakeBackend::with_cards(150));
        ctl.mount().await.unwrap();
        ctl.state_mut().set_filter("card-00");
        ctl.state_mut().select_all();
        assert_eq!(ctl.state().selection().size(), 150);
        ctl.state_mut().toggle_all();
        assert!(ctl.state().selection().is_empty());
    }

    #[tokio::test]
    async fn test_range_toggle_follows_filtered_order() {
        let mut ctl = controller(FakeBackend::with_cards(30));
        ctl.mount().await.unwrap();
        ctl.state_mut().set_filter("card-01");
        ctl.state_mut().toggle("card-011", SelectGesture::Single);
        ctl.state_mut().toggle("card-014", SelectGesture::Range);
        assert_eq!(
            ctl.state().selection().ids(),
            vec!["card-011", "card-012", "card-013", "card-014"]
        );
    }

    #[tokio::test]
    async fn test_delete_keeps_window_and_clears_selection() {
        let mut ctl = controller_with(FakeBackend::with_cards(60), 40);
        ctl.mount().await.unwrap();
        assert_eq!(ctl.state().revealed(), 40);
        for id in ["card-001", "card-005", "card-050"] {
            ctl.state_mut().toggle(id, SelectGesture::Single);
        }

        let outcome = ctl.delete_selected().await.unwrap();
        assert!(!outcome.some_deletions_failed);
        assert_eq!(ctl.state().cards().len(), 57);
        assert_eq!(ctl.state().revealed(), 40);
        assert!(ctl.state().selection().is_empty());
        assert_eq!(ctl.backend().deleted.borrow().len(), 3);
        assert_eq!(ctl.state().phase(), Phase::Ready);
    }

    #[tokio::test]
    async fn test_delete_clamps_window_to_new_length() {
        let mut ctl = controller(FakeBackend::with_cards(10));
        ctl.mount().await.unwrap();
        ctl.state_mut().select_all();
        ctl.delete_selected().await.unwrap();
        assert_eq!(ctl.state().cards().len(), 0);
        assert_eq!(ctl.state().revealed(), 0);
    }

    #[tokio::test]
    #[traced_test]
    async fn test_partial_delete_warns_and_still_refreshes() {
        let backend = FakeBackend {
            partial_delete: true,
            ..FakeBackend::with_cards(5)
        };
        let mut ctl = controller(backend);
        ctl.mount().await.unwrap();
        ctl.state_mut().toggle("card-002", SelectGesture::Single);
        let outcome = ctl.delete_selected().await.unwrap();
        assert!(outcome.some_deletions_failed);
        assert_eq!(ctl.state().cards().len(), 4);
        assert!(ctl.state().selection().is_empty());
        assert!(logs_contain("some credit card deletions failed"));
    }

    #[tokio::test]
    async fn test_failed_refetch_leaves_list_stale() {
        let mut ctl = controller(FakeBackend::with_cards(5));
        ctl.mount().await.unwrap();
        ctl.state_mut().toggle("card-000", SelectGesture::Single);
        ctl.backend().fail_fetch.set(true);
        let err = ctl.delete_selected().await.unwrap_err();
        assert!(matches!(err, CardError::Fetch(_)));
        assert_eq!(ctl.state().cards().len(), 5);
        assert!(!ctl.state().is_loading());
    }

    #[tokio::test]
    async fn test_create_reveals_new_card_with_margin() {
        let backend = FakeBackend {
            insert_at: Some(119),
            ..FakeBackend::with_cards(149)
        };
        let mut ctl = controller(backend);
        ctl.mount().await.unwrap();
        let mut editor = Accept {
            processor: Some("Amex"),
            ..Accept::default()
        };

        let saved = ctl.create(&mut editor).await.unwrap().unwrap();
        assert_eq!(editor.seen, Some(CardDraft::default()));
        assert_eq!(saved.processor_name, "Amex");
        assert_eq!(ctl.state().cards().len(), 150);
        assert_eq!(ctl.state().cards()[119].id, saved.id);
        assert_eq!(ctl.state().revealed(), 150);
    }

    #[tokio::test]
    async fn test_create_near_top_uses_margin() {
        let backend = FakeBackend {
            insert_at: Some(3),
            ..FakeBackend::with_cards(400)
        };
        let mut ctl = controller(backend);
        ctl.mount().await.unwrap();
        ctl.create(&mut Accept::default()).await.unwrap();
        assert_eq!(ctl.state().revealed(), 78);
    }

    #[tokio::test]
    async fn test_dismissed_create_changes_nothing() {
        let mut ctl = controller(FakeBackend::with_cards(5));
        ctl.mount().await.unwrap();
        let version = ctl.state().version();
        assert!(ctl.create(&mut Dismiss).await.unwrap().is_none());
        assert_eq!(ctl.state().version(), version);
        assert_eq!(ctl.state().cards().len(), 5);
    }

    #[tokio::test]
    async fn test_edit_inside_window_keeps_window() {
        let mut ctl = controller_with(FakeBackend::with_cards(200), 50);
        ctl.mount().await.unwrap();
        let mut editor = Accept {
            processor: Some("Discover"),
            ..Accept::default()
        };
        ctl.edit("card-010", &mut editor).await.unwrap();
        assert_eq!(editor.seen.unwrap().id.as_deref(), Some("card-010"));
        assert_eq!(ctl.state().revealed(), 50);
        assert_eq!(ctl.state().find("card-010").unwrap().processor_name, "Discover");
    }

    #[tokio::test]
    async fn test_edit_beyond_window_expands() {
        let mut ctl = controller_with(FakeBackend::with_cards(300), 50);
        ctl.mount().await.unwrap();
        ctl.edit("card-120", &mut Accept::default()).await.unwrap();
        assert_eq!(ctl.state().revealed(), 195);
    }

    #[tokio::test]
    async fn test_edit_unknown_card() {
        let mut ctl = controller(FakeBackend::with_cards(3));
        ctl.mount().await.unwrap();
        let err = ctl.edit("nope", &mut Accept::default()).await.unwrap_err();
        assert!(matches!(err, CardError::UnknownCard(_)));
    }

    #[tokio::test]
    async fn test_save_failure_is_reported_and_state_kept() {
        let backend = FakeBackend {
            fail_save: true,
            ..FakeBackend::with_cards(3)
        };
        let mut ctl = controller(backend);
        ctl.mount().await.unwrap();
        let err = ctl.create(&mut Accept::default()).await.unwrap_err();
        assert!(matches!(err, CardError::Save(_)));
        assert_eq!(ctl.state().cards().len(), 3);
        assert_eq!(ctl.state().phase(), Phase::Ready);
    }

    #[tokio::test]
    async fn test_mount_sets_and_unmount_clears_undo_marker() {
        let undo = UndoState::default();
        let mut ctl = ListController::new(FakeBackend::with_cards(1), ListConfig::default(), undo.clone());
        ctl.mount().await.unwrap();
        assert_eq!(undo.active_modal().as_deref(), Some(MANAGE_CREDIT_CARDS));
        ctl.unmount();
        assert!(undo.undo_allowed());
        assert!(matches!(ctl.delete_selected().await, Err(CardError::Detached)));
    }

    #[tokio::test]
    async fn test_dropping_controller_clears_undo_marker() {
        let undo = UndoState::default();
        {
            let mut ctl = ListController::new(FakeBackend::with_cards(1), ListConfig::default(), undo.clone());
            ctl.mount().await.unwrap();
            assert!(!undo.undo_allowed());
        }
        assert!(undo.undo_allowed());
    }

    #[test]
    fn test_second_mutation_is_refused_while_pending() {
        let mut state = ListState::new(ListConfig::default());
        let ticket = state.begin(Op::Delete).unwrap();
        assert_eq!(state.phase(), Phase::Loading);
        assert!(matches!(state.begin(Op::Create), Err(CardError::Busy)));
        state.finish(ticket);
        assert!(state.begin(Op::Edit).is_ok());
    }

    #[test]
    fn test_load_more_allowed_while_pending() {
        let mut state = ListState::new(ListConfig::default());
        let load = state.begin(Op::Load).unwrap();
        state.apply_initial(&load, make_cards(200));
        state.finish(load);

        let _delete = state.begin(Op::Delete).unwrap();
        assert!(state.load_more());
        assert_eq!(state.revealed(), 150);
    }

    #[test]
    fn test_response_after_teardown_is_discarded() {
        let mut state = ListState::new(ListConfig::default());
        let ticket = state.begin(Op::Load).unwrap();
        state.detach();
        assert!(!state.apply_initial(&ticket, make_cards(10)));
        assert!(state.cards().is_empty());
        state.finish(ticket);
        assert!(matches!(state.begin(Op::Load), Err(CardError::Detached)));
    }

    #[test]
    fn test_window_after_save_rules() {
        assert_eq!(window_after_save(Op::Create, 100, Some(119), 75), 194);
        assert_eq!(window_after_save(Op::Create, 100, None, 75), 100);
        assert_eq!(window_after_save(Op::Edit, 50, Some(10), 75), 50);
        assert_eq!(window_after_save(Op::Edit, 50, Some(50), 75), 50);
        assert_eq!(window_after_save(Op::Edit, 50, Some(51), 75), 126);
        assert_eq!(window_after_save(Op::Edit, 50, None, 75), 50);
    }

    #[test]
    fn test_hover_is_tracked() {
        let mut state = ListState::new(ListConfig::default());
        assert_eq!(state.hovered(), None);
        state.set_hovered(Some("card-001".to_string()));
        assert_eq!(state.hovered(), Some("card-001"));
        state.set_hovered(None);
        assert_eq!(state.hovered(), None);
    }
}
