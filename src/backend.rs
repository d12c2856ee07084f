//! Request/response seams the card list talks to.

use rusqlite::Connection;

use crate::error::Result;
use crate::models::{CardDraft, CreditCard, DeleteOutcome, Payee};
use crate::store;

/// Card persistence as seen by the list screen.
#[allow(async_fn_in_trait)]
pub trait CardBackend {
    /// Full ordered card list.
    async fn get_cards(&self) -> Result<Vec<CreditCard>>;
    async fn delete_all(&self, ids: &[String]) -> Result<DeleteOutcome>;
    async fn save(&self, draft: CardDraft) -> Result<CreditCard>;
    /// Reference data used only for display.
    async fn load_payees(&self) -> Result<Vec<Payee>>;
}

/// The edit modal. Resolves to the submitted draft, or `None` when the
/// modal was dismissed without saving.
#[allow(async_fn_in_trait)]
pub trait CardEditor {
    async fn edit(&mut self, draft: CardDraft) -> Result<Option<CardDraft>>;
}

pub struct SqliteBackend {
    conn: Connection,
}

impl SqliteBackend {
    pub fn new(conn: Connection) -> Self {
        Self { conn }
    }
}

impl CardBackend for SqliteBackend {
    async fn get_cards(&self) -> Result<Vec<CreditCard>> {
        store::list_cards(&self.conn)
    }

    async fn delete_all(&self, ids: &[String]) -> Result<DeleteOutcome> {
        store::delete_cards(&self.conn, ids)
    }

    async fn save(&self, draft: CardDraft) -> Result<CreditCard> {
        store::save_card(&self.conn, &draft)
    }

    async fn load_payees(&self) -> Result<Vec<Payee>> {
        store::list_payees(&self.conn)
    }
}
