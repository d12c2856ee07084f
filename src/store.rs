use std::collections::HashMap;

use rusqlite::{params, Connection, OptionalExtension};

use crate::error::{CardError, Result};
use crate::models::{ActionOp, CardAction, CardDraft, CreditCard, DeleteOutcome, Payee};

const CARD_COLUMNS: &str = "id, account_id, processor_name, statement_closing_day, payment_due_date, credit_limit, stage";

fn card_from_row(row: &rusqlite::Row) -> rusqlite::Result<CreditCard> {
    Ok(CreditCard {
        id: row.get(0)?,
        account_id: row.get(1)?,
        processor_name: row.get(2)?,
        statement_closing_day: row.get(3)?,
        payment_due_date: row.get(4)?,
        credit_limit: row.get(5)?,
        stage: row.get(6)?,
        actions: Vec::new(),
    })
}

/// All live cards in insertion order, with their actions.
pub fn list_cards(conn: &Connection) -> Result<Vec<CreditCard>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {CARD_COLUMNS} FROM credit_cards WHERE tombstone = 0 ORDER BY sort_order"
    ))?;
    let mut cards = stmt
        .query_map([], card_from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    let mut actions = load_actions(conn)?;
    for card in &mut cards {
        if let Some(list) = actions.remove(&card.id) {
            card.actions = list;
        }
    }
    Ok(cards)
}

pub fn get_card(conn: &Connection, id: &str) -> Result<Option<CreditCard>> {
    let card = conn
        .query_row(
            &format!("SELECT {CARD_COLUMNS} FROM credit_cards WHERE id = ?1 AND tombstone = 0"),
            [id],
            card_from_row,
        )
        .optional()?;
    match card {
        Some(mut card) => {
            card.actions = load_card_actions(conn, id)?;
            Ok(Some(card))
        }
        None => Ok(None),
    }
}

type ActionRow = (String, String, String, String, Option<String>);

fn action_row(row: &rusqlite::Row) -> rusqlite::Result<ActionRow> {
    Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?))
}

fn decode_action(field: String, op: String, value: String, options: Option<String>) -> Result<CardAction> {
    let op = ActionOp::parse(&op)
        .ok_or_else(|| CardError::Validation(format!("Unknown action op: {op}")))?;
    let options = match options {
        Some(text) => Some(serde_json::from_str(&text)?),
        None => None,
    };
    Ok(CardAction {
        field,
        op,
        value: serde_json::from_str(&value)?,
        options,
    })
}

fn load_actions(conn: &Connection) -> Result<HashMap<String, Vec<CardAction>>> {
    let mut stmt = conn.prepare(
        "SELECT card_id, field, op, value, options FROM card_actions ORDER BY card_id, position",
    )?;
    let rows = stmt
        .query_map([], action_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    let mut by_card: HashMap<String, Vec<CardAction>> = HashMap::new();
    for (card_id, field, op, value, options) in rows {
        by_card
            .entry(card_id)
            .or_default()
            .push(decode_action(field, op, value, options)?);
    }
    Ok(by_card)
}

fn load_card_actions(conn: &Connection, card_id: &str) -> Result<Vec<CardAction>> {
    let mut stmt = conn.prepare(
        "SELECT card_id, field, op, value, options FROM card_actions WHERE card_id = ?1 ORDER BY position",
    )?;
    let rows = stmt
        .query_map([card_id], action_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    rows.into_iter()
        .map(|(_, field, op, value, options)| decode_action(field, op, value, options))
        .collect()
}

/// Replace a card's actions wholesale.
pub fn set_actions(conn: &Connection, card_id: &str, actions: &[CardAction]) -> Result<()> {
    let tx = conn.unchecked_transaction()?;
    write_actions(&tx, card_id, actions)?;
    tx.commit()?;
    Ok(())
}

fn write_actions(conn: &Connection, card_id: &str, actions: &[CardAction]) -> Result<()> {
    conn.execute("DELETE FROM card_actions WHERE card_id = ?1", [card_id])?;
    for (position, action) in actions.iter().enumerate() {
        let options = action
            .options
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;
        conn.execute(
            "INSERT INTO card_actions (card_id, position, field, op, value, options) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                card_id,
                position as i64,
                action.field,
                action.op.as_str(),
                serde_json::to_string(&action.value)?,
                options,
            ],
        )?;
    }
    Ok(())
}

/// Tombstone every id. An already-deleted id counts as deleted; an id that
/// never existed is reported as a partial failure. The rest are still deleted.
pub fn delete_cards(conn: &Connection, ids: &[String]) -> Result<DeleteOutcome> {
    let tx = conn.unchecked_transaction()?;
    let mut outcome = DeleteOutcome::default();
    for id in ids {
        let changed = tx.execute(
            "UPDATE credit_cards SET tombstone = 1 WHERE id = ?1 AND tombstone = 0",
            [id],
        )?;
        if changed == 0 {
            let exists: bool = tx.query_row(
                "SELECT EXISTS(SELECT 1 FROM credit_cards WHERE id = ?1)",
                [id],
                |row| row.get(0),
            )?;
            if !exists {
                outcome.some_deletions_failed = true;
            }
        }
    }
    tx.commit()?;
    Ok(outcome)
}

fn validate(draft: &CardDraft) -> Result<()> {
    if !(1..=31).contains(&draft.statement_closing_day) {
        return Err(CardError::Validation(
            "Statement closing day must be between 1 and 31".into(),
        ));
    }
    if !(1..=31).contains(&draft.payment_due_date) {
        return Err(CardError::Validation(
            "Payment due day must be between 1 and 31".into(),
        ));
    }
    if draft.credit_limit < 0 {
        return Err(CardError::Validation("Credit limit cannot be negative".into()));
    }
    Ok(())
}

fn new_id() -> String {
    let bytes: [u8; 16] = rand::random();
    let h = hex::encode(bytes);
    format!("{}-{}-{}-{}-{}", &h[0..8], &h[8..12], &h[12..16], &h[16..20], &h[20..32])
}

fn insert_card(conn: &Connection, draft: &CardDraft) -> Result<String> {
    let id = new_id();
    conn.execute(
        "INSERT INTO credit_cards (id, account_id, processor_name, statement_closing_day, payment_due_date, credit_limit, stage, sort_order)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, (SELECT COALESCE(MAX(sort_order), 0) + 1 FROM credit_cards))",
        params![
            id,
            draft.account_id,
            draft.processor_name,
            draft.statement_closing_day,
            draft.payment_due_date,
            draft.credit_limit,
            draft.stage,
        ],
    )?;
    Ok(id)
}

/// Insert a new card (draft without id) or update an existing one.
pub fn save_card(conn: &Connection, draft: &CardDraft) -> Result<CreditCard> {
    validate(draft)?;
    let id = match &draft.id {
        None => insert_card(conn, draft)?,
        Some(id) => {
            let changed = conn.execute(
                "UPDATE credit_cards SET account_id = ?2, processor_name = ?3, statement_closing_day = ?4,
                 payment_due_date = ?5, credit_limit = ?6, stage = ?7 WHERE id = ?1 AND tombstone = 0",
                params![
                    id,
                    draft.account_id,
                    draft.processor_name,
                    draft.statement_closing_day,
                    draft.payment_due_date,
                    draft.credit_limit,
                    draft.stage,
                ],
            )?;
            if changed == 0 {
                return Err(CardError::UnknownCard(id.clone()));
            }
            id.clone()
        }
    };
    get_card(conn, &id)?.ok_or(CardError::UnknownCard(id))
}

fn card_for_account(conn: &Connection, account_id: &str) -> Result<Option<String>> {
    let id = conn
        .query_row(
            "SELECT id FROM credit_cards WHERE unicode_lower(account_id) = ?1 AND tombstone = 0
             ORDER BY sort_order LIMIT 1",
            [account_id.to_lowercase()],
            |row| row.get(0),
        )
        .optional()?;
    Ok(id)
}

/// Return the live card attached to `account_id` (compared case-insensitively),
/// creating one with default fields when none exists.
pub fn create_credit_card(conn: &Connection, account_id: &str) -> Result<String> {
    if let Some(id) = card_for_account(conn, account_id)? {
        return Ok(id);
    }
    let draft = CardDraft {
        account_id: Some(account_id.to_string()),
        ..CardDraft::default()
    };
    insert_card(conn, &draft)
}

/// Create or update a card in one transaction: the card attached to
/// `account_id` when given, otherwise a new one. `edit` adjusts the fields
/// before validation, and non-empty `actions` replace the card's actions.
/// Nothing is written when any step fails.
pub fn upsert_card<F>(
    conn: &Connection,
    account_id: Option<&str>,
    edit: F,
    actions: &[CardAction],
) -> Result<CreditCard>
where
    F: FnOnce(&mut CardDraft),
{
    let tx = conn.unchecked_transaction()?;
    let mut draft = match account_id {
        Some(account) => match card_for_account(&tx, account)? {
            Some(id) => {
                let card = get_card(&tx, &id)?.ok_or(CardError::UnknownCard(id))?;
                CardDraft::from(&card)
            }
            None => CardDraft {
                account_id: Some(account.to_string()),
                ..CardDraft::default()
            },
        },
        None => CardDraft::default(),
    };
    edit(&mut draft);

    let saved = save_card(&tx, &draft)?;
    if !actions.is_empty() {
        write_actions(&tx, &saved.id, actions)?;
    }
    let card = get_card(&tx, &saved.id)?.ok_or(CardError::UnknownCard(saved.id))?;
    tx.commit()?;
    Ok(card)
}

pub fn list_payees(conn: &Connection) -> Result<Vec<Payee>> {
    let mut stmt = conn.prepare("SELECT id, name FROM payees ORDER BY name")?;
    let payees = stmt
        .query_map([], |row| {
            Ok(Payee {
                id: row.get(0)?,
                name: row.get(1)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(payees)
}

pub fn add_payee(conn: &Connection, name: &str) -> Result<Payee> {
    let name = name.trim();
    if name.is_empty() {
        return Err(CardError::Validation("Payee name cannot be empty".into()));
    }
    let payee = Payee {
        id: new_id(),
        name: name.to_string(),
    };
    conn.execute(
        "INSERT INTO payees (id, name) VALUES (?1, ?2)",
        params![payee.id, payee.name],
    )?;
    Ok(payee)
}
