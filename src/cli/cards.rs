use chrono::NaiveDate;
use colored::Colorize;
use comfy_table::{Cell, Table};
use rusqlite::Connection;
use serde_json::{json, Value};
use tracing::warn;

use crate::db::{get_connection, init_db};
use crate::error::{CardError, Result};
use crate::filter;
use crate::fmt::{cents, describe_action, dollars_to_cents};
use crate::models::{ActionOp, CardAction};
use crate::settings::{db_path, get_data_dir};
use crate::store;

pub(crate) fn open_db() -> Result<Connection> {
    std::fs::create_dir_all(get_data_dir())?;
    let conn = get_connection(&db_path())?;
    init_db(&conn)?;
    Ok(conn)
}

pub fn list(query: Option<&str>) -> Result<()> {
    let conn = open_db()?;
    let cards = store::list_cards(&conn)?;
    let payees = store::list_payees(&conn)?;
    let shown = filter::apply(&cards, query.unwrap_or(""));

    if shown.is_empty() {
        println!("No credit cards yet.");
        return Ok(());
    }

    let mut table = Table::new();
    table.set_header(vec![
        "ID", "Account", "Processor", "Closing", "Due", "Limit", "Stage", "Actions",
    ]);
    for card in shown {
        let actions: Vec<String> = card
            .actions
            .iter()
            .map(|a| describe_action(a, &payees))
            .collect();
        table.add_row(vec![
            Cell::new(&card.id),
            Cell::new(card.account_id.as_deref().unwrap_or("")),
            Cell::new(&card.processor_name),
            Cell::new(card.statement_closing_day),
            Cell::new(card.payment_due_date),
            Cell::new(cents(card.credit_limit)),
            Cell::new(card.stage.as_deref().unwrap_or("")),
            Cell::new(actions.join("\n")),
        ]);
    }
    println!("Credit Cards\n{table}");
    Ok(())
}

/// Field values for `cards add`; `None` keeps the default (or the
/// existing card's value when upserting by account).
pub struct NewCard<'a> {
    pub account: Option<&'a str>,
    pub processor: Option<&'a str>,
    pub closing_day: Option<u8>,
    pub due_day: Option<u8>,
    pub limit: Option<f64>,
    pub stage: Option<&'a str>,
    pub set: &'a [String],
    pub link_schedule: Option<&'a str>,
}

pub fn add(new: &NewCard) -> Result<()> {
    let conn = open_db()?;

    let mut actions = new
        .set
        .iter()
        .map(|s| parse_set_action(s))
        .collect::<Result<Vec<_>>>()?;
    if let Some(link) = new.link_schedule {
        actions.push(parse_link_schedule(link)?);
    }

    let limit = new
        .limit
        .map(|dollars| {
            dollars_to_cents(dollars)
                .ok_or_else(|| CardError::Validation("Credit limit is out of range".into()))
        })
        .transpose()?;

    let card = store::upsert_card(
        &conn,
        new.account,
        |draft| {
            if let Some(p) = new.processor {
                draft.processor_name = p.to_string();
            }
            if let Some(day) = new.closing_day {
                draft.statement_closing_day = day;
            }
            if let Some(day) = new.due_day {
                draft.payment_due_date = day;
            }
            if let Some(cents) = limit {
                draft.credit_limit = cents;
            }
            if let Some(stage) = new.stage {
                draft.stage = Some(stage.to_string());
            }
        },
        &actions,
    )?;
    println!("Saved credit card: {}", card.id);
    Ok(())
}

pub fn delete(ids: &[String]) -> Result<()> {
    let conn = open_db()?;
    let outcome = store::delete_cards(&conn, ids)?;
    if outcome.some_deletions_failed {
        warn!(requested = ids.len(), "some credit card deletions failed");
        println!(
            "{}",
            "Some cards were not deleted because of errors".yellow()
        );
    } else {
        println!("Deleted {} credit cards", ids.len());
    }
    Ok(())
}

fn parse_set_action(spec: &str) -> Result<CardAction> {
    let (field, raw) = spec
        .split_once('=')
        .filter(|(field, _)| !field.trim().is_empty())
        .ok_or_else(|| CardError::Validation(format!("Expected FIELD=VALUE, got '{spec}'")))?;
    let value = serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()));
    Ok(CardAction {
        field: field.trim().to_string(),
        op: ActionOp::Set,
        value,
        options: None,
    })
}

fn parse_link_schedule(spec: &str) -> Result<CardAction> {
    let invalid = || CardError::Validation(format!("Expected PAYEE_ID@YYYY-MM-DD, got '{spec}'"));
    let (payee, next) = spec.split_once('@').ok_or_else(invalid)?;
    NaiveDate::parse_from_str(next, "%Y-%m-%d").map_err(|_| invalid())?;
    Ok(CardAction {
        field: "date".to_string(),
        op: ActionOp::LinkSchedule,
        value: json!({ "payee": payee, "next_date": next }),
        options: None,
    })
}
