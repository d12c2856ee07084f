use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreditCard {
    pub id: String,
    pub account_id: Option<String>,
    pub processor_name: String,
    pub statement_closing_day: u8,
    pub payment_due_date: u8,
    /// Integer cents.
    pub credit_limit: i64,
    pub stage: Option<String>,
    #[serde(default)]
    pub actions: Vec<CardAction>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ActionOp {
    Set,
    LinkSchedule,
}

impl ActionOp {
    pub fn as_str(self) -> &'static str {
        match self {
            ActionOp::Set => "set",
            ActionOp::LinkSchedule => "link-schedule",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "set" => Some(ActionOp::Set),
            "link-schedule" => Some(ActionOp::LinkSchedule),
            _ => None,
        }
    }
}

/// Display-only transformation attached to a card.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CardAction {
    pub field: String,
    pub op: ActionOp,
    pub value: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<Value>,
}

/// Field values handed to the edit form and back to the store.
/// `id == None` means the card has not been persisted yet.
#[derive(Debug, Clone, PartialEq)]
pub struct CardDraft {
    pub id: Option<String>,
    pub account_id: Option<String>,
    pub processor_name: String,
    pub statement_closing_day: u8,
    pub payment_due_date: u8,
    pub credit_limit: i64,
    pub stage: Option<String>,
}

impl Default for CardDraft {
    fn default() -> Self {
        Self {
            id: None,
            account_id: None,
            processor_name: String::new(),
            statement_closing_day: 1,
            payment_due_date: 8,
            credit_limit: 0,
            stage: None,
        }
    }
}

impl From<&CreditCard> for CardDraft {
    fn from(card: &CreditCard) -> Self {
        Self {
            id: Some(card.id.clone()),
            account_id: card.account_id.clone(),
            processor_name: card.processor_name.clone(),
            statement_closing_day: card.statement_closing_day,
            payment_due_date: card.payment_due_date,
            credit_limit: card.credit_limit,
            stage: card.stage.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Payee {
    pub id: String,
    pub name: String,
}

/// Result of a bulk delete. Partial failure is reported, not raised.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DeleteOutcome {
    pub some_deletions_failed: bool,
}
