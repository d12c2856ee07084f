use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use ratatui::{
    layout::{Constraint, Layout},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::Paragraph,
    Frame,
};
use tokio::runtime::Runtime;

use crate::backend::{CardEditor, SqliteBackend};
use crate::controller::ListController;
use crate::db::{get_connection, init_db};
use crate::error::Result;
use crate::fmt::{describe_action, dollars_to_cents};
use crate::logging;
use crate::models::{CardDraft, CreditCard};
use crate::selection::SelectGesture;
use crate::settings::{db_path, load_settings, Settings};
use crate::tui::{
    self, ScreenAction, CURSOR_STYLE, FOOTER_STYLE, HEADER_STYLE, SELECTED_STYLE, STAGE_STYLE,
    WARNING_STYLE,
};
use crate::undo::UndoState;

// Field indices for CardForm, in from_draft() order
const ACCOUNT_IDX: usize = 0;
const PROCESSOR_IDX: usize = 1;
const CLOSING_IDX: usize = 2;
const DUE_IDX: usize = 3;
const LIMIT_IDX: usize = 4;
const STAGE_IDX: usize = 5;

const PARTIAL_DELETE_WARNING: &str = "Some cards were not deleted because of errors";

enum Mode {
    List,
    Filter,
    Form { form: CardForm, target: FormTarget },
    ConfirmDelete,
}

#[derive(Clone)]
enum FormTarget {
    Create,
    Edit(String),
}

struct CardForm {
    fields: Vec<FormField>,
    focused: usize,
}

struct FormField {
    label: &'static str,
    value: String,
    kind: FieldKind,
}

enum FieldKind {
    Text,
    Number,
}

impl CardForm {
    fn from_draft(draft: &CardDraft) -> Self {
        let field = |label, value: String, kind| FormField { label, value, kind };
        Self {
            fields: vec![
                field("Account", draft.account_id.clone().unwrap_or_default(), FieldKind::Text),
                field("Processor", draft.processor_name.clone(), FieldKind::Text),
                field("Closing Day", draft.statement_closing_day.to_string(), FieldKind::Number),
                field("Due Day", draft.payment_due_date.to_string(), FieldKind::Number),
                field(
                    "Credit Limit",
                    format!("{:.2}", draft.credit_limit as f64 / 100.0),
                    FieldKind::Number,
                ),
                field("Stage", draft.stage.clone().unwrap_or_default(), FieldKind::Text),
            ],
            focused: 0,
        }
    }

    fn to_draft(&self) -> std::result::Result<CardDraft, String> {
        let text = |idx: usize| self.fields[idx].value.trim().to_string();
        let optional = |idx: usize| Some(text(idx)).filter(|v| !v.is_empty());
        let day = |idx: usize| {
            text(idx)
                .parse::<u8>()
                .ok()
                .filter(|d| (1..=31).contains(d))
                .ok_or_else(|| format!("{} must be a day between 1 and 31", self.fields[idx].label))
        };
        let limit: f64 = text(LIMIT_IDX)
            .parse()
            .map_err(|_| "Credit limit must be a number".to_string())?;
        let credit_limit =
            dollars_to_cents(limit).ok_or_else(|| "Credit limit is out of range".to_string())?;

        Ok(CardDraft {
            id: None,
            account_id: optional(ACCOUNT_IDX),
            processor_name: text(PROCESSOR_IDX),
            statement_closing_day: day(CLOSING_IDX)?,
            payment_due_date: day(DUE_IDX)?,
            credit_limit,
            stage: optional(STAGE_IDX),
        })
    }
}

/// Edit modal whose answer is already known: the form was submitted.
struct SubmittedForm(Option<CardDraft>);

impl CardEditor for SubmittedForm {
    async fn edit(&mut self, _seed: CardDraft) -> Result<Option<CardDraft>> {
        Ok(self.0.take())
    }
}

pub struct CardManager {
    controller: ListController<SqliteBackend>,
    runtime: Runtime,
    undo: UndoState,
    cursor: usize,
    scroll_offset: usize,
    last_visible_rows: usize,
    load_more_rows: usize,
    mode: Mode,
    status_message: Option<String>,
    /// Remaining keypresses before the status message is cleared.
    status_ttl: u8,
}

impl CardManager {
    pub fn new(backend: SqliteBackend, settings: &Settings, undo: UndoState) -> Result<Self> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;
        let controller = ListController::new(backend, settings.list.clone(), undo.clone());

        let mut manager = Self {
            controller,
            runtime,
            undo,
            cursor: 0,
            scroll_offset: 0,
            last_visible_rows: 20,
            load_more_rows: settings.tui_load_more_rows,
            mode: Mode::List,
            status_message: None,
            status_ttl: 0,
        };
        if let Err(e) = manager.runtime.block_on(manager.controller.mount()) {
            manager.set_status(format!("Error: {e}"));
        }
        manager.sync_hover();
        Ok(manager)
    }

    fn set_status(&mut self, msg: String) {
        self.status_message = Some(msg);
        self.status_ttl = 3;
    }

    fn visible_len(&self) -> usize {
        self.controller.state().visible().len()
    }

    fn cursor_card(&self) -> Option<&CreditCard> {
        self.controller.state().visible().get(self.cursor).copied()
    }

    fn sync_hover(&mut self) {
        let id = self.cursor_card().map(|c| c.id.clone());
        self.controller.state_mut().set_hovered(id);
    }

    fn clamp_cursor(&mut self) {
        let len = self.visible_len();
        self.cursor = if len == 0 { 0 } else { self.cursor.min(len - 1) };
        self.ensure_visible();
        self.sync_hover();
    }

    fn ensure_visible(&mut self) {
        let rows = self.last_visible_rows.max(1);
        if self.cursor < self.scroll_offset {
            self.scroll_offset = self.cursor;
        } else if self.cursor >= self.scroll_offset + rows {
            self.scroll_offset = self.cursor + 1 - rows;
        }
    }

    fn focus(&mut self, id: &str) {
        if let Some(i) = self
            .controller
            .state()
            .visible()
            .iter()
            .position(|c| c.id == id)
        {
            self.cursor = i;
        }
        self.clamp_cursor();
    }

    /// Reveal more rows once the cursor is close to the end of the window.
    fn maybe_load_more(&mut self) {
        let len = self.visible_len();
        if len.saturating_sub(self.cursor) <= self.load_more_rows {
            self.controller.state_mut().load_more();
        }
    }

    pub fn draw(&mut self, frame: &mut Frame) {
        if let Mode::Form { form, target } = &self.mode {
            let title = match target {
                FormTarget::Create => "Create New Credit Card",
                FormTarget::Edit(_) => "Edit Credit Card",
            };
            self.draw_form(frame, title, form);
            return;
        }
        self.draw_list(frame);
    }

    fn draw_list(&mut self, frame: &mut Frame) {
        let area = frame.area();
        let border_style = Style::default().fg(Color::DarkGray);

        let [header_area, sep, content_area, hints_area] = Layout::vertical([
            Constraint::Length(1),
            Constraint::Length(1),
            Constraint::Fill(1),
            Constraint::Length(1),
        ])
        .areas(area);

        frame.render_widget(
            Paragraph::new(" Cardbook: Credit Cards").style(HEADER_STYLE),
            header_area,
        );

        let sep_line = "\u{2501}".repeat(area.width as usize);
        frame.render_widget(Paragraph::new(sep_line.as_str()).style(border_style), sep);

        let state = self.controller.state();
        let visible = state.visible();
        let selection = state.selection();
        let loading = if state.is_loading() { "  loading\u{2026}" } else { "" };

        let mut lines = vec![
            Line::from(""),
            Line::from(Span::styled(
                format!(
                    " Credit Cards ({} of {} loaded){loading}",
                    state.revealed(),
                    state.cards().len()
                ),
                Style::default().add_modifier(Modifier::BOLD),
            )),
            Line::from(Span::styled(
                " Attach a credit card to an account to keep track of statements and due dates.",
                FOOTER_STYLE,
            )),
        ];

        let filter_style = if matches!(self.mode, Mode::Filter) {
            Style::default().fg(Color::Cyan)
        } else {
            FOOTER_STYLE
        };
        let cursor_mark = if matches!(self.mode, Mode::Filter) { "_" } else { "" };
        let filter_text = if state.filter().is_empty() && !matches!(self.mode, Mode::Filter) {
            "Filter cards...".to_string()
        } else {
            format!("{}{cursor_mark}", state.filter())
        };
        lines.push(Line::from(vec![
            Span::styled(" Filter: ", FOOTER_STYLE),
            Span::styled(filter_text, filter_style),
        ]));
        lines.push(Line::from(""));

        let desc_width = (area.width as usize).saturating_sub(100).max(12);

        if visible.is_empty() {
            if state.cards().is_empty() {
                lines.push(Line::from("   No credit cards yet. Press 'n' to create one."));
            } else {
                lines.push(Line::from("   No loaded cards match the filter."));
            }
        } else {
            let all_mark = if selection.is_empty() { "[ ]" } else { "[x]" };
            lines.push(Line::from(Span::styled(
                format!(
                    " {all_mark} {:<8} {:<36} {:<14} {:<14} {:>5} {:>12}  {}",
                    "Stage", "Card", "Account", "Processor", "Days", "Limit", "Actions"
                ),
                Style::default()
                    .fg(Color::DarkGray)
                    .add_modifier(Modifier::BOLD),
            )));

            let data_rows = (content_area.height as usize).saturating_sub(lines.len());
            self.last_visible_rows = data_rows;

            let end = (self.scroll_offset + data_rows).min(visible.len());
            for (i, card) in visible.iter().enumerate().take(end).skip(self.scroll_offset) {
                let selected = selection.has(&card.id);
                let check = if selected { "[x]" } else { "[ ]" };
                let row_style = if selected {
                    SELECTED_STYLE
                } else if i == self.cursor {
                    CURSOR_STYLE
                } else {
                    Style::default()
                };
                let actions: Vec<String> = card
                    .actions
                    .iter()
                    .map(|a| describe_action(a, state.payees()))
                    .collect();
                let marker = if i == self.cursor { ">" } else { " " };

                lines.push(
                    Line::from(vec![
                        Span::raw(format!("{marker}{check} ")),
                        Span::styled(
                            format!("{:<8} ", truncate(card.stage.as_deref().unwrap_or(""), 8)),
                            STAGE_STYLE,
                        ),
                        Span::raw(format!(
                            "{:<36} {:<14} {:<14} {:>2}/{:<2} ",
                            card.id,
                            truncate(card.account_id.as_deref().unwrap_or("\u{2014}"), 14),
                            truncate(&card.processor_name, 14),
                            card.statement_closing_day,
                            card.payment_due_date,
                        )),
                        tui::limit_span(card.credit_limit),
                        Span::raw(format!("  {}", truncate(&actions.join("; "), desc_width))),
                    ])
                    .style(row_style),
                );
            }
        }

        if let Mode::ConfirmDelete = &self.mode {
            lines.push(Line::from(""));
            lines.push(Line::from(Span::styled(
                format!("   Delete {} cards? (y/n)", selection.size()),
                WARNING_STYLE,
            )));
        }

        frame.render_widget(Paragraph::new(lines), content_area);

        if let Some(msg) = &self.status_message {
            frame.render_widget(
                Paragraph::new(format!(" {msg}")).style(WARNING_STYLE),
                hints_area,
            );
        } else if let Mode::ConfirmDelete = &self.mode {
            frame.render_widget(
                Paragraph::new(" y=confirm  n=cancel").style(FOOTER_STYLE),
                hints_area,
            );
        } else if let Mode::Filter = &self.mode {
            frame.render_widget(
                Paragraph::new(" type to filter  Enter=done  Esc=clear").style(FOOTER_STYLE),
                hints_area,
            );
        } else {
            let delete_hint = if selection.is_empty() {
                String::new()
            } else {
                format!("  d=delete {} cards", selection.size())
            };
            frame.render_widget(
                Paragraph::new(format!(
                    " Space=select  a=all  /=filter  n=new  e=edit{delete_hint}  Esc=back"
                ))
                .style(FOOTER_STYLE),
                hints_area,
            );
        }
    }

    fn draw_form(&self, frame: &mut Frame, title: &str, form: &CardForm) {
        let area = frame.area();
        let border_style = Style::default().fg(Color::DarkGray);

        let [header_area, sep, content_area, hints_area] = Layout::vertical([
            Constraint::Length(1),
            Constraint::Length(1),
            Constraint::Fill(1),
            Constraint::Length(1),
        ])
        .areas(area);

        frame.render_widget(
            Paragraph::new(" Cardbook: Credit Cards").style(HEADER_STYLE),
            header_area,
        );

        let sep_line = "\u{2501}".repeat(area.width as usize);
        frame.render_widget(Paragraph::new(sep_line.as_str()).style(border_style), sep);

        let (intro, _) = tui::wrap_text(
            "Select an account to attach this credit card. The account keeps working as usual, \
             with extra help for tracking statements.",
            (area.width as usize).saturating_sub(4).min(76),
        );

        let mut lines = vec![
            Line::from(""),
            Line::from(Span::styled(
                format!(" {title}"),
                Style::default().add_modifier(Modifier::BOLD),
            )),
            Line::from(""),
        ];
        for l in intro.lines() {
            lines.push(Line::from(Span::styled(format!("   {l}"), FOOTER_STYLE)));
        }
        lines.push(Line::from(""));

        for (i, field) in form.fields.iter().enumerate() {
            let is_focused = i == form.focused;
            let label_style = if is_focused {
                Style::default().add_modifier(Modifier::BOLD)
            } else {
                Style::default()
            };
            let cursor = if is_focused { "_" } else { "" };
            lines.push(Line::from(vec![
                Span::styled(format!("   {:<14} ", field.label), label_style),
                Span::styled(
                    format!("{}{cursor}", field.value),
                    if is_focused {
                        Style::default().fg(Color::Cyan)
                    } else {
                        Style::default()
                    },
                ),
            ]));
        }

        if let Some(msg) = &self.status_message {
            lines.push(Line::from(""));
            lines.push(Line::from(Span::styled(format!("   {msg}"), WARNING_STYLE)));
        }

        frame.render_widget(Paragraph::new(lines), content_area);

        frame.render_widget(
            Paragraph::new(" Tab=next field  Enter=save  Esc=cancel").style(FOOTER_STYLE),
            hints_area,
        );
    }

    pub fn handle_key(&mut self, key: KeyEvent) -> ScreenAction {
        if self.status_ttl > 0 {
            self.status_ttl -= 1;
            if self.status_ttl == 0 {
                self.status_message = None;
            }
        }

        if key.modifiers.contains(KeyModifiers::CONTROL) {
            match key.code {
                KeyCode::Char('c') => return self.close(),
                KeyCode::Char('z') | KeyCode::Char('y') => {
                    self.handle_undo_shortcut();
                    return ScreenAction::Continue;
                }
                _ => {}
            }
        }

        match self.mode {
            Mode::List => self.handle_list_key(key),
            Mode::Filter => self.handle_filter_key(key.code),
            Mode::Form { .. } => self.handle_form_key(key.code),
            Mode::ConfirmDelete => self.handle_delete_key(key.code),
        }
    }

    fn handle_undo_shortcut(&mut self) {
        if self.undo.undo_allowed() {
            self.set_status("Nothing to undo".into());
        } else {
            self.set_status("Undo is not available while managing credit cards".into());
        }
    }

    fn close(&mut self) -> ScreenAction {
        self.controller.unmount();
        ScreenAction::Close
    }

    fn handle_list_key(&mut self, key: KeyEvent) -> ScreenAction {
        let busy = self.controller.state().is_loading();
        match key.code {
            KeyCode::Up => {
                self.cursor = self.cursor.saturating_sub(1);
                self.clamp_cursor();
            }
            KeyCode::Down => {
                self.cursor += 1;
                self.maybe_load_more();
                self.clamp_cursor();
            }
            KeyCode::PageDown => {
                self.cursor += self.last_visible_rows.max(1);
                self.maybe_load_more();
                self.clamp_cursor();
            }
            KeyCode::PageUp => {
                self.cursor = self.cursor.saturating_sub(self.last_visible_rows.max(1));
                self.clamp_cursor();
            }
            KeyCode::Char(' ') | KeyCode::Char('V') => {
                let gesture = if key.code == KeyCode::Char('V')
                    || key.modifiers.contains(KeyModifiers::SHIFT)
                {
                    SelectGesture::Range
                } else {
                    SelectGesture::Single
                };
                if let Some(id) = self.cursor_card().map(|c| c.id.clone()) {
                    self.controller.state_mut().toggle(&id, gesture);
                }
            }
            KeyCode::Char('a') => self.controller.state_mut().toggle_all(),
            KeyCode::Char('/') => self.mode = Mode::Filter,
            KeyCode::Char('n') if !busy => {
                self.status_message = None;
                self.mode = Mode::Form {
                    form: CardForm::from_draft(&CardDraft::default()),
                    target: FormTarget::Create,
                };
            }
            KeyCode::Char('e') | KeyCode::Enter if !busy => {
                if let Some(card) = self.cursor_card() {
                    let form = CardForm::from_draft(&CardDraft::from(card));
                    let target = FormTarget::Edit(card.id.clone());
                    self.status_message = None;
                    self.mode = Mode::Form { form, target };
                }
            }
            KeyCode::Char('d') if !busy => {
                if self.controller.state().selection().is_empty() {
                    self.set_status("Select cards with Space first".into());
                } else {
                    self.mode = Mode::ConfirmDelete;
                }
            }
            KeyCode::Char('q') | KeyCode::Esc => return self.close(),
            _ => {}
        }
        ScreenAction::Continue
    }

    fn handle_filter_key(&mut self, code: KeyCode) -> ScreenAction {
        let mut query = self.controller.state().filter().to_string();
        match code {
            KeyCode::Enter => {
                self.mode = Mode::List;
                return ScreenAction::Continue;
            }
            KeyCode::Esc => {
                query.clear();
                self.mode = Mode::List;
            }
            KeyCode::Backspace => {
                query.pop();
            }
            KeyCode::Char(c) => query.push(c),
            _ => return ScreenAction::Continue,
        }
        self.controller.state_mut().set_filter(query);
        self.cursor = 0;
        self.scroll_offset = 0;
        self.clamp_cursor();
        ScreenAction::Continue
    }

    fn handle_form_key(&mut self, code: KeyCode) -> ScreenAction {
        let Mode::Form { form, target } = &mut self.mode else {
            return ScreenAction::Continue;
        };

        match code {
            KeyCode::Esc => self.mode = Mode::List,
            KeyCode::Tab | KeyCode::Down => {
                form.focused = (form.focused + 1) % form.fields.len();
            }
            KeyCode::BackTab | KeyCode::Up => {
                form.focused = if form.focused == 0 {
                    form.fields.len() - 1
                } else {
                    form.focused - 1
                };
            }
            KeyCode::Char(c) => {
                let field = &mut form.fields[form.focused];
                let accepted = match field.kind {
                    FieldKind::Text => true,
                    FieldKind::Number => c.is_ascii_digit() || c == '.',
                };
                if accepted {
                    field.value.push(c);
                }
            }
            KeyCode::Backspace => {
                form.fields[form.focused].value.pop();
            }
            KeyCode::Enter => {
                let draft = match form.to_draft() {
                    Ok(d) => d,
                    Err(msg) => {
                        self.set_status(msg);
                        return ScreenAction::Continue;
                    }
                };
                let target = target.clone();
                self.submit(draft, target);
            }
            _ => {}
        }
        ScreenAction::Continue
    }

    fn submit(&mut self, draft: CardDraft, target: FormTarget) {
        let mut editor = SubmittedForm(Some(draft));
        let result = match &target {
            FormTarget::Create => self.runtime.block_on(self.controller.create(&mut editor)),
            FormTarget::Edit(id) => self.runtime.block_on(self.controller.edit(id, &mut editor)),
        };
        match result {
            Ok(Some(card)) => {
                self.mode = Mode::List;
                self.focus(&card.id);
                let verb = match target {
                    FormTarget::Create => "Created",
                    FormTarget::Edit(_) => "Saved",
                };
                self.set_status(format!("{verb} card {}", truncate(&card.id, 9)));
            }
            Ok(None) => self.mode = Mode::List,
            Err(e) => self.set_status(e.to_string()),
        }
    }

    fn handle_delete_key(&mut self, code: KeyCode) -> ScreenAction {
        match code {
            KeyCode::Char('y') => {
                self.mode = Mode::List;
                let count = self.controller.state().selection().size();
                match self.runtime.block_on(self.controller.delete_selected()) {
                    Ok(outcome) if outcome.some_deletions_failed => {
                        self.set_status(PARTIAL_DELETE_WARNING.into());
                    }
                    Ok(_) => self.set_status(format!("Deleted {count} cards")),
                    Err(e) => self.set_status(e.to_string()),
                }
                self.clamp_cursor();
            }
            KeyCode::Char('n') | KeyCode::Esc => self.mode = Mode::List,
            _ => {}
        }
        ScreenAction::Continue
    }
}

impl tui::Screen for CardManager {
    fn draw(&mut self, frame: &mut Frame) {
        CardManager::draw(self, frame);
    }

    fn handle_key(&mut self, key: KeyEvent) -> ScreenAction {
        CardManager::handle_key(self, key)
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let truncated: String = s.chars().take(max - 1).collect();
        format!("{truncated}\u{2026}")
    }
}

pub fn run() -> Result<()> {
    let settings = load_settings();
    let data_dir = std::path::PathBuf::from(&settings.data_dir);
    std::fs::create_dir_all(&data_dir)?;
    logging::init_to_file(&settings, &data_dir.join("cardbook.log"))?;

    let conn = get_connection(&db_path())?;
    init_db(&conn)?;

    let mut manager = CardManager::new(SqliteBackend::new(conn), &settings, UndoState::global())?;
    tui::run_screen(&mut manager)
}
