use std::sync::Arc;

use crossterm::event::{KeyCode, KeyEvent};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::action::Action;
use crate::aggregate::Aggregator;
use crate::command::{Command, CommandInterpreter, Feed};
use crate::dataset::Dataset;
use crate::detail::DetailView;
use crate::error::AckError;
use crate::event::Event;
use crate::forge::Forge;
use crate::ui;
use crate::view::{PageDirection, ViewEngine};

pub struct App {
    pub view: ViewEngine,
    pub commands: CommandInterpreter,
    pub detail: Option<DetailView>,
    pub owner: String,
    pub repo: String,
    pub loading: bool,
    pub error: Option<String>,
    pub should_quit: bool,
    width: u16,
    height: u16,
    load_id: u64,
    forge: Arc<dyn Forge>,
    aggregator: Arc<Aggregator>,
    cancel: CancellationToken,
    action_tx: mpsc::UnboundedSender<Action>,
}

impl App {
    pub fn new(
        forge: Arc<dyn Forge>,
        aggregator: Aggregator,
        owner: String,
        repo: String,
        (width, height): (u16, u16),
        action_tx: mpsc::UnboundedSender<Action>,
    ) -> Self {
        Self {
            view: ViewEngine::new(Dataset::default(), ui::table_rows(height)),
            commands: CommandInterpreter::new(),
            detail: None,
            owner,
            repo,
            loading: false,
            error: None,
            should_quit: false,
            width,
            height,
            load_id: 0,
            forge,
            aggregator: Arc::new(aggregator),
            cancel: CancellationToken::new(),
            action_tx,
        }
    }

    /// Abandon any refresh still in flight. Its result, if it ever
    /// arrives, lands in a closed channel.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }

    pub fn handle_event(&mut self, event: Event) -> Action {
        match event {
            Event::Init => Action::Refresh,
            Event::Resize(w, h) => Action::Resize(w, h),
            Event::Key(key) => self.handle_key(key),
            _ => Action::None,
        }
    }

    fn handle_key(&mut self, key: KeyEvent) -> Action {
        if self.detail.is_some() {
            return match key.code {
                KeyCode::Char('q') | KeyCode::Esc => Action::CloseDetail,
                KeyCode::Char('j') | KeyCode::Down => Action::ScrollDown,
                KeyCode::Char('k') | KeyCode::Up => Action::ScrollUp,
                KeyCode::Char('h') | KeyCode::Left => Action::ScrollLeft,
                KeyCode::Char('l') | KeyCode::Right => Action::ScrollRight,
                KeyCode::PageDown => Action::PageDown,
                KeyCode::PageUp => Action::PageUp,
                KeyCode::Char('g') => Action::GoToTop,
                KeyCode::Char('G') => Action::GoToBottom,
                KeyCode::Char('b') | KeyCode::Char('o') => Action::OpenInBrowser,
                _ => Action::None,
            };
        }

        match self.commands.feed(key.code) {
            Feed::Command(command) => return command_action(command),
            Feed::Pending | Feed::Cancelled => return Action::None,
            Feed::Ignored => {}
        }

        match key.code {
            KeyCode::Char('j') | KeyCode::Down => Action::ScrollDown,
            KeyCode::Char('k') | KeyCode::Up => Action::ScrollUp,
            KeyCode::PageDown => Action::PageDown,
            KeyCode::PageUp => Action::PageUp,
            KeyCode::Char('g') | KeyCode::Home => Action::GoToTop,
            KeyCode::Char('G') | KeyCode::End => Action::GoToBottom,
            KeyCode::Char('d') | KeyCode::Enter => Action::OpenDetail,
            KeyCode::Char('b') => Action::OpenInBrowser,
            _ => Action::None,
        }
    }

    pub fn update(&mut self, action: Action) {
        if self.error.is_some()
            && !matches!(
                action,
                Action::None
                    | Action::Error(_)
                    | Action::Resize(..)
                    | Action::RefreshLoaded(..)
                    | Action::RefreshFailed(..)
            )
        {
            self.error = None;
        }

        match action {
            Action::Quit => {
                self.should_quit = true;
                self.shutdown();
            }
            Action::ScrollDown => match &mut self.detail {
                Some(detail) => detail.scroll_by(1, ui::detail_rows(self.height)),
                None => self.view.move_cursor(1),
            },
            Action::ScrollUp => match &mut self.detail {
                Some(detail) => detail.scroll_by(-1, ui::detail_rows(self.height)),
                None => self.view.move_cursor(-1),
            },
            Action::ScrollRight => {
                if let Some(detail) = &mut self.detail {
                    detail.shift_by(4, ui::detail_cols(self.width));
                }
            }
            Action::ScrollLeft => {
                if let Some(detail) = &mut self.detail {
                    detail.shift_by(-4, ui::detail_cols(self.width));
                }
            }
            Action::PageDown => self.page(PageDirection::Down),
            Action::PageUp => self.page(PageDirection::Up),
            Action::GoToTop => match &mut self.detail {
                Some(detail) => detail.to_top(),
                None => self.view.jump_to_first(),
            },
            Action::GoToBottom => match &mut self.detail {
                Some(detail) => detail.to_bottom(ui::detail_rows(self.height)),
                None => self.view.jump_to_last(),
            },
            Action::Resize(width, height) => {
                self.width = width;
                self.height = height;
                self.view.set_viewport(ui::table_rows(height));
                if let Some(detail) = &mut self.detail {
                    detail.scroll_by(0, ui::detail_rows(height));
                    detail.shift_by(0, ui::detail_cols(width));
                }
            }

            Action::OpenDetail => {
                if let Some(pr) = self.view.selected() {
                    self.detail = Some(DetailView::new(&pr));
                }
            }
            Action::CloseDetail => {
                self.detail = None;
            }

            Action::SetSort(key) => self.view.set_sort(key),
            Action::SetFilter(column, pattern) => {
                if let Err(e) = self.view.set_filter(column, &pattern) {
                    self.error = Some(e.to_string());
                }
            }
            Action::ClearFilters => self.view.clear_filters(),

            Action::Refresh => {
                self.load_id += 1;
                self.loading = true;
                self.spawn_refresh(self.load_id);
            }
            Action::RefreshLoaded(summaries, load_id) => {
                if load_id != self.load_id {
                    tracing::debug!(load_id, current = self.load_id, "dropping superseded refresh");
                    return;
                }
                self.loading = false;
                self.view.replace_dataset(summaries);
            }
            Action::RefreshFailed(msg, load_id) => {
                if load_id != self.load_id {
                    return;
                }
                tracing::warn!(error = %msg, "refresh failed, keeping previous data");
                self.loading = false;
                self.error = Some(msg);
            }

            Action::OpenInBrowser => {
                let url = match &self.detail {
                    Some(detail) => Some(detail.url.clone()),
                    None => self.view.selected().map(|pr| pr.url),
                };
                if let Some(url) = url.filter(|u| !u.is_empty()) {
                    if let Err(e) = open::that_detached(&url) {
                        tracing::warn!(%url, error = %e, "failed to open browser");
                        self.action_tx.send(AckError::from(e).into()).ok();
                    }
                }
            }

            Action::Error(msg) => {
                self.error = Some(msg);
            }
            Action::None => {}
        }
    }

    fn page(&mut self, direction: PageDirection) {
        match &mut self.detail {
            Some(detail) => detail.page(direction, ui::detail_rows(self.height)),
            None => self.view.page_move(direction),
        }
    }

    fn spawn_refresh(&self, load_id: u64) {
        let tx = self.action_tx.clone();
        let forge = Arc::clone(&self.forge);
        let aggregator = Arc::clone(&self.aggregator);
        let cancel = self.cancel.clone();
        let owner = self.owner.clone();
        let repo = self.repo.clone();
        tokio::spawn(async move {
            let fetched = tokio::select! {
                biased;
                _ = cancel.cancelled() => return,
                result = forge.fetch_repository(&owner, &repo) => result,
            };
            match fetched {
                Ok(prs) => {
                    let summaries = aggregator.aggregate_all(&prs);
                    tx.send(Action::RefreshLoaded(summaries, load_id)).ok();
                }
                Err(e) => {
                    tx.send(Action::RefreshFailed(e.to_string(), load_id)).ok();
                }
            }
        });
    }
}

fn command_action(command: Command) -> Action {
    match command {
        Command::Quit => Action::Quit,
        Command::Refresh => Action::Refresh,
        Command::ClearFilters => Action::ClearFilters,
        Command::SetSort(key) => Action::SetSort(key),
        Command::SetFilter(column, pattern) => Action::SetFilter(column, pattern),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::{TimeZone, Utc};
    use crossterm::event::KeyModifiers;
    use std::sync::Mutex;

    use crate::classify::Classifier;
    use crate::config::{GeneralConfig, Vocabulary};
    use crate::error::Result;
    use crate::types::{Comment, PrMetadata, PullRequestData, VerdictCategory};
    use crate::view::Column;

    /// Serves queued responses, one per fetch.
    #[derive(Debug)]
    struct FakeForge {
        responses: Mutex<Vec<Result<Vec<PullRequestData>>>>,
    }

    impl FakeForge {
        fn with(mut responses: Vec<Result<Vec<PullRequestData>>>) -> Arc<Self> {
            responses.reverse();
            Arc::new(Self {
                responses: Mutex::new(responses),
            })
        }
    }

    #[async_trait]
    impl Forge for FakeForge {
        fn name(&self) -> &str {
            "fake"
        }

        async fn check_repository(&self, _owner: &str, _repo: &str) -> Result<()> {
            Ok(())
        }

        async fn fetch_repository(&self, _owner: &str, _repo: &str) -> Result<Vec<PullRequestData>> {
            self.responses
                .lock()
                .unwrap()
                .pop()
                .unwrap_or_else(|| Ok(Vec::new()))
        }
    }

    fn pr(number: u64, author: &str, acks: &[&str]) -> PullRequestData {
        PullRequestData {
            meta: PrMetadata {
                number,
                title: format!("PR {}", number),
                author: author.to_string(),
                url: format!("https://github.com/o/r/pull/{}", number),
                head_commit: Some("abcdef1234".to_string()),
                ..Default::default()
            },
            comments: acks
                .iter()
                .enumerate()
                .map(|(i, who)| Comment {
                    author: who.to_string(),
                    body: "ACK abcdef1".to_string(),
                    submitted_at_commit: None,
                    created_at: Utc.with_ymd_and_hms(2024, 1, 1, 0, i as u32, 0).unwrap(),
                })
                .collect(),
            force_pushes: Vec::new(),
        }
    }

    fn app(forge: Arc<dyn Forge>) -> (App, mpsc::UnboundedReceiver<Action>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let classifier = Classifier::new(&Vocabulary::default()).unwrap();
        let aggregator = Aggregator::new(classifier, &GeneralConfig::default());
        let app = App::new(
            forge,
            aggregator,
            "o".to_string(),
            "r".to_string(),
            (120, 30),
            tx,
        );
        (app, rx)
    }

    fn key(app: &mut App, code: KeyCode) {
        let action = app.handle_event(Event::Key(KeyEvent::new(code, KeyModifiers::NONE)));
        app.update(action);
    }

    fn type_str(app: &mut App, s: &str) {
        for c in s.chars() {
            key(app, KeyCode::Char(c));
        }
    }

    async fn refresh(app: &mut App, rx: &mut mpsc::UnboundedReceiver<Action>) {
        app.update(Action::Refresh);
        assert!(app.loading);
        let action = rx.recv().await.unwrap();
        app.update(action);
    }

    #[tokio::test]
    async fn refresh_hands_over_aggregated_dataset() {
        let forge = FakeForge::with(vec![Ok(vec![
            pr(1, "alice", &["bob"]),
            pr(2, "alice", &["bob", "carol"]),
        ])]);
        let (mut app, mut rx) = app(forge);

        refresh(&mut app, &mut rx).await;

        assert!(!app.loading);
        assert_eq!(app.view.project().numbers(), vec![2, 1]);
        assert_eq!(app.view.project().get(0).unwrap().count(VerdictCategory::Ack), 2);
    }

    #[tokio::test]
    async fn failed_refresh_keeps_previous_dataset() {
        let forge = FakeForge::with(vec![
            Ok(vec![pr(5, "alice", &["bob"])]),
            Err(AckError::Api("502 Bad Gateway".to_string())),
        ]);
        let (mut app, mut rx) = app(forge);

        refresh(&mut app, &mut rx).await;
        refresh(&mut app, &mut rx).await;

        assert!(!app.loading);
        assert_eq!(app.view.project().numbers(), vec![5]);
        assert_eq!(app.error.as_deref(), Some("API error: 502 Bad Gateway"));
    }

    #[tokio::test]
    async fn superseded_refresh_is_dropped() {
        let forge = FakeForge::with(vec![
            Ok(vec![pr(1, "alice", &[])]),
            Ok(vec![pr(2, "alice", &[]), pr(3, "alice", &[])]),
        ]);
        let (mut app, mut rx) = app(forge);

        app.update(Action::Refresh);
        let first = rx.recv().await.unwrap();
        app.update(Action::Refresh);
        let second = rx.recv().await.unwrap();

        app.update(second);
        app.update(first);
        assert_eq!(app.view.project().numbers(), vec![2, 3]);
    }

    #[tokio::test]
    async fn refresh_after_shutdown_sends_nothing() {
        let forge = FakeForge::with(vec![Ok(vec![pr(1, "alice", &[])])]);
        let (mut app, mut rx) = app(forge);

        app.shutdown();
        app.update(Action::Refresh);
        drop(app);
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn filter_keystrokes_match_direct_call() {
        let forge = FakeForge::with(vec![Ok(vec![
            pr(1, "achow101", &[]),
            pr(2, "alice", &[]),
        ])]);
        let (mut app, mut rx) = app(forge);
        refresh(&mut app, &mut rx).await;

        type_str(&mut app, ":fo/achow101");
        assert_eq!(app.commands.buffer(), ":fo/achow101");
        key(&mut app, KeyCode::Enter);

        let mut direct = ViewEngine::new(Dataset::default(), app.view.viewport());
        direct.replace_dataset(app.view.dataset().all().to_vec());
        direct.set_filter(Column::Author, "achow101").unwrap();

        assert_eq!(
            app.view.state().filter_patterns(),
            direct.state().filter_patterns()
        );
        assert_eq!(app.view.project().numbers(), direct.project().numbers());
        assert_eq!(app.view.project().numbers(), vec![1]);
    }

    #[tokio::test]
    async fn unknown_filter_column_applies_nothing() {
        let forge = FakeForge::with(vec![Ok(vec![pr(1, "alice", &[])])]);
        let (mut app, mut rx) = app(forge);
        refresh(&mut app, &mut rx).await;

        type_str(&mut app, ":fx");
        assert!(!app.commands.is_active());
        assert!(app.view.state().filters.is_empty());
        // `j` is navigation again, not part of a command
        key(&mut app, KeyCode::Char('j'));
        assert!(!app.commands.is_active());
    }

    #[tokio::test]
    async fn malformed_filter_is_reported() {
        let forge = FakeForge::with(vec![Ok(vec![pr(1, "alice", &[])])]);
        let (mut app, mut rx) = app(forge);
        refresh(&mut app, &mut rx).await;

        type_str(&mut app, ":ft/Fix");
        key(&mut app, KeyCode::Enter);
        type_str(&mut app, ":ft/(");
        key(&mut app, KeyCode::Enter);

        assert!(app.error.as_deref().unwrap().contains("Invalid filter pattern"));
        assert_eq!(app.view.state().filter_patterns(), vec![(Column::Title, "Fix")]);
    }

    #[tokio::test]
    async fn sort_command_changes_order() {
        let forge = FakeForge::with(vec![Ok(vec![
            pr(1, "alice", &["bob", "carol"]),
            pr(2, "alice", &[]),
        ])]);
        let (mut app, mut rx) = app(forge);
        refresh(&mut app, &mut rx).await;
        assert_eq!(app.view.project().numbers(), vec![1, 2]);

        type_str(&mut app, ":sn");
        assert_eq!(app.view.state().sort_key, VerdictCategory::Nack);
        assert_eq!(app.view.project().numbers(), vec![1, 2]);
    }

    #[tokio::test]
    async fn detail_view_opens_and_closes() {
        let forge = FakeForge::with(vec![Ok(vec![
            pr(1, "alice", &["bob"]),
            pr(2, "alice", &[]),
        ])]);
        let (mut app, mut rx) = app(forge);
        refresh(&mut app, &mut rx).await;

        key(&mut app, KeyCode::Char('j'));
        key(&mut app, KeyCode::Char('d'));
        assert_eq!(app.detail.as_ref().map(|d| d.number), Some(2));

        // navigation now scrolls the detail, not the table
        key(&mut app, KeyCode::Char('k'));
        assert_eq!(app.view.state().cursor, 1);

        key(&mut app, KeyCode::Char('q'));
        assert!(app.detail.is_none());
        assert!(!app.should_quit);
    }

    #[tokio::test]
    async fn quit_command_and_ctrl_c() {
        let (mut app, _rx) = app(FakeForge::with(Vec::new()));
        key(&mut app, KeyCode::Char('q'));
        assert!(!app.should_quit);
        type_str(&mut app, ":q");
        assert!(app.should_quit);

        let ctrl_c = Event::Key(KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL));
        assert!(ctrl_c.is_quit());
    }

    #[tokio::test]
    async fn errors_reach_the_status_line_and_clear_on_next_key() {
        let (mut app, _rx) = app(FakeForge::with(Vec::new()));
        app.update(AckError::Api("rate limited".to_string()).into());
        assert_eq!(app.error.as_deref(), Some("API error: rate limited"));
        key(&mut app, KeyCode::Char('j'));
        assert!(app.error.is_none());
    }

    #[tokio::test]
    async fn resize_updates_viewport() {
        let (mut app, _rx) = app(FakeForge::with(Vec::new()));
        app.update(Action::Resize(80, 50));
        assert_eq!(app.view.viewport(), ui::table_rows(50));
    }
}
