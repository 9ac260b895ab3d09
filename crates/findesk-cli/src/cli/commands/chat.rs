//! Interactive chat command handler.
//!
//! A line-oriented session over stdin. Plain lines are sent as turns; lines
//! starting with `/` drive analysis mode, news search, reference selection
//! and report export.

use std::io::{self, Stdout, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use findesk_core::client::HttpGenerator;
use findesk_core::config::Config;
use findesk_core::controller::{SessionController, ToggleOutcome, TurnOutcome, notice_for};
use findesk_core::error::SendRejected;
use findesk_core::export::ReportExport;
use findesk_core::search::NewsSearch;
use findesk_core::session::{ReferenceItem, SearchStatus, SessionState, SessionStore};
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::cli::render::{self, TranscriptRenderer};

const HELP: &str = "\
Commands:
  /mode on|off     Toggle analysis mode
  /search <query>  Search the latest news
  /news            Show the last search results
  /select <n>      Select or deselect result n as a reference (analysis mode)
  /analyze <n>     Quick analysis of result n
  /refs            Show selected references
  /export [dir]    Save the latest report as Markdown
  /help            Show this help
  /quit            Leave the chat";

pub async fn run(config: &Config, base_url: &str) -> Result<()> {
    let initial = if config.greeting {
        SessionState::with_greeting()
    } else {
        SessionState::default()
    };
    let store = SessionStore::new(initial);
    let generator = HttpGenerator::new(base_url, config.generation_timeout())?;
    let search = NewsSearch::new(base_url, config.search_timeout())?;

    let mut repl = Repl {
        controller: SessionController::new(store.clone(), generator),
        search,
        export_dir: config.effective_export_dir(),
        renderer: TranscriptRenderer::new(io::stdout()),
        rx: store.subscribe(),
        store,
    };

    println!("findesk chat ({base_url}). Type /help for commands.\n");
    let state = repl.store.snapshot();
    repl.renderer.render(&state)?;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        repl.prompt()?;
        let Some(line) = lines.next_line().await.context("read stdin")? else {
            break;
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        match line.strip_prefix('/') {
            Some(command) => {
                if !repl.command(command).await? {
                    break;
                }
            }
            None => repl.turn(line).await?,
        }
    }

    tracing::debug!("chat session ended");
    Ok(())
}

struct Repl {
    controller: SessionController<HttpGenerator>,
    store: SessionStore,
    search: NewsSearch,
    export_dir: PathBuf,
    renderer: TranscriptRenderer<Stdout>,
    rx: tokio::sync::watch::Receiver<SessionState>,
}

impl Repl {
    fn prompt(&self) -> io::Result<()> {
        let mode = if self.store.read(SessionState::analysis_mode) {
            "analysis"
        } else {
            "chat"
        };
        let mut out = io::stdout();
        write!(out, "{mode}> ")?;
        out.flush()
    }

    /// Runs one slash command. Returns `false` when the session should end.
    async fn command(&mut self, input: &str) -> Result<bool> {
        let (name, arg) = match input.split_once(char::is_whitespace) {
            Some((name, arg)) => (name, arg.trim()),
            None => (input, ""),
        };

        match name {
            "quit" | "exit" => return Ok(false),
            "help" => println!("{HELP}"),
            "mode" => match arg {
                "on" => {
                    self.controller.set_analysis_mode(true);
                    println!("Analysis mode on. Select references with /select <n>.");
                }
                "off" => {
                    self.controller.set_analysis_mode(false);
                    println!("Analysis mode off.");
                }
                _ => println!("Usage: /mode on|off"),
            },
            "search" => self.search(arg).await,
            "news" => self.print_results(),
            "select" => {
                if let Some(item) = self.result_at(arg) {
                    let title = item.display_title();
                    match self.controller.toggle_reference(item) {
                        Ok(ToggleOutcome::Selected) => println!("Selected: {title}"),
                        Ok(ToggleOutcome::Deselected) => println!("Deselected: {title}"),
                        Err(rejected) => println!("{}", notice_for(rejected)),
                    }
                }
            }
            "analyze" => {
                if let Some(item) = self.result_at(arg) {
                    let outcome = render::follow(
                        self.controller.analyze(item),
                        &mut self.rx,
                        &mut self.renderer,
                    )
                    .await?;
                    self.after_turn(outcome);
                }
            }
            "refs" => {
                let selected = self.store.read(|state| state.selected_references().to_vec());
                if selected.is_empty() {
                    println!("No references selected.");
                }
                for (i, item) in selected.iter().enumerate() {
                    println!("{}. {} <{}>", i + 1, item.display_title(), item.link);
                }
            }
            "export" => self.export(arg),
            other => println!("Unknown command '/{other}'. Type /help for commands."),
        }

        Ok(true)
    }

    async fn turn(&mut self, text: &str) -> Result<()> {
        let outcome =
            render::follow(self.controller.send(text), &mut self.rx, &mut self.renderer).await?;
        self.after_turn(outcome);
        Ok(())
    }

    fn after_turn(&self, outcome: Result<TurnOutcome, SendRejected>) {
        match outcome {
            Ok(TurnOutcome::Completed { .. }) => {
                let is_report = self
                    .store
                    .read(|state| state.last_message().is_some_and(|m| m.is_report()));
                if is_report {
                    println!("(Report ready. /export to save it as Markdown.)\n");
                }
            }
            Ok(TurnOutcome::Failed { error, .. }) => {
                tracing::debug!(%error, "turn failed in chat");
            }
            Err(rejected) => println!("{rejected}"),
        }
    }

    async fn search(&self, query: &str) {
        println!("Searching...");
        match self.controller.search(&self.search, query).await {
            Ok(_) => self.print_results(),
            Err(rejected) => println!("{rejected}"),
        }
    }

    fn print_results(&self) {
        let search = self.store.read(|state| state.search().clone());
        match search.status() {
            SearchStatus::Idle => println!("No search yet. Try /search <query>."),
            SearchStatus::Loading => println!("Search in progress."),
            SearchStatus::Done(outcome) => match outcome.notice(search.query()) {
                Some(notice) => println!("{notice}"),
                None => {
                    for (i, item) in search.results().iter().enumerate() {
                        let marker = if self.store.read(|state| state.is_selected(&item.link)) {
                            "*"
                        } else {
                            " "
                        };
                        println!("{marker}{:>2}. {}", i + 1, item.display_title());
                    }
                }
            },
        }
    }

    /// Looks up a 1-based result index, printing a hint when it is invalid.
    fn result_at(&self, arg: &str) -> Option<ReferenceItem> {
        let item = arg.parse::<usize>().ok().and_then(|n| {
            self.store
                .read(|state| state.search().results().get(n.checked_sub(1)?).cloned())
        });
        if item.is_none() {
            println!("No result '{arg}'. Use /news to list results.");
        }
        item
    }

    fn export(&self, arg: &str) {
        let report = self.store.read(|state| {
            state
                .latest_report()
                .and_then(|message| ReportExport::from_message(message))
        });
        let Some(report) = report else {
            println!("No report to export yet.");
            return;
        };

        let dir = if arg.is_empty() {
            self.export_dir.clone()
        } else {
            PathBuf::from(arg)
        };
        match report.write_to(&dir) {
            Ok(path) => println!("Exported report to {}", path.display()),
            Err(e) => println!("Export failed: {e:#}"),
        }
    }
}
