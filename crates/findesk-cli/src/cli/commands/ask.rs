//! Ask command handler.

use std::path::Path;

use anyhow::{Context, Result, anyhow};
use findesk_core::client::HttpGenerator;
use findesk_core::config::Config;
use findesk_core::controller::{SessionController, TurnOutcome};
use findesk_core::export::ReportExport;
use findesk_core::search::NewsSearch;
use findesk_core::session::{SessionState, SessionStore};

use crate::cli::render::{self, TranscriptRenderer};

pub struct AskOptions<'a> {
    pub config: &'a Config,
    pub base_url: &'a str,
    pub prompt: &'a str,
    pub analysis: bool,
    pub news: Option<&'a str>,
    pub export: Option<&'a Path>,
}

pub async fn run(options: AskOptions<'_>) -> Result<()> {
    let store = SessionStore::new(SessionState::default());
    let generator = HttpGenerator::new(options.base_url, options.config.generation_timeout())?;
    let controller = SessionController::new(store.clone(), generator);

    controller.set_analysis_mode(options.analysis || options.news.is_some());

    if let Some(query) = options.news {
        let search = NewsSearch::new(options.base_url, options.config.search_timeout())?;
        let outcome = controller
            .search(&search, query)
            .await
            .context("news search")?;
        if let Some(notice) = outcome.notice(query.trim()) {
            eprintln!("{notice}");
        }

        let results = store.read(|state| state.search().results().to_vec());
        for item in results {
            controller
                .toggle_reference(item)
                .map_err(|rejected| anyhow!(rejected.notice()))?;
        }
        tracing::info!(
            references = store.read(|state| state.selected_references().len()),
            "references selected from search"
        );
    }

    let mut rx = store.subscribe();
    let mut renderer = TranscriptRenderer::new(std::io::stdout());
    let outcome = render::follow(controller.send(options.prompt), &mut rx, &mut renderer)
        .await
        .context("write reply")??;

    if let TurnOutcome::Failed { error, .. } = outcome {
        return Err(anyhow::Error::new(error).context("generation failed"));
    }

    if let Some(dir) = options.export {
        let report = store.read(|state| {
            state
                .latest_report()
                .and_then(|message| ReportExport::from_message(message))
        });
        match report {
            Some(report) => {
                let path = report.write_to(dir)?;
                eprintln!("Exported report to {}", path.display());
            }
            None => eprintln!("Reply is not a report; nothing exported"),
        }
    }

    Ok(())
}
