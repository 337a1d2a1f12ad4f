use std::{env, process::exit, sync::Arc};

use tracing::{error, info};
use tracing_subscriber::{
    fmt::format::FmtSpan, prelude::__tracing_subscriber_SubscriberExt, util::SubscriberInitExt,
};
use tube_drogue::{
    artifact::save_artifact,
    render::human_timestamp,
    view::{FormatsBrowser, HistoryView, Panel, PrimaryAction, ViewState},
    Config, HttpBackend, Outcome, Session,
};

fn print_history(backend: &HttpBackend, history: &HistoryView) {
    match history {
        HistoryView::Entries(entries) => {
            println!("Previous downloads:");
            for entry in entries {
                println!(
                    "  {} [{}] {} {}",
                    entry.title.as_deref().unwrap_or("Unknown Video"),
                    entry.format.as_deref().unwrap_or("Unknown"),
                    entry
                        .timestamp
                        .map(human_timestamp)
                        .unwrap_or_else(|| "Unknown".to_string()),
                    backend.artifact_url(&entry.download_id),
                );
            }
        }
        HistoryView::Empty => println!("No downloads yet."),
        HistoryView::Unloaded => {}
    }
}

fn print_formats(browser: &FormatsBrowser) {
    println!("{} ({})", browser.title, browser.duration);
    println!("  {}", browser.command);
    for row in &browser.rows {
        println!("  {:<24} {:<12} {}", row.label, row.resolution, row.command);
    }
}

fn print_progress(view: &ViewState) {
    let progress = &view.progress;
    println!(
        "{} {} | {} | {} | {}",
        progress.status_text, progress.percentage_text, progress.speed, progress.eta, progress.filename
    );
}

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_span_events(FmtSpan::NEW | FmtSpan::CLOSE))
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let config = Config::from_env();
    let backend = match HttpBackend::new(config.clone()) {
        Ok(backend) => Arc::new(backend),
        Err(err) => {
            error!("Could not set up the HTTP client: {}", err);
            exit(1);
        }
    };
    let session = Session::new(backend.clone(), config.clone());
    let environment = session.init().await;
    info!("Using {} ({:?})", config.server, environment);

    let mut args = env::args().skip(1);
    let Some(url) = args.next() else {
        print_history(&backend, &session.view().history);
        return;
    };
    let format = args.next().unwrap_or_else(|| "best".to_string());

    let mut updates = session.subscribe();
    match session.submit(&url, &format).await {
        Ok(Outcome::Polling(handle)) => info!("Tracking download {}", handle),
        Ok(Outcome::Described(_)) => {}
        Ok(Outcome::Superseded) => return,
        Err(err) => {
            eprintln!("{}", err.user_message());
            exit(1);
        }
    }

    let view = loop {
        let view = updates.borrow_and_update().clone();
        match view.panel {
            Panel::Success => break view,
            Panel::Error => {
                eprintln!("{}", view.error_message.unwrap_or_default());
                exit(1);
            }
            Panel::InProgress => print_progress(&view),
            Panel::Idle => {}
        }
        if updates.changed().await.is_err() {
            return;
        }
    };

    let Some(success) = view.success else {
        return;
    };
    println!("{} [{}] {}", success.title, success.quality, success.filename);
    match &success.action {
        PrimaryAction::SeeFormats(browser) => print_formats(browser),
        PrimaryAction::Download { handle } => {
            println!("{}", backend.artifact_url(handle));
            if let Some(dir) = &config.save_dir {
                let hint = Some(success.filename.as_str()).filter(|name| *name != "Unknown");
                match save_artifact(&backend, handle, hint, dir).await {
                    Ok(path) => println!("Saved to {}", path.display()),
                    Err(err) => {
                        error!("Failed to save {}: {}", handle, err);
                        exit(1);
                    }
                }
            }
            if let Ok(history) = session.refresh_history().await {
                print_history(&backend, &history);
            }
        }
    }
}
