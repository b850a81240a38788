//! Line-oriented search box. Each input line replaces the box contents;
//! lines starting with `:` are commands.

use product_search::config::SearchConfig;
use product_search::location::MemoryHistory;
use product_search::navigation::{NavKey, ResultNavigator};
use product_search::session::spawn_search_loop;
use product_search::state::{SearchPhase, SearchState};
use product_search::AppState;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::info;

const HELP: &str = "commands: :more :retry :clear :page N :down :up :enter :where :quit";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let config = SearchConfig::from_env()?;
    info!("Search API: {}", config.api_base_url);

    let app = AppState::from_config(config)?;
    let session = Arc::new(app.new_session(MemoryHistory::new("/search")));

    if let Some(location) = std::env::args().nth(1) {
        session.restore_from_location(&location).await;
    }
    let _search_loop = spawn_search_loop(&session);

    let mut updates = session.subscribe();
    tokio::spawn(async move {
        while updates.changed().await.is_ok() {
            let state = updates.borrow_and_update().clone();
            render(&state);
        }
    });

    println!("{}", HELP);
    let mut navigator = ResultNavigator::new(0);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    while let Some(line) = lines.next_line().await? {
        let state = session.state();
        navigator.set_item_count(state.results.len());
        navigator.set_enabled(!state.is_loading && !state.results.is_empty());

        let mut words = line.split_whitespace();
        match words.next() {
            Some(":quit") => break,
            Some(":more") => {
                let session = session.clone();
                tokio::spawn(async move {
                    if !session.load_more().await {
                        println!("nothing more to load");
                    }
                });
            }
            Some(":retry") => {
                let session = session.clone();
                tokio::spawn(async move {
                    session.retry().await;
                });
            }
            Some(":clear") => session.clear(),
            Some(":page") => match words.next().and_then(|n| n.parse::<u32>().ok()) {
                Some(page) => {
                    let session = session.clone();
                    tokio::spawn(async move {
                        if !session.go_to_page(page).await {
                            println!("page {} is not available", page);
                        }
                    });
                }
                None => println!("usage: :page N"),
            },
            Some(nav @ (":down" | ":up" | ":enter")) => {
                let key = match nav {
                    ":down" => NavKey::Down,
                    ":up" => NavKey::Up,
                    _ => NavKey::Enter,
                };
                if let Some(index) = navigator.handle(key) {
                    if let Some(product) = state.results.get(index) {
                        println!("selected {} ({}) ${:.2}", product.name, product.id, product.price);
                    }
                } else if let Some(index) = navigator.focused() {
                    if let Some(product) = state.results.get(index) {
                        println!("> {}", product.name);
                    }
                }
            }
            Some(":where") => println!("{}", session.location().current()),
            Some(command) if command.starts_with(':') => println!("{}", HELP),
            _ => {
                navigator.handle(NavKey::Escape);
                session.set_input(line.clone());
            }
        }
    }

    Ok(())
}

fn render(state: &SearchState) {
    match state.phase() {
        SearchPhase::Idle => println!("(type to search)"),
        SearchPhase::Searching => println!("searching for {:?}...", state.query),
        SearchPhase::LoadingMore => println!("loading page {}...", state.page + 1),
        SearchPhase::Error => {
            if let Some(error) = &state.error {
                let presentation = error.presentation();
                println!("{}: {}", presentation.title, error.message);
                println!("  {}", presentation.suggestion);
                if error.is_retryable() {
                    println!("  :retry to try again");
                }
            }
        }
        SearchPhase::Success if state.is_empty_result() => {
            println!("no products found for {:?}", state.query)
        }
        SearchPhase::Success => {
            println!(
                "found {} product{} for {:?}",
                state.total,
                if state.total == 1 { "" } else { "s" },
                state.query
            );
            for (i, product) in state.results.iter().enumerate() {
                let stock = if product.in_stock { "" } else { " (out of stock)" };
                println!(
                    "{:>3}. {} [{}] ${:.2} {:.1}*{}",
                    i + 1,
                    product.name,
                    product.category,
                    product.price,
                    product.rating,
                    stock
                );
            }
            if state.has_more {
                println!("  :more for the next page");
            }
        }
    }
}
