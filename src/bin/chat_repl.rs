use chat_relay::cli::ReplArgs;
use chat_relay::client::ChatServiceClient;
use chat_relay::llm::selector::ModelSelector;
use chat_relay::models::chat::Role;
use chat_relay::models::stream::StreamEvent;
use chat_relay::view::render::{ render_message, RenderedPart, REDACTED_PLACEHOLDER };
use chat_relay::view::ChatView;

use clap::Parser;
use dotenv::dotenv;
use log::warn;
use std::error::Error;
use std::io::Write;
use tokio::io::{ AsyncBufReadExt, BufReader };

fn print_flush(text: &str) {
    print!("{}", text);
    let _ = std::io::stdout().flush();
}

fn print_citations(view: &ChatView) {
    let Some(reply) = view.messages().last().filter(|m| m.role == Role::Assistant) else {
        return;
    };
    let citations: Vec<(String, Option<String>)> = render_message(reply)
        .into_iter()
        .filter_map(|part| match part {
            RenderedPart::Citation { href, label } => Some((label, href)),
            _ => None,
        })
        .collect();

    if !citations.is_empty() {
        println!("\nSources:");
        for (i, (label, href)) in citations.iter().enumerate() {
            match href {
                Some(href) => println!("  [{}] {} <{}>", i + 1, label, href),
                None => println!("  [{}] {}", i + 1, label),
            }
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error + Send + Sync>> {
    dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let args = ReplArgs::parse();

    let client = ChatServiceClient::new(args.server_url.clone(), args.api_key.clone());
    let mut view = ChatView::new();
    view.select_model(ModelSelector::resolve(Some(&args.model)));

    println!(
        "Connected to {} (model: {}). Type /model <fast|pro|reasoning|search> or /quit.",
        args.server_url,
        view.selected_model()
    );

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print_flush("> ");
        let Some(line) = lines.next_line().await? else {
            break;
        };
        let line = line.trim_end();

        if line == "/quit" {
            break;
        }
        if let Some(tag) = line.strip_prefix("/model") {
            match ModelSelector::parse(tag.trim()) {
                Some(selector) => {
                    view.select_model(selector);
                    println!("Model set to {}", selector);
                }
                None => println!("Unknown model '{}'", tag.trim()),
            }
            continue;
        }

        view.set_input(line);
        let Some((request, _)) = view.submit() else {
            continue;
        };

        let mut in_reasoning = false;
        client.stream_into_view(&mut view, &request, |event, _| {
            match event {
                StreamEvent::Reasoning { text } => {
                    if !in_reasoning {
                        print_flush("(thinking) ");
                        in_reasoning = true;
                    }
                    print_flush(text);
                }
                StreamEvent::RedactedReasoning { .. } => print_flush(REDACTED_PLACEHOLDER),
                StreamEvent::Text { text } => {
                    if in_reasoning {
                        print_flush("\n\n");
                        in_reasoning = false;
                    }
                    print_flush(text);
                }
                _ => {}
            }
        }).await;
        println!();

        if let Some(error) = view.error() {
            warn!("Reply failed: {}", error);
            println!("Error: {}", error);
        } else {
            print_citations(&view);
        }
    }

    Ok(())
}
