// Command-line probe: subscribe to a few symbols and print what arrives
//
// Usage: cargo run --example client -- [ws://host:port/ws] [SYMBOL ...]
use futures_util::{SinkExt, StreamExt};
use serde_json::json;
use tokio_tungstenite::{connect_async, tungstenite::protocol::Message};
use url::Url;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut args = std::env::args().skip(1).peekable();
    let addr = match args.peek() {
        Some(arg) if arg.starts_with("ws://") || arg.starts_with("wss://") => {
            args.next().unwrap()
        }
        _ => "ws://127.0.0.1:8000/ws".to_string(),
    };
    let mut symbols: Vec<String> = args.collect();
    if symbols.is_empty() {
        symbols = vec!["AAPL".to_string(), "MSFT".to_string()];
    }

    let url = Url::parse(&addr)?;
    let (ws_stream, _) = connect_async(url).await?;
    let (mut write, mut read) = ws_stream.split();
    println!("connected to {}", addr);

    let subscribe = json!({ "action": "subscribe", "symbols": symbols });
    write.send(Message::Text(subscribe.to_string())).await?;
    println!("> {}", subscribe);

    while let Some(message) = read.next().await {
        match message? {
            Message::Text(text) => println!("< {}", text),
            Message::Close(_) => {
                println!("server closed the connection");
                break;
            }
            _ => {}
        }
    }

    Ok(())
}
