#[tokio::main]
async fn main() {
    if let Err(err) = toolgate::mcp::server::run_stdio().await {
        eprintln!("toolgate: {}", err);
        std::process::exit(1);
    }
}
