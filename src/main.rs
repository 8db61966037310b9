#[tokio::main]
async fn main() {
    if let Err(e) = neurotriage_lib::run().await {
        tracing::error!("{e}");
        eprintln!("neurotriage: {e}");
        std::process::exit(1);
    }
}
