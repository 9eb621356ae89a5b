use monero_connection_manager::cli::Cli;
use monero_connection_manager::config::{default_config_path, Config};
use monero_connection_manager::core::connection::{
    ConnectionListener, ConnectionManager, IsahcRpcTransport, RpcConnection,
};
use std::sync::Arc;
use std::time::Duration;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse_args();

    if cli.init {
        let path = match &cli.config {
            Some(path) => path.clone(),
            None => default_config_path()?,
        };
        if Config::init_at(&path)? {
            println!("Wrote default config to {}", path.display());
        } else {
            println!("Config already exists at {}", path.display());
        }
        return Ok(());
    }

    let config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    config.check()?;

    if cli.check_config {
        println!("✓ Configuration valid ({} connections)", config.connections.len());
        return Ok(());
    }

    let manager = ConnectionManager::from_config(&config, Arc::new(IsahcRpcTransport::new()?))?;

    if let Some(seconds) = cli.watch {
        let printer: Arc<dyn ConnectionListener> = Arc::new(|connection: Option<Arc<RpcConnection>>| {
            print_connection("changed", connection.as_deref());
        });
        manager.add_listener(printer);

        let options = config.polling.to_poll_options(&manager.get_connections());
        manager.start_polling(options)?;
        tokio::time::sleep(Duration::from_secs(seconds)).await;
        manager.stop_polling();
    } else {
        let best = manager.get_best_available_connection(&[]).await?;
        print_connection("best", best.as_deref());
    }

    for connection in manager.get_connections() {
        println!("{}", serde_json::to_string(&connection.snapshot())?);
    }

    Ok(())
}

fn print_connection(label: &str, connection: Option<&RpcConnection>) {
    match connection {
        Some(connection) => match connection.last_response_time() {
            Some(ms) => println!("{}: {} ({}ms)", label, connection.uri(), ms),
            None => println!("{}: {}", label, connection.uri()),
        },
        None => println!("{}: none", label),
    }
}
