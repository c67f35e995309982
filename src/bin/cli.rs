use clap::{Parser, Subcommand};
use kvwire::config::{DEFAULT_HOST, DEFAULT_PORT, HOST_ENV, PORT_ENV};
use kvwire::{Client, Config, Error, ValueType};
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
struct Args {
    /// The server host
    #[arg(long, env = HOST_ENV, default_value = DEFAULT_HOST)]
    host: String,

    /// The server port
    #[arg(short, long, env = PORT_ENV, default_value_t = DEFAULT_PORT)]
    port: u16,

    #[command(subcommand)]
    command: Cmd,
}

#[derive(Subcommand, Debug)]
enum Cmd {
    /// Check that the server answers
    Ping,
    /// Print every registered key with its type and value as JSON
    Dump,
    /// Print the value stored at a key as JSON
    Get {
        key: String,
        /// string, hash, set, list, zset, json, vector or doc
        #[arg(short, long, default_value = "string")]
        r#type: ValueType,
    },
    /// Delete a key
    Del { key: String },
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .try_init()
        .map_err(|e| debug!("Failed to initialize global tracing: {}", e));

    let args = Args::parse();
    let client = Client::new(Config::new(args.host, args.port));

    let result = run(&client, args.command).await;
    client.disconnect().await;
    result
}

async fn run(client: &Client, command: Cmd) -> Result<(), Error> {
    match command {
        Cmd::Ping => {
            if !client.health_check().await {
                return Err(format!("no PONG from {}", client.config().addr()).into());
            }
            println!("PONG");
        }
        Cmd::Dump => {
            let entries = client.enumerate_all().await;
            println!("{}", serde_json::to_string_pretty(&entries)?);
        }
        Cmd::Get { key, r#type } => {
            let value = client.get(&key, r#type).await;
            println!("{}", serde_json::to_string_pretty(&value)?);
        }
        Cmd::Del { key } => {
            println!("{}", client.del(&key).await);
        }
    }
    Ok(())
}
