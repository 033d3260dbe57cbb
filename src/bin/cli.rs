//! PostVault CLI Client
//!
//! Command-line interface for the PostVault REST surface. Sends one request
//! per invocation and prints the status line and body.

use std::io::{Read, Write};
use std::net::TcpStream;
use std::time::Duration;

use clap::{Parser, Subcommand};

/// PostVault CLI
#[derive(Parser, Debug)]
#[command(name = "postvault-cli")]
#[command(about = "CLI for the PostVault REST service")]
#[command(version)]
struct Args {
    /// Server address
    #[arg(short, long, env = "POSTVAULT_ADDR", default_value = "127.0.0.1:8087")]
    server: String,

    /// Value sent in the Host header
    #[arg(long, env = "POSTVAULT_SERVER_NAME", default_value = "reddit-scraper")]
    server_name: String,

    /// Give up after this many seconds without a response
    #[arg(long, default_value_t = 30)]
    timeout: u64,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List every stored record
    List,

    /// Get one record by id
    Get {
        /// The record id
        id: String,
    },

    /// Move the oldest pending record into storage
    Ingest,

    /// Move every pending record into storage
    IngestRemaining,

    /// Replace a record with a JSON object of fields
    Update {
        /// The record id
        id: String,

        /// JSON body, e.g. '{"unique_id": "...", "post_category": "funny"}'
        json: String,
    },

    /// Delete a record by id
    Delete {
        /// The record id
        id: String,
    },
}

impl Commands {
    /// Method, path and optional body of the request
    fn request(&self) -> (&'static str, String, Option<&str>) {
        match self {
            Commands::List => ("GET", "/posts/".to_string(), None),
            Commands::Get { id } => ("GET", format!("/posts/{}/", id), None),
            Commands::Ingest => ("POST", "/posts/".to_string(), None),
            Commands::IngestRemaining => ("POST", "/posts/remaining/".to_string(), None),
            Commands::Update { id, json } => ("PUT", format!("/posts/{}/", id), Some(json)),
            Commands::Delete { id } => ("DELETE", format!("/posts/{}/", id), None),
        }
    }
}

fn main() {
    let args = Args::parse();

    match send(&args) {
        Ok(response) => {
            let (head, body) = response
                .split_once("\r\n\r\n")
                .unwrap_or((response.as_str(), ""));
            println!("{}", head.lines().next().unwrap_or_default());
            if !body.is_empty() {
                println!("{}", body);
            }
        }
        Err(e) => {
            eprintln!("Request to {} failed: {}", args.server, e);
            std::process::exit(1);
        }
    }
}

fn send(args: &Args) -> std::io::Result<String> {
    let (method, path, body) = args.command.request();

    let mut stream = TcpStream::connect(&args.server)?;
    stream.set_read_timeout(Some(Duration::from_secs(args.timeout)))?;

    let mut request = format!(
        "{} {} HTTP/1.1\r\nHost: {}\r\nConnection: close\r\n",
        method, path, args.server_name
    );
    if let Some(body) = body {
        request.push_str("Content-Type: application/json\r\n");
        request.push_str(&format!("Content-Length: {}\r\n", body.len()));
    }
    request.push_str("\r\n");
    if let Some(body) = body {
        request.push_str(body);
    }

    stream.write_all(request.as_bytes())?;

    let mut response = Vec::new();
    stream.read_to_end(&mut response)?;
    Ok(String::from_utf8_lossy(&response).into_owned())
}
