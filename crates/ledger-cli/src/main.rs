use anyhow::Result;
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::debug;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "ledger-cli")]
#[command(about = "CLI client for the certificate ledger node")]
struct Cli {
    /// Node base URL (e.g. http://127.0.0.1:8080)
    #[arg(long, global = true, default_value = "http://127.0.0.1:8080")]
    node: String,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the node's full chain
    Chain,
    /// Queue a certificate transaction
    Submit {
        /// Owner; defaults to the node's id
        #[arg(long)]
        owner: Option<String>,
        #[arg(long)]
        name: String,
        #[arg(long)]
        rollnumber: String,
        #[arg(long)]
        cgpa: String,
    },
    /// Mine a block, optionally issuing a certificate in it
    Mine {
        #[arg(long, requires_all = ["rollnumber", "cgpa"])]
        name: Option<String>,
        #[arg(long, requires_all = ["name", "cgpa"])]
        rollnumber: Option<String>,
        #[arg(long, requires_all = ["name", "rollnumber"])]
        cgpa: Option<String>,
    },
    /// List transactions waiting for the next block
    Pending,
    /// Register peer nodes
    Register {
        /// Peer addresses, e.g. http://127.0.0.1:5001
        #[arg(required = true)]
        nodes: Vec<String>,
    },
    /// Run consensus against registered peers
    Resolve,
}

#[derive(Serialize)]
struct TxOut {
    #[serde(skip_serializing_if = "Option::is_none")]
    owner: Option<String>,
    name: String,
    rollnumber: String,
    cgpa: String,
}

#[derive(Serialize)]
struct MineOut {
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    rollnumber: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    cgpa: Option<String>,
}

#[derive(Serialize)]
struct RegisterOut {
    nodes: Vec<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .pretty()
        .init();

    let cli = Cli::parse();
    let node = cli.node.trim_end_matches('/');
    let client = reqwest::Client::new();

    let request = match cli.cmd {
        Command::Chain => client.get(format!("{node}/chain")),
        Command::Pending => client.get(format!("{node}/transactions/pending")),
        Command::Resolve => client.get(format!("{node}/nodes/resolve")),
        Command::Submit {
            owner,
            name,
            rollnumber,
            cgpa,
        } => client
            .post(format!("{node}/transactions/new"))
            .json(&TxOut {
                owner,
                name,
                rollnumber,
                cgpa,
            }),
        Command::Mine {
            name,
            rollnumber,
            cgpa,
        } => client.post(format!("{node}/mine")).json(&MineOut {
            name,
            rollnumber,
            cgpa,
        }),
        Command::Register { nodes } => client
            .post(format!("{node}/nodes/register"))
            .json(&RegisterOut { nodes }),
    };

    let res = request.send().await?;
    let status = res.status();
    debug!(%status, "node responded");
    let body: serde_json::Value = res.json().await?;
    println!("status: {}", status);
    println!("{}", serde_json::to_string_pretty(&body)?);
    Ok(())
}
