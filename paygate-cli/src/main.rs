//! Paygate CLI
//!
//! Drives the gateway adapters directly from a JSON config file.

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;

use paygate_hex::{Pay, inbound::parse_notification};
use paygate_types::{Amount, Charge, PayConfig, PayMethod, Payout, QueryKind};

#[derive(Parser)]
#[command(name = "paygate")]
#[command(author, version, about = "Payment gateway CLI", long_about = None)]
struct Cli {
    /// Gateway config file (JSON)
    #[arg(long, env = "PAYGATE_CONFIG", default_value = "paygate.json")]
    config: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List configured gateways
    Gateways,
    /// Start a payment and print what to hand the payer
    Pay {
        #[arg(long)]
        gateway: String,
        /// web, wap, app, scan, pos or mini
        #[arg(long, default_value = "web")]
        method: PayMethod,
        #[arg(long)]
        trade_no: String,
        /// Amount in yuan, e.g. 12.34
        #[arg(long)]
        amount: String,
        #[arg(long, default_value = "")]
        subject: String,
        /// Provider hint, repeatable (method=alipay)
        #[arg(long = "extra", value_parser = parse_pair)]
        extras: Vec<(String, String)>,
    },
    /// Pay out to an account
    Transfer {
        #[arg(long)]
        gateway: String,
        #[arg(long)]
        transfer_no: String,
        /// Amount in yuan
        #[arg(long)]
        amount: String,
        /// Payee real name
        #[arg(long)]
        name: String,
        #[arg(long)]
        account: String,
        /// Bank name or provider channel
        #[arg(long, default_value = "")]
        channel: String,
        #[arg(long, default_value = "")]
        remark: String,
    },
    /// Query an order at the provider
    Find {
        #[arg(long)]
        gateway: String,
        #[arg(long)]
        order: String,
        #[arg(long, value_enum, default_value = "pay")]
        kind: Kind,
    },
    /// Verify a notification (query string, form, JSON or XML)
    Verify {
        #[arg(long)]
        gateway: String,
        data: String,
    },
    /// Remaining payout balance
    Balance {
        #[arg(long)]
        gateway: String,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum Kind {
    Pay,
    Transfer,
}

impl From<Kind> for QueryKind {
    fn from(kind: Kind) -> Self {
        match kind {
            Kind::Pay => QueryKind::Pay,
            Kind::Transfer => QueryKind::Transfer,
        }
    }
}

fn parse_pair(s: &str) -> Result<(String, String), String> {
    s.split_once('=')
        .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
        .ok_or_else(|| format!("expected key=value, got {}", s))
}

fn print_json(value: &impl Serialize) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = PayConfig::from_file(&cli.config)?;
    let pay = Pay::new(config);

    match cli.command {
        Commands::Gateways => {
            for name in pay.names() {
                println!("{}", name);
            }
        }

        Commands::Pay {
            gateway,
            method,
            trade_no,
            amount,
            subject,
            extras,
        } => {
            let mut charge = Charge::new(trade_no, Amount::from_yuan(&amount)?).with_subject(subject);
            for (name, value) in extras {
                charge = charge.with_extra(name, value);
            }
            let response = pay.gateway(&gateway)?.pay(method, &charge).await?;
            print_json(&response)?;
        }

        Commands::Transfer {
            gateway,
            transfer_no,
            amount,
            name,
            account,
            channel,
            remark,
        } => {
            let payout = Payout::new(transfer_no, Amount::from_yuan(&amount)?, name, account)
                .with_channel(channel)
                .with_remark(remark);
            let outcome = pay.gateway(&gateway)?.transfer(&payout).await?;
            print_json(&outcome)?;
        }

        Commands::Find {
            gateway,
            order,
            kind,
        } => {
            let found = pay.gateway(&gateway)?.find(&order, kind.into()).await?;
            print_json(&found)?;
        }

        Commands::Verify { gateway, data } => {
            let params = parse_notification(None, "", data.as_bytes())?;
            let result = pay.gateway(&gateway)?.verify(params).await?;
            print_json(&result)?;
        }

        Commands::Balance { gateway } => {
            let balance = pay.gateway(&gateway)?.balance().await?;
            print_json(&balance)?;
        }
    }

    Ok(())
}
