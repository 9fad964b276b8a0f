// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::path::PathBuf;
use std::process::ExitCode;

use chrono::NaiveDate;
use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use serde_json::json;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use descarga_masiva::config::{
    ClientConfig, CredentialConfig, DEFAULT_LOG_FILTER, LOG_FORMAT_ENV,
};
use descarga_masiva::{
    Credential, DateRangeQuery, DescargaError, DocumentStatus, DocumentType, QueryParameters,
    RequestType,
};

/// descarga-masiva - SAT mass CFDI download client
///
/// Credentials and service settings are read from the environment
/// (`SAT_CERTIFICATE_PATH`, `SAT_PRIVATE_KEY_PATH`, `SAT_PRIVATE_KEY_PASSWORD`,
/// `SAT_SERVICE_TYPE`). Results are printed as JSON.
#[derive(Parser, Debug)]
#[command(name = "descarga-masiva")]
#[command(version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Authenticate and print the issued token
    Authenticate,

    /// Request the documents of a date range
    Query {
        /// First day (YYYY-MM-DD)
        start: NaiveDate,

        /// Last day (YYYY-MM-DD)
        end: NaiveDate,

        /// Whether the signer issued or received the documents
        #[arg(value_enum, default_value = "issued")]
        direction: Direction,

        /// Counterpart RFCs
        rfcs: Vec<String>,

        /// Voucher type (I, E, T, N, P)
        #[arg(long, value_parser = parse_document_type)]
        document_type: Option<DocumentType>,

        /// Only active (`vigente`) or cancelled (`cancelado`) documents
        #[arg(long, value_parser = parse_document_status)]
        document_status: Option<DocumentStatus>,

        /// Request metadata instead of the CFDI files
        #[arg(long)]
        metadata: bool,
    },

    /// Request a single document by folio (UUID)
    QueryFolio {
        /// Folio fiscal
        uuid: String,
    },

    /// Check the status of a request
    Verify {
        /// Request id returned by `query`
        request_id: String,
    },

    /// Download a package
    Download {
        /// Package id returned by `verify`
        package_id: String,

        /// Write the ZIP archive here instead of printing base64
        output: Option<PathBuf>,
    },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Direction {
    Issued,
    Received,
}

fn parse_document_type(value: &str) -> Result<DocumentType, String> {
    match value.trim().to_ascii_uppercase().as_str() {
        "I" => Ok(DocumentType::Ingreso),
        "E" => Ok(DocumentType::Egreso),
        "T" => Ok(DocumentType::Traslado),
        "N" => Ok(DocumentType::Nomina),
        "P" => Ok(DocumentType::Pago),
        other => Err(format!("unknown document type: {other}")),
    }
}

fn parse_document_status(value: &str) -> Result<DocumentStatus, String> {
    match value.trim().to_ascii_lowercase().as_str() {
        "vigente" => Ok(DocumentStatus::Active),
        "cancelado" => Ok(DocumentStatus::Cancelled),
        other => Err(format!("unknown document status: {other}")),
    }
}

fn init_logging() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    let json = std::env::var(LOG_FORMAT_ENV)
        .map(|format| format.trim().eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    // Logs go to stderr so stdout carries only results.
    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr),
            )
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .pretty()
                    .with_writer(std::io::stderr),
            )
            .init();
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<(), DescargaError> {
    let rendered = serde_json::to_string_pretty(value).map_err(std::io::Error::from)?;
    println!("{rendered}");
    Ok(())
}

async fn run(command: Commands) -> Result<(), DescargaError> {
    let client = ClientConfig::from_env()?.build_client()?;
    let credential = CredentialConfig::from_env()?.open()?;
    info!(
        rfc = %credential.subject_rfc(),
        service = %client.endpoints().service_type(),
        "Loaded FIEL credential"
    );

    match command {
        Commands::Authenticate => print_json(&client.authenticate(&credential).await?),
        Commands::Query {
            start,
            end,
            direction,
            rfcs,
            document_type,
            document_status,
            metadata,
        } => {
            let query = match direction {
                Direction::Issued => {
                    DateRangeQuery::issued(start, end, &credential.subject_rfc(), rfcs)
                }
                Direction::Received => DateRangeQuery::received(start, end, rfcs),
            }
            .with_document_type(document_type.unwrap_or_default())
            .with_document_status(document_status.unwrap_or_default())
            .with_request_type(if metadata {
                RequestType::Metadata
            } else {
                RequestType::Cfdi
            });
            print_json(&client.query(&credential, &query.into()).await?)
        }
        Commands::QueryFolio { uuid } => {
            print_json(&client.query(&credential, &QueryParameters::folio(uuid)).await?)
        }
        Commands::Verify { request_id } => {
            print_json(&client.verify(&credential, &request_id).await?)
        }
        Commands::Download { package_id, output } => {
            let result = client.download(&credential, &package_id).await?;
            match output {
                Some(path) => {
                    let bytes = result.package_bytes()?;
                    std::fs::write(&path, &bytes)?;
                    print_json(&json!({
                        "status": result.status,
                        "path": path.display().to_string(),
                        "bytes": bytes.len(),
                    }))
                }
                None => print_json(&result),
            }
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging();

    match run(cli.command).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(kind = e.kind(), error = %e, "Operation failed");
            let _ = print_json(&json!({ "error": e.kind(), "message": e.to_string() }));
            ExitCode::FAILURE
        }
    }
}
