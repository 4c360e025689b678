//! Command-line surface for the clinical coding review client.
//!
//! Each command maps to one workflow intent: suggest/create a draft
//! episode, list with filters, drive the submit/approve/reject
//! transitions, inspect and revert code diffs, compare an uploaded
//! document, and draft clinician queries.
//!
//! # Environment Variables
//! - `API_BASE`, `API_SCOPE`, `BYPASS_AUTH`: backend and auth configuration
//! - `OIDC_CLIENT_ID`, `OIDC_TENANT_ID`, `OIDC_REDIRECT_URI`: identity provider
//! - `CCR_ACCESS_TOKEN`, `CCR_USERNAME`, `CCR_ROLES`: dev identity provider

use anyhow::Context;
use chrono::Utc;
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use ccr_client::{ClientConfig, EnvIdentityProvider, WorkflowController};
use ccr_core::{episode, DiffResult, Episode, EpisodeDraft, ListFilter, QueryDraft};
use ccr_types::EpisodeStatus;

/// Default draft used when no fields are supplied, matching the demo
/// episode the review backend is seeded with.
const DEFAULT_NHS_NUMBER: &str = "9999999999";
const DEFAULT_PATIENT_NAME: &str = "John Smith";
const DEFAULT_SPECIALTY: &str = "Respiratory Medicine";
const DEFAULT_SOURCE_TEXT: &str = "Admitted with community-acquired pneumonia. Background of COPD. CXR performed, nebulisation and oxygen therapy.";

const DEFAULT_QUERY_TO: &str = "dr.smith@hospital.nhs.uk";
const DEFAULT_QUERY_SUBJECT: &str = "Clinical Coding Query";
const DEFAULT_QUERY_BODY: &str = "Could you clarify the pneumonia aetiology and site?";

#[derive(Parser)]
#[command(name = "ccr")]
#[command(about = "Clinical coding review client")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Request suggested codes for an admission note
    Suggest {
        /// Free-text admission note
        #[arg(long, default_value = DEFAULT_SOURCE_TEXT)]
        text: String,
        #[arg(long, default_value = DEFAULT_PATIENT_NAME)]
        patient: String,
        #[arg(long, default_value = DEFAULT_SPECIALTY)]
        specialty: String,
    },
    /// Create an episode from an admission note
    Create {
        #[arg(long, default_value = DEFAULT_SOURCE_TEXT)]
        text: String,
        #[arg(long, default_value = DEFAULT_PATIENT_NAME)]
        patient: String,
        #[arg(long, default_value = DEFAULT_SPECIALTY)]
        specialty: String,
    },
    /// List episodes with filters and pagination
    List {
        /// Status filter: 0=Draft 1=Submitted 2=Approved 3=Rejected
        #[arg(long)]
        status: Option<u8>,
        /// Inclusive admission-date lower bound (YYYY-MM-DD)
        #[arg(long)]
        from: Option<String>,
        /// Inclusive admission-date upper bound (YYYY-MM-DD)
        #[arg(long)]
        to: Option<String>,
        #[arg(long, default_value_t = 1)]
        page: u32,
        #[arg(long, default_value_t = 25)]
        page_size: u32,
    },
    /// Submit a Draft episode for review (Coder)
    Submit {
        episode_id: String,
    },
    /// Approve a Submitted episode (Reviewer)
    Approve {
        episode_id: String,
        /// Review notes
        #[arg(long)]
        notes: Option<String>,
    },
    /// Reject a Submitted episode (Reviewer)
    Reject {
        episode_id: String,
        /// Review notes
        #[arg(long)]
        notes: Option<String>,
    },
    /// Show the live code diff for an episode
    Diff {
        episode_id: String,
    },
    /// Revert an episode's codes to the old snapshot of its diff (Reviewer)
    Revert {
        episode_id: String,
    },
    /// Draft a clinician query for an episode (Coder)
    Query {
        episode_id: String,
        #[arg(long, default_value = DEFAULT_QUERY_TO)]
        to: String,
        #[arg(long, default_value = DEFAULT_QUERY_SUBJECT)]
        subject: String,
        #[arg(long, default_value = DEFAULT_QUERY_BODY)]
        body: String,
    },
    /// Upload a document and compare coder codes against suggestions
    CompareUpload {
        /// Document to upload (.txt, .csv, .json, .docx, .pdf)
        file: std::path::PathBuf,
        /// Optional coder codes, JSON or CSV, passed through to the backend
        #[arg(long)]
        codes: Option<String>,
    },
    /// Print the static export download links
    ExportLinks,
    /// Show the active account and its roles
    Whoami,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env().add_directive("ccr=info".parse()?))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let config = ClientConfig::from_env();
    let mut controller = WorkflowController::new(config, Box::new(EnvIdentityProvider));
    if let Err(e) = controller.sign_in() {
        // Authorized calls will fail with NotSignedIn; unauthorized ones
        // (export links, bypass mode) still work.
        eprintln!("Sign-in failed: {e}");
    }

    match cli.command {
        Some(Commands::Suggest {
            text,
            patient,
            specialty,
        }) => {
            let draft = draft_from(text, patient, specialty);
            let suggestions = controller.suggest(&draft).await?;
            println!("{}", serde_json::to_string_pretty(&suggestions)?);
        }
        Some(Commands::Create {
            text,
            patient,
            specialty,
        }) => {
            let draft = draft_from(text, patient, specialty);
            controller.create(&draft).await?;
            println!("Created episode for {}.", draft.patient_name);
            print_episodes(controller.episodes(), controller.total());
        }
        Some(Commands::List {
            status,
            from,
            to,
            page,
            page_size,
        }) => {
            let filter = build_filter(status, from, to, page, page_size)?;
            controller.set_filter(filter);
            controller.refresh().await?;
            print_episodes(controller.episodes(), controller.total());
        }
        Some(Commands::Submit { episode_id }) => {
            controller.refresh().await?;
            controller.submit(&episode_id).await?;
            println!("Submitted episode {episode_id}.");
            print_episodes(controller.episodes(), controller.total());
        }
        Some(Commands::Approve { episode_id, notes }) => {
            controller.refresh().await?;
            controller.approve(&episode_id, notes.as_deref()).await?;
            println!("Approved episode {episode_id}.");
            print_episodes(controller.episodes(), controller.total());
        }
        Some(Commands::Reject { episode_id, notes }) => {
            controller.refresh().await?;
            controller.reject(&episode_id, notes.as_deref()).await?;
            println!("Rejected episode {episode_id}.");
            print_episodes(controller.episodes(), controller.total());
        }
        Some(Commands::Diff { episode_id }) => {
            let diff = controller.load_diff(&episode_id).await?;
            print_diff(diff);
        }
        Some(Commands::Revert { episode_id }) => {
            controller.load_diff(&episode_id).await?;
            controller.revert().await?;
            println!("Reverted episode {episode_id} to old codes.");
        }
        Some(Commands::Query {
            episode_id,
            to,
            subject,
            body,
        }) => {
            let draft = QueryDraft::new(to, subject, body)?;
            controller.create_query(&episode_id, &draft).await?;
            println!("Query drafted and dispatched for episode {episode_id}.");
        }
        Some(Commands::CompareUpload { file, codes }) => {
            let bytes = std::fs::read(&file)
                .with_context(|| format!("failed to read {}", file.display()))?;
            let file_name = file
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_else(|| "upload".to_owned());
            let diff = controller.compare_upload(&file_name, bytes, codes).await?;
            print_diff(&diff);
        }
        Some(Commands::ExportLinks) => {
            println!("CSV:  {}", controller.config().export_csv_url());
            println!("JSON: {}", controller.config().export_json_url());
        }
        Some(Commands::Whoami) => match controller.active_account() {
            Some(account) => {
                let roles: Vec<&str> = account
                    .roles()
                    .iter()
                    .map(|role| role.as_claim())
                    .collect();
                println!("Signed in as {} (roles: {})", account.username, roles.join(", "));
            }
            None if controller.config().bypass_auth => println!("dev-bypass (no account)"),
            None => println!("Not signed in."),
        },
        None => {
            println!("Use 'ccr --help' for commands");
        }
    }

    Ok(())
}

fn draft_from(text: String, patient: String, specialty: String) -> EpisodeDraft {
    EpisodeDraft {
        nhs_number: DEFAULT_NHS_NUMBER.to_owned(),
        patient_name: patient,
        admission_date: Utc::now(),
        specialty,
        source_text: text,
    }
}

fn build_filter(
    status: Option<u8>,
    from: Option<String>,
    to: Option<String>,
    page: u32,
    page_size: u32,
) -> anyhow::Result<ListFilter> {
    let status = status
        .map(EpisodeStatus::try_from)
        .transpose()
        .context("invalid status filter")?;
    let from = from
        .map(|value| episode::parse_date_bound(&value))
        .transpose()?;
    let to = to
        .map(|value| episode::parse_date_bound(&value))
        .transpose()?;
    Ok(ListFilter {
        status,
        from,
        to,
        page,
        page_size,
    })
}

fn print_episodes(episodes: &[Episode], total: u64) {
    if episodes.is_empty() {
        println!("No episodes found (or filtered out).");
        return;
    }
    println!("Episodes ({total} total):");
    for episode in episodes {
        let admission = episode
            .admission_date
            .map(|ts| ts.to_rfc3339())
            .unwrap_or_else(|| "-".to_owned());
        println!(
            "ID: {}, Patient: {}, Admission: {}, Specialty: {}, Status: {}",
            episode.id,
            episode.display_name(),
            admission,
            episode.specialty.as_deref().unwrap_or(""),
            episode.status,
        );
    }
}

fn print_code_list(heading: &str, entries: &[ccr_core::CodeEntry]) {
    println!("{heading}:");
    if entries.is_empty() {
        println!("  (none)");
        return;
    }
    for entry in entries {
        let primary = if entry.is_primary { " (primary)" } else { "" };
        println!("  {} - {}{}", entry.code, entry.description, primary);
    }
}

fn print_diff(diff: &DiffResult) {
    if let Some(preview) = &diff.narrative_preview {
        println!("Narrative preview:\n{preview}\n");
    }
    print_code_list("Old diagnoses", &diff.dx.old);
    print_code_list("New diagnoses", &diff.dx.new);
    print_code_list("Old procedures", &diff.px.old);
    print_code_list("New procedures", &diff.px.new);
    println!("Dx added:   {}", join_or_dash(&diff.deltas.dx_added));
    println!("Dx removed: {}", join_or_dash(&diff.deltas.dx_removed));
    println!("Px added:   {}", join_or_dash(&diff.deltas.px_added));
    println!("Px removed: {}", join_or_dash(&diff.deltas.px_removed));
    if let Some(audit_id) = &diff.audit_id {
        println!("Revertible audit snapshot: {audit_id}");
    }
}

fn join_or_dash(codes: &[String]) -> String {
    if codes.is_empty() {
        "-".to_owned()
    } else {
        codes.join(", ")
    }
}
