use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use clap::Parser;
use tracing::info;
use elders_wisdom::{
    anthology::{ANTHOLOGY_FILENAME, DirectorySink, JsonRasterizer, export_pdf, preview_filename},
    auth::{Authenticator, PasswordAuthenticator},
    blob::{LocalBlobStore, UploadRule},
    completion::{WordTarget, section_satisfied},
    config::Config,
    editors::{CoverEditor, set_section_content},
    record::{FeedbackStatus, ReviewSection, SectionKey},
    session::{StudentSession, TeacherSession},
    store::{RecordStore, SqliteStore},
    utils::init_log,
};

#[derive(Debug, clap::Parser)]
#[command(author, version, about = "Write and review elder-story e-books", long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Commands,
    /// Path to the TOML config file
    #[arg(short, long, default_value = "elders.toml")]
    config: PathBuf,
    /// Overrides the configured database url
    #[arg(short, long)]
    database: Option<String>,
}

#[derive(Debug, clap::Args)]
struct StudentLogin {
    #[arg(short, long)]
    name: String,
    #[arg(short = 'k', long)]
    class_code: String,
}

#[derive(Debug, clap::Args)]
struct TeacherLogin {
    #[arg(short, long)]
    email: String,
    #[arg(short, long)]
    password: String,
}

#[derive(Debug, clap::Subcommand)]
enum Commands {
    Student {
        #[command(flatten)]
        login: StudentLogin,
        #[command(subcommand)]
        command: StudentCommand,
    },
    Teacher {
        #[command(flatten)]
        login: TeacherLogin,
        #[command(subcommand)]
        command: TeacherCommand,
    },
    /// Write the class anthology, one JSON file per page
    Anthology {
        #[command(flatten)]
        login: TeacherLogin,
        #[arg(short, long)]
        threshold: Option<u8>,
        #[arg(short, long, default_value = "out")]
        out: PathBuf,
    },
}

#[derive(Debug, clap::Subcommand)]
enum StudentCommand {
    Login,
    /// Replace a section's content with the contents of a file
    Write { section: SectionKey, file: PathBuf },
    /// Upload an image and use it as the cover
    Cover { file: PathBuf },
    Status,
    /// Write the book preview, one JSON file per page
    Preview {
        #[arg(short, long, default_value = "out")]
        out: PathBuf,
    },
}

#[derive(Debug, clap::Subcommand)]
enum TeacherCommand {
    CreateAccount,
    Overview,
    Feedback {
        record_id: String,
        section: ReviewSection,
        status: FeedbackStatus,
        comment: String,
    },
    Analytics,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();
    let config = match Config::load(&args.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load config {}: {:?}", args.config.display(), e);
            return;
        }
    };
    let _guard = match init_log(config.log_dir.clone()) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Failed to initialize logging: {:?}", e);
            return;
        }
    };
    if !args.config.is_file() {
        info!("config {} not found, using defaults", args.config.display());
    }
    if let Err(e) = run(args, config).await {
        eprintln!("{:?}", e);
    }
}

async fn connect(config: &Config) -> anyhow::Result<SqliteStore> {
    if let Some(path) = config.database_url.strip_prefix("sqlite://") {
        if let Some(parent) = Path::new(path).parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
    }
    Ok(SqliteStore::connect(&config.database_url).await?)
}

async fn run(args: Args, mut config: Config) -> anyhow::Result<()> {
    if let Some(url) = args.database {
        config.database_url = url;
    }
    let sqlite = connect(&config).await?;
    let authenticator = PasswordAuthenticator::new(sqlite.database.clone());
    let store = RecordStore::new(Arc::new(sqlite));

    match args.command {
        Commands::Student { login, command } => {
            let session =
                StudentSession::begin(store, &config, &login.name, &login.class_code).await?;
            match command {
                StudentCommand::Login => {
                    let record = session.record();
                    println!("{:<36} {}% complete", record.id, record.completion_percentage);
                }
                StudentCommand::Write { section, file } => {
                    let html = tokio::fs::read_to_string(&file).await?;
                    session.edit_with(|r| set_section_content(r, section, html))?;
                }
                StudentCommand::Cover { file } => {
                    let bytes = tokio::fs::read(&file).await?;
                    let file_name = file
                        .file_name()
                        .map(|f| f.to_string_lossy().into_owned())
                        .unwrap_or_default();
                    let blobs = LocalBlobStore::new(&config.blob_root);
                    let report = |p: f64| println!("uploading {file_name}: {p:.0}%");
                    let url = session
                        .upload(&blobs, UploadRule::IMAGE, SectionKey::Cover, &file_name, &bytes, Some(&report))
                        .await?;
                    session.edit_with(|r| Ok(CoverEditor::new(r).set_image(url)))?;
                }
                StudentCommand::Status => print_status(&session),
                StudentCommand::Preview { out } => {
                    let record = session.record();
                    let mut sink = DirectorySink::new(out);
                    let path = export_pdf(
                        &session.preview(),
                        &JsonRasterizer,
                        &mut sink,
                        &preview_filename(&record),
                    )
                    .await?;
                    println!("preview written to {}", path.display());
                }
            }
            if let Some(saved) = session.end().await? {
                println!("saved at {saved}");
            }
        }
        Commands::Teacher { login, command } => {
            if let TeacherCommand::CreateAccount = command {
                authenticator.create_account(&login.email, &login.password).await?;
                println!("Account created for {}", login.email);
                return Ok(());
            }
            let authenticator: Arc<dyn Authenticator> = Arc::new(authenticator);
            let teacher =
                TeacherSession::begin(authenticator, store, &login.email, &login.password).await?;
            match command {
                TeacherCommand::CreateAccount => {}
                TeacherCommand::Overview => {
                    for card in teacher.students().await? {
                        let badges: Vec<String> = card
                            .badges
                            .iter()
                            .map(|(badge, status)| format!("{badge}:{status:?}"))
                            .collect();
                        println!(
                            "{:<36} {:<24} {:<12} {:<6} {:>3}% {}",
                            card.id,
                            card.title,
                            card.name,
                            card.class_code,
                            card.completion_percentage,
                            badges.join(" ")
                        );
                    }
                }
                TeacherCommand::Feedback {
                    record_id,
                    section,
                    status,
                    comment,
                } => {
                    let item = teacher
                        .give_feedback(&record_id, section, &comment, status)
                        .await?;
                    println!("Feedback saved at {}", item.date);
                }
                TeacherCommand::Analytics => {
                    let stats = teacher.analytics().await?;
                    println!("students:       {}", stats.total);
                    println!("completed:      {} ({:.0}%)", stats.completed, stats.share(stats.completed));
                    println!("in progress:    {} ({:.0}%)", stats.in_progress, stats.share(stats.in_progress));
                    println!("not started:    {} ({:.0}%)", stats.not_started, stats.share(stats.not_started));
                    println!("average:        {}%", stats.average_completion);
                    for (class_code, count) in &stats.per_class {
                        println!("class {class_code:<8} {count}");
                    }
                    for card in &stats.most_active {
                        println!("recent: {} ({}) {}", card.name, card.class_code, card.last_updated);
                    }
                }
            }
            teacher.end();
        }
        Commands::Anthology {
            login,
            threshold,
            out,
        } => {
            let authenticator: Arc<dyn Authenticator> = Arc::new(authenticator);
            let teacher =
                TeacherSession::begin(authenticator, store, &login.email, &login.password).await?;
            let pages = teacher
                .anthology(threshold.unwrap_or(config.anthology_threshold))
                .await?;
            if pages.is_empty() {
                println!("No e-book has reached the anthology threshold yet.");
            } else {
                let mut sink = DirectorySink::new(out);
                let path = export_pdf(&pages, &JsonRasterizer, &mut sink, ANTHOLOGY_FILENAME).await?;
                println!("{} pages written to {}", pages.len(), path.display());
            }
            teacher.end();
        }
    }
    Ok(())
}

fn print_status(session: &StudentSession) {
    let record = session.record();
    println!("{} ({}): {}% complete", record.name, record.class_code, record.completion_percentage);
    for key in SectionKey::ALL {
        let words = record.cached_word_count(key);
        let target = match WordTarget::for_section(key) {
            Some(WordTarget { min, max: Some(max) }) => format!("{words}/{min}-{max} words"),
            Some(WordTarget { min, max: None }) => format!("{words}/{min}+ words"),
            None => String::new(),
        };
        let done = if section_satisfied(&record, key) { "done" } else { "" };
        println!("  {:<18} {:<20} {}", key.label(), target, done);
        if let Ok(reviewable) = ReviewSection::try_from(key) {
            if let Some(feedback) = record.teacher_feedback.get(&reviewable) {
                println!("    feedback ({:?}): {}", feedback.status, feedback.comment);
            }
        }
    }
    let status = session.status();
    if let Some(error) = status.last_error {
        println!("  last save failed: {error}");
    }
}
