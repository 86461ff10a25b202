use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser, Subcommand};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

mod bootstrap;

use bootstrap::bootstrap;
use studypilot_core::load_config;
use studypilot_schema::{AskRequest, AskResponse, Difficulty, ExamFlashcardRequest, Mode, StudyState};

#[derive(Parser)]
#[command(name = "studypilot", version, about = "studypilot study coach")]
struct Cli {
    #[arg(
        long,
        default_value = ".",
        help = "Config root directory (contains config/main.yaml)"
    )]
    config_root: PathBuf,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Start the HTTP API server")]
    Serve {
        #[arg(long, help = "Bind address, overrides server.bind")]
        bind: Option<String>,
    },
    #[command(about = "Ask one question and print the answer")]
    Ask {
        #[arg(help = "Message to send")]
        message: String,
        #[arg(long, help = "Force a mode (plan, explain, quiz, flashcards, review, coach)")]
        mode: Option<String>,
        #[arg(long, help = "YAML file with the current study state")]
        state: Option<PathBuf>,
        #[arg(long, help = "Answer without retrieving study materials")]
        no_memory: bool,
        #[arg(long, help = "Do not redirect to coaching interventions")]
        skip_intervention: bool,
    },
    #[command(about = "Generate exam-grade flashcards as JSON")]
    Flashcards {
        #[arg(long, help = "Topic of the cards")]
        topic: String,
        #[arg(long, help = "Source material file; retrieved by topic when omitted")]
        content_file: Option<PathBuf>,
        #[arg(long, default_value = "10", help = "Number of cards (1-50)")]
        count: u32,
        #[arg(long, default_value = "intermediate", help = "Target difficulty")]
        difficulty: String,
        #[arg(long = "mistake", help = "Past mistake to target with trap cards (repeatable)")]
        mistakes: Vec<String>,
    },
    #[command(about = "Validate config files")]
    Validate,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_dir = cli.config_root.join("logs");
    std::fs::create_dir_all(&log_dir)?;
    let file_appender = tracing_appender::rolling::daily(&log_dir, "studypilot.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(non_blocking),
        )
        .init();

    let Some(command) = cli.command else {
        Cli::command().print_help()?;
        println!();
        return Ok(());
    };

    match command {
        Commands::Validate => {
            let config = load_config(&cli.config_root)?;
            println!(
                "Config valid. {} providers, reasoning={}, structured={}, memory={}.",
                config.providers.len(),
                config.generation.reasoning.model,
                config.generation.structured.model,
                if config.memory.enabled { "on" } else { "off" }
            );
        }
        Commands::Serve { bind } => {
            let config = load_config(&cli.config_root)?;
            let state = bootstrap(&config).await?;
            let addr = bind.unwrap_or_else(|| config.server.bind.clone());
            studypilot_server::serve(state, &addr).await?;
        }
        Commands::Ask {
            message,
            mode,
            state,
            no_memory,
            skip_intervention,
        } => {
            let config = load_config(&cli.config_root)?;
            let app = bootstrap(&config).await?;

            let mut request = AskRequest::new(message);
            request.mode = mode.as_deref().map(str::parse::<Mode>).transpose()?;
            request.context = state.as_deref().map(read_study_state).transpose()?;
            request.use_memory = !no_memory;
            request.skip_intervention = skip_intervention;

            let response = app.orchestrator.ask(request).await?;
            print_ask_response(&response)?;
        }
        Commands::Flashcards {
            topic,
            content_file,
            count,
            difficulty,
            mistakes,
        } => {
            let config = load_config(&cli.config_root)?;
            let app = bootstrap(&config).await?;

            let content = content_file
                .as_deref()
                .map(|path| {
                    std::fs::read_to_string(path)
                        .with_context(|| format!("failed to read content file: {}", path.display()))
                })
                .transpose()?;

            let mut request = ExamFlashcardRequest::new(topic, String::new(), count);
            request.content = content;
            request.difficulty = difficulty.parse::<Difficulty>()?;
            request.mistakes = mistakes;

            let batch = app.flashcards.generate_exam_grade(&request).await?;
            println!("{}", serde_json::to_string_pretty(&batch)?);
        }
    }

    Ok(())
}

fn read_study_state(path: &Path) -> Result<StudyState> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read state file: {}", path.display()))?;
    serde_yaml::from_str(&content)
        .with_context(|| format!("failed to parse yaml file: {}", path.display()))
}

fn print_ask_response(response: &AskResponse) -> Result<()> {
    println!("[{}] {}", response.mode, response.answer);
    if let Some(structured) = &response.structured_output {
        println!("\n{}", serde_json::to_string_pretty(structured)?);
    }
    println!(
        "\nmemory: {} ({} chunks)",
        response.memory_quality.as_str(),
        response.chunks_used
    );
    for suggestion in &response.suggestions {
        println!("{} {} -> \"{}\"", suggestion.icon, suggestion.message, suggestion.action);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_parses_flashcards_with_repeated_mistakes() {
        let cli = Cli::try_parse_from([
            "studypilot",
            "flashcards",
            "--topic",
            "Cells",
            "--count",
            "5",
            "--mistake",
            "confused osmosis with diffusion",
            "--mistake",
            "forgot ATP",
        ])
        .unwrap();
        match cli.command {
            Some(Commands::Flashcards { topic, count, mistakes, .. }) => {
                assert_eq!(topic, "Cells");
                assert_eq!(count, 5);
                assert_eq!(mistakes.len(), 2);
            }
            _ => panic!("expected flashcards command"),
        }
    }

    #[test]
    fn cli_parses_ask_flags() {
        let cli = Cli::try_parse_from([
            "studypilot",
            "--config-root",
            "/tmp/sp",
            "ask",
            "quiz me",
            "--no-memory",
            "--mode",
            "quiz",
        ])
        .unwrap();
        assert_eq!(cli.config_root, PathBuf::from("/tmp/sp"));
        match cli.command {
            Some(Commands::Ask { message, mode, no_memory, skip_intervention, .. }) => {
                assert_eq!(message, "quiz me");
                assert_eq!(mode.as_deref(), Some("quiz"));
                assert!(no_memory);
                assert!(!skip_intervention);
            }
            _ => panic!("expected ask command"),
        }
    }

    #[test]
    fn study_state_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.yaml");
        std::fs::write(&path, "focus_minutes_today: 15\ndays_until_exam: 2\n").unwrap();

        let state = read_study_state(&path).unwrap();
        assert_eq!(state.focus_minutes_today, 15);
        assert_eq!(state.days_until_exam, Some(2));
        assert_eq!(state.target_focus_minutes, 120);
    }
}
