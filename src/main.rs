use clap::{Parser, Subcommand, ValueEnum};
use env_logger::Env;
use itertools::Itertools;
use log::info;
use std::{
    error::Error,
    fs,
    path::{Path, PathBuf},
};

use quizledger::{
    config::{BackendKind, Config, ConfigStore, FileConfigStore},
    export::write_review_csv,
    format::{format_date, format_time},
    persistence::StatsBackend,
    progress_percent, GameOutcome, LedgerError, MissedQuestion, PlayerStats, Quest, QuestEngine,
    StatsStore, TopicStats,
};

/// player progress ledger for quiz games
#[derive(Parser, Debug, Clone)]
#[clap(
    version,
    about,
    long_about = "Tracks quiz results per topic, keeps the questions you missed for review, and scores quests against your lifetime stats."
)]
pub struct Cli {
    /// config file to read instead of the default location
    #[clap(long)]
    config: Option<PathBuf>,

    /// stats file to use instead of the configured one
    #[clap(long)]
    stats_path: Option<PathBuf>,

    /// storage format for the stats record
    #[clap(long, value_enum)]
    backend: Option<BackendKind>,

    #[clap(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// print lifetime stats, or one topic's details and review list
    Show {
        #[clap(short, long)]
        topic: Option<String>,
    },
    /// record the outcome of a finished game
    Record {
        #[clap(short, long)]
        topic: String,

        #[clap(short, long, value_enum)]
        result: GameResult,

        #[clap(long, default_value_t = 0)]
        turns_won: u64,

        #[clap(long, default_value_t = 0)]
        turns_lost: u64,

        #[clap(long, default_value_t = 0)]
        duration_ms: u64,

        /// longest run of correct answers in this game
        #[clap(long, default_value_t = 0)]
        streak: u32,

        /// a missed question as "question|your answer|correct answer"
        #[clap(long = "missed", value_parser = parse_missed)]
        missed: Vec<MissedQuestion>,
    },
    /// forget the missed questions of a topic
    ClearMissed { topic: String },
    /// delete a topic's history (lifetime totals are kept)
    DeleteTopic { topic: String },
    /// wipe all stats
    Clear {
        /// confirm the irreversible reset
        #[clap(long)]
        yes: bool,
    },
    /// evaluate a quest file against the current stats and save it back
    Quests { file: PathBuf },
    /// write every missed question to a CSV file
    Export { file: PathBuf },
    /// save settings (and any --backend/--stats-path given) as the defaults
    Config {
        /// missed questions listed per topic by `show --topic`
        #[clap(long)]
        review_limit: Option<usize>,

        /// keep only this many missed questions per topic
        #[clap(long, conflicts_with = "keep_all_missed")]
        missed_retention: Option<usize>,

        /// stop dropping old missed questions
        #[clap(long)]
        keep_all_missed: bool,
    },
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, ValueEnum, strum_macros::Display)]
pub enum GameResult {
    Won,
    Lost,
}

fn parse_missed(s: &str) -> Result<MissedQuestion, String> {
    match s.split('|').map(str::trim).collect::<Vec<_>>().as_slice() {
        [question, player, correct] if !question.is_empty() => {
            Ok(MissedQuestion::new(*question, *player, *correct))
        }
        _ => Err("expected \"question|your answer|correct answer\"".to_string()),
    }
}

impl Cli {
    fn config_store(&self) -> FileConfigStore {
        match &self.config {
            Some(path) => FileConfigStore::with_path(path),
            None => FileConfigStore::new(),
        }
    }

    /// Config file values with command-line overrides applied
    fn resolve_config(&self) -> Config {
        let mut config = self.config_store().load();
        if let Some(backend) = self.backend {
            config.backend = backend;
        }
        if let Some(path) = &self.stats_path {
            config.stats_path = Some(path.clone());
        }
        config
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::Builder::from_env(Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();
    let config = cli.resolve_config();

    if let Command::Config {
        review_limit,
        missed_retention,
        keep_all_missed,
    } = cli.command
    {
        let saved = save_config(
            &cli.config_store(),
            config,
            review_limit,
            missed_retention,
            keep_all_missed,
        )?;
        print!("{}", render_config(&saved));
        return Ok(());
    }

    info!(
        "using {} store at {}",
        config.backend,
        config.resolved_stats_path().display()
    );

    let backend = config.open_backend()?;
    let mut store = StatsStore::open(backend).with_missed_retention(config.missed_retention);

    run(cli.command, &config, &mut store)
}

fn run<B: StatsBackend>(
    command: Command,
    config: &Config,
    store: &mut StatsStore<B>,
) -> Result<(), Box<dyn Error>> {
    match command {
        Command::Show { topic: None } => print!("{}", render_overview(store.stats())),
        Command::Show { topic: Some(name) } => match store.stats().topic(&name) {
            Some(topic) => print!("{}", render_topic(topic, config.review_limit)),
            None => println!("No stats for topic \"{name}\""),
        },
        Command::Record {
            topic,
            result,
            turns_won,
            turns_lost,
            duration_ms,
            streak,
            missed,
        } => {
            let outcome = GameOutcome {
                topic_name: topic,
                won: result == GameResult::Won,
                turns_won,
                turns_lost,
                duration_ms,
                best_streak: streak,
                missed,
            };
            tolerate_write_failure(store.record_game_outcome(&outcome).map(|_| ()))?;
            let stats = store.stats();
            println!(
                "Recorded {} game in \"{}\" ({} played, {}% win rate)",
                result.to_string().to_lowercase(),
                outcome.topic_name,
                stats.total_games_played,
                stats.win_rate()
            );
        }
        Command::ClearMissed { topic } => {
            tolerate_write_failure(store.clear_missed_questions(&topic).map(|_| ()))?;
            println!("Cleared missed questions for \"{topic}\"");
        }
        Command::DeleteTopic { topic } => {
            tolerate_write_failure(store.delete_topic(&topic).map(|_| ()))?;
            println!("Deleted topic \"{topic}\"");
        }
        Command::Clear { yes: false } => {
            return Err("refusing to delete all stats without --yes".into());
        }
        Command::Clear { yes: true } => {
            tolerate_write_failure(store.clear_stats().map(|_| ()))?;
            println!("All stats cleared");
        }
        Command::Quests { file } => run_quests(&file, store.stats())?,
        Command::Export { file } => {
            let rows = write_review_csv(store.stats(), fs::File::create(&file)?)?;
            println!("Exported {rows} missed questions to {}", file.display());
        }
        Command::Config { .. } => print!("{}", render_config(config)),
    }
    Ok(())
}

fn save_config(
    store: &impl ConfigStore,
    mut config: Config,
    review_limit: Option<usize>,
    missed_retention: Option<usize>,
    keep_all_missed: bool,
) -> std::io::Result<Config> {
    if let Some(limit) = review_limit {
        config.review_limit = limit;
    }
    if keep_all_missed {
        config.missed_retention = None;
    } else if missed_retention.is_some() {
        config.missed_retention = missed_retention;
    }
    store.save(&config)?;
    Ok(config)
}

fn render_config(config: &Config) -> String {
    let retention = config
        .missed_retention
        .map_or_else(|| "all".to_string(), |n| n.to_string());
    format!(
        "Backend:          {}\nStats Path:       {}\nReview Limit:     {}\nMissed Retention: {}\n",
        config.backend,
        config.resolved_stats_path().display(),
        config.review_limit,
        retention
    )
}

/// A failed write still leaves the in-memory update intact, so it is only
/// reported
fn tolerate_write_failure(result: Result<(), LedgerError>) -> Result<(), LedgerError> {
    match result {
        Err(e) if e.is_non_fatal() => {
            eprintln!("warning: {e}");
            Ok(())
        }
        other => other,
    }
}

fn run_quests(path: &Path, stats: &PlayerStats) -> Result<(), Box<dyn Error>> {
    let quests: Vec<Quest> = serde_json::from_slice(&fs::read(path)?)?;
    let mut engine = QuestEngine::new(quests);
    let completed = engine.apply(stats)?;

    fs::write(path, serde_json::to_vec_pretty(engine.quests())?)?;

    print!("{}", render_quests(engine.quests())?);
    for quest in &completed {
        println!("Quest complete: {} (+{} XP)", quest.description, quest.reward_xp);
    }
    Ok(())
}

fn render_overview(stats: &PlayerStats) -> String {
    if stats.total_games_played == 0 {
        return "No games played yet!\n".to_string();
    }

    let mut out = String::new();
    out.push_str(&format!("Games Played:       {}\n", stats.total_games_played));
    out.push_str(&format!("Win Rate:           {}%\n", stats.win_rate()));
    out.push_str(&format!("Best Streak:        {}\n", stats.longest_streak));
    out.push_str(&format!(
        "Time Played:        {}\n",
        format_time(stats.total_time_played_ms)
    ));
    out.push_str(&format!("Questions Answered: {}\n", stats.questions_answered()));
    out.push_str(&format!("Correct Answers:    {}\n", stats.total_turns_won));
    out.push_str(&format!("Wrong Answers:      {}\n", stats.total_turns_lost));
    out.push_str(&format!("Accuracy:           {}%\n", stats.turn_accuracy()));
    out.push_str(&format!("Games Won:          {}\n", stats.total_games_won));
    out.push_str(&format!("Games Lost:         {}\n", stats.total_games_lost));

    if !stats.topics.is_empty() {
        out.push_str(&format!("\nTopics Studied ({})\n", stats.topics.len()));
        for topic in stats
            .topics
            .iter()
            .sorted_by(|a, b| b.last_played.cmp(&a.last_played))
        {
            out.push_str(&format!(
                "  {} - {} games, {}% accuracy",
                truncate(&topic.topic_name, 30),
                topic.games_played,
                topic.accuracy()
            ));
            if !topic.missed_questions.is_empty() {
                out.push_str(&format!(", {} to review", topic.missed_questions.len()));
            }
            out.push('\n');
        }
    }
    out
}

fn render_topic(topic: &TopicStats, review_limit: usize) -> String {
    let mut out = format!("{}\n", topic.topic_name);
    out.push_str(&format!("  First played:  {}\n", format_date(topic.first_played)));
    out.push_str(&format!("  Last played:   {}\n", format_date(topic.last_played)));
    out.push_str(&format!("  Time spent:    {}\n", format_time(topic.total_time_ms)));
    out.push_str(&format!(
        "  Correct/Wrong: {}/{}\n",
        topic.turns_won, topic.turns_lost
    ));
    out.push_str(&format!("  Accuracy:      {}%\n", topic.accuracy()));

    let review = topic.recent_missed(review_limit);
    if !review.is_empty() {
        out.push_str("  Questions to Review\n");
        for missed in review {
            out.push_str(&format!(
                "    {}\n      Your answer: {}  Correct: {}\n",
                missed.question, missed.player_answer, missed.correct_answer
            ));
        }
    }
    out
}

fn render_quests(quests: &[Quest]) -> Result<String, LedgerError> {
    if quests.is_empty() {
        return Ok("No active quests\n".to_string());
    }
    let mut out = String::new();
    for quest in quests {
        let mark = if quest.is_completed { "x" } else { " " };
        out.push_str(&format!(
            "[{mark}] {} ({}) {}/{} {}% +{} XP\n",
            quest.description,
            quest.quest_type,
            quest.progress,
            quest.target,
            progress_percent(quest)?,
            quest.reward_xp
        ));
    }
    Ok(out)
}

fn truncate(s: &str, max_chars: usize) -> String {
    if s.chars().count() > max_chars {
        format!("{}...", s.chars().take(max_chars).collect::<String>())
    } else {
        s.to_string()
    }
}
