use anyhow::{bail, Context, Result};
use log::info;

use storyloom::db::{self, repository};
use storyloom::{config, game, StoryGenerator, DEFAULT_THEME};

const USAGE: &str = "\
Usage:
  storyloom generate [theme...]   generate and store a new story
  storyloom play <story_id>       play a stored story

Environment:
  GEMINI_API_KEY     API key (required for the gemini backend)
  STORY_MODEL        model name, or .gguf path with STORY_BACKEND=local
  STORY_TEMPERATURE  sampling temperature (default 0.7)
  STORY_DATABASE     SQLite file (default stories.db)

Logging: set RUST_LOG=debug or RUST_LOG=trace for verbose output";

fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    // Control verbosity with RUST_LOG:
    //   RUST_LOG=info   # request sizes, story ids
    //   RUST_LOG=debug  # + messages, extracted JSON, each inserted node
    //   RUST_LOG=trace  # + full rendered prompt
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let command = args.first().context(USAGE)?;

    match command.as_str() {
        "generate" => generate(&args[1..]),
        "play" => {
            let story_id: i64 = args
                .get(1)
                .context(USAGE)?
                .parse()
                .context("story_id must be a number")?;
            play(story_id)
        }
        other => bail!("unknown command {other:?}\n\n{USAGE}"),
    }
}

fn generate(theme_words: &[String]) -> Result<()> {
    let theme = if theme_words.is_empty() {
        DEFAULT_THEME.to_string()
    } else {
        theme_words.join(" ")
    };

    let mut generator =
        StoryGenerator::from_env().context("failed to configure story generator")?;
    let mut conn = db::open(config::database_path()).context("failed to open database")?;

    let session_id = uuid::Uuid::new_v4().to_string();
    println!("Generating a story with theme: {theme:?}");
    println!("(this might take a few seconds)\n");

    let story = generator
        .generate_story(&mut conn, &session_id, &theme)
        .context("story generation failed")?;
    info!("Story {} stored for session {session_id}", story.id);

    println!("Title: {}  (id {})", story.title, story.id);
    if let Some(root) = repository::find_root_node(&conn, story.id)? {
        println!("\nStory start: {}", root.content);
        println!("\nOptions:");
        if root.options.is_empty() {
            println!("This is an ending node.");
        }
        for option in &root.options {
            println!("- {}", option.text);
        }
    }
    println!("\nPlay it with: storyloom play {}", story.id);
    Ok(())
}

fn play(story_id: i64) -> Result<()> {
    let conn = db::open(config::database_path()).context("failed to open database")?;
    let story = repository::load_complete_story(&conn, story_id)
        .with_context(|| format!("failed to load story {story_id}"))?;

    let stdin = std::io::stdin();
    let mut input = stdin.lock();
    let mut out = std::io::stdout();
    game::run(&story, &mut input, &mut out)
}
