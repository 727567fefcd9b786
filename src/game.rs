use std::io::{BufRead, Write};

use anyhow::{Context, Result};
use log::{info, warn};

use crate::db::models::{CompleteStory, StoryNode};

// ---------------------------------------------------------------------------
// Game state
// ---------------------------------------------------------------------------

struct GameState<'a> {
    story: &'a CompleteStory,
    current_node_id: i64,
    /// Number of choices the player has made.
    steps_completed: usize,
}

impl<'a> GameState<'a> {
    fn new(story: &'a CompleteStory) -> Self {
        Self {
            story,
            current_node_id: story.root_node_id,
            steps_completed: 0,
        }
    }

    fn current_node(&self) -> Result<&'a StoryNode> {
        self.story
            .get(self.current_node_id)
            .with_context(|| format!("story references missing node {}", self.current_node_id))
    }
}

// ---------------------------------------------------------------------------
// Game over screen
// ---------------------------------------------------------------------------

/// Outcome of a single play-through.
#[derive(Debug, PartialEq, Eq)]
pub enum GameOutcome {
    /// Player reached an ending node.
    Finished {
        won: bool,
        steps_completed: usize,
        total_steps: usize,
        ending_node_id: i64,
    },
    /// Player typed quit mid-story, or input ran out.
    Quit,
}

fn show_game_over(out: &mut impl Write, outcome: &GameOutcome) -> Result<()> {
    writeln!(out, "\n========================================")?;
    writeln!(out, "               THE END")?;
    writeln!(out, "========================================")?;

    match outcome {
        GameOutcome::Finished {
            won,
            steps_completed,
            total_steps,
            ending_node_id,
        } => {
            if *won {
                writeln!(out, "  Result: VICTORY - you found the winning ending!")?;
            } else {
                writeln!(out, "  Result: DEFEAT - this path did not end well.")?;
            }
            writeln!(
                out,
                "  Choices: {} (longest path: {})",
                steps_completed, total_steps
            )?;
            writeln!(out, "  Ended at node: {}", ending_node_id)?;
        }
        GameOutcome::Quit => {
            writeln!(out, "  You closed the book.")?;
        }
    }

    writeln!(out, "========================================\n")?;
    writeln!(out, "  [r] Restart    [q] Quit\n")?;
    Ok(())
}

/// Read the player's post-game choice. Returns `true` to restart, `false` to quit.
fn prompt_restart(input: &mut impl BufRead, out: &mut impl Write) -> Result<bool> {
    loop {
        write!(out, "> ")?;
        out.flush()?;
        let mut line = String::new();
        if input.read_line(&mut line)? == 0 {
            return Ok(false);
        }
        match line.trim().to_lowercase().as_str() {
            "r" => return Ok(true),
            "q" => return Ok(false),
            _ => writeln!(out, "  Press [r] to restart or [q] to quit.")?,
        }
    }
}

// ---------------------------------------------------------------------------
// Single play-through
// ---------------------------------------------------------------------------

pub fn play_round(
    story: &CompleteStory,
    input: &mut impl BufRead,
    out: &mut impl Write,
) -> Result<GameOutcome> {
    let mut state = GameState::new(story);
    let total_steps = story.total_steps();

    info!("Story {} started at node {}", story.story.id, state.current_node_id);

    loop {
        let node = state.current_node()?;
        writeln!(out, "\n{}", node.content)?;

        if node.is_ending || node.options.is_empty() {
            if !node.is_ending {
                warn!("Node {} has no options but is not an ending", node.id);
            }
            info!("Ending reached: node {} (winning={})", node.id, node.is_winning_ending);
            return Ok(GameOutcome::Finished {
                won: node.is_winning_ending,
                steps_completed: state.steps_completed,
                total_steps,
                ending_node_id: node.id,
            });
        }

        writeln!(out)?;
        for (i, option) in node.options.iter().enumerate() {
            writeln!(out, "  [{}] {}", i + 1, option.text)?;
        }

        let choice = loop {
            write!(out, "\n[You]: ")?;
            out.flush()?;
            let mut line = String::new();
            if input.read_line(&mut line)? == 0 {
                return Ok(GameOutcome::Quit);
            }
            let line = line.trim();

            if line.eq_ignore_ascii_case("quit") || line.eq_ignore_ascii_case("exit") {
                return Ok(GameOutcome::Quit);
            }

            match line.parse::<usize>() {
                Ok(n) if (1..=node.options.len()).contains(&n) => break &node.options[n - 1],
                _ => writeln!(out, "(Pick a number from 1 to {}.)", node.options.len())?,
            }
        };

        info!("Transition: {} -> {} ({:?})", node.id, choice.node_id, choice.text);
        state.current_node_id = choice.node_id;
        state.steps_completed += 1;
    }
}

// ---------------------------------------------------------------------------
// Public entry point: plays rounds until the player quits
// ---------------------------------------------------------------------------

pub fn run(story: &CompleteStory, input: &mut impl BufRead, out: &mut impl Write) -> Result<()> {
    loop {
        writeln!(out, "\n========================================")?;
        writeln!(out, "   {}", story.story.title)?;
        writeln!(out, "========================================")?;
        writeln!(out, "Choose an option by number. Type quit to stop.")?;

        let outcome = play_round(story, input, out)?;
        show_game_over(out, &outcome)?;

        if outcome == GameOutcome::Quit || !prompt_restart(input, out)? {
            writeln!(out, "Thanks for playing!")?;
            break;
        }

        info!("Player chose to restart");
    }

    Ok(())
}
