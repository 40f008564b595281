//! Interactive REPL — the terminal face of the game.
//!
//! Launch with `ecosort play`. Type `/help` for available commands, Tab for completion.

use std::sync::Arc;

use rustyline::completion::{Completer, Pair};
use rustyline::config::CompletionType;
use rustyline::error::ReadlineError;
use rustyline::highlight::Highlighter;
use rustyline::hint::Hinter;
use rustyline::validate::Validator;
use rustyline::{
    Cmd, ConditionalEventHandler, Config, Editor, Event, EventContext, EventHandler, Helper,
    KeyEvent, RepeatCount,
};

use ecosort::{AnalysisResult, Classification};

use crate::config::Settings;
use crate::remote;
use crate::session::{AuthService, GameController, LocalAuth};

/// Available REPL commands.
const COMMANDS: &[(&str, &str)] = &[
    ("/camera", "Turn on the camera (optional image directory)"),
    ("/start", "Start live analysis"),
    ("/stop", "Stop live analysis"),
    ("/off", "Turn the camera off"),
    ("/answer", "Answer the current item: recycle | trash"),
    ("/next", "Clear the result and judge the next item"),
    ("/result", "Show the AI verdict once you have answered"),
    ("/stats", "Show score, streak, level, and accuracy"),
    ("/achievements", "List achievement badges"),
    ("/login", "Sign in with a name"),
    ("/logout", "Sign out"),
    ("/clear", "Clear the screen"),
    ("/help", "Show available commands"),
    ("/exit", "Quit the game"),
];

const ANSWERS: &[&str] = &["recycle", "trash"];

/// REPL helper for tab completion.
#[derive(Default)]
struct EcoHelper;

impl Completer for EcoHelper {
    type Candidate = Pair;

    fn complete(
        &self,
        line: &str,
        pos: usize,
        _ctx: &rustyline::Context<'_>,
    ) -> rustyline::Result<(usize, Vec<Pair>)> {
        let input = &line[..pos];

        if !input.contains(' ') {
            let matches: Vec<Pair> = COMMANDS
                .iter()
                .filter(|(cmd, _)| cmd.starts_with(input))
                .map(|(cmd, desc)| Pair {
                    display: format!("{cmd:<16} {desc}"),
                    replacement: format!("{cmd} "),
                })
                .collect();
            return Ok((0, matches));
        }

        let (cmd, args) = input.split_once(' ').unwrap_or((input, ""));
        if cmd == "/answer" {
            let prefix_start = input.len() - args.len();
            let matches: Vec<Pair> = ANSWERS
                .iter()
                .filter(|a| a.starts_with(args.trim()))
                .map(|a| Pair {
                    display: a.to_string(),
                    replacement: a.to_string(),
                })
                .collect();
            return Ok((prefix_start, matches));
        }

        Ok((pos, Vec::new()))
    }
}

impl Hinter for EcoHelper {
    type Hint = String;

    fn hint(&self, line: &str, pos: usize, _ctx: &rustyline::Context<'_>) -> Option<String> {
        if pos < line.len() || line.is_empty() {
            return None;
        }
        if line.starts_with('/') && !line.contains(' ') {
            for (cmd, _) in COMMANDS {
                if cmd.starts_with(line) && *cmd != line {
                    return Some(cmd[line.len()..].to_string());
                }
            }
        }
        None
    }
}

impl Highlighter for EcoHelper {}
impl Validator for EcoHelper {}
impl Helper for EcoHelper {}

struct TabCompleteOrAcceptHint;

impl ConditionalEventHandler for TabCompleteOrAcceptHint {
    fn handle(
        &self,
        _evt: &Event,
        _n: RepeatCount,
        _positive: bool,
        ctx: &EventContext<'_>,
    ) -> Option<Cmd> {
        if ctx.has_hint() {
            Some(Cmd::CompleteHint)
        } else {
            Some(Cmd::Complete)
        }
    }
}

/// Run the interactive game.
pub fn run(settings: Settings) -> anyhow::Result<()> {
    let runtime = tokio::runtime::Runtime::new()?;
    let _guard = runtime.enter();

    let auth = Arc::new(LocalAuth::new());
    let (store, classifier) = remote::connect(&settings)?;
    let mut game = GameController::new(store, classifier, auth.clone(), settings.timing);

    let mut results = game.subscribe();
    runtime.spawn(async move {
        while results.changed().await.is_ok() {
            let frame = results.borrow_and_update().as_ref().map(|v| v.frame.clone());
            if let Some(frame) = frame {
                eprintln!("\n  \u{1f50d} Analyzed {frame}. Recycle or trash? /answer <choice>");
            }
        }
    });

    eprintln!();
    eprintln!(
        "  \x1b[32m\u{267b}\x1b[0m \x1b[1mecosort v{}\x1b[0m \x1b[90m\u{2014} Recycle or trash? Beat the AI.\x1b[0m",
        env!("CARGO_PKG_VERSION")
    );
    eprintln!();
    eprintln!(
        "    \x1b[36m/camera\x1b[0m, then \x1b[36m/start\x1b[0m. \x1b[90mTab\x1b[0m completes, \x1b[90m/exit\x1b[0m quits."
    );
    eprintln!();

    let config = Config::builder()
        .history_ignore_space(true)
        .auto_add_history(true)
        .completion_type(CompletionType::List)
        .completion_prompt_limit(20)
        .build();

    let mut rl: Editor<EcoHelper, rustyline::history::DefaultHistory> =
        Editor::with_config(config)?;
    rl.set_helper(Some(EcoHelper));
    rl.bind_sequence(
        KeyEvent::from('\t'),
        EventHandler::Conditional(Box::new(TabCompleteOrAcceptHint)),
    );

    let home = std::env::var("HOME")
        .or_else(|_| std::env::var("USERPROFILE"))
        .unwrap_or_else(|_| ".".to_string());
    let hist_path = std::path::PathBuf::from(&home).join(".ecosort_history");
    if hist_path.exists() {
        let _ = rl.load_history(&hist_path);
    }

    loop {
        let prompt = format!(" \x1b[36mecosort ({})>\x1b[0m ", game.phase());
        match rl.readline(&prompt) {
            Ok(line) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }

                let input = line.strip_prefix('/').unwrap_or(line);
                if input.is_empty() {
                    cmd_help();
                    continue;
                }

                let (cmd, args) = input.split_once(' ').unwrap_or((input, ""));
                let args = args.trim();

                match cmd {
                    "exit" | "quit" => {
                        eprintln!("  \x1b[90m\u{2728}\x1b[0m Goodbye!");
                        break;
                    }
                    "help" | "h" | "?" => cmd_help(),
                    "clear" | "cls" => eprint!("\x1b[2J\x1b[H"),
                    "camera" => cmd_camera(args, &settings, &mut game),
                    "start" => match game.start_analysis() {
                        Ok(()) => eprintln!("  Live analysis on. Hold an item up to the camera."),
                        Err(e) => eprintln!("  {e}"),
                    },
                    "stop" => match game.stop_analysis() {
                        Ok(()) => eprintln!("  Live analysis off."),
                        Err(e) => eprintln!("  {e}"),
                    },
                    "off" => {
                        game.stop_camera();
                        eprintln!("  Camera off.");
                    }
                    "answer" | "a" => cmd_answer(args, &mut game),
                    "recycle" | "trash" => cmd_answer(cmd, &mut game),
                    "next" => {
                        game.next_round();
                        eprintln!("  Ready for the next item.");
                    }
                    "result" => match (game.answered(), game.current_verdict()) {
                        (Some(answered), _) => {
                            print_result(&answered.verdict.frame, &answered.verdict.result)
                        }
                        (None, Some(_)) => eprintln!("  Answer first, then see the verdict."),
                        (None, None) => eprintln!("  No analysis yet."),
                    },
                    "stats" => cmd_stats(&game),
                    "achievements" => cmd_achievements(&game),
                    "login" => {
                        if args.is_empty() {
                            eprintln!("  Usage: /login <name>");
                        } else {
                            auth.login(args);
                            eprintln!("  Signed in as {args}. Applies from the next /start.");
                        }
                    }
                    "logout" => {
                        auth.logout();
                        eprintln!("  Signed out.");
                    }
                    _ => {
                        eprintln!("  Unknown command '/{cmd}'. Type /help for commands.");
                    }
                }
            }
            Err(ReadlineError::Interrupted) => {
                eprintln!("  \x1b[90m(Ctrl+C)\x1b[0m Type \x1b[1m/exit\x1b[0m to quit.");
            }
            Err(ReadlineError::Eof) => {
                eprintln!("  \x1b[90m\u{2728}\x1b[0m Goodbye!");
                break;
            }
            Err(err) => {
                eprintln!("  Error: {err}");
                break;
            }
        }
    }

    game.shutdown();
    let _ = rl.save_history(&hist_path);

    Ok(())
}

fn cmd_help() {
    eprintln!();
    eprintln!("  Commands:");
    eprintln!();
    for (cmd, desc) in COMMANDS {
        eprintln!("    {cmd:<18} {desc}");
    }
    eprintln!();
    eprintln!("  Tip: /recycle and /trash are shortcuts for /answer.");
    eprintln!();
}

fn cmd_camera(args: &str, settings: &Settings, game: &mut GameController) {
    let dir = if args.is_empty() {
        settings.camera_dir.clone()
    } else {
        std::path::PathBuf::from(args)
    };

    match game.attach_directory(&dir) {
        Ok(frames) => eprintln!("  Camera on: {} ({frames} frames)", dir.display()),
        Err(e) => eprintln!("  \x1b[31m{e}\x1b[0m"),
    }
}

fn cmd_answer(args: &str, game: &mut GameController) {
    let choice: Classification = match args.parse() {
        Ok(c) => c,
        Err(_) => {
            eprintln!("  Usage: /answer recycle|trash");
            return;
        }
    };
    match game.submit_answer(choice) {
        Ok(answered) => {
            let scored = answered.scored;
            if scored.correct {
                eprintln!(
                    "  \x1b[32mCorrect!\x1b[0m +{} points (streak {})",
                    scored.points, scored.stats.streak
                );
            } else {
                eprintln!("  \x1b[31mNot quite.\x1b[0m Streak reset.");
            }
            eprintln!(
                "  Score {}  Level {}  Accuracy {}%",
                scored.stats.score,
                scored.stats.level,
                scored.stats.accuracy()
            );
            print_result(&answered.verdict.frame, &answered.verdict.result);
            eprintln!("  /next to judge another item.");
        }
        Err(e) => eprintln!("  {e}"),
    }
}

fn cmd_stats(game: &GameController) {
    let stats = game.stats();
    eprintln!();
    eprintln!("  Score:    {}", stats.score);
    eprintln!("  Level:    {}", stats.level);
    eprintln!("  Streak:   {}", stats.streak);
    eprintln!(
        "  Answers:  {} ({} correct, {}% accuracy)",
        stats.total_answers,
        stats.correct_answers,
        stats.accuracy()
    );
    eprintln!("  Attempts: {} ({} stale dropped)", game.attempts(), game.stale_discards());
    eprintln!();
}

fn cmd_achievements(game: &GameController) {
    eprintln!();
    for badge in game.achievements() {
        let mark = if badge.unlocked { "\u{2605}" } else { "\u{2606}" };
        eprintln!("    {mark} {:<14} {}", badge.title, badge.description);
    }
    eprintln!();
}

fn print_result(frame: &str, result: &AnalysisResult) {
    let color = match result.classification {
        Classification::Recycle => "\x1b[32m",
        Classification::Trash => "\x1b[33m",
    };
    eprintln!();
    eprintln!(
        "  AI verdict on {frame}: {color}{}\x1b[0m ({}% confident)",
        result.classification.as_str().to_uppercase(),
        result.confidence
    );
    eprintln!("  {}", result.explanation);
    for tip in &result.tips {
        eprintln!("    \u{2022} {tip}");
    }
    eprintln!();
}
