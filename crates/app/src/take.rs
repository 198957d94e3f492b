//! Interactive checkpoint attempt on the terminal.

use std::sync::Arc;
use std::time::Duration as StdDuration;

use academy_core::model::{CheckpointId, LearnerId};
use chrono::Duration;
use services::{
    AppServices, CheckpointFlowError, CheckpointSession, Countdown, Selection, SubmissionOutcome,
};
use tokio::sync::{Mutex, mpsc};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Input {
    Answer(usize),
    Next,
    Previous,
    GoTo(usize),
    Show,
    Submit,
    Quit,
}

/// Parse one line of learner input. Options and positions are 1-based on screen.
fn parse_input(line: &str) -> Option<Input> {
    let mut parts = line.split_whitespace();
    let cmd = parts.next()?;
    let number = |raw: Option<&str>| {
        raw.and_then(|v| v.parse::<usize>().ok())
            .and_then(|n| n.checked_sub(1))
    };
    let input = match cmd {
        "a" | "answer" => Input::Answer(number(parts.next())?),
        "n" | "next" => Input::Next,
        "p" | "prev" => Input::Previous,
        "g" | "go" => Input::GoTo(number(parts.next())?),
        "s" | "show" => Input::Show,
        "submit" => Input::Submit,
        "q" | "quit" => Input::Quit,
        _ => return None,
    };
    Some(input)
}

pub fn format_wait(wait: Duration) -> String {
    let secs = wait.num_seconds().max(0);
    let (h, m, s) = (secs / 3600, (secs % 3600) / 60, secs % 60);
    if h > 0 {
        format!("{h}h {m:02}m")
    } else {
        format!("{m}m {s:02}s")
    }
}

fn show(session: &CheckpointSession) {
    let Some(question) = session.current_question() else {
        return;
    };
    let position = session.current_position();
    let progress = session.progress();
    println!();
    println!(
        "Question {}/{}  ({} answered, {} left)",
        position + 1,
        progress.total,
        progress.answered,
        format_wait(Duration::seconds(i64::from(progress.remaining_secs)))
    );
    println!("{}", question.prompt());
    for (index, option) in question.options().iter().enumerate() {
        let marker = if session.answer(position) == Some(index) {
            '*'
        } else {
            ' '
        };
        println!("  {marker}{}. {option}", index + 1);
    }
    println!("commands: a <n> | n | p | g <n> | s | submit | q");
}

fn apply(session: &mut CheckpointSession, input: Input) {
    let position = session.current_position();
    let outcome = match input {
        Input::Answer(option) => match session.select_answer(position, option) {
            Ok(Selection::Recorded) => {
                let next = (position + 1).min(session.question_count().saturating_sub(1));
                session.go_to(next)
            }
            Ok(Selection::AlreadyLocked) => {
                println!("this answer is locked");
                Ok(())
            }
            Err(err) => Err(err),
        },
        Input::Next => {
            session.go_to((position + 1).min(session.question_count().saturating_sub(1)))
        }
        Input::Previous => session.go_to(position.saturating_sub(1)),
        Input::GoTo(target) => session.go_to(target),
        Input::Show | Input::Submit | Input::Quit => Ok(()),
    };
    if let Err(err) = outcome {
        println!("{err}");
    }
    show(session);
}

/// Forward stdin lines from a dedicated thread so a pending read never holds up shutdown.
fn spawn_stdin_reader() -> mpsc::UnboundedReceiver<String> {
    let (tx, rx) = mpsc::unbounded_channel();
    std::thread::spawn(move || {
        for line in std::io::stdin().lines() {
            let Ok(line) = line else { break };
            if tx.send(line).is_err() {
                break;
            }
        }
    });
    rx
}

pub async fn run(
    app: &AppServices,
    learner: LearnerId,
    checkpoint_id: &CheckpointId,
) -> Result<(), Box<dyn std::error::Error>> {
    let checkpoints = app.checkpoints();
    let session = match checkpoints.start(learner, checkpoint_id).await {
        Ok(session) => session,
        Err(CheckpointFlowError::NotEligible { retry_after, .. }) => {
            println!(
                "{checkpoint_id} is cooling down, try again in {}",
                format_wait(retry_after)
            );
            return Ok(());
        }
        Err(err) => return Err(err.into()),
    };
    let session = Arc::new(Mutex::new(session));
    show(&*session.lock().await);

    let mut countdown = Countdown::spawn(
        (*checkpoints).clone(),
        Arc::clone(&session),
        StdDuration::from_secs(1),
    );
    let mut lines = spawn_stdin_reader();
    let mut timer_running = true;

    let outcome: Option<SubmissionOutcome> = loop {
        tokio::select! {
            expired = countdown.expired(), if timer_running => {
                match expired {
                    Some(outcome) => {
                        println!("time is up");
                        break Some(outcome);
                    }
                    None => timer_running = false,
                }
            }
            line = lines.recv() => {
                let Some(line) = line else { break None };
                let Some(input) = parse_input(&line) else {
                    println!("unknown command: {}", line.trim());
                    continue;
                };
                let mut guard = session.lock().await;
                if guard.is_finished() {
                    // the countdown won the race; its outcome arrives on the next turn
                    continue;
                }
                match input {
                    Input::Quit => break None,
                    Input::Submit => match checkpoints.submit(&mut guard).await {
                        Ok(outcome) => break Some(outcome),
                        Err(err) => println!("{err}"),
                    },
                    other => apply(&mut guard, other),
                }
            }
        }
    };
    drop(countdown);

    let Some(outcome) = outcome else {
        println!("attempt abandoned, nothing was recorded");
        return Ok(());
    };

    let verdict = if outcome.result.passed() { "passed" } else { "failed" };
    println!("{verdict}: {}", outcome.result.score());

    let mut saved = outcome.saved;
    while !saved {
        println!("your result could not be saved. retry? [y/n]");
        let Some(answer) = lines.recv().await else {
            break;
        };
        if !answer.trim().eq_ignore_ascii_case("y") {
            break;
        }
        let mut guard = session.lock().await;
        match checkpoints.save_result(&mut guard).await {
            Ok(_) => saved = true,
            Err(err) => println!("{err}"),
        }
    }
    if saved {
        println!("result saved");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inputs_are_one_based() {
        assert_eq!(parse_input("a 2"), Some(Input::Answer(1)));
        assert_eq!(parse_input("g 12"), Some(Input::GoTo(11)));
        assert_eq!(parse_input("a 0"), None);
        assert_eq!(parse_input("a"), None);
        assert_eq!(parse_input("submit"), Some(Input::Submit));
        assert_eq!(parse_input("  n  "), Some(Input::Next));
        assert_eq!(parse_input("dance"), None);
    }

    #[test]
    fn waits_are_human_readable() {
        assert_eq!(format_wait(Duration::seconds(75)), "1m 15s");
        assert_eq!(format_wait(Duration::hours(23) + Duration::minutes(5)), "23h 05m");
        assert_eq!(format_wait(Duration::seconds(-3)), "0m 00s");
    }
}
