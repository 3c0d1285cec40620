use itertools::Itertools;
use serde::Serialize;
use std::io::Write;

use crate::error::BackendError;
use crate::stats::PlayerStats;

#[derive(Debug, Serialize)]
struct ReviewRow<'a> {
    topic: &'a str,
    question: &'a str,
    player_answer: &'a str,
    correct_answer: &'a str,
}

/// Write every missed question as CSV, topics in name order and questions
/// oldest first. Returns the number of rows written.
pub fn write_review_csv<W: Write>(stats: &PlayerStats, writer: W) -> Result<usize, BackendError> {
    let mut csv = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(writer);
    csv.write_record(["topic", "question", "player_answer", "correct_answer"])
        .map_err(csv_error)?;

    let mut rows = 0;
    for topic in stats
        .topics
        .iter()
        .sorted_by(|a, b| a.topic_name.cmp(&b.topic_name))
    {
        for missed in &topic.missed_questions {
            csv.serialize(ReviewRow {
                topic: &topic.topic_name,
                question: &missed.question,
                player_answer: &missed.player_answer,
                correct_answer: &missed.correct_answer,
            })
            .map_err(csv_error)?;
            rows += 1;
        }
    }

    csv.flush()?;
    Ok(rows)
}

fn csv_error(e: csv::Error) -> BackendError {
    match e.into_kind() {
        csv::ErrorKind::Io(io) => BackendError::Io(io),
        other => BackendError::Rejected(format!("{other:?}")),
    }
}
