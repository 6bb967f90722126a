//! Global quiz bank and leaderboard.
//!
//! Both come from static datasets loaded once at startup. A missing or broken
//! file leaves the bank or the baseline board empty.

use std::collections::HashMap;
use std::path::Path;

use serde::Serialize;
use tracing::{info, warn};

use crate::domain::{GlobalQuizItem, Language, LeaderboardPlayer, User, UserProfile};
use crate::seeds::{load_leaderboard, load_quiz_bank};

pub const POINTS_PER_CORRECT: u32 = 100;

/// A question as shown to players, without its answer.
#[derive(Clone, Debug, Serialize)]
pub struct QuizQuestion {
  pub index: usize,
  pub question: String,
  pub options: Vec<String>,
}

#[derive(Clone, Debug, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AnswerReview {
  pub index: usize,
  pub selected: Option<usize>,
  pub correct_answer_index: usize,
  pub correct: bool,
  pub explanation: String,
}

#[derive(Clone, Debug, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct QuizResult {
  pub score: u32,
  pub correct_count: usize,
  pub total: usize,
  pub review: Vec<AnswerReview>,
}

#[derive(Default)]
pub struct QuizService {
  banks: HashMap<Language, Vec<GlobalQuizItem>>,
  leaderboard: Vec<LeaderboardPlayer>,
}

impl QuizService {
  pub fn new(banks: HashMap<Language, Vec<GlobalQuizItem>>, leaderboard: Vec<LeaderboardPlayer>) -> Self {
    Self { banks, leaderboard }
  }

  pub async fn load(dir: &Path) -> Self {
    let mut banks = HashMap::new();
    for lang in Language::ALL {
      let bank = load_quiz_bank(dir, lang).await.unwrap_or_else(|e| {
        warn!(target: "chronicle_backend", %lang, error = %e, "Quiz bank unavailable");
        Vec::new()
      });
      info!(target: "chronicle_backend", %lang, questions = bank.len(), "Quiz bank loaded");
      banks.insert(lang, bank);
    }
    let leaderboard = load_leaderboard(dir).await.unwrap_or_else(|e| {
      warn!(target: "chronicle_backend", error = %e, "Leaderboard unavailable");
      Vec::new()
    });
    Self::new(banks, leaderboard)
  }

  fn bank(&self, lang: Language) -> &[GlobalQuizItem] {
    self.banks.get(&lang).map(Vec::as_slice).unwrap_or(&[])
  }

  pub fn questions(&self, lang: Language) -> Vec<QuizQuestion> {
    self
      .bank(lang)
      .iter()
      .enumerate()
      .map(|(index, q)| QuizQuestion { index, question: q.question.clone(), options: q.options.clone() })
      .collect()
  }

  /// `answers[i]` is the option picked for question `i`; missing or `None` counts as wrong.
  pub fn score(&self, lang: Language, answers: &[Option<usize>]) -> QuizResult {
    let review: Vec<AnswerReview> = self
      .bank(lang)
      .iter()
      .enumerate()
      .map(|(index, q)| {
        let selected = answers.get(index).copied().flatten();
        AnswerReview {
          index,
          selected,
          correct_answer_index: q.correct_answer_index,
          correct: selected == Some(q.correct_answer_index),
          explanation: q.explanation.clone(),
        }
      })
      .collect();
    let correct_count = review.iter().filter(|r| r.correct).count();
    QuizResult {
      score: correct_count as u32 * POINTS_PER_CORRECT,
      correct_count,
      total: review.len(),
      review,
    }
  }

  /// Baseline board plus the caller (if they have scored), sorted by score and ranked from 1.
  pub fn leaderboard(&self, me: Option<(&User, &UserProfile)>) -> Vec<LeaderboardPlayer> {
    let mut players = self.leaderboard.clone();
    if let Some((user, profile)) = me {
      let high = profile.global_quiz_stats.high_score;
      if high > 0 {
        players.push(LeaderboardPlayer {
          rank: 0,
          name: format!("{} (You)", user.name),
          score: high,
          avatar: user.avatar_url.clone(),
        });
      }
    }
    players.sort_by(|a, b| b.score.cmp(&a.score));
    for (i, p) in players.iter_mut().enumerate() {
      p.rank = i as u32 + 1;
    }
    players
  }
}
