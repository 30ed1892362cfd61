use rand::rng;
use rand::seq::SliceRandom;

use aptitude_core::model::{QuestionBank, QuestionRecord};

/// Draw up to `count` distinct questions from the bank.
///
/// Unbiased shuffle-then-truncate: every question is equally likely to be
/// drawn and the drawn order is itself uniformly random. Asking for more
/// questions than the bank holds yields the whole bank, shuffled.
#[must_use]
pub fn draw_questions(bank: &QuestionBank, count: usize) -> Vec<QuestionRecord> {
    let mut rng = rng();
    draw_questions_with(bank, count, &mut rng)
}

pub(crate) fn draw_questions_with<R: rand::Rng + ?Sized>(
    bank: &QuestionBank,
    count: usize,
    rng: &mut R,
) -> Vec<QuestionRecord> {
    let mut pool: Vec<QuestionRecord> = bank.records().to_vec();
    pool.as_mut_slice().shuffle(rng);
    pool.truncate(count);
    pool
}
