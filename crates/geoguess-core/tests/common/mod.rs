#![allow(dead_code)]

use geoguess_core::{
    Answer, Category, EngineParams, GameSession, Item, ItemRecord, Question, QuestionRecord, Step,
};

pub fn items() -> Vec<ItemRecord> {
    serde_json::from_str(include_str!("../fixtures/eight_countries.json")).expect("fixture items")
}

pub fn questions() -> Vec<QuestionRecord> {
    serde_json::from_str(include_str!("../fixtures/eight_countries.questions.json"))
        .expect("fixture questions")
}

pub fn session() -> GameSession {
    GameSession::start(Category::Country, items(), questions(), EngineParams::default())
        .expect("fixture session starts")
}

pub fn record(name: &str) -> ItemRecord {
    items()
        .into_iter()
        .find(|record| record.name == name)
        .unwrap_or_else(|| panic!("{name} is in the fixture"))
}

/// Truthful yes/no answer for `target`.
pub fn truthful(target: &Item, question: &Question) -> Answer {
    if target.matches(question) {
        Answer::Yes
    } else {
        Answer::No
    }
}

/// Plays a full game answering truthfully for `name`; returns the guess name
/// and the confidence after each answer.
pub fn play_truthfully(name: &str) -> (String, Vec<f64>) {
    let target = Item::from_record(record(name), 1.0);
    let mut session = session();
    let mut confidences = Vec::new();
    loop {
        match session.next_step() {
            Step::Ask(question) => {
                let outcome = session
                    .submit_answer(truthful(&target, &question))
                    .expect("pending question accepts an answer");
                confidences.push(outcome.confidence);
            }
            Step::Guess(prediction) => {
                let guess = prediction.prediction.expect("a leader exists").name;
                return (guess, confidences);
            }
        }
    }
}
