mod common;

use geoguess_core::{Answer, GameSession, Item, SessionSnapshot, Step};

fn advance(session: &mut GameSession, target: &Item, answers: usize) {
    for _ in 0..answers {
        let Step::Ask(question) = session.next_step() else {
            panic!("game ended early");
        };
        session
            .submit_answer(common::truthful(target, &question))
            .expect("answer accepted");
    }
}

#[test]
fn restored_session_makes_identical_choices() {
    let target = Item::from_record(common::record("Iceland"), 1.0);
    let mut original = common::session();
    advance(&mut original, &target, 3);
    assert!(original.items().iter().any(Item::is_eliminated));

    let json = SessionSnapshot::to_json(&original).expect("snapshot serializes");
    let mut restored = SessionSnapshot::from_json(&json)
        .expect("snapshot parses")
        .restore()
        .expect("snapshot restores");

    assert_eq!(restored.confidence(), original.confidence());
    assert_eq!(
        restored.peek_next_question().map(|q| q.text.clone()),
        original.peek_next_question().map(|q| q.text.clone())
    );

    loop {
        let left = original.next_step();
        let right = restored.next_step();
        assert_eq!(left, right);
        match left {
            Step::Ask(question) => {
                let answer = common::truthful(&target, &question);
                let a = original.submit_answer(answer).expect("original accepts");
                let b = restored.submit_answer(answer).expect("restored accepts");
                assert_eq!(a, b);
            }
            Step::Guess(prediction) => {
                assert_eq!(prediction.prediction.map(|p| p.name).as_deref(), Some("Iceland"));
                break;
            }
        }
    }
}

#[test]
fn selection_is_repeatable_across_fresh_sessions() {
    let mut first = common::session();
    let mut second = common::session();
    for answer in [Answer::No, Answer::Yes, Answer::DontKnow, Answer::No] {
        assert_eq!(first.peek_next_question(), first.peek_next_question());
        let (Step::Ask(a), Step::Ask(b)) = (first.next_step(), second.next_step()) else {
            panic!("both sessions should still be asking");
        };
        assert_eq!(a, b);
        first.submit_answer(answer).expect("answer accepted");
        second.submit_answer(answer).expect("answer accepted");
    }
    assert_eq!(first.confidence(), second.confidence());
}

#[test]
fn early_prediction_lists_runners_up() {
    let target = Item::from_record(common::record("Nepal"), 1.0);
    let mut session = common::session();
    advance(&mut session, &target, 1);
    let prediction = session.final_prediction().expect("prediction after a question");
    assert!(prediction.prediction.is_some());
    assert_eq!(prediction.alternatives.len(), 3);
    let leader = prediction.prediction.as_ref().map(|p| p.probability).unwrap_or(0.0);
    assert!(prediction.alternatives.iter().all(|alt| alt.probability <= leader));
    assert_eq!(prediction.questions_asked, 1);
    assert_eq!(prediction.total_items, 8);
}
