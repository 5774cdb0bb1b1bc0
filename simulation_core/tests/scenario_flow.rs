//! End-to-end sessions through the public engine API.

use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

use scenario_rules::{
    ChoiceId, DecisionId, EventId, OutcomeRating, PhaseId, ScenarioCatalog, StakeholderId,
};
use simulation_core::{
    FileStorage, NavigationError, ScriptedRandom, SimEvent, Simulation, Topic,
};

const WORKSHOP: &str = include_str!("fixtures/workshop.json");

fn catalog() -> ScenarioCatalog {
    ScenarioCatalog::from_json_str(WORKSHOP).unwrap()
}

fn event(raw: &str) -> EventId {
    EventId::from(raw)
}

fn choice(raw: &str) -> ChoiceId {
    ChoiceId::from(raw)
}

#[test]
fn test_full_session() {
    // One roll, spent on the planning curveball.
    let sim = Simulation::builder()
        .catalog(catalog())
        .random(ScriptedRandom::new([0.0], [0]))
        .build()
        .unwrap();

    // Briefing
    assert_eq!(sim.start().unwrap(), PhaseId::from("briefing"));
    sim.advance_time(Duration::from_millis(1000));
    assert_eq!(sim.queue().active_event(), Some(event("welcome-briefing")));
    sim.choose_event_option(&event("welcome-briefing"), &choice("acknowledge"))
        .unwrap();

    // Planning: the protest curveball is scheduled on entry.
    sim.navigate_to_next_phase().unwrap();
    assert_eq!(sim.queue().queued_events(), vec![event("protest")]);
    assert_eq!(
        sim.navigate_to_next_phase(),
        Err(NavigationError::CriteriaNotMet {
            phase: PhaseId::from("planning")
        })
    );

    let result = sim
        .process_decision(&DecisionId::from("projectScope"), &choice("full-network"))
        .unwrap();
    assert!(result.phase_complete);
    assert_eq!(sim.queue().active_event(), Some(event("contractor-delay")));

    // The curveball fires while the contractor event is open and waits its turn.
    sim.advance_time(Duration::from_secs(5));
    assert_eq!(sim.queue().active_event(), Some(event("contractor-delay")));

    sim.choose_event_option(&event("contractor-delay"), &choice("pay-overtime"))
        .unwrap();
    assert_eq!(sim.queue().active_event(), Some(event("protest")));

    sim.choose_event_option(&event("protest"), &choice("negotiate"))
        .unwrap();
    assert_eq!(sim.queue().active_event(), Some(event("media-coverage")));
    sim.choose_event_option(&event("media-coverage"), &choice("embrace"))
        .unwrap();

    let resources = sim.store().resources();
    assert_eq!(resources.budget(), 550_000.0);
    assert_eq!(resources.political_capital(), 85.0);

    // Funding
    sim.navigate_to_next_phase().unwrap();
    sim.process_decision(
        &DecisionId::from("fundingSource"),
        &choice("international-loan"),
    )
    .unwrap();
    assert_eq!(sim.store().resources().budget(), 825_000.0);
    assert_eq!(sim.store().hidden_debt().total, 500_000.0);

    sim.advance_time(Duration::from_secs(1));
    assert_eq!(sim.queue().active_event(), Some(event("donor-visit")));
    assert!(sim.queue().queue_event(&event("ministry-praise"), Duration::ZERO));

    assert!(sim.dismiss_event(&event("donor-visit")));
    assert_eq!(sim.queue().active_event(), Some(event("ministry-praise")));
    sim.choose_event_option(&event("ministry-praise"), &choice("accept"))
        .unwrap();

    // Outcomes
    sim.navigate_to_next_phase().unwrap();
    assert!(sim.phases().is_final_phase());

    let summary = sim.calculate_outcomes();
    assert_eq!(summary.project_success, 77);
    assert_eq!(summary.sustainability, 63);
    assert_eq!(summary.rating, OutcomeRating::Good);
    assert_eq!(summary.decisions_made, 2);
    assert_eq!(summary.hidden_debt_total, 500_000.0);

    let exited: Vec<_> = sim
        .phases()
        .phase_history()
        .into_iter()
        .map(|record| record.phase)
        .collect();
    assert_eq!(
        exited,
        vec![
            PhaseId::from("briefing"),
            PhaseId::from("planning"),
            PhaseId::from("funding")
        ]
    );
    assert_eq!(sim.store().seen_events().len(), 6);
    assert_eq!(
        sim.store().relationships()[&StakeholderId::from("ministry")].relationship_type,
        scenario_rules::RelationshipType::Allied
    );
}

#[test]
fn test_published_topics() {
    let sim = Simulation::builder()
        .catalog(catalog())
        .random(ScriptedRandom::never())
        .build()
        .unwrap();

    let topics = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&topics);
    let _subscription = sim.bus().subscribe_all(move |event| {
        if event.topic() != Topic::StateChanged {
            sink.borrow_mut().push(event.topic());
        }
    });

    sim.start().unwrap();
    sim.advance_time(Duration::from_secs(1));
    sim.bus().publish(SimEvent::EventChoiceRequested {
        event_id: event("welcome-briefing"),
        choice_id: choice("acknowledge"),
    });

    assert_eq!(
        *topics.borrow(),
        vec![
            Topic::PhaseChanged,
            Topic::ShowEvent,
            Topic::EventChoiceRequested,
            Topic::EventChoiceProcessed
        ]
    );
}

#[test]
fn test_snapshot_reset_restore() {
    let sim = Simulation::builder()
        .catalog(catalog())
        .random(ScriptedRandom::never())
        .build()
        .unwrap();
    sim.start().unwrap();
    sim.navigate_to_next_phase().unwrap();
    sim.process_decision(&DecisionId::from("projectScope"), &choice("pilot"))
        .unwrap();

    let snapshot = sim.snapshot();
    sim.reset(false);
    assert_eq!(sim.store().current_phase(), None);
    assert!(sim.store().decisions().is_empty());

    sim.restore(snapshot.clone(), false);
    assert_eq!(sim.snapshot(), snapshot);
    assert_eq!(sim.store().current_phase(), Some(PhaseId::from("planning")));
}

#[test]
fn test_session_survives_restart_on_disk() {
    let dir = tempfile::tempdir().unwrap();

    {
        let sim = Simulation::builder()
            .catalog(catalog())
            .storage(FileStorage::new(dir.path()))
            .random(ScriptedRandom::never())
            .build()
            .unwrap();
        sim.start().unwrap();
        sim.navigate_to_next_phase().unwrap();
        sim.process_decision(&DecisionId::from("projectScope"), &choice("pilot"))
            .unwrap();
    }

    let sim = Simulation::builder()
        .catalog(catalog())
        .storage(FileStorage::new(dir.path()))
        .random(ScriptedRandom::never())
        .build()
        .unwrap();
    assert_eq!(sim.start().unwrap(), PhaseId::from("planning"));
    assert_eq!(sim.store().resources().budget(), 850_000.0);
}
