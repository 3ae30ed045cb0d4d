//! Core combat laws checked against scripted dice.
//!
//! Run with: `cargo test -p grail-core --test combat_properties`

use grail_core::dice::{self, Dice, GameRng, Reroll};
use grail_core::events::{CombatEvent, EncounterOutcome};
use grail_core::instance::{hits, reduced_damage};
use grail_core::params::{ParameterGraph, Stat};
use grail_core::testing::{assert_hp, TestHarness};
use grail_core::world::{Hand, Rank, Team, UnitId, Weapon};
use grail_core::CombatError;

fn training_sword() -> Weapon {
    Weapon {
        name: "Training Sword".to_string(),
        rank: Rank::C,
        tags: Vec::new(),
        range: 1,
        dice: [Dice::new(1, 8); 6],
        effects: Vec::new(),
    }
}

/// Attacker with ATK 5 and a 1d8 sword against EVA 10 and ARM 2.
fn duel() -> (TestHarness, UnitId, UnitId) {
    let mut harness = TestHarness::new();
    let attacker = harness.spawn_sample("Attacker", Team::Good);
    let defender = harness.spawn_sample("Defender", Team::Evil);
    harness
        .encounter
        .equip_weapon(attacker, training_sword(), Hand::Main)
        .unwrap();
    harness.encounter.sum_param(attacker, Stat::Melee, 5).unwrap();
    harness.encounter.sum_param(defender, Stat::Armour, 2).unwrap();
    harness.encounter.unit_mut(attacker).unwrap().actions = 3;
    (harness, attacker, defender)
}

// =============================================================================
// Parameters
// =============================================================================

#[test]
fn test_parameter_propagation() {
    let mut graph = ParameterGraph::standard();
    graph.sum(Stat::Agility, 3);
    graph.subtract(Stat::Agility, 1);
    graph.sum(Stat::Agility, 5);
    assert_eq!(graph.get(Stat::Agility), 7);
    assert_eq!(graph.get(Stat::Evasion), 17);

    graph.sum(Stat::Luck, 5);
    assert_eq!(graph.get(Stat::CritThreat), 2);
    graph.subtract(Stat::Luck, 1);
    assert_eq!(graph.get(Stat::CritThreat), 2);
    graph.subtract(Stat::Luck, 1);
    assert_eq!(graph.get(Stat::CritThreat), 1);

    graph.sum(Stat::Endurance, 4);
    graph.sum(Stat::Mana, 2);
    assert_eq!(graph.get(Stat::Resistance), 4);
    assert_eq!(graph.get(Stat::MpGeneration), 2);
}

#[test]
fn test_movement_recalculates() {
    let mut harness = TestHarness::new();
    let unit = harness.spawn_sample("Runner", Team::Good);
    assert_eq!(harness.encounter.movement(unit).unwrap(), 5);
    harness.encounter.sum_param(unit, Stat::Strength, 3).unwrap();
    assert_eq!(harness.encounter.movement(unit).unwrap(), 8);
    assert_eq!(
        harness.encounter.param_text(unit, Stat::Movement).unwrap(),
        "Movement: 8 (STR + 5)"
    );
}

// =============================================================================
// Dice
// =============================================================================

#[test]
fn test_reroll_combine() {
    assert_eq!(Reroll::No.combine(Reroll::Advantage), Reroll::Advantage);
    assert_eq!(Reroll::Advantage.combine(Reroll::Advantage), Reroll::Advantage);
    assert_eq!(Reroll::Advantage.combine(Reroll::Disadvantage), Reroll::No);
    assert_eq!(Reroll::Disadvantage.combine(Reroll::Advantage), Reroll::No);
}

#[test]
fn test_basic_roll_range() {
    let mut rng = GameRng::new(2024);
    for _ in 0..10_000 {
        let roll = dice::basic_roll(&mut rng, 0, Reroll::No);
        assert!((3..=18).contains(&roll), "3d6 rolled {roll}");
    }
}

// =============================================================================
// Attacks
// =============================================================================

#[test]
fn test_hit_law() {
    assert!(hits(11, 10));
    assert!(!hits(10, 10));
    assert!(!hits(9, 10));
}

#[test]
fn test_damage_floor() {
    assert_eq!(reduced_damage(2, 2), None);
    assert_eq!(reduced_damage(1, 2), None);
    assert_eq!(reduced_damage(8, 2), Some(6));
}

#[test]
fn test_tie_misses() {
    let (mut harness, attacker, defender) = duel();
    // 2 + 2 + 1 + 5 = 10 against Evasion 10.
    harness.dice.queue(&[2, 2, 1]);
    let outcomes = harness.encounter.attack(attacker, defender).unwrap();
    assert_eq!(outcomes[0].roll, 10);
    assert!(!outcomes[0].hit);
    assert_hp(&harness, defender, 25);
}

#[test]
fn test_attack_scenario() {
    let (mut harness, attacker, defender) = duel();

    // 11 hits, no crit, 8 on the d8 less 2 armour.
    harness.dice.queue(&[2, 2, 2, 1, 1, 1, 8]);
    let outcomes = harness.encounter.attack(attacker, defender).unwrap();
    assert_eq!(outcomes.len(), 1);
    assert_eq!(outcomes[0].roll, 11);
    assert!(outcomes[0].hit);
    assert_eq!(outcomes[0].damage, Some(6));
    assert_hp(&harness, defender, 19);

    // Same hit, but a 1 on the d8 is soaked entirely.
    harness.dice.queue(&[2, 2, 2, 1, 1, 1, 1]);
    let health_events = harness.count_events(|e| matches!(e, CombatEvent::HealthChanged { .. }));
    let outcomes = harness.encounter.attack(attacker, defender).unwrap();
    assert!(outcomes[0].hit);
    assert_eq!(outcomes[0].damage, None);
    assert_hp(&harness, defender, 19);
    assert_eq!(
        harness.count_events(|e| matches!(e, CombatEvent::HealthChanged { .. })),
        health_events
    );
}

// =============================================================================
// Mana
// =============================================================================

#[test]
fn test_mana_overflow_bleeds_health() {
    let mut harness = TestHarness::new();
    let caster = harness.spawn_sample("Caster", Team::Good);
    harness.encounter.restore_mana(caster, 3).unwrap();

    assert!(harness.encounter.spend_mana(caster, 10).unwrap());
    assert_eq!(harness.encounter.mp(caster).unwrap(), 0);
    assert_hp(&harness, caster, 18);
}

#[test]
fn test_mana_refusal_changes_nothing() {
    let mut harness = TestHarness::new();
    let caster = harness.spawn_sample("Caster", Team::Good);
    harness.encounter.unit_mut(caster).unwrap().hp = 5;
    harness.encounter.drain_events();

    assert!(!harness.encounter.spend_mana(caster, 5).unwrap());
    assert_hp(&harness, caster, 5);
    assert_eq!(harness.encounter.mp(caster).unwrap(), 0);
    assert_eq!(harness.encounter.events().count(), 0);
}

// =============================================================================
// Turns
// =============================================================================

#[test]
fn test_turn_exhaustion_ends_once() {
    let mut harness = TestHarness::new();
    let first = harness.spawn_sample("First", Team::Good);
    let second = harness.spawn_sample("Second", Team::Evil);
    harness.dice.queue(&[1, 1, 1, 6, 6, 6]);
    harness.encounter.start().unwrap();
    assert_eq!(harness.encounter.current_unit(), Some(first));

    let ended = |h: &TestHarness| {
        h.count_events(|e| matches!(e, CombatEvent::TurnEnded { unit } if *unit == first))
    };
    harness.encounter.reduce_action_count(first, 1).unwrap();
    harness.encounter.reduce_action_count(first, 1).unwrap();
    assert_eq!(harness.encounter.current_unit(), Some(first));
    assert_eq!(ended(&harness), 0);

    harness.encounter.reduce_action_count(first, 1).unwrap();
    assert_eq!(ended(&harness), 1);
    assert_eq!(harness.encounter.current_unit(), Some(second));
}

#[test]
fn test_team_wipeout_is_terminal() {
    let mut harness = TestHarness::new();
    let knight = harness.spawn_sample("Knight", Team::Good);
    let squire = harness.spawn_sample("Squire", Team::Good);
    let brute = harness.spawn_sample("Brute", Team::Evil);
    harness.dice.queue(&[1, 1, 1, 2, 2, 2, 6, 6, 6]);
    harness.encounter.start().unwrap();
    assert_eq!(harness.encounter.current_unit(), Some(knight));

    harness.encounter.kill_unit(brute).unwrap();
    assert_eq!(harness.encounter.outcome(), Some(EncounterOutcome::Victory));
    assert_eq!(harness.encounter.current_unit(), None);
    let round = harness.encounter.round();

    // Nothing moves once the fight is decided.
    harness.encounter.end_turn(knight).unwrap();
    harness.encounter.kill_unit(brute).unwrap();
    harness.encounter.reduce_action_count(squire, 5).unwrap();
    assert_eq!(harness.encounter.round(), round);
    assert_eq!(harness.encounter.current_unit(), None);
    assert!(matches!(
        harness.encounter.attack(knight, squire),
        Err(CombatError::EncounterOver)
    ));
    assert_eq!(
        harness.count_events(|e| matches!(
            e,
            CombatEvent::EncounterEnded {
                outcome: EncounterOutcome::Victory
            }
        )),
        1
    );
}
