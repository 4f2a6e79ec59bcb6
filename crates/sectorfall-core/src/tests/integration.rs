//! End-to-end tests driving a session through the recording platform.

use super::helpers::*;
use crate::config::GameConfig;
use crate::error::{SessionError, Transition};
use crate::player::{ParticipantId, PlayerAction};
use crate::session::{GamePhase, SessionState};

fn pid(id: u64) -> ParticipantId {
    ParticipantId::new(id)
}

// =============================================================================
// Phase flow
// =============================================================================

mod phase_tests {
    use super::*;

    #[test]
    fn first_tick_opens_welcome_movement_prompt() {
        let (session, platform) = started_session(2, seeded_config(1));

        assert_eq!(session.state(), SessionState::InProgress);
        assert_eq!(session.phase(), GamePhase::Movement);
        assert!(session.is_first_movement_phase());

        let log = platform.log();
        assert_eq!(
            log.last_channel(),
            Some("Welcome to the games! @survivors, please select a sector to move to.")
        );
        let (handle, options) = log.channel_prompt().unwrap();
        assert_eq!(Some(handle), session.movement_prompt());
        assert_eq!(options, 6);
    }

    #[test]
    fn lone_player_waits_in_movement() {
        let (mut session, platform) = started_session(1, seeded_config(1));
        let before = session.snapshot();
        let posts = platform.log().channel.len();

        for _ in 0..5 {
            session.tick();
        }

        assert_eq!(session.snapshot(), before);
        assert_eq!(platform.log().channel.len(), posts);
    }

    #[test]
    fn empty_game_still_opens_movement() {
        let (mut session, platform) = session_with(seeded_config(1));
        session.resume_game().unwrap();
        assert_eq!(session.phase(), GamePhase::Movement);
        assert!(platform.log().channel_prompt().is_some());
    }

    #[test]
    fn phases_alternate_with_two_players() {
        let (mut session, platform) = started_session(2, seeded_config(2));

        session.tick();
        assert_eq!(session.phase(), GamePhase::Interaction);
        assert!(!session.is_first_movement_phase());
        assert!(session.movement_prompt().is_none());

        session.tick();
        assert_eq!(session.phase(), GamePhase::Movement);
        assert_eq!(
            platform.log().last_channel(),
            Some("@survivors, please select a sector to move to.")
        );
    }

    #[test]
    fn every_living_player_gets_an_action_prompt() {
        let (mut session, platform) = started_session(4, seeded_config(3));
        session.tick();

        let log = platform.log();
        for id in 1..=4 {
            let (_, options) = log.action_prompt_for(pid(id)).unwrap();
            let expected = if session.player(pid(id)).unwrap().found_player.is_some() {
                3
            } else {
                2
            };
            assert_eq!(options, expected);
        }
    }

    #[test]
    fn idle_role_members_pruned_on_first_movement() {
        let platform_seed = 4;
        let (mut session, platform) = session_with(seeded_config(platform_seed));
        platform.add_member(9);
        session.join(participant(1)).unwrap();
        session.join(participant(2)).unwrap();
        session.resume_game().unwrap();

        assert!(platform.log().role.contains(&pid(9)));
        session.tick();

        let log = platform.log();
        assert_eq!(log.revoked, [pid(9)]);
        assert!(log.role.contains(&pid(1)));
        assert!(log.role.contains(&pid(2)));
    }
}

// =============================================================================
// Lifecycle
// =============================================================================

mod lifecycle_tests {
    use super::*;

    #[test]
    fn pause_before_start_is_rejected() {
        let (mut session, _platform) = session_with(seeded_config(1));
        let err = session.pause_game().unwrap_err();
        assert_eq!(
            err,
            SessionError::InvalidTransition {
                action: Transition::Pause,
                state: SessionState::NotStarted,
            }
        );
        assert_eq!(err.to_string(), "cannot pause a game that is not started");
        assert_eq!(session.state(), SessionState::NotStarted);
    }

    #[test]
    fn resume_and_pause_only_from_valid_states() {
        let (mut session, _platform) = started_session(2, seeded_config(1));

        assert!(session.resume_game().is_err());
        session.pause_game().unwrap();
        assert_eq!(session.state(), SessionState::Paused);
        assert!(session.pause_game().is_err());
        assert_eq!(session.state(), SessionState::Paused);
    }

    #[test]
    fn paused_ticks_do_nothing() {
        let (mut session, platform) = started_session(2, seeded_config(1));
        session.pause_game().unwrap();
        let before = session.snapshot();
        let posts = platform.log().channel.len();

        session.tick();
        session.tick();

        assert_eq!(session.snapshot(), before);
        assert_eq!(platform.log().channel.len(), posts);
    }

    #[test]
    fn resume_ticks_immediately() {
        let (mut session, _platform) = started_session(2, seeded_config(1));
        session.pause_game().unwrap();
        session.resume_game().unwrap();
        assert_eq!(session.state(), SessionState::InProgress);
        assert_eq!(session.phase(), GamePhase::Interaction);
    }
}

// =============================================================================
// Joining
// =============================================================================

mod join_tests {
    use super::*;

    #[test]
    fn join_greets_and_grants_role() {
        let (mut session, platform) = session_with(seeded_config(1));
        session.join(participant(1)).unwrap();

        let log = platform.log();
        assert_eq!(log.dms_to(pid(1)), ["Welcome to the games!"]);
        assert!(log.role.contains(&pid(1)));
        assert_eq!(session.player(pid(1)).unwrap().health, 15);
    }

    #[test]
    fn duplicate_join_rejected() {
        let (mut session, _platform) = session_with(seeded_config(1));
        session.join(participant(1)).unwrap();
        assert_eq!(
            session.join(participant(1)),
            Err(SessionError::AlreadyJoined(pid(1)))
        );
        assert_eq!(session.player_count(), 1);
    }

    #[test]
    fn picking_a_sector_admits_newcomers_during_first_movement() {
        let (mut session, platform) = started_session(2, seeded_config(1));
        let prompt = session.movement_prompt().unwrap();

        session.handle_choice(prompt, participant(3), 4).unwrap();

        let newcomer = session.player(pid(3)).unwrap();
        assert_eq!(newcomer.next_sector, 5);
        assert_eq!(newcomer.current_sector, 1);
        assert!(platform.log().role.contains(&pid(3)));
    }

    #[test]
    fn joins_close_after_first_movement() {
        let (mut session, _platform) = started_session(2, seeded_config(1));
        session.tick();
        assert_eq!(session.join(participant(3)), Err(SessionError::JoinsClosed));

        session.tick();
        let prompt = session.movement_prompt().unwrap();
        assert_eq!(
            session.handle_choice(prompt, participant(3), 0),
            Err(SessionError::JoinsClosed)
        );
        assert_eq!(session.player_count(), 2);
    }

    #[test]
    fn late_join_can_be_disabled() {
        let config = GameConfig {
            allow_late_join: false,
            ..seeded_config(1)
        };
        let (mut session, _platform) = started_session(2, config);
        assert_eq!(session.join(participant(3)), Err(SessionError::JoinsClosed));
    }

    #[test]
    fn unreachable_joiner_is_removed_and_announced() {
        let (mut session, platform) = session_with(seeded_config(1));
        platform.block_direct(2);

        let err = session.join(participant(2)).unwrap_err();
        assert!(matches!(err, SessionError::Delivery(_)));
        assert_eq!(session.player_count(), 0);

        let log = platform.log();
        assert!(log
            .last_channel()
            .unwrap()
            .starts_with("Birch, I can't send you direct messages"));
        assert_eq!(log.revoked, [pid(2)]);
    }

    #[test]
    fn player_unreachable_mid_game_is_dropped() {
        let (mut session, platform) = started_session(3, seeded_config(1));
        platform.block_direct(3);

        session.tick();

        assert!(session.player(pid(3)).is_none());
        assert_eq!(session.player_count(), 2);
        assert!(platform.log().revoked.contains(&pid(3)));
    }

    #[test]
    fn sighting_of_dropped_player_is_withdrawn() {
        let (mut session, platform) = started_session(2, certain_config(1));
        platform.block_direct(2);

        session.tick();

        assert!(session.player(pid(2)).is_none());
        assert!(session.player(pid(1)).unwrap().found_player.is_none());

        let log = platform.log();
        let dms = log.dms_to(pid(1));
        assert_eq!(dms.len(), 3);
        assert!(dms[1].contains("You see Birch in the distance."));
        assert!(dms[2].contains("You don't think anyone's around."));
        assert!(!dms[2].contains("fight"));

        let first = log.direct.iter().filter(|(to, _, _)| *to == pid(1)).nth(1).unwrap().1;
        assert!(log.deleted.contains(&first));
        assert!(!log.active_prompts.contains_key(&first));
        let (_, options) = log.action_prompt_for(pid(1)).unwrap();
        assert_eq!(options, 2);
    }
}

// =============================================================================
// Movement and encounters
// =============================================================================

mod encounter_tests {
    use super::*;

    #[test]
    fn moves_apply_before_pairing() {
        let (mut session, platform) = started_session(2, seeded_config(5));
        move_all(&mut session, &[1], 3);

        session.tick();

        assert_eq!(session.player(pid(1)).unwrap().current_sector, 3);
        assert_eq!(session.player(pid(2)).unwrap().current_sector, 1);
        // Different sectors, so nobody can have been paired.
        assert!(session.players().all(|p| p.found_player.is_none()));

        let log = platform.log();
        assert!(log.dms_to(pid(1))[1].starts_with("You've arrived in sector 3."));
        assert!(log.dms_to(pid(2))[1].starts_with("You're still in sector 1."));
    }

    #[test]
    fn out_of_range_sector_is_ignored() {
        let (mut session, _platform) = started_session(2, seeded_config(1));
        let prompt = session.movement_prompt().unwrap();

        session.handle_choice(prompt, participant(1), 6).unwrap();
        session.handle_choice(prompt, participant(7), 99).unwrap();

        assert_eq!(session.player(pid(1)).unwrap().next_sector, 1);
        assert!(session.player(pid(7)).is_none());
    }

    #[test]
    fn three_in_one_sector_with_certain_notice() {
        let (mut session, platform) = started_session(3, certain_config(6));
        session.tick();

        let paired: Vec<_> = session
            .players()
            .filter(|p| p.found_player.is_some())
            .collect();
        assert_eq!(paired.len(), 2);
        assert_eq!(paired[0].found_player, Some(paired[1].id()));
        assert_eq!(paired[1].found_player, Some(paired[0].id()));

        let log = platform.log();
        for player in &paired {
            let (_, options) = log.action_prompt_for(player.id()).unwrap();
            assert_eq!(options, 3);
        }
        let loner = session
            .players()
            .find(|p| p.found_player.is_none())
            .unwrap();
        let (_, options) = log.action_prompt_for(loner.id()).unwrap();
        assert_eq!(options, 2);
        assert!(log
            .dms_to(loner.id())
            .last()
            .unwrap()
            .contains("You don't think anyone's around."));

        let seen = session.player(paired[1].id()).unwrap();
        let text = log.dms_to(paired[0].id()).last().unwrap().to_string();
        assert!(text.contains(&format!("You see {} in the distance.", seen.name())));
        assert!(!text.contains("doesn't look like they see you"));
    }

    #[test]
    fn one_sided_sighting_is_described() {
        let config = GameConfig {
            notice_chance: 0.5,
            mutual_notice_chance: 0.0,
            ..GameConfig::default()
        };
        let found = (0..200).any(|seed| {
            let (mut session, platform) = started_session(
                2,
                GameConfig {
                    seed: Some(seed),
                    ..config.clone()
                },
            );
            session.tick();
            let one_sided = session.players().find(|p| {
                p.found_player
                    .and_then(|id| session.player(id))
                    .is_some_and(|other| other.found_player.is_none())
            });
            one_sided.is_some_and(|p| {
                platform
                    .log()
                    .dms_to(p.id())
                    .last()
                    .is_some_and(|t| t.contains("It doesn't look like they see you."))
            })
        });
        assert!(found);
    }
}

// =============================================================================
// Actions, combat and game over
// =============================================================================

mod interaction_tests {
    use super::*;

    #[test]
    fn attack_needs_a_sighting() {
        let config = GameConfig {
            notice_chance: 0.0,
            ..seeded_config(1)
        };
        let (mut session, platform) = started_session(2, config);
        session.tick();

        act_all(&mut session, &platform, &[1], 2);
        assert_eq!(
            session.player(pid(1)).unwrap().next_action,
            PlayerAction::Run
        );

        act_all(&mut session, &platform, &[1], 1);
        assert_eq!(
            session.player(pid(1)).unwrap().next_action,
            PlayerAction::Search
        );
    }

    #[test]
    fn choices_on_someone_elses_prompt_are_ignored() {
        let (mut session, platform) = started_session(2, certain_config(1));
        session.tick();

        let (handle, _) = platform.log().action_prompt_for(pid(2)).unwrap();
        session.handle_choice(handle, participant(1), 2).unwrap();
        session.handle_choice(handle, participant(2), 7).unwrap();

        assert!(session
            .players()
            .all(|p| p.next_action == PlayerAction::Run));
    }

    #[test]
    fn searching_with_certain_find_heals_and_announces() {
        let config = GameConfig {
            notice_chance: 0.0,
            ..certain_config(2)
        };
        let (mut session, platform) = started_session(2, config);
        session.tick();
        act_all(&mut session, &platform, &[1, 2], 1);
        session.tick();

        assert!(session.players().all(|p| p.health == 22));
        assert!(session.players().all(|p| p.found_medkit()));

        let log = platform.log();
        assert!(log
            .channel_texts()
            .contains(&"Ash found a medkit!\nBirch found a medkit!"));
        assert_eq!(
            log.dms_to(pid(1)).last(),
            Some(&"You are in sector 1.\nYour health is 22.")
        );
    }

    #[test]
    fn action_prompts_are_retracted_on_resolution() {
        let (mut session, platform) = started_session(2, seeded_config(3));
        session.tick();
        let (handle, _) = platform.log().action_prompt_for(pid(1)).unwrap();

        session.tick();

        let log = platform.log();
        assert!(!log.active_prompts.contains_key(&handle));
        assert!(log.deleted.contains(&handle));
    }

    #[test]
    fn status_messages_are_replaced_next_interaction() {
        let (mut session, platform) = started_session(2, seeded_config(3));
        session.tick();
        session.tick();
        let status = platform.log().direct.last().map(|(_, h, _)| *h).unwrap();

        session.tick();

        assert!(platform.log().deleted.contains(&status));
    }

    #[test]
    fn fight_to_the_end() {
        let (mut session, platform) = started_session(2, certain_config(7));

        for _ in 0..50 {
            session.tick();
            act_all(&mut session, &platform, &[1, 2], 2);
            session.tick();
            if session.state() == SessionState::Complete {
                break;
            }
        }

        assert_eq!(session.state(), SessionState::Complete);
        assert!(session.living_count() <= 1);

        let log = platform.log();
        let summary = log.last_channel().unwrap();
        assert!(summary.starts_with("Game over!\n"));
        assert!(log.channel_prompt().is_none());
        assert!(log
            .channel_texts()
            .iter()
            .any(|t| t.starts_with("Ash and Birch fought!")));
        for dead in session.players().filter(|p| !p.is_alive()) {
            assert_eq!(log.dms_to(dead.id()).last(), Some(&"You died."));
        }
    }

    #[test]
    fn complete_game_ignores_everything() {
        let (mut session, platform) = started_session(2, seeded_config(8));
        session.tick();
        session.player_mut(pid(2)).unwrap().health = 0;
        session.tick();
        assert_eq!(session.state(), SessionState::Complete);
        assert_eq!(
            platform.log().last_channel(),
            Some("Game over!\nAsh came out on top!")
        );

        let before = session.snapshot();
        session.tick();
        assert!(session.resume_game().is_err());
        assert!(session.pause_game().is_err());
        assert_eq!(session.join(participant(5)), Err(SessionError::JoinsClosed));
        assert_eq!(session.snapshot(), before);
    }

    #[test]
    fn nobody_left_standing() {
        let (mut session, platform) = started_session(2, seeded_config(9));
        session.tick();
        session.player_mut(pid(1)).unwrap().health = 0;
        session.player_mut(pid(2)).unwrap().health = -3;
        session.tick();

        assert_eq!(session.state(), SessionState::Complete);
        assert_eq!(
            platform.log().last_channel(),
            Some("Game over!\nThere were no survivors.")
        );
    }
}
