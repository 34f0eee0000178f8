mod common;
use common::{harness, ScriptedProvisioner, SECRET};

use ovpn_bot::constants::{replies, triggers};
use ovpn_bot::errors::{BotError, BotErrorKind};
use ovpn_bot::managers::dispatcher::Route;
use ovpn_bot::managers::sessions::{InputOutcome, StartOutcome};
use ovpn_bot::models::{Completion, SessionState, UserId};
use std::time::Duration;

async fn finish(outcome: InputOutcome) -> Completion {
    match outcome {
        InputOutcome::Provisioning(handle) => handle.await.expect("provisioning task"),
        other => panic!("expected provisioning, got {:?}", other),
    }
}

#[tokio::test]
async fn wrong_secret_removes_session_and_stays_unauthenticated() {
    let h = harness(ScriptedProvisioner::succeeding());
    let sessions = &h.app.sessions;
    let user = UserId::from(1);

    assert_eq!(sessions.start_request(&user), StartOutcome::Started);
    assert_eq!(sessions.state_of(&user), SessionState::AwaitingSecret);

    match sessions.submit_input(&user, "guess").await {
        InputOutcome::Rejected(err) => {
            assert_eq!(err.kind, BotErrorKind::Denied);
            assert_eq!(err.code, "DENIED");
        }
        other => panic!("expected rejection, got {:?}", other),
    }
    assert!(!sessions.has_session(&user));

    let outcome = sessions.submit_input(&user, "guess").await;
    assert!(matches!(outcome, InputOutcome::NoSession));
    assert!(!sessions.has_session(&user));
    assert!(h.provisioner.calls().is_empty());
    assert_eq!(h.delivery.texts_for(&user), vec![replies::SECRET_REJECTED]);
}

#[tokio::test]
async fn correct_secret_then_name_provisions_once_and_delivers() {
    let h = harness(ScriptedProvisioner::succeeding());
    let sessions = &h.app.sessions;
    let user = UserId::from(2);

    sessions.start_request(&user);
    assert!(matches!(
        sessions.submit_input(&user, SECRET).await,
        InputOutcome::Authenticated
    ));
    assert_eq!(sessions.state_of(&user), SessionState::AwaitingConfigName);

    let outcome = sessions.submit_input(&user, "office-laptop").await;
    assert!(!sessions.has_session(&user), "entry is gone at the terminal step");
    assert_eq!(finish(outcome).await, Completion::Succeeded);

    let calls = h.provisioner.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].config_name, "office-laptop");
    assert_eq!(calls[0].user_id, user);

    let documents = h.delivery.documents_for(&user);
    assert_eq!(documents.len(), 1);
    assert_eq!(documents[0].1, "office-laptop.ovpn");
    assert_eq!(
        h.delivery.texts_for(&user),
        vec![
            replies::SECRET_ACCEPTED,
            replies::GENERATING,
            replies::DELIVERY_HEADER
        ]
    );
    assert!(!sessions.has_session(&user));
    assert!(!sessions.is_provisioning(&user));
}

#[tokio::test]
async fn remote_connection_failure_reports_once_and_clears_session() {
    let h = harness(ScriptedProvisioner::failing(BotError::connection(
        "Failed to connect SSH: Connection refused (os error 111)",
    )));
    let sessions = &h.app.sessions;
    let user = UserId::from(3);

    sessions.start_request(&user);
    sessions.submit_input(&user, SECRET).await;
    let completion = finish(sessions.submit_input(&user, "phone").await).await;
    assert!(matches!(completion, Completion::Failed(_)));

    let failures: Vec<String> = h
        .delivery
        .texts_for(&user)
        .into_iter()
        .filter(|text| text.starts_with("An error occurred:"))
        .collect();
    assert_eq!(
        failures,
        vec!["An error occurred: Failed to connect SSH: Connection refused (os error 111)"]
    );
    assert!(h.delivery.documents_for(&user).is_empty());
    assert!(!sessions.has_session(&user));

    // The user may start over right away.
    assert_eq!(sessions.start_request(&user), StartOutcome::Started);
}

#[tokio::test]
async fn cancel_at_either_step_removes_session_without_provisioning() {
    let h = harness(ScriptedProvisioner::succeeding());
    let sessions = &h.app.sessions;
    let user = UserId::from(4);

    sessions.start_request(&user);
    assert!(matches!(
        sessions.submit_input(&user, triggers::CANCEL).await,
        InputOutcome::Cancelled
    ));
    assert!(!sessions.has_session(&user));

    sessions.start_request(&user);
    sessions.submit_input(&user, SECRET).await;
    assert!(matches!(
        sessions.submit_input(&user, triggers::CANCEL).await,
        InputOutcome::Cancelled
    ));
    assert!(!sessions.has_session(&user));
    assert!(h.provisioner.calls().is_empty());

    assert!(!sessions.cancel(&user), "cancel without a session is a no-op");
}

#[tokio::test]
async fn progressing_one_user_never_touches_another() {
    let h = harness(ScriptedProvisioner::succeeding());
    let sessions = &h.app.sessions;
    let alice = UserId::from("alice");
    let bob = UserId::from("bob");

    sessions.start_request(&alice);
    sessions.start_request(&bob);
    sessions.submit_input(&alice, SECRET).await;
    assert_eq!(sessions.state_of(&alice), SessionState::AwaitingConfigName);
    assert_eq!(sessions.state_of(&bob), SessionState::AwaitingSecret);

    sessions.submit_input(&bob, "wrong").await;
    assert!(!sessions.has_session(&bob));
    assert_eq!(sessions.state_of(&alice), SessionState::AwaitingConfigName);

    finish(sessions.submit_input(&alice, "alice-laptop").await).await;
    assert!(h.delivery.documents_for(&bob).is_empty());
    assert_eq!(h.delivery.documents_for(&alice).len(), 1);
}

#[tokio::test]
async fn restart_while_awaiting_name_goes_back_to_secret() {
    let h = harness(ScriptedProvisioner::succeeding());
    let sessions = &h.app.sessions;
    let user = UserId::from(5);

    sessions.start_request(&user);
    sessions.submit_input(&user, SECRET).await;
    assert_eq!(sessions.start_request(&user), StartOutcome::Restarted);
    assert_eq!(sessions.state_of(&user), SessionState::AwaitingSecret);

    // The name is now taken as a (wrong) secret.
    sessions.submit_input(&user, "office-laptop").await;
    assert!(!sessions.has_session(&user));
    assert!(h.provisioner.calls().is_empty());
}

#[tokio::test]
async fn unusable_name_ends_the_conversation_with_one_failure() {
    let long_name = "a".repeat(65);
    for (offset, name) in ["my laptop", "ноутбук", long_name.as_str(), "../../etc/passwd"]
        .into_iter()
        .enumerate()
    {
        let h = harness(ScriptedProvisioner::succeeding());
        let sessions = &h.app.sessions;
        let user = UserId::from(600 + offset as i64);

        sessions.start_request(&user);
        sessions.submit_input(&user, SECRET).await;
        let detail = match sessions.submit_input(&user, name).await {
            InputOutcome::InvalidName(err) => {
                assert_eq!(err.kind, BotErrorKind::InvalidParams);
                err.message
            }
            other => panic!("expected invalid name for {:?}, got {:?}", name, other),
        };

        assert!(!sessions.has_session(&user), "{:?} left a session behind", name);
        assert_eq!(sessions.state_of(&user), SessionState::Idle);
        assert!(!sessions.is_provisioning(&user));
        assert!(h.provisioner.calls().is_empty());
        assert_eq!(
            h.delivery.texts_for(&user),
            vec![replies::SECRET_ACCEPTED.to_string(), replies::failure(&detail)]
        );

        // A follow-up input is a fresh, unauthenticated start.
        assert!(matches!(
            sessions.submit_input(&user, "laptop").await,
            InputOutcome::NoSession
        ));
    }
}

#[tokio::test]
async fn start_is_refused_while_provisioning_is_in_flight() {
    let h = harness(ScriptedProvisioner::succeeding().with_delay(Duration::from_millis(200)));
    let sessions = &h.app.sessions;
    let user = UserId::from(7);

    sessions.start_request(&user);
    sessions.submit_input(&user, SECRET).await;
    let outcome = sessions.submit_input(&user, "slow-one").await;

    assert!(sessions.is_provisioning(&user));
    assert_eq!(sessions.start_request(&user), StartOutcome::Busy);
    assert!(!sessions.has_session(&user));

    finish(outcome).await;
    assert_eq!(sessions.start_request(&user), StartOutcome::Started);
}

#[tokio::test]
async fn different_users_provision_concurrently() {
    let h = harness(ScriptedProvisioner::succeeding().with_delay(Duration::from_millis(150)));
    let sessions = h.app.sessions.clone();

    let mut tasks = Vec::new();
    for id in 0..4i64 {
        let sessions = sessions.clone();
        tasks.push(tokio::spawn(async move {
            let user = UserId::from(100 + id);
            sessions.start_request(&user);
            sessions.submit_input(&user, SECRET).await;
            let outcome = sessions.submit_input(&user, &format!("device-{}", id)).await;
            finish(outcome).await
        }));
    }
    for task in tasks {
        assert_eq!(task.await.expect("task"), Completion::Succeeded);
    }
    assert_eq!(h.provisioner.calls().len(), 4);
    assert!(h.provisioner.peak_concurrency() >= 2);
    assert_eq!(sessions.active_sessions(), 0);
}

#[tokio::test]
async fn racing_inputs_from_one_user_reach_terminal_state_once() {
    let h = harness(ScriptedProvisioner::succeeding());
    let sessions = h.app.sessions.clone();
    let user = UserId::from(8);

    sessions.start_request(&user);
    sessions.submit_input(&user, SECRET).await;

    let mut tasks = Vec::new();
    for i in 0..8 {
        let sessions = sessions.clone();
        let user = user.clone();
        tasks.push(tokio::spawn(async move {
            sessions.submit_input(&user, &format!("name-{}", i)).await
        }));
    }
    let mut provisioning = 0;
    for task in tasks {
        if let InputOutcome::Provisioning(handle) = task.await.expect("task") {
            handle.await.expect("provisioning");
            provisioning += 1;
        }
    }
    assert_eq!(provisioning, 1);
    assert_eq!(h.provisioner.calls().len(), 1);
    assert!(!sessions.has_session(&user));
}

#[tokio::test]
async fn dispatcher_routes_triggers_and_fallback() {
    let h = harness(ScriptedProvisioner::succeeding());
    let dispatcher = &h.app.dispatcher;
    let user = UserId::from(9);

    assert!(matches!(dispatcher.handle(&user, triggers::START).await, Route::Welcome));
    assert!(matches!(dispatcher.handle(&user, "hello?").await, Route::Fallback));
    assert!(matches!(
        dispatcher.handle(&user, triggers::GENERATE).await,
        Route::Generate(StartOutcome::Started)
    ));
    assert!(matches!(
        dispatcher.handle(&user, SECRET).await,
        Route::Conversation(InputOutcome::Authenticated)
    ));
    assert!(matches!(dispatcher.handle(&user, triggers::CANCEL).await, Route::Cancelled));
    assert!(!h.app.sessions.has_session(&user));

    assert_eq!(
        h.delivery.texts_for(&user),
        vec![
            replies::WELCOME,
            replies::FALLBACK,
            replies::ASK_SECRET,
            replies::SECRET_ACCEPTED,
            replies::CANCELLED,
        ]
    );
}

#[tokio::test]
async fn dispatcher_generate_command_runs_full_flow() {
    let h = harness(ScriptedProvisioner::succeeding());
    let dispatcher = &h.app.dispatcher;
    let user = UserId::from(10);

    dispatcher.handle(&user, triggers::GENERATE_COMMAND).await;
    dispatcher.handle(&user, SECRET).await;
    match dispatcher.handle(&user, "tablet").await {
        Route::Conversation(outcome) => {
            assert_eq!(finish(outcome).await, Completion::Succeeded)
        }
        other => panic!("unexpected route {:?}", other),
    }
    assert_eq!(h.delivery.documents_for(&user).len(), 1);
}
