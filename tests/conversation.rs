//! Inbound conversation pipeline integration tests

use std::sync::Arc;

use async_trait::async_trait;

use nudge_gateway::agent::{FALLBACK_REPLY, ReplyOutcome};
use nudge_gateway::context::PromptConfig;
use nudge_gateway::naming::{Inflector, NameForms, render_template};
use nudge_gateway::persona::Persona;
use nudge_gateway::session::Role;
use nudge_gateway::{Error, Result};

mod common;
use common::{Harness, ScriptedGenerator};

/// Declines "Маша" like a real service would; everything else fails
struct RussianInflector;

#[async_trait]
impl Inflector for RussianInflector {
    async fn inflect(&self, name: &str) -> Result<NameForms> {
        if name != "Маша" {
            return Err(Error::Inflection(format!("unknown name {name}")));
        }
        Ok(NameForms {
            nominative: "Маша".to_string(),
            genitive: "Маши".to_string(),
            dative: "Маше".to_string(),
            accusative: "Машу".to_string(),
            instrumental: "Машей".to_string(),
            prepositional: "Маше".to_string(),
        })
    }
}

#[tokio::test]
async fn reply_is_generated_delivered_and_stored() {
    let h = Harness::new(ScriptedGenerator::always("  hi yourself  "));

    let outcome = h.say(5, "hello there").await;
    assert_eq!(outcome, ReplyOutcome::Replied("hi yourself".to_string()));
    assert_eq!(h.channel.sent_to(5), vec!["hi yourself".to_string()]);
    assert_eq!(h.channel.typing(), vec![5]);

    let session = h.store.snapshot(5).await.unwrap();
    let roles: Vec<Role> = session.history.iter().map(|t| t.role).collect();
    assert_eq!(roles, vec![Role::User, Role::Assistant]);
    assert_eq!(session.last_bot_reply, Some(h.clock_now()));
    session.check_invariants(h.store.max_history_chars()).unwrap();
}

#[tokio::test]
async fn introduced_name_without_inflector_uses_identity_forms() {
    let h = Harness::new(ScriptedGenerator::always("nice to meet you"));
    h.say(1, "hey, call me Alex").await;

    let session = h.store.snapshot(1).await.unwrap();
    assert_eq!(session.user_name.as_deref(), Some("Alex"));
    assert_eq!(session.name_forms.as_ref().unwrap().nominative, "Alex");
    assert_eq!(render_template(&session, "{name}, hi!"), "Alex, hi!");
    assert_eq!(render_template(&session, "to {name_dat}"), "to Alex");
}

#[tokio::test]
async fn name_learned_from_a_message_shapes_that_same_reply() {
    let h = Harness::with_prompt(
        ScriptedGenerator::always("привет"),
        PromptConfig {
            name_addendum: "Пиши {name_dat} ласково.".to_string(),
            ..PromptConfig::default()
        },
    );
    h.say(1, "меня зовут Маша").await;

    // Without an inflector the dative falls back to the base form
    let system = h.generator.last_system_prompt().unwrap();
    assert!(system.contains("Пиши Маша ласково."), "{system}");
}

#[tokio::test]
async fn inflected_forms_are_stored_and_rendered() {
    let h = Harness::with_inflector(
        ScriptedGenerator::always("ok"),
        Arc::new(RussianInflector) as Arc<dyn Inflector>,
    );
    h.say(1, "Меня зовут Маша").await;

    let session = h.store.snapshot(1).await.unwrap();
    assert_eq!(session.name_forms.as_ref().unwrap().dative, "Маше");
    assert_eq!(render_template(&session, "Скучаю по {name_dat}"), "Скучаю по Маше");
}

#[tokio::test]
async fn inflection_failure_degrades_to_identity() {
    let h = Harness::with_inflector(
        ScriptedGenerator::always("ok"),
        Arc::new(RussianInflector) as Arc<dyn Inflector>,
    );
    assert!(matches!(h.say(1, "my name is Olga").await, ReplyOutcome::Replied(_)));

    let session = h.store.snapshot(1).await.unwrap();
    assert_eq!(session.name_forms, Some(NameForms::identity("Olga")));
}

#[tokio::test]
async fn hostile_beats_affectionate() {
    let h = Harness::new(ScriptedGenerator::always("hm"));
    h.say(1, "I love you but you are stupid").await;

    assert_eq!(h.store.snapshot(1).await.unwrap().persona, Persona::Hostile);
    let system = h.generator.last_system_prompt().unwrap();
    assert!(system.contains(Persona::Hostile.instruction()));
}

#[tokio::test]
async fn persona_follows_the_latest_message() {
    let h = Harness::new(ScriptedGenerator::always("hm"));
    h.say(1, "you idiot").await;
    h.say(1, "sorry, I missed you").await;
    assert_eq!(h.store.snapshot(1).await.unwrap().persona, Persona::Affectionate);

    h.say(1, "what's for dinner").await;
    assert_eq!(h.store.snapshot(1).await.unwrap().persona, Persona::Neutral);
}

#[tokio::test]
async fn fallback_is_delivered_but_not_persisted() {
    let h = Harness::new(ScriptedGenerator::script(vec![None, Some("back again")]));

    assert_eq!(h.say(1, "first").await, ReplyOutcome::Fallback);
    assert_eq!(h.channel.sent_to(1), vec![FALLBACK_REPLY.to_string()]);

    let session = h.store.snapshot(1).await.unwrap();
    assert_eq!(session.history.len(), 1);
    assert_eq!(session.history[0].role, Role::User);

    // The next prompt must not replay the fallback text
    h.say(1, "second").await;
    let requests = h.generator.requests();
    let replayed = &requests.last().unwrap().messages;
    assert!(replayed.iter().all(|m| m.content != FALLBACK_REPLY));
    assert!(replayed.iter().any(|m| m.content == "first"));
}

#[tokio::test]
async fn delivery_failure_is_reported_and_not_stored() {
    let h = Harness::new(ScriptedGenerator::always("lost"));
    h.channel.fail_for(3);

    assert_eq!(h.say(3, "anyone?").await, ReplyOutcome::DeliveryFailed);
    let session = h.store.snapshot(3).await.unwrap();
    assert_eq!(session.history.len(), 1);
    assert!(session.last_bot_reply.is_none());
}

#[tokio::test]
async fn blank_messages_are_ignored() {
    let h = Harness::new(ScriptedGenerator::always("?"));
    assert_eq!(h.say(1, "   ").await, ReplyOutcome::Ignored);
    assert!(h.store.is_empty().await);
    assert!(h.generator.requests().is_empty());
}

#[tokio::test]
async fn history_stays_within_budget() {
    let h = Harness::with_prompt(
        ScriptedGenerator::always("0123456789"),
        PromptConfig {
            max_history_chars: 50,
            ..PromptConfig::default()
        },
    );
    for i in 0..20 {
        h.say(1, &format!("message {i:02}")).await;
    }

    let session = h.store.snapshot(1).await.unwrap();
    let total: usize = session.history.iter().map(|t| t.char_len()).sum();
    assert!(total <= 50, "{total}");
    assert_eq!(session.last_turn().unwrap().content, "0123456789");
    session.check_invariants(50).unwrap();
}

#[tokio::test]
async fn chats_are_isolated() {
    let h = Harness::new(ScriptedGenerator::always("ok"));
    h.say(1, "call me Alex").await;
    h.say(2, "you are useless").await;

    let one = h.store.snapshot(1).await.unwrap();
    let two = h.store.snapshot(2).await.unwrap();
    assert_eq!(one.persona, Persona::Neutral);
    assert_eq!(two.persona, Persona::Hostile);
    assert!(two.user_name.is_none());
    assert_eq!(h.store.len().await, 2);
}
